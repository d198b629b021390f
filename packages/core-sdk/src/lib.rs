pub mod config;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod server;
pub mod telemetry;
pub mod web;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config;
    pub use crate::llm;
    pub use crate::models;
    pub use crate::prompts;
    pub use crate::server;
    pub use crate::telemetry;
    pub use crate::web;
}
