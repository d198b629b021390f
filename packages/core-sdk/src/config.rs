use std::env;

/**
 * \brief 进程级配置，启动时从环境变量读取一次，之后只读共享。
 */
#[derive(Debug, Clone)]
pub struct Settings {
    /** \brief 运行环境名：development / production 等 */
    pub env: String,
    /** \brief 调试开关，development 下默认开启 */
    pub debug: bool,
    /** \brief HTTP 监听地址 */
    pub host: String,
    /** \brief HTTP 监听端口 */
    pub port: u16,
    /** \brief 事件日志开关，缺省跟随 debug */
    pub telemetry_enabled: bool,
}

impl Settings {
    /**
     * \brief 读取 .env 与环境变量，构造配置。
     *
     * .env 缺失不视为错误。
     */
    pub fn from_env() -> Settings {
        let _ = dotenvy::dotenv();

        let env_name = env::var("ENV").unwrap_or_else(|_| "development".to_string());
        let debug = match env::var("DEBUG") {
            Ok(v) => parse_bool(&v),
            Err(_) => env_name == "development",
        };
        let telemetry_enabled = match env::var("TELEMETRY") {
            Ok(v) => parse_bool(&v),
            Err(_) => debug,
        };

        Settings {
            debug,
            telemetry_enabled,
            host: env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BACKEND_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(5454),
            env: env_name,
        }
    }

    /** \brief 组合出监听地址，如 "0.0.0.0:5454"。 */
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
