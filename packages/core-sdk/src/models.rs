use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/**
 * \brief 支持的模型服务商（封闭枚举，未知名称在边界处报错）。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    OpenAi,
    Anthropic,
    Ollama,
    Deepseek,
    Openrouter,
}

/**
 * \brief 各服务商实际使用的线上协议形态。
 *
 * ollama / deepseek / openrouter 均兼容 OpenAI chat completions。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    OpenAi,
    Claude,
    Gemini,
}

impl Provider {
    /**
     * \brief 按名称解析服务商，未知名称返回配置错误。
     */
    pub fn from_name(name: &str) -> Result<Provider> {
        match name.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAi),
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "ollama" => Ok(Provider::Ollama),
            "deepseek" => Ok(Provider::Deepseek),
            "openrouter" => Ok(Provider::Openrouter),
            other => Err(anyhow!(
                "unsupported provider '{}', expected one of: google, openai, anthropic, ollama, deepseek, openrouter",
                other
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Ollama => "ollama",
            Provider::Deepseek => "deepseek",
            Provider::Openrouter => "openrouter",
        }
    }

    pub fn wire_kind(&self) -> WireKind {
        match self {
            Provider::Google => WireKind::Gemini,
            Provider::Anthropic => WireKind::Claude,
            Provider::OpenAi | Provider::Ollama | Provider::Deepseek | Provider::Openrouter => {
                WireKind::OpenAi
            }
        }
    }

    /** \brief 未显式指定模型时使用的默认模型名。 */
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Google => "gemini-1.5-flash",
            Provider::OpenAi => "gpt-4o-mini",
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::Ollama => "llama3.1",
            Provider::Deepseek => "deepseek-chat",
            Provider::Openrouter => "openrouter/auto",
        }
    }

    /** \brief 未显式指定 base_url 时使用的默认 API 基地址。 */
    pub fn default_api_base(&self) -> &'static str {
        match self {
            Provider::Google => "https://generativelanguage.googleapis.com",
            Provider::OpenAi => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Ollama => "http://localhost:11434/v1",
            Provider::Deepseek => "https://api.deepseek.com",
            Provider::Openrouter => "https://openrouter.ai/api",
        }
    }

    /** \brief 该服务商默认凭证对应的环境变量名。 */
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Google => "GOOGLE_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::Ollama => "OLLAMA_API_KEY",
            Provider::Deepseek => "DEEPSEEK_API_KEY",
            Provider::Openrouter => "OPENROUTER_API_KEY",
        }
    }

    /** \brief 本地部署的服务商允许空凭证。 */
    pub fn allows_missing_key(&self) -> bool {
        matches!(self, Provider::Ollama)
    }
}

/**
 * \brief 请求携带的调度覆盖项，缺省项由调度器补默认值。
 */
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /** \brief 角色：system/user/assistant */
    pub role: String,
    /** \brief 内容 */
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_from_name() {
        assert_eq!(
            Provider::from_name("google").expect("parse google"),
            Provider::Google
        );
        assert_eq!(
            Provider::from_name(" OpenAI ").expect("parse openai"),
            Provider::OpenAi
        );
        assert_eq!(
            Provider::from_name("claude").expect("parse claude alias"),
            Provider::Anthropic
        );
        let err = Provider::from_name("bedrock").expect_err("unknown must fail");
        assert!(err.to_string().contains("unsupported provider 'bedrock'"));
    }

    #[test]
    fn test_wire_kind_mapping() {
        assert_eq!(Provider::Google.wire_kind(), WireKind::Gemini);
        assert_eq!(Provider::Anthropic.wire_kind(), WireKind::Claude);
        assert_eq!(Provider::Deepseek.wire_kind(), WireKind::OpenAi);
        assert_eq!(Provider::Openrouter.wire_kind(), WireKind::OpenAi);
        assert_eq!(Provider::Ollama.wire_kind(), WireKind::OpenAi);
    }

    #[test]
    fn test_serde_lowercase_names() {
        let v = serde_json::to_string(&Provider::OpenAi).expect("serialize");
        assert_eq!(v, "\"openai\"");
        let p: Provider = serde_json::from_str("\"deepseek\"").expect("deserialize");
        assert_eq!(p, Provider::Deepseek);
    }

    #[test]
    fn test_defaults_are_nonempty() {
        for p in [
            Provider::Google,
            Provider::OpenAi,
            Provider::Anthropic,
            Provider::Ollama,
            Provider::Deepseek,
            Provider::Openrouter,
        ] {
            assert!(!p.default_model().is_empty());
            assert!(p.default_api_base().starts_with("http"));
            assert!(p.api_key_env().ends_with("_API_KEY"));
        }
    }
}
