use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::models::{LlmSettings, Message, Provider, WireKind};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

/** \brief 聊天接口默认采样温度。 */
pub const DEFAULT_TEMPERATURE: f64 = 0.4;

/**
 * \brief 调度就绪的服务商配置：凭证、模型、基地址均已补全。
 */
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    pub provider: Provider,
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
}

/**
 * \brief 把请求覆盖项解析为可调度配置。
 *
 * 凭证取请求覆盖，否则取该服务商的环境变量默认值；二者皆无且服务商
 * 要求鉴权时报错。模型与基地址同理回退到内置默认。
 */
pub fn resolve(settings: &LlmSettings) -> Result<ResolvedProvider> {
    let provider = match settings.provider.as_deref() {
        Some(name) => Provider::from_name(name)?,
        None => Provider::Google,
    };

    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            std::env::var(provider.api_key_env())
                .ok()
                .filter(|k| !k.trim().is_empty())
        });
    let api_key = match api_key {
        Some(k) => k,
        None if provider.allows_missing_key() => String::new(),
        None => {
            return Err(anyhow!(
                "missing API key for provider '{}': pass api_key or set {}",
                provider.as_str(),
                provider.api_key_env()
            ))
        }
    };

    let model = settings
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| provider.default_model().to_string());
    let api_base = settings
        .base_url
        .clone()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| provider.default_api_base().to_string());

    Ok(ResolvedProvider {
        provider,
        api_base,
        api_key,
        model,
        temperature: settings.temperature.unwrap_or(DEFAULT_TEMPERATURE),
    })
}

/**
 * \brief 非流式生成：一次外呼，返回完整回复文本。
 */
pub async fn generate_text(
    rp: &ResolvedProvider,
    prompt: &str,
    system_message: Option<&str>,
) -> Result<String> {
    match rp.provider.wire_kind() {
        WireKind::OpenAi => generate_openai(rp, prompt, system_message).await,
        WireKind::Claude => generate_claude(rp, prompt, system_message).await,
        WireKind::Gemini => generate_gemini(rp, prompt, system_message).await,
    }
}

async fn generate_openai(
    rp: &ResolvedProvider,
    prompt: &str,
    system_message: Option<&str>,
) -> Result<String> {
    let url = format!("{}/v1/chat/completions", rp.api_base.trim_end_matches('/'));
    let client = reqwest::Client::builder().build()?;

    let mut messages: Vec<Message> = Vec::new();
    if let Some(sys) = system_message {
        messages.push(Message {
            role: "system".to_string(),
            content: sys.to_string(),
        });
    }
    messages.push(Message {
        role: "user".to_string(),
        content: prompt.to_string(),
    });

    let body = json!({
        "model": rp.model,
        "messages": messages,
        "temperature": rp.temperature,
        "stream": false
    });

    let resp = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(AUTHORIZATION, format!("Bearer {}", rp.api_key))
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("request failed: {} -> {}", status, text));
    }
    let v: Value = resp.json().await?;
    Ok(extract_openai_content(&v))
}

async fn generate_claude(
    rp: &ResolvedProvider,
    prompt: &str,
    system_message: Option<&str>,
) -> Result<String> {
    let url = format!("{}/v1/messages", rp.api_base.trim_end_matches('/'));
    let client = reqwest::Client::new();

    let mut body = json!({
        "model": rp.model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "temperature": rp.temperature,
        "messages": [{
            "role": "user",
            "content": [{"type": "text", "text": prompt}]
        }],
    });
    if let Some(sys) = system_message {
        body["system"] = json!(sys);
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert("x-api-key", HeaderValue::from_str(&rp.api_key)?);
    headers.insert(
        "anthropic-version",
        HeaderValue::from_static(ANTHROPIC_VERSION),
    );

    let resp = client.post(url).headers(headers).json(&body).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("claude request failed: {} -> {}", status, text));
    }
    let v: Value = resp.json().await?;
    Ok(extract_anthropic_content(&v))
}

async fn generate_gemini(
    rp: &ResolvedProvider,
    prompt: &str,
    system_message: Option<&str>,
) -> Result<String> {
    let base = normalize_gemini_base(&rp.api_base);
    let url = format!("{}/models/{}:generateContent", base, rp.model);
    let client = reqwest::Client::new();

    let mut body = json!({
        "contents": [{
            "role": "user",
            "parts": [{"text": prompt}]
        }],
        "generationConfig": {
            "temperature": rp.temperature
        }
    });
    if let Some(sys) = system_message {
        body["system_instruction"] = json!({
            "parts": [{"text": sys}]
        });
    }

    let resp = client
        .post(url)
        .query(&[("key", rp.api_key.as_str())])
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(anyhow!("gemini request failed: {} -> {}", status, text));
    }
    let v: Value = resp.json().await?;
    Ok(extract_gemini_content(&v))
}

fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_anthropic_content(v: &Value) -> String {
    v.get("content")
        .and_then(|arr| arr.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

fn extract_gemini_content(v: &Value) -> String {
    if let Some(candidates) = v.get("candidates").and_then(|c| c.as_array()) {
        if let Some(first) = candidates.first() {
            if let Some(content) = first.get("content") {
                if let Some(parts) = content.get("parts").and_then(|p| p.as_array()) {
                    return parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<Vec<_>>()
                        .join("");
                }
            }
        }
    }
    v.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string()
}

fn normalize_gemini_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{}/v1beta", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: &str) -> LlmSettings {
        LlmSettings {
            provider: Some(provider.to_string()),
            ..LlmSettings::default()
        }
    }

    #[test]
    fn test_resolve_explicit_key_wins() {
        let mut s = settings("openai");
        s.api_key = Some("sk-explicit".to_string());
        s.model = Some("gpt-4o".to_string());
        let rp = resolve(&s).expect("resolve openai");
        assert_eq!(rp.api_key, "sk-explicit");
        assert_eq!(rp.model, "gpt-4o");
        assert_eq!(rp.api_base, "https://api.openai.com");
        assert_eq!(rp.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_resolve_env_fallback() {
        std::env::set_var("DEEPSEEK_API_KEY", "sk-from-env");
        let rp = resolve(&settings("deepseek")).expect("resolve deepseek");
        assert_eq!(rp.api_key, "sk-from-env");
        assert_eq!(rp.model, "deepseek-chat");
        std::env::remove_var("DEEPSEEK_API_KEY");
    }

    #[test]
    fn test_resolve_missing_key_fails() {
        std::env::remove_var("OPENROUTER_API_KEY");
        let err = resolve(&settings("openrouter")).expect_err("must fail without key");
        assert!(err.to_string().contains("OPENROUTER_API_KEY"));
    }

    #[test]
    fn test_resolve_ollama_without_key() {
        std::env::remove_var("OLLAMA_API_KEY");
        let rp = resolve(&settings("ollama")).expect("ollama needs no key");
        assert!(rp.api_key.is_empty());
        assert_eq!(rp.api_base, "http://localhost:11434/v1");
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let err = resolve(&settings("watsonx")).expect_err("unknown provider");
        assert!(err.to_string().contains("unsupported provider"));
    }

    #[test]
    fn test_resolve_blank_overrides_fall_back() {
        let mut s = settings("ollama");
        s.model = Some("  ".to_string());
        s.base_url = Some(String::new());
        s.temperature = Some(1.3);
        let rp = resolve(&s).expect("resolve");
        assert_eq!(rp.model, "llama3.1");
        assert_eq!(rp.api_base, "http://localhost:11434/v1");
        assert_eq!(rp.temperature, 1.3);
    }

    #[test]
    fn test_extract_openai_content() {
        let v = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(extract_openai_content(&v), "hello");
        assert_eq!(extract_openai_content(&json!({})), "");
    }

    #[test]
    fn test_extract_anthropic_content() {
        let v = json!({
            "content": [
                {"type": "text", "text": "part one"},
                {"type": "text", "text": " part two"}
            ]
        });
        assert_eq!(extract_anthropic_content(&v), "part one part two");
    }

    #[test]
    fn test_extract_gemini_content() {
        let v = json!({
            "candidates": [{
                "content": {"parts": [{"text": "gemini says"}]}
            }]
        });
        assert_eq!(extract_gemini_content(&v), "gemini says");
    }

    #[test]
    fn test_normalize_gemini_base() {
        assert_eq!(
            normalize_gemini_base("https://generativelanguage.googleapis.com"),
            "https://generativelanguage.googleapis.com/v1beta"
        );
        assert_eq!(
            normalize_gemini_base("https://example.com/v1beta/"),
            "https://example.com/v1beta"
        );
    }
}
