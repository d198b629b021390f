use anyhow::{anyhow, Result};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::llm::{self, DEFAULT_TEMPERATURE};
use crate::models::LlmSettings;
use crate::prompts::{self, RepoContext};
use crate::telemetry;
use crate::web;

const SERVICE_NAME: &str = "Agentic Browser API";
const SERVICE_DESCRIPTION: &str =
    "AI-powered tools for chat generation, GitHub analysis, and web content processing";

/**
 * \brief 启动 HTTP 服务。
 * \param addr 监听地址，如 "0.0.0.0:5454"
 */
pub async fn run(addr: &str) -> Result<()> {
    let app = router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/** \brief 组装全部路由；放开 CORS 供配套看板调用。 */
pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/v1/chat/generate", post(chat_generate))
        .route("/v1/github/answer", post(github_answer))
        .route("/v1/website/markdown", post(website_markdown))
        .route("/v1/website/html-to-md", post(website_html_to_md))
        .layer(CorsLayer::permissive())
}

#[derive(Deserialize, Debug)]
struct ChatRequest {
    /** \brief 用户提问 */
    prompt: String,
    /** \brief 可选系统提示 */
    #[serde(default)]
    system_message: Option<String>,
    /** \brief 服务商名，缺省 google */
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default)]
    model: Option<String>,
    /** \brief 覆盖环境变量凭证 */
    #[serde(default)]
    api_key: Option<String>,
    /** \brief 自建服务基地址（主要给 ollama） */
    #[serde(default)]
    base_url: Option<String>,
    /** \brief 采样温度，合法区间 [0.0, 2.0] */
    #[serde(default = "default_temperature")]
    temperature: f64,
}

#[derive(Serialize, Debug)]
struct ChatResponse {
    content: String,
}

#[derive(Deserialize, Debug)]
struct GithubAnswerRequest {
    /** \brief 针对仓库的问题 */
    question: String,
    /** \brief 相关文件内容或合并后的上下文 */
    #[serde(default)]
    text: String,
    /** \brief 仓库目录树 */
    #[serde(default)]
    tree: String,
    /** \brief 仓库简介 */
    #[serde(default)]
    summary: String,
    /** \brief 先前对话内容 */
    #[serde(default)]
    chat_history: String,
    #[serde(default)]
    llm_provider: Option<String>,
    #[serde(default)]
    llm_model: Option<String>,
    #[serde(default)]
    llm_api_key: Option<String>,
    #[serde(default)]
    llm_base_url: Option<String>,
    #[serde(default)]
    llm_temperature: Option<f64>,
}

#[derive(Serialize, Debug)]
struct GithubAnswerResponse {
    answer: String,
}

#[derive(Deserialize, Debug)]
struct WebsiteMarkdownRequest {
    url: String,
}

#[derive(Deserialize, Debug)]
struct HtmlToMdRequest {
    html: String,
}

#[derive(Serialize, Debug)]
struct MarkdownResponse {
    markdown: String,
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/** \brief 进入任何外呼之前的温度校验。 */
fn validate_temperature(temperature: f64) -> Result<()> {
    if !(0.0..=2.0).contains(&temperature) {
        return Err(anyhow!(
            "temperature must be within [0.0, 2.0], got {}",
            temperature
        ));
    }
    Ok(())
}

/** \brief 所有处理失败统一折算为 400 + 文本消息。 */
fn bad_request<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

/**
 * \brief 健康检查，不依赖任何下游服务商。
 */
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/**
 * \brief 服务信息。
 */
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": SERVICE_DESCRIPTION,
        "docs_url": "/docs",
        "redoc_url": "/redoc"
    }))
}

/**
 * \brief 聊天生成：一次外呼转发给所选服务商。
 */
async fn chat_generate(
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    validate_temperature(req.temperature).map_err(bad_request)?;

    let settings = LlmSettings {
        provider: Some(req.provider.clone()),
        model: req.model,
        api_key: req.api_key,
        base_url: req.base_url,
        temperature: Some(req.temperature),
    };

    let rp = llm::resolve(&settings).map_err(|e| {
        telemetry::log_error("server.chat", &format!("resolve failed: {}", e));
        bad_request(e)
    })?;

    telemetry::log_event(
        "server.chat",
        &format!(
            "provider={} model={} prompt_len={}",
            rp.provider.as_str(),
            rp.model,
            req.prompt.len()
        ),
    );

    match llm::generate_text(&rp, &req.prompt, req.system_message.as_deref()).await {
        Ok(content) => Ok(Json(ChatResponse { content })),
        Err(e) => {
            telemetry::log_error("server.chat", &format!("generate failed: {}", e));
            Err(bad_request(e))
        }
    }
}

/**
 * \brief 仓库问答：模板拼 prompt 后转发给调度器。
 */
async fn github_answer(
    Json(req): Json<GithubAnswerRequest>,
) -> Result<Json<GithubAnswerResponse>, (StatusCode, String)> {
    if let Some(t) = req.llm_temperature {
        validate_temperature(t).map_err(bad_request)?;
    }

    let ctx = RepoContext {
        question: req.question,
        text: req.text,
        tree: req.tree,
        summary: req.summary,
        chat_history: req.chat_history,
    };
    let overrides = LlmSettings {
        provider: req.llm_provider,
        model: req.llm_model,
        api_key: req.llm_api_key,
        base_url: req.llm_base_url,
        temperature: req.llm_temperature,
    };

    telemetry::log_event(
        "server.github",
        &format!(
            "question_len={} text_len={} tree_len={}",
            ctx.question.len(),
            ctx.text.len(),
            ctx.tree.len()
        ),
    );

    match prompts::github_answer(&ctx, &overrides).await {
        Ok(answer) => Ok(Json(GithubAnswerResponse { answer })),
        Err(e) => {
            telemetry::log_error("server.github", &format!("answer failed: {}", e));
            Err(bad_request(e))
        }
    }
}

/**
 * \brief 抓取网页并转 markdown。
 */
async fn website_markdown(
    Json(req): Json<WebsiteMarkdownRequest>,
) -> Result<Json<MarkdownResponse>, (StatusCode, String)> {
    telemetry::log_event("server.website", &format!("fetch url={}", req.url));
    match web::fetch_markdown(&req.url).await {
        Ok(markdown) => Ok(Json(MarkdownResponse { markdown })),
        Err(e) => {
            telemetry::log_error("server.website", &format!("fetch failed: {}", e));
            Err(bad_request(e))
        }
    }
}

/**
 * \brief HTML 文本转 markdown。
 */
async fn website_html_to_md(
    Json(req): Json<HtmlToMdRequest>,
) -> Result<Json<MarkdownResponse>, (StatusCode, String)> {
    telemetry::log_event("server.website", &format!("html_len={}", req.html.len()));
    match web::html_to_markdown(&req.html) {
        Ok(markdown) => Ok(Json(MarkdownResponse { markdown })),
        Err(e) => {
            telemetry::log_error("server.website", &format!("convert failed: {}", e));
            Err(bad_request(e))
        }
    }
}
