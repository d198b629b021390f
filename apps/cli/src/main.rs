use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agentbrowse_core_sdk::{config, llm, models::LlmSettings, prompts, server, telemetry, web};

/**
 * \brief CLI 程序入口：启动服务或做一次性调用。
 */
#[derive(Parser, Debug)]
#[command(name = "agentbrowse", version, about = "Agentic Browser API service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 服务。
     */
    Serve {
        /** \brief 覆盖 BACKEND_HOST/BACKEND_PORT 组合出的监听地址 */
        #[arg(long)]
        addr: Option<String>,
    },

    /**
     * \brief 一次性聊天生成，打印回复。
     */
    Chat {
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "google")]
        provider: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long, default_value_t = 0.4)]
        temperature: f64,
        #[arg(long)]
        system: Option<String>,
    },

    /**
     * \brief 针对仓库上下文提问，打印答案。
     */
    Github {
        #[arg(long)]
        question: String,
        #[arg(long, default_value = "")]
        text: String,
        #[arg(long, default_value = "")]
        tree: String,
        #[arg(long, default_value = "")]
        summary: String,
        #[arg(long)]
        provider: Option<String>,
    },

    /**
     * \brief 抓取网页并打印 markdown。
     */
    Markdown {
        #[arg(long)]
        url: String,
    },

    /**
     * \brief 把 HTML 转 markdown，来源为文件或标准输入。
     */
    Html2md {
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = config::Settings::from_env();
    telemetry::set_enabled(settings.telemetry_enabled);

    match cli.command {
        Commands::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.bind_addr());
            server::run(&addr).await?;
        }
        Commands::Chat {
            prompt,
            provider,
            model,
            api_key,
            base_url,
            temperature,
            system,
        } => {
            let rp = llm::resolve(&LlmSettings {
                provider: Some(provider),
                model,
                api_key,
                base_url,
                temperature: Some(temperature),
            })
            .context("resolve provider failed")?;
            let content = llm::generate_text(&rp, &prompt, system.as_deref())
                .await
                .context("generation failed")?;
            println!("{}", content);
        }
        Commands::Github {
            question,
            text,
            tree,
            summary,
            provider,
        } => {
            let ctx = prompts::RepoContext {
                question,
                text,
                tree,
                summary,
                chat_history: String::new(),
            };
            let overrides = LlmSettings {
                provider,
                ..LlmSettings::default()
            };
            let answer = prompts::github_answer(&ctx, &overrides)
                .await
                .context("github answer failed")?;
            println!("{}", answer);
        }
        Commands::Markdown { url } => {
            let md = web::fetch_markdown(&url).await.context("fetch failed")?;
            println!("{}", md);
        }
        Commands::Html2md { file } => {
            let html = match file {
                Some(path) => std::fs::read_to_string(&path)
                    .with_context(|| format!("read {} failed", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("read stdin failed")?;
                    buf
                }
            };
            let md = web::html_to_markdown(&html).context("convert failed")?;
            println!("{}", md);
        }
    }

    Ok(())
}
