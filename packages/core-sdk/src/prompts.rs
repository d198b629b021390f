use anyhow::Result;

use crate::llm;
use crate::models::LlmSettings;

/** \brief 仓库问答的固定系统提示。 */
const GITHUB_SYSTEM_MESSAGE: &str = "You are a senior software engineer answering questions \
about a GitHub repository. Ground every statement in the provided context. When the context \
is insufficient, say so instead of guessing. Answer in concise markdown.";

/**
 * \brief 仓库问答的调用方上下文，除 question 外均可为空。
 */
#[derive(Debug, Clone, Default)]
pub struct RepoContext {
    pub question: String,
    pub text: String,
    pub tree: String,
    pub summary: String,
    pub chat_history: String,
}

/**
 * \brief 拼装固定结构的单条 prompt。
 *
 * 各可选段原样嵌入，来源字段为空则整段省略；不做截断、分块或相关性
 * 排序，上下文按调用方给定的原文转发。
 */
pub fn build_github_prompt(ctx: &RepoContext) -> String {
    let mut sections: Vec<String> = Vec::new();

    if !ctx.summary.trim().is_empty() {
        sections.push(format!("## Repository summary\n{}", ctx.summary.trim()));
    }
    if !ctx.tree.trim().is_empty() {
        sections.push(format!("## File tree\n```\n{}\n```", ctx.tree.trim()));
    }
    if !ctx.text.trim().is_empty() {
        sections.push(format!("## Relevant files\n{}", ctx.text.trim()));
    }
    if !ctx.chat_history.trim().is_empty() {
        sections.push(format!(
            "## Conversation so far\n{}",
            ctx.chat_history.trim()
        ));
    }
    sections.push(format!("## Question\n{}", ctx.question.trim()));

    sections.join("\n\n")
}

/**
 * \brief 仓库问答：拼 prompt 后交给调度器生成答案。
 *
 * overrides 中缺省的项回退到内置默认（provider=google 等）。
 */
pub async fn github_answer(ctx: &RepoContext, overrides: &LlmSettings) -> Result<String> {
    let rp = llm::resolve(overrides)?;
    let prompt = build_github_prompt(ctx);
    llm::generate_text(&rp, &prompt, Some(GITHUB_SYSTEM_MESSAGE)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_with_full_context() {
        let ctx = RepoContext {
            question: "How does auth work?".to_string(),
            text: "// auth.js\nfunction authenticate(user) {}".to_string(),
            tree: "src/\n  auth/\n    auth.js".to_string(),
            summary: "A Node.js authentication service".to_string(),
            chat_history: "user: hi\nassistant: hello".to_string(),
        };
        let prompt = build_github_prompt(&ctx);
        assert!(prompt.contains("## Repository summary"));
        assert!(prompt.contains("A Node.js authentication service"));
        assert!(prompt.contains("## File tree"));
        assert!(prompt.contains("auth.js"));
        assert!(prompt.contains("## Relevant files"));
        assert!(prompt.contains("## Conversation so far"));
        assert!(prompt.contains("## Question\nHow does auth work?"));
    }

    #[test]
    fn test_prompt_omits_empty_sections() {
        let ctx = RepoContext {
            question: "What does this repo do?".to_string(),
            ..RepoContext::default()
        };
        let prompt = build_github_prompt(&ctx);
        assert!(!prompt.contains("## Repository summary"));
        assert!(!prompt.contains("## File tree"));
        assert!(!prompt.contains("## Relevant files"));
        assert!(!prompt.contains("## Conversation so far"));
        assert_eq!(prompt, "## Question\nWhat does this repo do?");
    }

    #[test]
    fn test_prompt_question_always_last() {
        let ctx = RepoContext {
            question: "q".to_string(),
            summary: "s".to_string(),
            ..RepoContext::default()
        };
        let prompt = build_github_prompt(&ctx);
        assert!(prompt.ends_with("## Question\nq"));
    }

    #[test]
    fn test_context_embedded_verbatim() {
        let ctx = RepoContext {
            question: "q".to_string(),
            text: "line1\nline2 <unescaped> & raw".to_string(),
            ..RepoContext::default()
        };
        let prompt = build_github_prompt(&ctx);
        assert!(prompt.contains("line1\nline2 <unescaped> & raw"));
    }
}
