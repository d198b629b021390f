use anyhow::{anyhow, Result};

const USER_AGENT: &str =
    "Mozilla/5.0 (compatible; AgentBrowse/0.1; +https://github.com/agentbrowse)";

/**
 * \brief 抓取网页并转为 markdown。
 *
 * 仅接受 http/https；非 2xx 响应与网络错误均作为抓取错误上抛。
 */
pub async fn fetch_markdown(url: &str) -> Result<String> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(anyhow!("invalid url '{}': expected http:// or https://", url));
    }

    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let resp = client.get(url).send().await?;

    if !resp.status().is_success() {
        let status = resp.status();
        return Err(anyhow!("fetch failed: {} -> {}", status, url));
    }
    let html = resp.text().await?;
    if html.trim().is_empty() {
        return Err(anyhow!("fetch failed: empty body from {}", url));
    }

    Ok(normalize_markdown(&html2md::parse_html(&html)))
}

/**
 * \brief 把调用方给定的 HTML 文本转为 markdown。
 */
pub fn html_to_markdown(html: &str) -> Result<String> {
    if html.trim().is_empty() {
        return Err(anyhow!("html must not be empty"));
    }
    Ok(normalize_markdown(&html2md::parse_html(html)))
}

/** \brief 压缩多余空行并去掉首尾空白，保证重复转换结果可比。 */
fn normalize_markdown(md: &str) -> String {
    let mut out = String::with_capacity(md.len());
    let mut blank_run = 0usize;
    for line in md.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.trim().to_string()
}
