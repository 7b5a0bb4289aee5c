/// 邮件列表页面
///
/// 按筛选条件查询邮件，逐封获取并渲染为 HTML
use anyhow::{Context, Result};

use crate::config::SearchConfig;
use crate::mail::gmail::api::MailApi;
use crate::mail::gmail::content::extract_body;
use crate::mail::gmail::types::Message;
use crate::utils::html::escape_html;

const UNKNOWN_SENDER: &str = "Desconhecido";
const NO_SUBJECT: &str = "Sem assunto";
const NO_DATE: &str = "Data não disponível";

/// 构建 Gmail 搜索查询（发件人、主题、时间窗口三者取交集）
pub fn build_query(search: &SearchConfig) -> String {
    format!(
        r#"from:{} subject:"{}" after:{} before:{}"#,
        search.sender_pattern,
        search.subject_pattern,
        search.after.timestamp(),
        search.before.timestamp()
    )
}

/// 渲染邮件列表
///
/// 顺序与 messages.list 返回的顺序一致，不重新排序；超过 `max_results` 的邮件被忽略
///
/// # Errors
/// 任一 API 调用或正文解码失败时整体失败，不输出部分结果
pub async fn render_listing<A: MailApi>(api: &A, search: &SearchConfig) -> Result<String> {
    let query = build_query(search);
    let refs = api.list_messages(&query, search.max_results).await?;

    tracing::info!("📬 查询到 {} 封邮件", refs.len());

    let mut output = vec![banner(search, refs.len())];

    for message_ref in &refs {
        let message = api.get_message(&message_ref.id).await?;
        output.push(render_message(&message)?);
    }

    Ok(output.join("\n"))
}

fn banner(search: &SearchConfig, count: usize) -> String {
    format!(
        r#"<h1>E-mails de "{}" com assunto "{}" entre {} e {} ({} encontrados):</h1>"#,
        escape_html(&search.sender_pattern),
        escape_html(&search.subject_pattern),
        search.after.format("%d/%m/%Y"),
        search.before.format("%d/%m/%Y"),
        count
    )
}

fn render_message(message: &Message) -> Result<String> {
    let content = extract_body(&message.payload.node)
        .with_context(|| format!("解码邮件正文失败: {}", message.id))?;

    let from = message.header("From").unwrap_or(UNKNOWN_SENDER);
    let subject = message.header("Subject").unwrap_or(NO_SUBJECT);
    let date = message.header("Date").unwrap_or(NO_DATE);

    // 正文保持原样（通常本身就是 HTML）
    Ok(format!(
        r#"
            <div style="border: 1px solid #ccc; padding: 10px; margin: 10px;">
                <p><strong>De:</strong> {}</p>
                <p><strong>Assunto:</strong> {}</p>
                <p><strong>Data:</strong> {}</p>
                <p><strong>ID:</strong> {}</p>
                <hr>
                <div style="margin-top: 10px;">
                    <strong>Conteúdo do E-mail:</strong>
                    <div style="margin-top: 10px; white-space: pre-wrap;">{}</div>
                </div>
            </div>
        "#,
        escape_html(from),
        escape_html(subject),
        escape_html(date),
        escape_html(&message.id),
        content
    ))
}
