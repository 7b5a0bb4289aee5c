/// Gmail API 调用模块
///
/// 只读：按查询条件列出邮件、获取单封完整邮件
use anyhow::{Context, Result};

use crate::mail::gmail::types::{ListMessagesResponse, Message, MessageRef};
use crate::utils::http_client;

/// 邮件只读 API 抽象
#[allow(async_fn_in_trait)]
pub trait MailApi {
    /// 列出匹配查询的邮件引用（单页，不翻页）
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;

    /// 获取完整邮件（format=full）
    async fn get_message(&self, id: &str) -> Result<Message>;
}

/// 按 Access Token 创建 API 客户端
pub trait ClientFactory {
    type Client: MailApi;

    fn create(&self, access_token: String) -> Self::Client;
}

/// 创建直连 Gmail REST API 的客户端
pub struct GmailClientFactory;

impl ClientFactory for GmailClientFactory {
    type Client = GmailApiClient;

    fn create(&self, access_token: String) -> GmailApiClient {
        GmailApiClient::new(access_token)
    }
}

/// Gmail API 客户端
pub struct GmailApiClient {
    access_token: String,
}

impl GmailApiClient {
    /// Gmail API 基础地址
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    /// 创建新的 Gmail API 客户端
    ///
    /// # Arguments
    /// * `access_token` - 有效的 Access Token
    pub fn new(access_token: String) -> Self {
        Self { access_token }
    }

    #[cfg(test)]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// 检查响应状态，失败时带上响应体
    async fn check_status(response: reqwest::Response, api: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();

        if status == 401 {
            anyhow::bail!("{} 返回 401：Token 无效或已过期", api);
        }

        anyhow::bail!("{} 返回错误 {}: {}", api, status, error_text);
    }
}

impl MailApi for GmailApiClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        tracing::debug!("正在查询邮件: q={} maxResults={}", query, max_results);

        let url = format!("{}/messages", Self::BASE_URL);
        let max_results = max_results.to_string();

        let response = http_client::get_client()
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await
            .context("请求 messages.list 失败")?;

        let list: ListMessagesResponse = Self::check_status(response, "Gmail messages.list")
            .await?
            .json()
            .await
            .context("解析 messages.list 响应失败")?;

        if list.next_page_token.is_some() {
            tracing::debug!(
                "还有更多匹配邮件未返回（估计总数: {:?}）",
                list.result_size_estimate
            );
        }

        Ok(list.messages)
    }

    async fn get_message(&self, id: &str) -> Result<Message> {
        tracing::debug!("正在获取邮件: {}", id);

        let url = format!("{}/messages/{}", Self::BASE_URL, id);

        let response = http_client::get_client()
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("format", "full")])
            .send()
            .await
            .with_context(|| format!("请求 messages.get 失败: {}", id))?;

        let message: Message = Self::check_status(response, "Gmail messages.get")
            .await?
            .json()
            .await
            .with_context(|| format!("解析邮件失败: {}", id))?;

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_client_creation() {
        let client = GmailApiClient::new("test_token".to_string());
        assert_eq!(client.access_token(), "test_token");
    }

    #[test]
    fn test_factory_binds_access_token() {
        let client = GmailClientFactory.create("ya29.token".to_string());
        assert_eq!(client.access_token(), "ya29.token");
    }

    #[tokio::test]
    #[ignore] // 需要有效的 Access Token
    async fn test_list_messages() {
        let access_token =
            std::env::var("TEST_ACCESS_TOKEN").expect("请设置 TEST_ACCESS_TOKEN 环境变量");

        let client = GmailApiClient::new(access_token);
        let refs = client.list_messages("in:inbox", 5).await.unwrap();

        println!("返回邮件数: {}", refs.len());
        assert!(refs.len() <= 5);
    }
}
