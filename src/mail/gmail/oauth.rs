/// Gmail OAuth2 授权码流程
///
/// 负责生成授权 URL、用授权码换取 Token、用 Refresh Token 续期
use anyhow::{Context, Result};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RefreshToken, RedirectUrl,
    Scope, TokenResponse, TokenUrl,
    basic::{BasicClient, BasicTokenResponse},
};
use url::Url;

use crate::config::oauth_config::OAuthConfig;
use crate::mail::gmail::types::Credential;

/// Token 端点抽象（便于在测试中替换网络调用）
#[allow(async_fn_in_trait)]
pub trait TokenEndpoint {
    /// 生成授权 URL（强制重新授权同意）
    fn authorize_url(&self) -> Url;

    /// 用授权码换取凭据
    async fn exchange_code(&self, code: &str) -> Result<Credential>;

    /// 用 Refresh Token 换取新的 Access Token
    async fn refresh(&self, refresh_token: &str) -> Result<Credential>;
}

/// 回调请求解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackParams {
    /// 用户同意授权
    Granted { code: String, state: Option<String> },

    /// 用户拒绝或授权服务器返回错误
    Denied { error: String },
}

/// 解析 OAuth2 回调 URL
///
/// # Errors
/// 既没有 `code` 也没有 `error` 参数
pub fn parse_callback(url: &Url) -> Result<CallbackParams> {
    let mut code = None;
    let mut state = None;
    let mut error = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Ok(CallbackParams::Denied { error });
    }

    let code = code.ok_or_else(|| anyhow::anyhow!("回调缺少 code 参数"))?;
    Ok(CallbackParams::Granted { code, state })
}

/// 基于 `oauth2` crate 的 Google 授权流程
pub struct OAuthFlow {
    client: BasicClient,
    scopes: Vec<String>,
}

impl OAuthFlow {
    /// 构建 OAuth2 客户端
    ///
    /// # Errors
    /// - 授权/Token 端点或 redirect_uri 不是合法 URL
    pub fn new(config: &OAuthConfig) -> Result<Self> {
        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(config.auth_uri.clone()).context("授权端点无效")?,
            Some(TokenUrl::new(config.token_uri.clone()).context("Token 端点无效")?),
        )
        .set_redirect_uri(RedirectUrl::new(config.redirect_uri.clone()).context("redirect_uri 无效")?);

        tracing::debug!("OAuth2 redirect_uri: {}", config.redirect_uri);

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    fn to_credential(&self, response: &BasicTokenResponse) -> Credential {
        let scopes = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| (**s).clone()).collect())
            .unwrap_or_else(|| self.scopes.clone());

        Credential::new(
            response.access_token().secret().to_string(),
            response.refresh_token().map(|t| t.secret().to_string()),
            response.expires_in().map(|d| d.as_secs() as i64),
            scopes,
        )
    }
}

impl TokenEndpoint for OAuthFlow {
    fn authorize_url(&self) -> Url {
        let (auth_url, csrf_state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();

        tracing::debug!("生成授权 URL（state: {}...）", short(csrf_state.secret()));
        auth_url
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential> {
        tracing::debug!("开始交换 Token，code: {}...", short(code));

        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                tracing::error!("Token 交换详细错误: {:?}", e);
                anyhow::anyhow!("Token 交换请求失败: {}", e)
            })?;

        let credential = self.to_credential(&token_response);

        tracing::info!("✅ Token 交换成功");
        tracing::debug!(
            "Access Token: {}... (过期时间: {:?}, 含 refresh_token: {})",
            short(&credential.access_token),
            credential.expiry,
            credential.refresh_token.is_some()
        );

        Ok(credential)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        tracing::debug!("开始刷新 Access Token");

        let token_response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| {
                let error_msg = e.to_string();

                // 提供更清晰的错误消息
                if error_msg.contains("invalid_grant") || error_msg.contains("401") {
                    tracing::error!("❌ Token 刷新失败 [授权被拒绝/已过期]: {}", error_msg);
                    tracing::error!("   💡 Refresh Token 已过期或被撤销，需要重新访问 /auth 授权");
                    anyhow::anyhow!(
                        "Refresh Token 交换失败（可能已过期或被撤销）：{}",
                        error_msg
                    )
                } else {
                    anyhow::anyhow!("Refresh Token 交换失败: {}", error_msg)
                }
            })?;

        Ok(self.to_credential(&token_response))
    }
}

/// 日志中只显示敏感值的前几个字符
fn short(secret: &str) -> &str {
    let end = secret
        .char_indices()
        .nth(8)
        .map(|(i, _)| i)
        .unwrap_or(secret.len());
    &secret[..end]
}
