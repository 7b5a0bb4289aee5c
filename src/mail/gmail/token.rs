/// 凭据生命周期管理
///
/// 唯一判断 Token 是否过期的地方：加载、按需刷新、持久化，最终交出 API 客户端
use anyhow::{Context, Result};
use url::Url;

use crate::config::storage::CredentialStore;
use crate::mail::gmail::api::ClientFactory;
use crate::mail::gmail::oauth::{CallbackParams, TokenEndpoint, parse_callback};
use crate::mail::gmail::types::Credential;

/// `acquire_client` 的结果
pub enum Acquired<C> {
    /// 凭据可用
    Ready(C),

    /// 没有可用凭据，需要用户访问授权 URL
    AuthorizationRequired(Url),
}

/// 回调处理结果
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// 授权成功，凭据已保存
    Authorized,

    /// 用户拒绝授权
    Denied(String),
}

/// 凭据管理器
pub struct CredentialManager<S, E, F> {
    store: S,
    endpoint: E,
    factory: F,
}

impl<S: CredentialStore, E: TokenEndpoint, F: ClientFactory> CredentialManager<S, E, F> {
    pub fn new(store: S, endpoint: E, factory: F) -> Self {
        Self {
            store,
            endpoint,
            factory,
        }
    }

    /// 授权 URL（强制重新同意，不保存任何状态）
    pub fn authorization_url(&self) -> Url {
        self.endpoint.authorize_url()
    }

    /// 获取可用的 API 客户端
    ///
    /// - 无凭据，或凭据无效且没有 Refresh Token：返回 `AuthorizationRequired`
    /// - 凭据无效但有 Refresh Token：刷新一次并保存，失败直接返回错误
    /// - 凭据有效：不发起任何网络请求
    pub async fn acquire_client(&self) -> Result<Acquired<F::Client>> {
        let credential = match self.store.load().context("加载凭据失败")? {
            Some(credential) => credential,
            None => return Ok(self.authorization_required("尚未授权")),
        };

        if credential.is_valid() {
            return Ok(Acquired::Ready(self.factory.create(credential.access_token)));
        }

        let refresh_token = match credential.refresh_token.as_deref() {
            Some(token) if credential.can_refresh() => token,
            _ => return Ok(self.authorization_required("凭据已失效且没有 Refresh Token")),
        };

        tracing::info!(
            "Access Token 已过期（{:?}），使用 Refresh Token 刷新",
            credential.expiry
        );

        let fresh = self.endpoint.refresh(refresh_token).await?;
        let refreshed = credential.refreshed(fresh);

        self.store.save(&refreshed).context("保存刷新后的凭据失败")?;

        tracing::info!(
            "✅ Access Token 刷新成功（新的过期时间: {:?}）",
            refreshed.expiry
        );

        Ok(Acquired::Ready(self.factory.create(refreshed.access_token)))
    }

    /// 处理授权回调：用授权码换取凭据并整体覆盖保存
    ///
    /// # Arguments
    /// * `callback_url` - 回调请求的完整外部 URL（包含 code 与 state）
    pub async fn complete_authorization(&self, callback_url: &Url) -> Result<CallbackOutcome> {
        let (code, state) = match parse_callback(callback_url)? {
            CallbackParams::Granted { code, state } => (code, state),
            CallbackParams::Denied { error } => {
                tracing::error!("用户拒绝授权: {}", error);
                return Ok(CallbackOutcome::Denied(error));
            }
        };

        // 不保存 state，因此这里只记录不校验
        tracing::debug!("收到授权回调（state: {:?}）", state);

        let credential: Credential = self
            .endpoint
            .exchange_code(&code)
            .await
            .context("Token 交换失败")?;

        if credential.refresh_token.is_none() {
            tracing::warn!("⚠️ 未收到 refresh_token，Access Token 过期后需要重新授权");
        }

        self.store.save(&credential).context("保存凭据失败")?;
        tracing::info!("✅ 凭据已保存");

        Ok(CallbackOutcome::Authorized)
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub(crate) fn endpoint(&self) -> &E {
        &self.endpoint
    }

    #[cfg(test)]
    pub(crate) fn factory(&self) -> &F {
        &self.factory
    }

    fn authorization_required(&self, reason: &str) -> Acquired<F::Client> {
        let auth_url = self.endpoint.authorize_url();
        tracing::info!("🔐 {}，需要授权", reason);
        Acquired::AuthorizationRequired(auth_url)
    }
}
