/// HTTP 服务
///
/// 基于 tiny_http 的单线程请求循环：逐个处理请求，每个请求在 Tokio 运行时上 block_on 执行完毕
use anyhow::Result;
use tiny_http::{Header, Method, Response, Server};
use url::Url;

use crate::config::SearchConfig;
use crate::config::storage::CredentialStore;
use crate::listing;
use crate::mail::gmail::api::ClientFactory;
use crate::mail::gmail::oauth::TokenEndpoint;
use crate::mail::gmail::token::{Acquired, CallbackOutcome, CredentialManager};
use crate::utils::html::escape_html;

/// 未授权时首页显示的提示
const AUTHENTICATE_FIRST_HTML: &str = r#"Autentique primeiro em <a href="/auth">/auth</a>"#;

/// OAuth2 成功页面 HTML
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Autenticação bem-sucedida</title>
</head>
<body>
    <h1>Autenticação bem-sucedida!</h1>
    <p>Você pode fechar esta janela e voltar ao aplicativo</p>
    <a href="/">Ver emails</a>
</body>
</html>"#;

/// OAuth2 错误页面 HTML（`{error}` 为授权服务器返回的错误码）
const DENIED_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Autenticação falhou</title>
</head>
<body>
    <h1>Autenticação falhou</h1>
    <p>O Google recusou a autorização: {error}</p>
    <a href="/auth">Tentar novamente</a>
</body>
</html>"#;

const NOT_FOUND_HTML: &str = "<h1>404 Not Found</h1>";
const METHOD_NOT_ALLOWED_HTML: &str = "<h1>405 Method Not Allowed</h1>";
const INTERNAL_ERROR_HTML: &str = "<h1>500 Internal Server Error</h1>";

/// 渲染结果
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    fn with_status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
        }
    }
}

/// 路由：`/`、`/auth`、`/callback`
pub struct Router<S, E, F> {
    manager: CredentialManager<S, E, F>,
    search: SearchConfig,

    /// 对外可见的基础 URL，用于还原回调请求的完整地址
    external_base: Url,
}

impl<S: CredentialStore, E: TokenEndpoint, F: ClientFactory> Router<S, E, F> {
    pub fn new(manager: CredentialManager<S, E, F>, search: SearchConfig, external_base: Url) -> Self {
        Self {
            manager,
            search,
            external_base,
        }
    }

    /// 处理单个请求
    ///
    /// 内部错误统一转换为 500，不返回部分页面
    pub async fn handle(&self, method: &Method, raw_url: &str) -> Page {
        match self.route(method, raw_url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!("❌ 处理请求失败 {} {}: {:#}", method, raw_url, e);
                Page::with_status(500, INTERNAL_ERROR_HTML)
            }
        }
    }

    async fn route(&self, method: &Method, raw_url: &str) -> Result<Page> {
        let url = self.external_base.join(raw_url)?;

        if *method != Method::Get {
            return Ok(Page::with_status(405, METHOD_NOT_ALLOWED_HTML));
        }

        match url.path() {
            "/" => self.index().await,
            "/auth" => Ok(self.auth()),
            "/callback" => self.callback(&url).await,
            _ => Ok(Page::with_status(404, NOT_FOUND_HTML)),
        }
    }

    async fn index(&self) -> Result<Page> {
        match self.manager.acquire_client().await? {
            Acquired::Ready(client) => {
                let html = listing::render_listing(&client, &self.search).await?;
                Ok(Page::ok(html))
            }
            Acquired::AuthorizationRequired(auth_url) => {
                tracing::info!("授权 URL: {}", auth_url);
                Ok(Page::ok(AUTHENTICATE_FIRST_HTML))
            }
        }
    }

    fn auth(&self) -> Page {
        let auth_url = self.manager.authorization_url();
        Page::ok(format!(
            r#"
        <h1>Autenticação necessária</h1>
        <a href="{}">Clique aqui para autenticar com o Google</a>
        <p>Depois da autenticação, você será redirecionado de volta para o aplicativo</p>
    "#,
            auth_url
        ))
    }

    async fn callback(&self, url: &Url) -> Result<Page> {
        match self.manager.complete_authorization(url).await? {
            CallbackOutcome::Authorized => Ok(Page::ok(SUCCESS_HTML)),
            CallbackOutcome::Denied(error) => Ok(Page {
                status: 400,
                body: DENIED_HTML.replace("{error}", &escape_html(&error)),
            }),
        }
    }
}

/// 启动 HTTP 服务并阻塞处理请求
///
/// # Errors
/// 无法绑定监听地址（端口被占用等）
pub fn serve<S, E, F>(
    router: &Router<S, E, F>,
    bind_addr: &str,
    runtime: &tokio::runtime::Runtime,
) -> Result<()>
where
    S: CredentialStore,
    E: TokenEndpoint,
    F: ClientFactory,
{
    let server = Server::http(bind_addr)
        .map_err(|e| anyhow::anyhow!("无法启动 HTTP 服务器（端口可能被占用）: {}", e))?;

    let content_type = Header::from_bytes(b"Content-Type", b"text/html; charset=utf-8")
        .map_err(|_| anyhow::anyhow!("无效的 Content-Type 头"))?;

    tracing::info!("🚀 HTTP 服务已启动: http://{}", bind_addr);

    for request in server.incoming_requests() {
        tracing::info!("收到请求: {} {}", request.method(), request.url());

        let page = runtime.block_on(router.handle(request.method(), request.url()));

        let response = Response::from_string(page.body)
            .with_status_code(page.status)
            .with_header(content_type.clone());

        if let Err(e) = request.respond(response) {
            tracing::warn!("发送响应失败: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::storage::FileCredentialStore;
    use crate::listing::fakes::{MailboxFactory, leaf, message};
    use crate::mail::gmail::content::ATTACHMENT_PLACEHOLDER;
    use crate::mail::gmail::token::fakes::{FakeEndpoint, MemoryStore, credential};

    fn router_with<S: CredentialStore>(
        store: S,
        endpoint: FakeEndpoint,
        mailbox: MailboxFactory,
    ) -> Router<S, FakeEndpoint, MailboxFactory> {
        Router::new(
            CredentialManager::new(store, endpoint, mailbox),
            SearchConfig::default(),
            Url::parse("https://fuzzy-space-8080.app.github.dev/").unwrap(),
        )
    }

    fn router(
        store: MemoryStore,
        endpoint: FakeEndpoint,
    ) -> Router<MemoryStore, FakeEndpoint, MailboxFactory> {
        router_with(store, endpoint, MailboxFactory::default())
    }

    #[tokio::test]
    async fn test_index_without_token_file_prompts_for_auth() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path().join("token.json"));
        let router = router_with(store, FakeEndpoint::default(), MailboxFactory::default());

        let page = router.handle(&Method::Get, "/").await;
        assert_eq!(page, Page::ok(AUTHENTICATE_FIRST_HTML));

        // 不发起任何 Token 请求，也不创建客户端、不写文件
        let endpoint = router.manager.endpoint();
        assert_eq!(endpoint.refreshes.get(), 0);
        assert_eq!(endpoint.exchanges.get(), 0);
        assert!(router.manager.factory().tokens.borrow().is_empty());
        assert!(!dir.path().join("token.json").exists());
    }

    #[tokio::test]
    async fn test_index_renders_listing_with_valid_credential() {
        let mailbox = MailboxFactory {
            messages: vec![
                message(
                    "msg-a",
                    &[
                        ("From", "Azul <no-reply@voeazul.com.br>"),
                        ("Subject", "Reserva confirmada"),
                    ],
                    vec![leaf("text/plain", Some("SGVsbG8="), None)],
                ),
                message(
                    "msg-b",
                    &[("Subject", "Reserva alterada")],
                    vec![leaf("text/html", None, Some("att-1"))],
                ),
            ],
            ..Default::default()
        };
        let router = router_with(
            MemoryStore::with(credential(60, Some("refresh"))),
            FakeEndpoint::default(),
            mailbox,
        );

        let page = router.handle(&Method::Get, "/").await;
        assert_eq!(page.status, 200);
        assert!(page.body.contains("(2 encontrados)"));
        assert!(page.body.contains("Hello"));
        assert!(page.body.contains(ATTACHMENT_PLACEHOLDER));

        assert_eq!(*router.manager.factory().tokens.borrow(), vec!["stored-access".to_string()]);
        assert_eq!(router.manager.endpoint().refreshes.get(), 0);
    }

    #[tokio::test]
    async fn test_index_refreshes_expired_credential_before_listing() {
        let router = router(MemoryStore::with(credential(-5, Some("refresh"))), FakeEndpoint::default());

        let page = router.handle(&Method::Get, "/").await;
        assert_eq!(page.status, 200);
        assert!(page.body.contains("(0 encontrados)"));

        assert_eq!(router.manager.endpoint().refreshes.get(), 1);
        assert_eq!(*router.manager.factory().tokens.borrow(), vec!["refreshed-access".to_string()]);
    }

    #[tokio::test]
    async fn test_index_expired_without_refresh_token_prompts_for_auth() {
        let router = router(MemoryStore::with(credential(-5, None)), FakeEndpoint::default());

        let page = router.handle(&Method::Get, "/").await;
        assert_eq!(page.body, AUTHENTICATE_FIRST_HTML);
    }

    #[tokio::test]
    async fn test_index_refresh_failure_is_500() {
        let router = router(
            MemoryStore::with(credential(-5, Some("revoked"))),
            FakeEndpoint {
                fail: true,
                ..Default::default()
            },
        );

        let page = router.handle(&Method::Get, "/").await;
        assert_eq!(page.status, 500);
    }

    #[tokio::test]
    async fn test_auth_page_links_to_consent_url() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        let page = router.handle(&Method::Get, "/auth").await;
        assert_eq!(page.status, 200);
        assert!(page.body.contains(r#"href="https://accounts.google.com/o/oauth2/auth?prompt=consent""#));
    }

    #[tokio::test]
    async fn test_callback_stores_credential() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        let page = router
            .handle(&Method::Get, "/callback?state=s1&code=4%2F0Ab")
            .await;
        assert_eq!(page, Page::ok(SUCCESS_HTML));

        let stored = router.manager_store_credential();
        assert_eq!(stored.access_token, "access-for-4/0Ab");
    }

    #[tokio::test]
    async fn test_callback_denied() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        let page = router.handle(&Method::Get, "/callback?error=access_denied").await;
        assert_eq!(page.status, 400);
        assert!(page.body.contains("access_denied"));
    }

    #[tokio::test]
    async fn test_callback_error_is_escaped() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        let page = router
            .handle(&Method::Get, "/callback?error=%3Cscript%3Ealert(1)%3C%2Fscript%3E")
            .await;
        assert_eq!(page.status, 400);
        assert!(!page.body.contains("<script>"));
        assert!(page.body.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(router.manager.store().credential.borrow().is_none());
    }

    #[tokio::test]
    async fn test_callback_without_code_is_500() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        let page = router.handle(&Method::Get, "/callback").await;
        assert_eq!(page, Page::with_status(500, INTERNAL_ERROR_HTML));
    }

    #[tokio::test]
    async fn test_unknown_path_and_method() {
        let router = router(MemoryStore::default(), FakeEndpoint::default());

        assert_eq!(router.handle(&Method::Get, "/favicon.ico").await.status, 404);
        assert_eq!(router.handle(&Method::Post, "/").await.status, 405);
    }

    impl Router<MemoryStore, FakeEndpoint, MailboxFactory> {
        fn manager_store_credential(&self) -> crate::mail::gmail::types::Credential {
            self.manager
                .store()
                .credential
                .borrow()
                .clone()
                .expect("回调后应已保存凭据")
        }
    }
}
