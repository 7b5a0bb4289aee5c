use anyhow::{Context, Result};

mod config;
mod listing;
mod mail;
mod server;
mod utils;

use config::{oauth_config::OAuthConfig, storage::FileCredentialStore};
use mail::gmail::{CredentialManager, OAuthFlow, api::GmailClientFactory};

fn main() -> Result<()> {
    // 1. 初始化日志
    init_logger()?;

    // 2. 加载配置（默认值 -> mailfilter.toml -> 环境变量）
    let cfg = config::load().context("加载配置失败")?;
    let external_base = cfg.server.external_base_url()?;
    let redirect_uri = cfg.server.redirect_uri()?;
    tracing::info!("对外地址: {}（redirect_uri: {}）", external_base, redirect_uri);

    // 3. 加载 OAuth2 客户端凭据
    let oauth_config = OAuthConfig::load(&cfg.paths.client_secrets_file, redirect_uri)?;
    if oauth_config.is_placeholder() {
        anyhow::bail!(
            "OAuth2 配置无效：请设置 GMAIL_CLIENT_ID / GMAIL_CLIENT_SECRET 或提供 {}",
            cfg.paths.client_secrets_file.display()
        );
    }

    // 4. 组装凭据管理器与路由
    let store = FileCredentialStore::new(&cfg.paths.token_file);
    tracing::info!("凭据文件: {}", store.path().display());

    let flow = OAuthFlow::new(&oauth_config).context("构建 OAuth2 客户端失败")?;
    let manager = CredentialManager::new(store, flow, GmailClientFactory);
    let router = server::Router::new(manager, cfg.search.clone(), external_base);

    // 5. 创建 Tokio 运行时（用于 async OAuth2 与 Gmail API 调用）
    let rt = tokio::runtime::Runtime::new().context("创建 Tokio 运行时失败")?;

    // 6. 阻塞处理 HTTP 请求
    server::serve(&router, &cfg.server.bind_addr(), &rt)
}

/// 初始化日志系统
fn init_logger() -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailfilter=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    Ok(())
}
