/// OAuth2 配置读取模块
///
/// 支持从环境变量或 Google Cloud Console 下载的客户端密钥文件读取 OAuth2 客户端凭据
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Gmail 只读权限
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// OAuth2 配置
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Google OAuth2 客户端 ID
    pub client_id: String,

    /// Google OAuth2 客户端密钥
    pub client_secret: String,

    /// 授权端点
    pub auth_uri: String,

    /// Token 端点
    pub token_uri: String,

    /// 重定向 URI（本服务的 /callback）
    pub redirect_uri: String,

    /// 请求的 API 权限范围
    pub scopes: Vec<String>,
}

/// `credentials.json` 的顶层结构（`web` 或 `installed` 二选一）
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    web: Option<ClientSecrets>,
    installed: Option<ClientSecrets>,
}

#[derive(Debug, Deserialize)]
struct ClientSecrets {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    GOOGLE_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    GOOGLE_TOKEN_URI.to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: "YOUR_CLIENT_ID.apps.googleusercontent.com".to_string(),
            client_secret: "YOUR_CLIENT_SECRET".to_string(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
            redirect_uri: "https://localhost:8080/callback".to_string(),
            scopes: vec![GMAIL_READONLY_SCOPE.to_string()],
        }
    }
}

impl OAuthConfig {
    /// 加载 OAuth2 配置
    ///
    /// 优先级（从高到低）：
    /// 1. 环境变量：`GMAIL_CLIENT_ID`, `GMAIL_CLIENT_SECRET`
    /// 2. 客户端密钥文件（默认 `./credentials.json`）
    /// 3. 默认占位符（调用方通过 `is_placeholder` 检查）
    pub fn load(secrets_path: &Path, redirect_uri: String) -> Result<Self> {
        let mut cfg = Self::load_with(secrets_path, |key| std::env::var(key).ok())?;
        cfg.redirect_uri = redirect_uri;
        Ok(cfg)
    }

    fn load_with<F>(secrets_path: &Path, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // 优先级 1：环境变量
        if let (Some(client_id), Some(client_secret)) =
            (var("GMAIL_CLIENT_ID"), var("GMAIL_CLIENT_SECRET"))
        {
            tracing::info!("✅ 从环境变量加载 OAuth2 配置");
            return Ok(Self {
                client_id,
                client_secret,
                ..Self::default()
            });
        }

        // 优先级 2：客户端密钥文件
        if secrets_path.exists() {
            let cfg = Self::load_from_file(secrets_path)?;
            tracing::info!("✅ 从客户端密钥文件加载 OAuth2 配置: {}", secrets_path.display());
            return Ok(cfg);
        }

        // 优先级 3：默认占位符
        tracing::warn!("⚠️ 未找到 OAuth2 配置，使用默认占位符");
        tracing::warn!(
            "请设置环境变量或放置客户端密钥文件：{}",
            secrets_path.display()
        );

        Ok(Self::default())
    }

    /// 从客户端密钥文件加载
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("读取客户端密钥文件失败: {}", path.display()))?;

        let file: ClientSecretsFile =
            serde_json::from_str(&content).context("解析客户端密钥文件失败")?;

        let secrets = file
            .web
            .or(file.installed)
            .ok_or_else(|| anyhow::anyhow!("客户端密钥文件缺少 web 或 installed 段"))?;

        Ok(Self {
            client_id: secrets.client_id,
            client_secret: secrets.client_secret,
            auth_uri: secrets.auth_uri,
            token_uri: secrets.token_uri,
            ..Self::default()
        })
    }

    /// 验证配置是否为默认占位符
    ///
    /// 用于检查用户是否已正确配置 OAuth2 凭据
    pub fn is_placeholder(&self) -> bool {
        self.client_id.contains("YOUR_CLIENT_ID")
            || self.client_secret.contains("YOUR_CLIENT_SECRET")
    }
}
