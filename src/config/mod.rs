use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub mod oauth_config;
pub mod storage;

/// 应用配置文件（可选，位于工作目录）
pub const CONFIG_FILE: &str = "./mailfilter.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub search: SearchConfig,
}

/// HTTP 监听与对外地址
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,

    /// 对外可见的 URL scheme（位于 HTTPS 反向代理之后时为 https）
    pub external_scheme: String,

    /// 对外可见的主机名，未设置时根据运行环境推导
    pub external_host: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub token_file: PathBuf,
    pub client_secrets_file: PathBuf,
}

/// 邮件筛选条件
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 发件人匹配模式（Gmail `from:` 语法）
    pub sender_pattern: String,

    /// 主题匹配模式（Gmail `subject:` 语法）
    pub subject_pattern: String,

    pub after: DateTime<Utc>,
    pub before: DateTime<Utc>,

    /// 单次查询最多返回的邮件数（不翻页）
    pub max_results: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            external_scheme: "https".to_string(),
            external_host: None,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("./token.json"),
            client_secrets_file: PathBuf::from("./credentials.json"),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            sender_pattern: "*@*voeazul*".to_string(),
            subject_pattern: "Reserva*".to_string(),
            after: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            before: Utc
                .with_ymd_and_hms(2025, 12, 31, 23, 59, 59)
                .single()
                .unwrap_or_default(),
            max_results: 100,
        }
    }
}

impl ServerConfig {
    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    /// 对外可见的基础 URL（仅用于生成 OAuth2 redirect_uri 与还原回调地址）
    pub fn external_base_url(&self) -> Result<url::Url> {
        let host = self
            .external_host
            .clone()
            .unwrap_or_else(|| format!("localhost:{}", self.port));
        let base = format!("{}://{}/", self.external_scheme, host);
        url::Url::parse(&base).with_context(|| format!("对外地址无效: {}", base))
    }

    /// OAuth2 回调地址
    pub fn redirect_uri(&self) -> Result<String> {
        Ok(self.external_base_url()?.join("callback")?.to_string())
    }
}

impl Config {
    /// 叠加环境变量
    ///
    /// - `MAILFILTER_PORT`
    /// - `MAILFILTER_EXTERNAL_SCHEME`
    /// - `MAILFILTER_EXTERNAL_HOST`
    /// - `CODESPACES=true` + `CODESPACE_NAME`：GitHub Codespaces 转发地址
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = var("MAILFILTER_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("MAILFILTER_PORT 不是有效端口: {}", port))?;
        }

        if let Some(scheme) = var("MAILFILTER_EXTERNAL_SCHEME") {
            self.server.external_scheme = scheme;
        }

        if let Some(host) = var("MAILFILTER_EXTERNAL_HOST") {
            self.server.external_host = Some(host);
        } else if self.server.external_host.is_none()
            && var("CODESPACES").as_deref() == Some("true")
        {
            let name = var("CODESPACE_NAME")
                .context("CODESPACES=true 但未设置 CODESPACE_NAME")?;
            self.server.external_host =
                Some(format!("{}-{}.app.github.dev", name, self.server.port));
        }

        Ok(())
    }
}

/// 加载配置
///
/// 顺序：默认值 -> `mailfilter.toml`（若存在）-> 环境变量
pub fn load() -> Result<Config> {
    let mut config = load_from(Path::new(CONFIG_FILE))?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

/// 从指定文件加载配置，文件不存在时返回默认配置
pub fn load_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!("配置文件不存在，使用默认配置: {}", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
    let config: Config = toml::from_str(&content)
        .with_context(|| format!("解析配置文件失败: {}", path.display()))?;

    tracing::info!("✅ 从配置文件加载配置: {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
        assert_eq!(config.paths.token_file, PathBuf::from("./token.json"));
        assert_eq!(config.search.max_results, 100);
        assert_eq!(config.search.after.timestamp(), 1_704_067_200);
        assert_eq!(config.search.before.timestamp(), 1_767_225_599);
        assert_eq!(
            config.server.redirect_uri().unwrap(),
            "https://localhost:8080/callback"
        );
    }

    #[test]
    fn test_codespaces_redirect_uri() {
        let mut config = Config::default();
        config
            .apply_env(env(&[("CODESPACES", "true"), ("CODESPACE_NAME", "fuzzy-space")]))
            .unwrap();

        assert_eq!(
            config.server.redirect_uri().unwrap(),
            "https://fuzzy-space-8080.app.github.dev/callback"
        );
    }

    #[test]
    fn test_explicit_host_wins() {
        let mut config = Config::default();
        config
            .apply_env(env(&[
                ("CODESPACES", "true"),
                ("CODESPACE_NAME", "fuzzy-space"),
                ("MAILFILTER_EXTERNAL_HOST", "mail.example.org"),
                ("MAILFILTER_EXTERNAL_SCHEME", "http"),
            ]))
            .unwrap();

        assert_eq!(
            config.server.redirect_uri().unwrap(),
            "http://mail.example.org/callback"
        );
    }

    #[test]
    fn test_invalid_port() {
        let mut config = Config::default();
        assert!(config.apply_env(env(&[("MAILFILTER_PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailfilter.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9090

[search]
subject_pattern = "Bilhete*"
after = "2025-01-01T00:00:00Z"
"#,
        )
        .unwrap();

        let config = load_from(&path).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.external_scheme, "https");
        assert_eq!(config.search.subject_pattern, "Bilhete*");
        assert_eq!(config.search.sender_pattern, "*@*voeazul*");
        assert_eq!(config.search.after.timestamp(), 1_735_689_600);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.server.port, 8080);
    }
}
