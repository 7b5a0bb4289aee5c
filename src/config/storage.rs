/// 凭据文件存储模块
///
/// 负责将 OAuth2 凭据持久化到本地 JSON 文件
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::mail::gmail::types::Credential;

/// 凭据存储文件版本号
const STORAGE_VERSION: &str = "1.0";

/// 凭据存储抽象
///
/// `load` 在尚未授权时返回 `Ok(None)`，`save` 总是整体覆盖
pub trait CredentialStore {
    fn load(&self) -> Result<Option<Credential>>;
    fn save(&self, credential: &Credential) -> Result<()>;
}

/// 凭据存储容器
#[derive(Debug, Serialize, Deserialize)]
struct CredentialFile {
    /// 文件格式版本
    version: String,

    #[serde(flatten)]
    credential: Credential,
}

/// 基于本地文件的凭据存储
///
/// 读写不加锁：并发的授权/刷新可能互相覆盖
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    /// 加载凭据
    ///
    /// # Errors
    /// - 文件格式错误
    /// - 反序列化失败
    fn load(&self) -> Result<Option<Credential>> {
        // 文件不存在是初始状态，不是错误
        if !self.path.exists() {
            tracing::debug!("凭据文件不存在: {}", self.path.display());
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("读取凭据文件失败: {}", self.path.display()))?;

        let file: CredentialFile =
            serde_json::from_str(&content).context("解析凭据文件失败（文件可能损坏）")?;

        if file.version != STORAGE_VERSION {
            tracing::warn!(
                "凭据文件版本不匹配（期望: {}, 实际: {}），尝试兼容加载",
                STORAGE_VERSION,
                file.version
            );
        }

        Ok(Some(file.credential))
    }

    /// 保存凭据（覆盖式）
    fn save(&self, credential: &Credential) -> Result<()> {
        let file = CredentialFile {
            version: STORAGE_VERSION.to_string(),
            credential: credential.clone(),
        };

        let content = serde_json::to_string_pretty(&file).context("序列化凭据失败")?;

        std::fs::write(&self.path, content)
            .with_context(|| format!("写入凭据文件失败: {}", self.path.display()))?;

        tracing::debug!("成功保存凭据到: {}", self.path.display());

        Ok(())
    }
}
