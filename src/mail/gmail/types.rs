/// Gmail 数据结构
///
/// 包含 OAuth2 凭据以及 Gmail API 返回的消息结构（MIME 树）
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token 刷新阈值（提前多少分钟视为过期）
pub const REFRESH_THRESHOLD_MINUTES: i64 = 5;

/// OAuth2 凭据
///
/// 首次授权成功时创建，每次刷新或重新授权时整体覆盖
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// 访问令牌
    pub access_token: String,

    /// 刷新令牌（Google 仅在 prompt=consent 时保证返回）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access Token 过期时间（UTC），缺失表示未知
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,

    /// 授权时获得的权限范围
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Credential {
    /// 根据 Token 端点响应创建凭据
    ///
    /// `expires_in` 超出可表示范围时视为过期时间未知
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_seconds: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expiry: expires_in_seconds
                .and_then(chrono::Duration::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
            scopes,
        }
    }

    /// 凭据是否可直接使用
    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_token_expiring(REFRESH_THRESHOLD_MINUTES)
    }

    /// 检查 Token 是否即将过期
    ///
    /// # Arguments
    /// * `threshold_minutes` - 提前多少分钟算作"即将过期"
    pub fn is_token_expiring(&self, threshold_minutes: i64) -> bool {
        match self.expiry {
            Some(expiry) => expiry <= Utc::now() + chrono::Duration::minutes(threshold_minutes),
            None => false,
        }
    }

    /// 是否可以通过 Refresh Token 静默续期
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// 合并刷新结果
    ///
    /// Google 刷新时通常不会返回新的 refresh_token，此时沿用旧值
    pub fn refreshed(&self, fresh: Credential) -> Credential {
        Credential {
            refresh_token: fresh.refresh_token.or_else(|| self.refresh_token.clone()),
            scopes: if fresh.scopes.is_empty() {
                self.scopes.clone()
            } else {
                fresh.scopes
            },
            ..fresh
        }
    }
}

/// messages.list 响应
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    pub next_page_token: Option<String>,
    pub result_size_estimate: Option<u32>,
}

/// 消息引用（仅包含 ID）
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
}

/// messages.get (format=full) 返回的完整消息
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub payload: MessagePayload,
}

impl Message {
    /// 按名称查找邮件头，同名时取第一个
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload
            .headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }
}

/// 邮件头（名称-值）
#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// 顶层 payload：邮件头 + MIME 树根节点
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawPart")]
pub struct MessagePayload {
    pub headers: Vec<Header>,
    pub node: MimeNode,
}

/// MIME 节点
///
/// 叶子节点携带正文（内联数据或附件引用），分支节点携带有序子节点
#[derive(Debug, Clone, PartialEq)]
pub enum MimeNode {
    Leaf { mime_type: String, body: PartBody },
    Branch { mime_type: String, parts: Vec<MimeNode> },
}

impl MimeNode {
    pub fn mime_type(&self) -> &str {
        match self {
            MimeNode::Leaf { mime_type, .. } | MimeNode::Branch { mime_type, .. } => mime_type,
        }
    }
}

/// 节点正文
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    /// base64url 编码的内联数据
    pub data: Option<String>,

    /// 附件 ID（正文不内联时存在）
    pub attachment_id: Option<String>,
}

/// Gmail 原始 JSON 结构，反序列化后再转换为 `MimeNode`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: PartBody,
    #[serde(default)]
    parts: Vec<RawPart>,
}

impl From<RawPart> for MimeNode {
    fn from(raw: RawPart) -> Self {
        if raw.parts.is_empty() {
            MimeNode::Leaf {
                mime_type: raw.mime_type,
                body: raw.body,
            }
        } else {
            MimeNode::Branch {
                mime_type: raw.mime_type,
                parts: raw.parts.into_iter().map(MimeNode::from).collect(),
            }
        }
    }
}

impl From<RawPart> for MessagePayload {
    fn from(mut raw: RawPart) -> Self {
        let headers = std::mem::take(&mut raw.headers);
        Self {
            headers,
            node: raw.into(),
        }
    }
}
