/// 邮件正文提取
///
/// 从 MIME 树中选出可读正文并解码
use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};

use crate::mail::gmail::types::{MimeNode, PartBody};

/// 正文以附件形式存在
pub const ATTACHMENT_PLACEHOLDER: &str = "[Conteúdo do e-mail está em anexo]";

/// 无法取得正文
pub const UNRECOVERABLE_PLACEHOLDER: &str = "[Não foi possível recuperar o conteúdo do e-mail]";

/// 可读正文的 MIME 类型（两者同等对待，先到先得）
const READABLE_MIME_TYPES: [&str; 2] = ["text/plain", "text/html"];

/// 正文解码错误
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("正文 base64url 解码失败: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("正文不是有效的 UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// 提取邮件正文
///
/// 优先级：
/// 1. 分支节点：按顺序查找第一个 text/plain 或 text/html 子节点
///    （只检查一层，不递归进入嵌套的 multipart）
/// 2. 叶子节点自身带有内联数据
/// 3. 否则返回占位文本
///
/// # Errors
/// 内联数据不是合法的 base64url 或 UTF-8
pub fn extract_body(node: &MimeNode) -> Result<String, DecodeError> {
    match node {
        MimeNode::Branch { parts, .. } => {
            for part in parts {
                if !READABLE_MIME_TYPES.contains(&part.mime_type()) {
                    continue;
                }
                let MimeNode::Leaf { body, .. } = part else {
                    continue;
                };

                if let Some(data) = &body.data {
                    return decode_body_data(data);
                }
                if body.attachment_id.is_some() {
                    return Ok(ATTACHMENT_PLACEHOLDER.to_string());
                }
            }
        }
        MimeNode::Leaf {
            body: PartBody {
                data: Some(data), ..
            },
            ..
        } => return decode_body_data(data),
        MimeNode::Leaf { .. } => {}
    }

    Ok(UNRECOVERABLE_PLACEHOLDER.to_string())
}

/// base64url 解码为 UTF-8 文本
///
/// Gmail 返回的数据通常带填充，但也见过不带填充的情况
fn decode_body_data(data: &str) -> Result<String, DecodeError> {
    let bytes = match URL_SAFE.decode(data) {
        Ok(bytes) => bytes,
        Err(_) => URL_SAFE_NO_PAD.decode(data.trim_end_matches('='))?,
    };
    Ok(String::from_utf8(bytes)?)
}
