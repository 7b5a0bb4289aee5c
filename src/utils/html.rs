/// 转义 HTML 特殊字符
///
/// 用于拼接到页面中的外部文本（邮件头、授权服务器返回的错误码等）
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(escape_html("access_denied"), "access_denied");
    }
}
