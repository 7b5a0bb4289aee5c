/// Gmail 模块 - OAuth2 认证、凭据生命周期与只读 API 调用
pub mod api;
pub mod content;
pub mod oauth;
pub mod token;
pub mod types;

// 重新导出常用类型和函数
pub use oauth::OAuthFlow;
pub use token::CredentialManager;
