pub mod html;
pub mod http_client;
