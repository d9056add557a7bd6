pub mod environment;
pub mod http;
pub mod http_assert;
pub mod http_body_form;
pub mod http_body_raw;
pub mod http_body_urlencoded;
pub mod http_header;
pub mod http_response;
pub mod http_response_assert;
pub mod http_response_header;
pub mod http_search_param;
pub mod http_version;
pub mod user;
pub mod variable;
pub mod workspace;
pub mod workspace_user;

pub use http::BodyKind;
pub use workspace_user::Role;
