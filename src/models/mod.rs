pub mod assert;
pub mod batch;
pub mod body_raw;
pub mod bytes;
pub mod environment;
pub mod http;
pub mod key_value;
pub mod log;
pub mod response;
pub mod user;
pub mod version;
pub mod workspace;

pub use assert::*;
pub use batch::*;
pub use body_raw::*;
pub use environment::*;
pub use http::*;
pub use key_value::*;
pub use log::*;
pub use response::*;
pub use user::*;
pub use version::*;
pub use workspace::*;
