pub mod access;
pub mod assert;
pub mod assertion;
pub mod auth;
pub mod body_raw;
pub mod expression;
pub mod history;
pub mod http;
pub mod http_client;
pub mod key_value;
pub mod preparer;
pub mod resolver;
pub mod runner;
pub mod snapshot;
pub mod variables;
pub mod workspace;

pub use access::{AccessService, Gate};
pub use assert::AssertService;
pub use assertion::{AssertionEngine, AssertionEvaluator, AssertionOutcome, EvalContext};
pub use auth::{AuthService, Claims};
pub use body_raw::BodyRawService;
pub use history::HistoryService;
pub use http::HttpService;
pub use http_client::{HttpClient, HttpExchange};
pub use key_value::KeyValueService;
pub use resolver::{ResolvedHttp, ResolverService};
pub use runner::{RunEngine, RunResult};
pub use variables::VariableService;
pub use workspace::WorkspaceService;
