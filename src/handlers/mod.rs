pub mod assert;
pub mod body_raw;
pub mod common;
pub mod history;
pub mod http;
pub mod key_value;
pub mod sync;
pub mod workspace;

pub use assert::{delete_asserts, insert_asserts, list_asserts, update_asserts};
pub use body_raw::{delete_body_raw, insert_body_raw, list_body_raw, update_body_raw};
pub use common::{DeletedResponse, ListResponse};
pub use history::{list_response_asserts, list_response_headers, list_responses, list_versions};
pub use http::{delete_http, duplicate_http, insert_http, list_http, run_http, update_http};
pub use key_value::{
    delete_body_forms, delete_body_urlencoded, delete_headers, delete_search_params,
    insert_body_forms, insert_body_urlencoded, insert_headers, insert_search_params,
    list_body_forms, list_body_urlencoded, list_headers, list_search_params, update_body_forms,
    update_body_urlencoded, update_headers, update_search_params,
};
pub use sync::{
    sync_asserts, sync_base_versions, sync_body_forms, sync_body_raw, sync_body_urlencoded,
    sync_headers, sync_http, sync_logs, sync_response_asserts, sync_response_headers,
    sync_responses, sync_search_params, sync_versions,
};
pub use workspace::{
    add_member, create_workspace, list_variables, list_workspaces, upsert_variable,
};
