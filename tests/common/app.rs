use axum_test::TestServer;
use http_workbench::build_router;
use http_workbench::config::Config;
use http_workbench::state::AppState;

/// Test configuration: a private in-memory database per app
pub fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-jwt-secret-that-is-at-least-32-characters-long".to_string(),
        jwt_expiration_hours: 24,
        host: "127.0.0.1".to_string(),
        port: 0,
        http_timeout_seconds: 5,
        max_response_body_bytes: 1024 * 1024,
        event_buffer_size: 256,
    }
}

/// Test application wrapper
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let state = AppState::new(test_config())
            .await
            .expect("Failed to create test app state");

        let router = build_router(state.clone());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, state }
    }
}
