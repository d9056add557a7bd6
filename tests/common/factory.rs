use uuid::Uuid;

use http_workbench::entity::{BodyKind, Role};
use http_workbench::models::{
    AddMember, AssertInsert, BodyRawInsert, CreateUser, CreateWorkspace, Http, HttpInsert,
    KeyValue, KeyValueInsert, KeyValueKind, UpsertVariable, Workspace,
};
use http_workbench::repositories::UserRepository;
use http_workbench::services::{
    AssertService, AuthService, BodyRawService, HttpService, KeyValueService, WorkspaceService,
};
use http_workbench::state::AppState;

/// Authentication info for tests
pub struct TestAuth {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestAuth {
    /// Get the Authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Factory for creating test data
pub struct Factory<'a> {
    state: &'a AppState,
}

impl<'a> Factory<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Create a test user and return auth info
    pub async fn create_user(&self) -> TestAuth {
        let unique_id = Uuid::new_v4();
        let email = format!("test-{}@example.com", unique_id);

        let input = CreateUser {
            email: email.clone(),
            name: format!("Test User {}", unique_id),
        };
        let user = UserRepository::create(&self.state.db, &input).await.unwrap();
        let token = AuthService::generate_token(user.id, &email, &self.state.config).unwrap();

        TestAuth {
            user_id: user.id,
            email,
            token,
        }
    }

    /// Create a workspace owned by `owner`
    pub async fn create_workspace(&self, owner: &TestAuth) -> Workspace {
        let input = CreateWorkspace {
            id: None,
            name: "Test Workspace".to_string(),
        };
        WorkspaceService::create(&self.state.db, owner.user_id, input)
            .await
            .unwrap()
            .workspace
    }

    pub async fn add_member(
        &self,
        owner: &TestAuth,
        workspace_id: Uuid,
        member: &TestAuth,
        role: Role,
    ) {
        let input = AddMember {
            user_id: member.user_id.to_string(),
            role,
        };
        WorkspaceService::add_member(&self.state.db, owner.user_id, workspace_id, input)
            .await
            .unwrap();
    }

    pub async fn set_variable(&self, owner: &TestAuth, workspace_id: Uuid, key: &str, value: &str) {
        let input = UpsertVariable {
            key: key.to_string(),
            value: value.to_string(),
            enabled: None,
            description: None,
            display_order: None,
        };
        WorkspaceService::upsert_variable(&self.state.db, owner.user_id, workspace_id, input)
            .await
            .unwrap();
    }

    /// Create a base request
    pub async fn create_http(
        &self,
        owner: &TestAuth,
        workspace_id: Uuid,
        method: &str,
        url: &str,
    ) -> Http {
        let input = HttpInsert {
            id: Uuid::now_v7().to_string(),
            workspace_id: workspace_id.to_string(),
            name: format!("{} {}", method, url),
            url: url.to_string(),
            method: method.to_string(),
            description: String::new(),
            body_kind: BodyKind::Empty,
            display_order: None,
            parent_http_id: None,
            delta_name: None,
            delta_url: None,
            delta_method: None,
            delta_description: None,
            delta_body_kind: None,
        };
        self.insert_http(owner, input).await
    }

    /// Create a delta of `parent` with an optional url override
    pub async fn create_delta(&self, owner: &TestAuth, parent: &Http, delta_url: Option<&str>) -> Http {
        let input = HttpInsert {
            id: Uuid::now_v7().to_string(),
            workspace_id: parent.workspace_id.to_string(),
            name: format!("Delta of {}", parent.name),
            url: String::new(),
            method: String::new(),
            description: String::new(),
            body_kind: BodyKind::Unspecified,
            display_order: None,
            parent_http_id: Some(parent.id.to_string()),
            delta_name: None,
            delta_url: delta_url.map(str::to_string),
            delta_method: None,
            delta_description: None,
            delta_body_kind: None,
        };
        self.insert_http(owner, input).await
    }

    async fn insert_http(&self, owner: &TestAuth, input: HttpInsert) -> Http {
        HttpService::insert(&self.state.db, &self.state.streams, owner.user_id, vec![input])
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn add_key_value(
        &self,
        owner: &TestAuth,
        http: &Http,
        kind: KeyValueKind,
        key: &str,
        value: &str,
        display_order: f64,
    ) -> KeyValue {
        let input = KeyValueInsert {
            id: Uuid::now_v7().to_string(),
            http_id: http.id.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            enabled: None,
            description: None,
            display_order: Some(display_order),
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        };
        KeyValueService::insert(&self.state.db, &self.state.streams, owner.user_id, kind, vec![input])
            .await
            .unwrap()
            .remove(0)
    }

    /// Override `base_row` on the delta `http`
    pub async fn override_key_value(
        &self,
        owner: &TestAuth,
        http: &Http,
        kind: KeyValueKind,
        base_row: &KeyValue,
        delta_value: Option<&str>,
        delta_enabled: Option<bool>,
    ) -> KeyValue {
        let input = KeyValueInsert {
            id: Uuid::now_v7().to_string(),
            http_id: http.id.to_string(),
            key: String::new(),
            value: String::new(),
            enabled: None,
            description: None,
            display_order: None,
            parent_id: Some(base_row.id.to_string()),
            delta_key: None,
            delta_value: delta_value.map(str::to_string),
            delta_enabled,
            delta_description: None,
            delta_display_order: None,
        };
        KeyValueService::insert(&self.state.db, &self.state.streams, owner.user_id, kind, vec![input])
            .await
            .unwrap()
            .remove(0)
    }

    pub async fn add_assert(&self, owner: &TestAuth, http: &Http, expression: &str, order: f64) {
        let input = AssertInsert {
            id: Uuid::now_v7().to_string(),
            http_id: http.id.to_string(),
            value: expression.to_string(),
            enabled: None,
            description: None,
            display_order: Some(order),
            parent_id: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        };
        AssertService::insert(&self.state.db, &self.state.streams, owner.user_id, vec![input])
            .await
            .unwrap();
    }

    /// Attach a raw body given as base64
    pub async fn set_body_raw(&self, owner: &TestAuth, http: &Http, base64: &str) {
        let input = BodyRawInsert {
            id: Uuid::now_v7().to_string(),
            http_id: http.id.to_string(),
            raw_data: base64.to_string(),
            delta_raw_data: None,
        };
        BodyRawService::insert(&self.state.db, &self.state.streams, owner.user_id, vec![input])
            .await
            .unwrap();
    }
}
