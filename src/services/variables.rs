use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::BodyKind;
use crate::error::{AppError, AppResult};
use crate::models::{KeyValueKind, Workspace};
use crate::repositories::{EnvironmentRepository, Repository, WorkspaceRepository};
use crate::services::resolver::ResolvedHttp;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("placeholder pattern")
});

/// Variable lookup that remembers which keys were consulted
#[derive(Debug, Default)]
pub struct Tracker {
    vars: HashMap<String, String>,
    consulted: BTreeSet<String>,
}

impl Tracker {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self {
            vars,
            consulted: BTreeSet::new(),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&str> {
        self.consulted.insert(key.to_string());
        self.vars.get(key).map(String::as_str)
    }

    /// Keys looked up so far, defined or not
    pub fn consulted(&self) -> impl Iterator<Item = &str> {
        self.consulted.iter().map(String::as_str)
    }

    /// Replace every `{{ key }}` in `text`
    pub fn substitute(&mut self, text: &str) -> AppResult<String> {
        if !text.contains("{{") {
            return Ok(text.to_string());
        }

        let mut missing = None;
        let replaced = PLACEHOLDER.replace_all(text, |caps: &Captures| {
            let key = &caps[1];
            match self.get(key) {
                Some(value) => value.to_string(),
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(AppError::InvalidArgument(format!(
                "undefined variable: {}",
                key
            ))),
            None => Ok(replaced.into_owned()),
        }
    }

    /// Substitute the templated parts of a resolved request that will
    /// actually be sent. Disabled rows and body collections the body kind
    /// ignores are left as written.
    pub fn apply(&mut self, resolved: &mut ResolvedHttp) -> AppResult<()> {
        resolved.http.url = self.substitute(&resolved.http.url)?;
        let body_kind = resolved.http.body_kind;

        for kind in KeyValueKind::ALL {
            if !sent_with(kind, body_kind) {
                continue;
            }
            for row in resolved.key_values_mut(kind).iter_mut().filter(|r| r.enabled) {
                row.key = self.substitute(&row.key)?;
                row.value = self.substitute(&row.value)?;
            }
        }

        if body_kind == BodyKind::Raw {
            if let Some(body) = resolved.body_raw.as_mut() {
                // Binary bodies pass through untouched
                if let Ok(text) = std::str::from_utf8(&body.raw_data) {
                    let replaced = self.substitute(text)?;
                    body.raw_data = replaced.into_bytes();
                }
            }
        }

        Ok(())
    }
}

fn sent_with(kind: KeyValueKind, body_kind: BodyKind) -> bool {
    match kind {
        KeyValueKind::Header | KeyValueKind::SearchParam => true,
        KeyValueKind::BodyForm => body_kind == BodyKind::FormData,
        KeyValueKind::BodyUrlEncoded => body_kind == BodyKind::UrlEncoded,
    }
}

pub struct VariableService;

impl VariableService {
    /// Enabled variables of the workspace's global environment
    pub async fn load(db: &DatabaseConnection, workspace_id: Uuid) -> AppResult<HashMap<String, String>> {
        let workspace: Workspace = WorkspaceRepository::find_by_id(db, workspace_id).await?;

        let Some(env_id) = workspace.global_env_id else {
            return Ok(HashMap::new());
        };

        if EnvironmentRepository::find_by_id(db, env_id).await?.is_none() {
            tracing::warn!(%workspace_id, %env_id, "global environment missing");
            return Ok(HashMap::new());
        }

        let vars = EnvironmentRepository::list_variables(db, env_id)
            .await?
            .into_iter()
            .filter(|v| v.enabled)
            .map(|v| (v.key, v.value))
            .collect();

        Ok(vars)
    }

    pub async fn tracker(db: &DatabaseConnection, workspace_id: Uuid) -> AppResult<Tracker> {
        Ok(Tracker::new(Self::load(db, workspace_id).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{Http, KeyValue};

    fn tracker(pairs: &[(&str, &str)]) -> Tracker {
        Tracker::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_substitutes_with_surrounding_whitespace() {
        let mut t = tracker(&[("host", "api.example.com"), ("version", "v2")]);
        let out = t
            .substitute("https://{{host}}/{{ version }}/items")
            .unwrap();
        assert_eq!(out, "https://api.example.com/v2/items");

        let consulted: Vec<_> = t.consulted().collect();
        assert_eq!(consulted, ["host", "version"]);
    }

    #[test]
    fn test_undefined_variable_names_the_key() {
        let mut t = tracker(&[]);
        let err = t.substitute("Bearer {{ token }}").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(err.to_string().contains("token"));
    }

    #[test]
    fn test_text_without_placeholders_is_unchanged() {
        let mut t = tracker(&[]);
        assert_eq!(t.substitute("{ \"a\": 1 }").unwrap(), "{ \"a\": 1 }");
        assert_eq!(t.consulted().count(), 0);
    }

    fn row(key: &str, value: &str, enabled: bool) -> KeyValue {
        KeyValue {
            id: Uuid::now_v7(),
            http_id: Uuid::nil(),
            key: key.to_string(),
            value: value.to_string(),
            enabled,
            description: String::new(),
            display_order: 0.0,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        }
    }

    fn resolved(body_kind: BodyKind) -> ResolvedHttp {
        ResolvedHttp {
            http: Http {
                id: Uuid::now_v7(),
                workspace_id: Uuid::now_v7(),
                name: "r".to_string(),
                url: "https://{{ host }}/".to_string(),
                method: "POST".to_string(),
                description: String::new(),
                body_kind,
                display_order: 0.0,
                last_run_at: None,
                parent_http_id: None,
                is_delta: false,
                delta_name: None,
                delta_url: None,
                delta_method: None,
                delta_description: None,
                delta_body_kind: None,
                is_snapshot: false,
                created_at: 0,
                updated_at: 0,
            },
            headers: vec![
                row("X-Host", "{{ host }}", true),
                row("X-Old", "{{ gone }}", false),
            ],
            search_params: Vec::new(),
            body_forms: vec![row("field", "{{ gone }}", true)],
            body_urlencoded: vec![row("name", "{{ host }}", true)],
            asserts: Vec::new(),
            body_raw: None,
        }
    }

    #[test]
    fn test_apply_skips_rows_that_are_not_sent() {
        let mut r = resolved(BodyKind::UrlEncoded);
        tracker(&[("host", "api.example.com")]).apply(&mut r).unwrap();

        assert_eq!(r.http.url, "https://api.example.com/");
        assert_eq!(r.headers[0].value, "api.example.com");
        assert_eq!(r.headers[1].value, "{{ gone }}");
        assert_eq!(r.body_forms[0].value, "{{ gone }}");
        assert_eq!(r.body_urlencoded[0].value, "api.example.com");
    }

    #[test]
    fn test_apply_fails_on_undefined_variable_in_sent_body() {
        let mut r = resolved(BodyKind::FormData);
        let err = tracker(&[("host", "api.example.com")])
            .apply(&mut r)
            .unwrap_err();
        assert!(err.to_string().contains("gone"));
    }
}
