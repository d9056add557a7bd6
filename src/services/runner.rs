use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{SyncEvent, Topic};
use crate::ids;
use crate::models::{
    Http, LogEntry, LogLevel, Response, ResponseAssert, ResponseHeader, RunOptions, Version,
};
use crate::repositories::{self, HttpRepository, Repository, ResponseRepository};
use crate::services::access::AccessService;
use crate::services::assertion::EvalContext;
use crate::services::http_client::HttpExchange;
use crate::services::preparer::{self, PreparedRequest};
use crate::services::resolver::{ResolvedHttp, ResolverService};
use crate::services::snapshot::{Snapshot, VersionInfo};
use crate::services::variables::VariableService;
use crate::state::AppState;

/// Everything one run stored
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunResult {
    pub response: Response,
    pub headers: Vec<ResponseHeader>,
    pub asserts: Vec<ResponseAssert>,
    pub version: Version,
}

/// Executes requests: resolve, substitute, send, store, assert, snapshot
pub struct RunEngine<'a> {
    state: &'a AppState,
}

impl<'a> RunEngine<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    pub async fn run(
        &self,
        user_id: Uuid,
        http_id: Uuid,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> AppResult<RunResult> {
        let db = &self.state.db;

        let target = HttpRepository::find_by_id(db, http_id).await?;
        AccessService::check_read(db, user_id, target.workspace_id).await?;
        if target.is_snapshot {
            return Err(AppError::FailedPrecondition(
                "snapshots cannot be run".to_string(),
            ));
        }

        match self.execute(user_id, &target, options, cancel).await {
            Ok(result) => {
                let passed = result.asserts.iter().filter(|a| a.success).count();
                self.log(
                    &target,
                    LogLevel::Info,
                    format!(
                        "{} returned {} in {} ms, {}/{} assertions passed",
                        result.version.name,
                        result.response.status,
                        result.response.duration_ms,
                        passed,
                        result.asserts.len()
                    ),
                );
                Ok(result)
            }
            Err(e) => {
                let level = match e {
                    AppError::Canceled => LogLevel::Warning,
                    _ => LogLevel::Error,
                };
                self.log(&target, level, format!("{} failed: {}", target.name, e));
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        user_id: Uuid,
        target: &Http,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> AppResult<RunResult> {
        let db = &self.state.db;
        let streams = &self.state.streams;
        let topic = Topic::workspace(target.workspace_id);

        let mut resolved = ResolverService::resolve(db, target).await?;
        resolved.http.workspace_id = target.workspace_id;

        let mut tracker = VariableService::tracker(db, target.workspace_id).await?;
        let mut substituted: ResolvedHttp = resolved.clone();
        tracker.apply(&mut substituted)?;
        let prepared = preparer::prepare(&substituted)?;

        tracing::info!(
            http_id = %target.id,
            method = %prepared.method,
            url = %prepared.url,
            variables = ?tracker.consulted().collect::<Vec<_>>(),
            "running request"
        );

        let exchange = self.state.http_client.execute(&prepared, &cancel).await?;
        let (response, headers) = stored_response(target.id, &exchange);

        // Response, headers and the run timestamp commit together
        let txn = repositories::begin(db).await?;
        let writer = ResponseRepository::tx(&txn);
        writer.insert(&response).await?;
        writer.insert_headers(&headers).await?;
        HttpRepository::tx(&txn)
            .touch_last_run(target.id, response.time)
            .await?;
        repositories::commit(txn).await?;

        let updated = HttpRepository::find_by_id(db, target.id).await?;
        streams.http.publish(topic, SyncEvent::update(updated));
        streams
            .response
            .publish(topic, SyncEvent::insert(response.clone()));
        streams
            .response_header
            .publish_all(topic, headers.iter().cloned().map(SyncEvent::insert));

        let context = EvalContext::new(exchange.status, &exchange.headers, &exchange.body);
        let outcomes = self
            .state
            .assertions
            .evaluate_all(&resolved.asserts, context)
            .await;
        let now = ids::now_unix();
        let asserts: Vec<ResponseAssert> = outcomes
            .iter()
            .map(|outcome| ResponseAssert {
                id: ids::new_id(),
                response_id: response.id,
                value: outcome.stored_value(),
                success: outcome.success,
                created_at: now,
            })
            .collect();

        // A failure here still leaves the run with a version
        let stored = store_asserts(db, &asserts).await;
        match &stored {
            Ok(()) => streams
                .response_assert
                .publish_all(topic, asserts.iter().cloned().map(SyncEvent::insert)),
            Err(e) => tracing::error!(
                http_id = %target.id,
                response_id = %response.id,
                error = %e,
                "failed to store assertion results"
            ),
        }

        let info = VersionInfo {
            http_id: target.id,
            author_user_id: user_id,
            name: options
                .version_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| default_version_name(&prepared, &resolved)),
            description: options.version_description.unwrap_or_default(),
        };
        let snapshot = Snapshot::compose(&resolved, info, &response, &headers);

        let txn = repositories::begin(db).await?;
        snapshot.write(&txn).await?;
        repositories::commit(txn).await?;

        snapshot.publish_rows(streams, topic);
        streams
            .version
            .publish(topic, SyncEvent::insert(snapshot.version.clone()));
        if target.is_delta {
            streams
                .base_request_version
                .publish(topic, SyncEvent::insert(snapshot.version.clone()));
        }
        stored?;

        Ok(RunResult {
            response,
            headers,
            asserts,
            version: snapshot.version,
        })
    }

    fn log(&self, target: &Http, level: LogLevel, message: String) {
        let entry = LogEntry {
            id: ids::new_id(),
            workspace_id: target.workspace_id,
            http_id: target.id,
            level,
            message,
            created_at: ids::now_unix(),
        };
        self.state
            .streams
            .log
            .publish(Topic::workspace(target.workspace_id), SyncEvent::insert(entry));
    }
}

async fn store_asserts(db: &DatabaseConnection, asserts: &[ResponseAssert]) -> AppResult<()> {
    if asserts.is_empty() {
        return Ok(());
    }
    let txn = repositories::begin(db).await?;
    ResponseRepository::tx(&txn).insert_asserts(asserts).await?;
    repositories::commit(txn).await
}

fn default_version_name(prepared: &PreparedRequest, resolved: &ResolvedHttp) -> String {
    format!("{} {}", prepared.method, resolved.http.url)
}

fn stored_response(http_id: Uuid, exchange: &HttpExchange) -> (Response, Vec<ResponseHeader>) {
    let now = ids::now_unix();
    let response = Response {
        id: ids::new_id(),
        http_id,
        status: i32::from(exchange.status),
        body: exchange.body.clone(),
        time: now,
        duration_ms: exchange.duration.as_millis() as i64,
        size: exchange.body.len() as i64,
        created_at: now,
    };

    let headers = exchange
        .headers
        .iter()
        .map(|(key, value)| ResponseHeader {
            id: ids::new_id(),
            response_id: response.id,
            header_key: key.clone(),
            header_value: value.clone(),
        })
        .collect();

    (response, headers)
}
