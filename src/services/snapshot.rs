use sea_orm::DatabaseTransaction;
use uuid::Uuid;

use crate::error::AppResult;
use crate::events::{EventStreams, SyncEvent, Topic};
use crate::ids;
use crate::models::{
    Assert, BodyRaw, Http, KeyValue, KeyValueKind, Response, ResponseHeader, Version,
};
use crate::repositories::{
    AssertRepository, BodyRawRepository, HttpRepository, KeyValueRepository, ResponseRepository,
    VersionRepository,
};
use crate::services::resolver::ResolvedHttp;

/// Every row one version writes. The snapshot request shares the version id.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: Version,
    pub http: Http,
    pub key_values: Vec<(KeyValueKind, Vec<KeyValue>)>,
    pub asserts: Vec<Assert>,
    pub body_raw: Option<BodyRaw>,
    pub response: Response,
    pub response_headers: Vec<ResponseHeader>,
}

/// Naming of a new version
#[derive(Debug, Clone)]
pub struct VersionInfo {
    pub http_id: Uuid,
    pub author_user_id: Uuid,
    pub name: String,
    pub description: String,
}

impl Snapshot {
    /// Freeze a resolved request and the response it produced
    pub fn compose(
        resolved: &ResolvedHttp,
        info: VersionInfo,
        response: &Response,
        headers: &[ResponseHeader],
    ) -> Self {
        let now = ids::now_unix();
        let version_id = ids::new_id();

        let version = Version {
            id: version_id,
            http_id: info.http_id,
            author_user_id: info.author_user_id,
            name: info.name,
            description: info.description,
            created_at: now,
        };

        let mut http = resolved.http.clone();
        http.id = version_id;
        http.clear_delta();
        http.is_snapshot = true;
        http.last_run_at = Some(response.time);
        http.created_at = now;
        http.updated_at = now;

        let key_values = KeyValueKind::ALL
            .into_iter()
            .map(|kind| {
                let rows = resolved
                    .key_values(kind)
                    .iter()
                    .map(|row| row.detached(ids::new_id(), version_id))
                    .collect();
                (kind, rows)
            })
            .collect();

        let asserts = resolved
            .asserts
            .iter()
            .map(|row| row.detached(ids::new_id(), version_id))
            .collect();

        let body_raw = resolved.body_raw.as_ref().map(|body| BodyRaw {
            id: ids::new_id(),
            http_id: version_id,
            raw_data: body.effective_data().to_vec(),
            delta_raw_data: None,
            is_delta: false,
            created_at: now,
            updated_at: now,
        });

        let response_copy = Response {
            id: ids::new_id(),
            http_id: version_id,
            ..response.clone()
        };

        let response_headers = headers
            .iter()
            .map(|h| ResponseHeader {
                id: ids::new_id(),
                response_id: response_copy.id,
                header_key: h.header_key.clone(),
                header_value: h.header_value.clone(),
            })
            .collect();

        Self {
            version,
            http,
            key_values,
            asserts,
            body_raw,
            response: response_copy,
            response_headers,
        }
    }

    /// Write every row inside the caller's transaction
    pub async fn write(&self, txn: &DatabaseTransaction) -> AppResult<()> {
        HttpRepository::tx(txn).insert_many(std::slice::from_ref(&self.http)).await?;
        VersionRepository::tx(txn).insert(&self.version).await?;

        let key_values = KeyValueRepository::tx(txn);
        for (kind, rows) in &self.key_values {
            key_values.insert_many(*kind, rows).await?;
        }

        AssertRepository::tx(txn).insert_many(&self.asserts).await?;
        if let Some(body) = &self.body_raw {
            BodyRawRepository::tx(txn).insert_many(std::slice::from_ref(body)).await?;
        }

        let responses = ResponseRepository::tx(txn);
        responses.insert(&self.response).await?;
        responses.insert_headers(&self.response_headers).await?;

        Ok(())
    }

    /// Publish the snapshot's child and response rows. The version itself is
    /// published by the caller once these are out.
    pub fn publish_rows(&self, streams: &EventStreams, topic: Topic) {
        for (kind, rows) in &self.key_values {
            streams
                .key_value(*kind)
                .publish_all(topic, rows.iter().cloned().map(SyncEvent::insert));
        }
        streams
            .assert
            .publish_all(topic, self.asserts.iter().cloned().map(SyncEvent::insert));
        if let Some(body) = &self.body_raw {
            streams.body_raw.publish(topic, SyncEvent::insert(body.clone()));
        }
        streams
            .response
            .publish(topic, SyncEvent::insert(self.response.clone()));
        streams.response_header.publish_all(
            topic,
            self.response_headers.iter().cloned().map(SyncEvent::insert),
        );
    }
}
