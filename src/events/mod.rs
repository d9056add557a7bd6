//! In-process pub/sub fabric feeding the sync endpoints.
//!
//! Every entity kind has its own [`EventStream`]; events are routed by
//! workspace and published only after the writing transaction commits.

pub mod stream;

pub use stream::{EventStream, Subscription, SyncEvent, Topic};

use tokio_util::sync::CancellationToken;

use crate::models::{
    Assert, BodyRaw, Http, KeyValue, KeyValueKind, LogEntry, Response, ResponseAssert,
    ResponseHeader, Version,
};

/// All event streams of the process
pub struct EventStreams {
    pub http: EventStream<Http>,
    pub header: EventStream<KeyValue>,
    pub search_param: EventStream<KeyValue>,
    pub body_form: EventStream<KeyValue>,
    pub body_urlencoded: EventStream<KeyValue>,
    pub assert: EventStream<Assert>,
    pub body_raw: EventStream<BodyRaw>,
    pub response: EventStream<Response>,
    pub response_header: EventStream<ResponseHeader>,
    pub response_assert: EventStream<ResponseAssert>,
    pub version: EventStream<Version>,
    pub log: EventStream<LogEntry>,
    /// Versions produced by running a delta, routed to viewers of its base
    pub base_request_version: EventStream<Version>,
    shutdown: CancellationToken,
}

impl EventStreams {
    pub fn new(buffer: usize) -> Self {
        let shutdown = CancellationToken::new();
        Self {
            http: EventStream::new("http", buffer, shutdown.clone()),
            header: EventStream::new("header", buffer, shutdown.clone()),
            search_param: EventStream::new("search_param", buffer, shutdown.clone()),
            body_form: EventStream::new("body_form", buffer, shutdown.clone()),
            body_urlencoded: EventStream::new("body_urlencoded", buffer, shutdown.clone()),
            assert: EventStream::new("assert", buffer, shutdown.clone()),
            body_raw: EventStream::new("body_raw", buffer, shutdown.clone()),
            response: EventStream::new("response", buffer, shutdown.clone()),
            response_header: EventStream::new("response_header", buffer, shutdown.clone()),
            response_assert: EventStream::new("response_assert", buffer, shutdown.clone()),
            version: EventStream::new("version", buffer, shutdown.clone()),
            log: EventStream::new("log", buffer, shutdown.clone()),
            base_request_version: EventStream::new(
                "base_request_version",
                buffer,
                shutdown.clone(),
            ),
            shutdown,
        }
    }

    pub fn key_value(&self, kind: KeyValueKind) -> &EventStream<KeyValue> {
        match kind {
            KeyValueKind::Header => &self.header,
            KeyValueKind::SearchParam => &self.search_param,
            KeyValueKind::BodyForm => &self.body_form,
            KeyValueKind::BodyUrlEncoded => &self.body_urlencoded,
        }
    }

    /// Close every subscription and refuse new ones
    pub fn shutdown(&self) {
        tracing::info!("Shutting down event streams");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
