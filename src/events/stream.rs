use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Routing key of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic {
    pub workspace_id: Uuid,
}

impl Topic {
    pub fn workspace(workspace_id: Uuid) -> Self {
        Self { workspace_id }
    }
}

/// What a sync client receives: a fact about one row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent<T> {
    Insert { value: T },
    Update { value: T },
    Delete { id: Uuid },
}

impl<T> SyncEvent<T> {
    pub fn insert(value: T) -> Self {
        SyncEvent::Insert { value }
    }

    pub fn update(value: T) -> Self {
        SyncEvent::Update { value }
    }

    pub fn delete(id: Uuid) -> Self {
        SyncEvent::Delete { id }
    }
}

struct Envelope<T> {
    topic: Topic,
    event: SyncEvent<T>,
}

/// Fan-out channel for one event type.
///
/// Publishing never waits on subscribers. Each subscriber gets its own
/// bounded buffer fed by a forwarding task; when a subscriber falls behind,
/// events are dropped for that subscriber only and the rest keep their order.
pub struct EventStream<T> {
    name: &'static str,
    sender: broadcast::Sender<Arc<Envelope<T>>>,
    buffer: usize,
    shutdown: CancellationToken,
}

impl<T> EventStream<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, buffer: usize, shutdown: CancellationToken) -> Self {
        let buffer = buffer.max(1);
        let (sender, _) = broadcast::channel(buffer);
        Self {
            name,
            sender,
            buffer,
            shutdown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn publish(&self, topic: Topic, event: SyncEvent<T>) {
        if self.shutdown.is_cancelled() {
            tracing::debug!(stream = self.name, "publish after shutdown ignored");
            return;
        }

        if self.sender.send(Arc::new(Envelope { topic, event })).is_err() {
            tracing::debug!(stream = self.name, "no active subscribers");
        }
    }

    pub fn publish_all<I>(&self, topic: Topic, events: I)
    where
        I: IntoIterator<Item = SyncEvent<T>>,
    {
        for event in events {
            self.publish(topic, event);
        }
    }

    /// Subscribe to every event whose topic passes `predicate`.
    ///
    /// Only events published after this call returns are delivered.
    pub fn subscribe<P, Fut>(&self, predicate: P) -> AppResult<Subscription<T>>
    where
        P: Fn(Topic) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(AppError::InvalidArgument(format!(
                "{} stream is shut down",
                self.name
            )));
        }

        let mut receiver = self.sender.subscribe();
        let (forward, buffered) = mpsc::channel(self.buffer);
        let cancel = self.shutdown.child_token();
        let token = cancel.clone();
        let name = self.name;

        tokio::spawn(async move {
            loop {
                let envelope = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = forward.closed() => break,
                    received = receiver.recv() => match received {
                        Ok(envelope) => envelope,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(stream = name, skipped, "subscriber lagged, events dropped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                };

                if !predicate(envelope.topic).await {
                    continue;
                }

                match forward.try_send(envelope.event.clone()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(stream = name, "subscriber buffer full, event dropped");
                    }
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            tracing::debug!(stream = name, "subscription closed");
        });

        Ok(Subscription {
            receiver: buffered,
            _guard: cancel.drop_guard(),
        })
    }
}

/// Live feed of one stream. Dropping it stops the forwarding task.
pub struct Subscription<T> {
    receiver: mpsc::Receiver<SyncEvent<T>>,
    _guard: DropGuard,
}

impl<T> Subscription<T> {
    /// Next event, or `None` once the fabric has shut down
    pub async fn recv(&mut self) -> Option<SyncEvent<T>> {
        self.receiver.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = SyncEvent<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next<T>(sub: &mut Subscription<T>) -> Option<SyncEvent<T>> {
        timeout(Duration::from_secs(2), sub.recv()).await.ok().flatten()
    }

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let stream = EventStream::<u32>::new("numbers", 16, CancellationToken::new());
        let mut sub = stream.subscribe(|_| async { true }).unwrap();
        let topic = Topic::workspace(Uuid::now_v7());

        for n in 0..5 {
            stream.publish(topic, SyncEvent::insert(n));
        }

        for n in 0..5 {
            assert_eq!(next(&mut sub).await, Some(SyncEvent::insert(n)));
        }
    }

    #[tokio::test]
    async fn test_predicate_filters_topics() {
        let stream = EventStream::<u32>::new("numbers", 16, CancellationToken::new());
        let visible = Uuid::now_v7();
        let hidden = Uuid::now_v7();
        let mut sub = stream
            .subscribe(move |topic: Topic| async move { topic.workspace_id == visible })
            .unwrap();

        stream.publish(Topic::workspace(hidden), SyncEvent::insert(1));
        stream.publish(Topic::workspace(visible), SyncEvent::insert(2));

        assert_eq!(next(&mut sub).await, Some(SyncEvent::insert(2)));
    }

    #[tokio::test]
    async fn test_only_events_after_subscribe_are_delivered() {
        let stream = EventStream::<u32>::new("numbers", 16, CancellationToken::new());
        let topic = Topic::workspace(Uuid::now_v7());
        stream.publish(topic, SyncEvent::insert(1));

        let mut sub = stream.subscribe(|_| async { true }).unwrap();
        stream.publish(topic, SyncEvent::delete(Uuid::nil()));

        assert_eq!(next(&mut sub).await, Some(SyncEvent::delete(Uuid::nil())));
    }

    #[tokio::test]
    async fn test_slow_subscriber_sees_gap_not_reorder() {
        let stream = EventStream::<u32>::new("numbers", 4, CancellationToken::new());
        let topic = Topic::workspace(Uuid::now_v7());
        let mut sub = stream.subscribe(|_| async { true }).unwrap();

        for n in 0..64 {
            stream.publish(topic, SyncEvent::insert(n));
        }

        let mut seen = Vec::new();
        while let Ok(Some(SyncEvent::Insert { value })) =
            timeout(Duration::from_millis(200), sub.recv()).await
        {
            seen.push(value);
        }

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[tokio::test]
    async fn test_shutdown_closes_and_rejects_subscriptions() {
        let root = CancellationToken::new();
        let stream = EventStream::<u32>::new("numbers", 16, root.clone());
        let mut sub = stream.subscribe(|_| async { true }).unwrap();

        root.cancel();

        assert_eq!(next(&mut sub).await, None);
        let err = stream.subscribe(|_| async { true }).err().unwrap();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidArgument);
    }

    #[test]
    fn test_sync_event_wire_shape() {
        let id = Uuid::now_v7();
        let json = serde_json::to_value(SyncEvent::<u32>::delete(id)).unwrap();
        assert_eq!(json["type"], "delete");
        assert_eq!(json["id"], id.to_string());

        let json = serde_json::to_value(SyncEvent::update(7u32)).unwrap();
        assert_eq!(json["type"], "update");
        assert_eq!(json["value"], 7);
    }
}
