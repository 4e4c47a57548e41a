//! In-process publication of session events.

use futures::{stream::BoxStream, StreamExt};
use nageyell_types::events::SessionEvent;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

pub trait EventSink: Send + Sync {
    fn publish(&self, event: SessionEvent);
    fn subscribe(&self) -> BoxStream<'static, SessionEvent>;
}

/// Simple in-process bus backed by a broadcast channel.
///
/// Publishing never blocks; slow subscribers drop the events they lagged behind on.
#[derive(Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl LocalBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }
}

impl EventSink for LocalBus {
    fn publish(&self, event: SessionEvent) {
        trace!("Publishing {:?} event {}", event.kind, event.id);
        if self.tx.send(event).is_err() {
            trace!("No subscribers for session event");
        }
    }

    fn subscribe(&self) -> BoxStream<'static, SessionEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Some(event),
                    Err(err) => {
                        debug!("Event subscriber lagged: {err}");
                        None
                    }
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nageyell_types::{events::EventKind, status::Status};

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = LocalBus::new(8);
        let mut stream = bus.subscribe();
        bus.publish(SessionEvent::status(Some(Status::WriteSucceeded)));
        bus.publish(SessionEvent::status(None));

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!(first.kind, EventKind::Status);
        assert!(matches!(
            first.payload,
            nageyell_types::events::EventPayload::Status(Some(Status::WriteSucceeded))
        ));
        assert!(matches!(
            second.payload,
            nageyell_types::events::EventPayload::Status(None)
        ));
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = LocalBus::new(0);
        bus.publish(SessionEvent::status(None));
    }
}
