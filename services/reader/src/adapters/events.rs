//! services/reader/src/adapters/events.rs
//!
//! Fans session transitions out to any number of subscribers.

use futures::stream;
use novel_reader_core::domain::AuthEvent;
use novel_reader_core::ports::AuthEventStream;
use tokio::sync::broadcast;
use tracing::warn;

const EVENT_CAPACITY: usize = 16;

/// A broadcast hub for `AuthEvent`s shared by the backend adapters.
#[derive(Clone)]
pub struct AuthEventHub {
    sender: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEventHub {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }
}

impl AuthEventHub {
    /// Delivers the event to every live subscriber. Having none is not an error.
    pub fn emit(&self, event: AuthEvent) {
        let _ = self.sender.send(event);
    }

    /// Opens a new subscription. The stream ends when the hub is dropped.
    pub fn subscribe(&self) -> AuthEventStream {
        let receiver = self.sender.subscribe();
        Box::pin(stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Auth event subscriber lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let hub = AuthEventHub::default();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.emit(AuthEvent::SignedOut);

        assert_eq!(first.next().await, Some(AuthEvent::SignedOut));
        assert_eq!(second.next().await, Some(AuthEvent::SignedOut));
    }

    #[tokio::test]
    async fn stream_ends_when_hub_is_dropped() {
        let hub = AuthEventHub::default();
        let mut events = hub.subscribe();
        drop(hub);
        assert_eq!(events.next().await, None);
    }
}
