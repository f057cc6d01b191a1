//! in process change notifications.
//!
//! publishers push events into a [`Channel`] and any number of subscribers
//! receive the ones that pass their filter. a subscription lives until it is
//! explicitly unsubscribed or the channel goes away.

use chrono::{DateTime, Utc};
use mfgsite_lib::account::ApprovalStatus;
use mfgsite_lib::ids;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::AbortHandle;

/// emitted when an admin approves or rejects an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountEvent {
    pub user_id: ids::UserId,
    pub status: ApprovalStatus,
    pub by: ids::UserId,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Channel<E> {
    sender: broadcast::Sender<E>,
}

impl<E> Channel<E>
where
    E: Clone + Send + 'static
{
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Channel { sender }
    }

    /// sends the event to every current subscriber. returns how many
    /// subscribers were listening
    pub fn publish(&self, event: E) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// must be called from inside a tokio runtime
    pub fn subscribe<F, H>(&self, filter: F, mut on_event: H) -> Subscription
    where
        F: Fn(&E) -> bool + Send + 'static,
        H: FnMut(E) + Send + 'static,
    {
        let mut receiver = self.sender.subscribe();

        let handle = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => if filter(&event) {
                        on_event(event);
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("subscriber fell behind, skipped {skipped} events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Subscription {
            handle: handle.abort_handle()
        }
    }

    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[derive(Debug)]
pub struct Subscription {
    handle: AbortHandle,
}

impl Subscription {
    pub fn unsubscribe(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    fn event(user_id: ids::UserId, status: ApprovalStatus) -> AccountEvent {
        AccountEvent {
            user_id,
            status,
            by: 1,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn filtered_delivery() {
        let channel = Channel::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let _sub = channel.subscribe(
            |e: &AccountEvent| e.status == ApprovalStatus::Rejected,
            move |e| { let _ = tx.send(e.user_id); }
        );

        assert_eq!(channel.publish(event(2, ApprovalStatus::Approved)), 1);
        assert_eq!(channel.publish(event(3, ApprovalStatus::Rejected)), 1);

        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();

        assert_eq!(received, Some(3));
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let channel = Channel::new(8);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let sub = channel.subscribe(|_: &AccountEvent| true, move |e| { let _ = tx.send(e.user_id); });

        sub.unsubscribe();
        tokio::task::yield_now().await;

        channel.publish(event(4, ApprovalStatus::Approved));

        // the sender lives in the aborted task so the channel closes once it
        // is dropped
        let received = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();

        assert_eq!(received, None);
    }

    #[test]
    fn publish_without_subscribers() {
        let channel: Channel<AccountEvent> = Channel::new(4);

        assert_eq!(channel.publish(event(1, ApprovalStatus::Pending)), 0);
        assert_eq!(channel.subscribers(), 0);
    }
}
