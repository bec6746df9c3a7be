//! Live, owner-scoped record subscriptions.
//!
//! A feed emits the owner's full ordered record set on start and again after
//! every change event for that owner. Consumers never see deltas.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use b2b_core::{Customer, CustomerStore, OwnerId};

/// One complete, ordered emission.
pub type CustomerSet = Arc<Vec<Customer>>;

const FEED_BUFFER: usize = 16;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Handle to a running subscription. Dropping it cancels the subscription.
pub struct CustomerFeed {
    owner: OwnerId,
    rx: mpsc::Receiver<CustomerSet>,
    task: JoinHandle<()>,
}

/// Start a live subscription for `owner`.
///
/// The event receiver is registered before the initial listing so no change
/// between the two can be missed. A lagged receiver triggers a re-list.
pub fn subscribe(store: Arc<dyn CustomerStore>, owner: OwnerId) -> CustomerFeed {
    let mut events = store.events().subscribe();
    let (tx, rx) = mpsc::channel(FEED_BUFFER);
    let task_owner = owner.clone();

    let task = tokio::spawn(async move {
        let owner = task_owner;
        if !initial_list(store.as_ref(), &owner, &tx).await {
            return;
        }
        loop {
            match events.recv().await {
                Ok(envelope) if envelope.payload.owner() == &owner => {
                    debug!(
                        subsystem = "live",
                        owner = %owner,
                        event_type = %envelope.event_type,
                        "Change event, re-listing"
                    );
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        subsystem = "live",
                        owner = %owner,
                        skipped,
                        "Event receiver lagged, resyncing"
                    );
                }
                Err(RecvError::Closed) => break,
            }
            if !relist(store.as_ref(), &owner, &tx).await {
                break;
            }
        }
        debug!(subsystem = "live", owner = %owner, "Subscription task finished");
    });

    CustomerFeed { owner, rx, task }
}

/// First emission. A failed list is retried with backoff until it succeeds
/// or the feed is dropped, so every subscriber starts from a full set.
async fn initial_list(
    store: &dyn CustomerStore,
    owner: &OwnerId,
    tx: &mpsc::Sender<CustomerSet>,
) -> bool {
    let mut delay = INITIAL_RETRY_DELAY;
    loop {
        match store.list(owner).await {
            Ok(records) => {
                debug!(
                    subsystem = "live",
                    owner = %owner,
                    result_count = records.len(),
                    "Emitting initial record set"
                );
                return tx.send(Arc::new(records)).await.is_ok();
            }
            Err(e) => {
                warn!(
                    subsystem = "live",
                    owner = %owner,
                    error = %e,
                    retry_ms = delay.as_millis() as u64,
                    "Initial list failed, retrying"
                );
                tokio::select! {
                    _ = tx.closed() => return false,
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
}

/// List and forward. Returns false once the feed side has gone away.
async fn relist(store: &dyn CustomerStore, owner: &OwnerId, tx: &mpsc::Sender<CustomerSet>) -> bool {
    match store.list(owner).await {
        Ok(records) => {
            debug!(subsystem = "live", owner = %owner, result_count = records.len(), "Emitting record set");
            tx.send(Arc::new(records)).await.is_ok()
        }
        Err(e) => {
            warn!(subsystem = "live", owner = %owner, error = %e, "Re-list failed, keeping previous set");
            !tx.is_closed()
        }
    }
}

impl CustomerFeed {
    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Wait for the next emission. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<CustomerSet> {
        self.rx.recv().await
    }

    /// Take an emission that is already waiting, without blocking.
    pub fn try_next(&mut self) -> Option<CustomerSet> {
        self.rx.try_recv().ok()
    }

    /// Stop emissions and wait until the background task has released its
    /// event receiver.
    pub async fn cancel(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        debug!(subsystem = "live", owner = %self.owner, "Subscription cancelled");
    }
}

impl Drop for CustomerFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for CustomerFeed {
    type Item = CustomerSet;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
