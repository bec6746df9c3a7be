//! Customer list with live updates and free-text search.

use std::sync::Arc;

use tracing::debug;

use b2b_core::{search_customers, Customer, CustomerStore, IdentityProvider, OwnerId};
use b2b_db::live::{subscribe, CustomerFeed, CustomerSet};

struct Memo {
    generation: u64,
    query: String,
    visible: Arc<Vec<Customer>>,
}

/// View-model over the signed-in owner's records.
pub struct PeopleView {
    store: Arc<dyn CustomerStore>,
    identity: Arc<dyn IdentityProvider>,
    feed: Option<CustomerFeed>,
    records: CustomerSet,
    /// Bumped whenever `records` is replaced.
    generation: u64,
    query: String,
    memo: Option<Memo>,
}

impl PeopleView {
    pub fn new(store: Arc<dyn CustomerStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            feed: None,
            records: Arc::new(Vec::new()),
            generation: 0,
            query: String::new(),
            memo: None,
        }
    }

    /// Owner the live feed is scoped to.
    pub fn owner(&self) -> Option<&OwnerId> {
        self.feed.as_ref().map(|f| f.owner())
    }

    /// Follow the identity provider. When the owner changed, the previous
    /// subscription is cancelled before the next one starts; with no owner
    /// the list is empty. Does nothing while the provider is settling.
    pub async fn sync_owner(&mut self) {
        if self.identity.is_settling() {
            return;
        }
        let wanted = self.identity.current();
        if wanted.as_ref() == self.owner() {
            return;
        }

        if let Some(previous) = self.feed.take() {
            debug!(subsystem = "people", owner = %previous.owner(), "Dropping subscription");
            previous.cancel().await;
        }
        self.replace_records(Arc::new(Vec::new()));

        if let Some(owner) = wanted {
            debug!(subsystem = "people", owner = %owner, "Subscribing to customers");
            self.feed = Some(subscribe(self.store.clone(), owner));
        }
    }

    /// Apply any emissions already waiting. Returns true when the record set
    /// changed.
    pub fn refresh(&mut self) -> bool {
        let mut latest = None;
        if let Some(feed) = self.feed.as_mut() {
            while let Some(set) = feed.try_next() {
                latest = Some(set);
            }
        }
        match latest {
            Some(set) => {
                self.replace_records(set);
                true
            }
            None => false,
        }
    }

    /// Wait for the next emission and apply it. False when there is no feed
    /// or it has ended.
    pub async fn next_update(&mut self) -> bool {
        let Some(feed) = self.feed.as_mut() else {
            return false;
        };
        match feed.next().await {
            Some(set) => {
                self.replace_records(set);
                self.refresh();
                true
            }
            None => false,
        }
    }

    fn replace_records(&mut self, set: CustomerSet) {
        self.records = set;
        self.generation += 1;
    }

    /// Full record set, newest first.
    pub fn records(&self) -> &[Customer] {
        &self.records
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Records matching the query, in store order. Recomputed only when the
    /// record set or the query changed since the last call.
    pub fn visible(&mut self) -> Arc<Vec<Customer>> {
        if let Some(memo) = &self.memo {
            if memo.generation == self.generation && memo.query == self.query {
                return memo.visible.clone();
            }
        }
        let visible = if self.query.trim().is_empty() {
            self.records.clone()
        } else {
            Arc::new(
                search_customers(&self.records, &self.query)
                    .into_iter()
                    .cloned()
                    .collect(),
            )
        };
        self.memo = Some(Memo {
            generation: self.generation,
            query: self.query.clone(),
            visible: visible.clone(),
        });
        visible
    }

    /// Cancel the live feed.
    pub async fn close(mut self) {
        if let Some(feed) = self.feed.take() {
            feed.cancel().await;
        }
    }
}
