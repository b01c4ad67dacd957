//! Patient list controller.
//!
//! Couples [`ListQueryState`] with a search debounce, the query cache and a
//! subscription on the current list key. Responses are tagged with the key
//! they were requested for and dropped once that key is no longer current.

use std::future::Future;
use std::time::Duration;

use patientdesk_api_types::PatientPage;
use tokio::time::Instant;
use tracing::debug;

use crate::application::debounce::Debounce;
use crate::application::list_query::{ListEvent, ListQueryParams, ListQueryState, Transition};
use crate::application::queries::QueryClient;
use crate::cache::{CacheEntry, QueryKey, Subscription};

pub struct PatientListController {
    queries: QueryClient,
    state: ListQueryState,
    debounce: Debounce<String>,
    subscription: Option<Subscription<PatientPage>>,
    latest: Option<CacheEntry<PatientPage>>,
    closed: bool,
}

impl PatientListController {
    pub fn new(queries: QueryClient, page_size: u32, debounce: Duration) -> Self {
        let state = ListQueryState::new(page_size);
        let subscription = Some(queries.subscribe_patients(state.params()));
        Self {
            queries,
            state,
            debounce: Debounce::new(debounce),
            subscription,
            latest: None,
            closed: false,
        }
    }

    pub fn state(&self) -> &ListQueryState {
        &self.state
    }

    pub fn params(&self) -> &ListQueryParams {
        self.state.params()
    }

    pub fn current_key(&self) -> QueryKey {
        self.state.query_key()
    }

    /// Last accepted entry for the current parameters.
    pub fn latest(&self) -> Option<&CacheEntry<PatientPage>> {
        self.latest.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Apply a user event received at `now`.
    pub fn dispatch(&mut self, event: ListEvent, now: Instant) -> Transition {
        if self.closed {
            return Transition::Unchanged;
        }
        if let ListEvent::SearchInput(text) = &event {
            self.debounce.push(text.clone(), now);
        }

        let transition = self.state.apply(event);
        if transition == Transition::ParamsChanged {
            debug!(key = %self.current_key(), "Patient list parameters changed");
            self.resubscribe();
        }
        transition
    }

    /// When the pending search will be committed, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Commit the pending search if its quiet window has elapsed.
    pub fn poll_search(&mut self, now: Instant) -> Transition {
        match self.debounce.poll(now) {
            Some(_) => self.dispatch(ListEvent::SearchSettled, now),
            None => Transition::Unchanged,
        }
    }

    /// Sleep until the pending search deadline, then commit it.
    pub async fn settle(&mut self) -> Transition {
        let Some(deadline) = self.debounce.deadline() else {
            return Transition::Unchanged;
        };
        tokio::time::sleep_until(deadline).await;
        self.poll_search(Instant::now())
    }

    /// Request the list for the current parameters.
    ///
    /// The returned future does not borrow the controller, so callers can keep
    /// dispatching events while it runs and hand the result to [`accept`](Self::accept).
    pub fn fetch_current(
        &self,
    ) -> impl Future<Output = (QueryKey, CacheEntry<PatientPage>)> + Send + 'static {
        let queries = self.queries.clone();
        let params = self.state.params().clone();
        async move {
            let key = params.query_key();
            let entry = queries.patients(&params).await;
            (key, entry)
        }
    }

    /// Store a response. Returns `false` when it belongs to superseded
    /// parameters or arrives after teardown.
    pub fn accept(&mut self, key: &QueryKey, entry: CacheEntry<PatientPage>) -> bool {
        if self.closed {
            debug!(key = %key, "Dropping patient list response after teardown");
            return false;
        }
        if *key != self.current_key() {
            debug!(
                key = %key,
                current = %self.current_key(),
                "Dropping superseded patient list response"
            );
            return false;
        }
        self.latest = Some(entry);
        true
    }

    /// Fetch and accept the list for the current parameters.
    pub async fn load(&mut self) -> Option<&CacheEntry<PatientPage>> {
        let (key, entry) = self.fetch_current().await;
        if self.accept(&key, entry) {
            self.latest.as_ref()
        } else {
            None
        }
    }

    /// Force a reload of the current parameters, bypassing freshness.
    pub async fn retry(&mut self) -> Option<&CacheEntry<PatientPage>> {
        let params = self.state.params().clone();
        let key = params.query_key();
        let entry = self.queries.refetch_patients(&params).await;
        if self.accept(&key, entry) {
            self.latest.as_ref()
        } else {
            None
        }
    }

    /// Wait for the next background update of the current list.
    pub async fn changed(&mut self) -> Option<CacheEntry<PatientPage>> {
        let subscription = self.subscription.as_mut()?;
        let entry = subscription.changed().await?;
        let key = subscription.key().clone();
        self.accept(&key, entry.clone()).then_some(entry)
    }

    /// Stop watching the list; later responses are ignored.
    pub fn teardown(&mut self) {
        self.closed = true;
        self.subscription = None;
        self.debounce.cancel();
        debug!("Patient list controller torn down");
    }

    fn resubscribe(&mut self) {
        self.subscription = Some(self.queries.subscribe_patients(self.state.params()));
        self.latest = self.queries.patient_lists().get(&self.current_key());
    }
}
