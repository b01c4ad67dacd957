//! Patient list parameters and their event-driven state machine.
//!
//! Transitions are pure: the state only records what the list should show.
//! Timing (debounce) and fetching live in
//! [`crate::application::patient_list::PatientListController`].

use patientdesk_api_types::{PatientStatus, SortColumn, SortOrder};

use crate::cache::{QueryKey, Resource};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;
/// Longest search text accepted from the input box.
pub const MAX_SEARCH_CHARS: usize = 200;

/// Parameters of one patient list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQueryParams {
    pub search: Option<String>,
    pub status: Option<PatientStatus>,
    pub sort_by: SortColumn,
    pub sort_order: SortOrder,
    pub limit: u32,
    pub offset: u32,
}

impl Default for ListQueryParams {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            sort_by: SortColumn::default(),
            sort_order: SortOrder::default(),
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl ListQueryParams {
    /// Clamp a requested page size into the range the backend accepts.
    pub fn clamp_limit(limit: u32) -> u32 {
        limit.clamp(1, MAX_PAGE_SIZE)
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Self::clamp_limit(limit);
        self
    }

    /// Zero-based page the current offset falls on.
    pub fn page_index(&self) -> u32 {
        self.offset / self.limit.max(1)
    }

    /// Number of pages needed to show `total` rows.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit.max(1)))
    }

    /// Canonical cache key. Blank search and absent status are omitted.
    pub fn query_key(&self) -> QueryKey {
        QueryKey::new(Resource::PatientList)
            .with_text("search", self.search.as_deref())
            .with_text("status", self.status.map(PatientStatus::as_str))
            .with_text("sort_by", Some(self.sort_by.as_str()))
            .with_text("sort_order", Some(self.sort_order.as_str()))
            .with_int("limit", Some(i64::from(self.limit)))
            .with_int("offset", Some(i64::from(self.offset)))
    }

    /// Query string pairs for the list endpoint.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::with_capacity(6);
        if let Some(search) = self.search.as_deref().map(str::trim)
            && !search.is_empty()
        {
            pairs.push(("search", search.to_string()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        pairs.push(("sort_by", self.sort_by.as_str().to_string()));
        pairs.push(("sort_order", self.sort_order.as_str().to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs.push(("offset", self.offset.to_string()));
        pairs
    }
}

/// User interactions with the patient list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEvent {
    /// Raw text typed into the search box. Not committed until settled.
    SearchInput(String),
    /// The debounce window elapsed; commit the latest input.
    SearchSettled,
    StatusFilter(Option<PatientStatus>),
    SortClicked(SortColumn),
    PageChanged(u32),
    PageSizeChanged(u32),
}

/// Effect of applying an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing observable changed.
    Unchanged,
    /// Search input changed; a debounce deadline should be (re)armed.
    SearchPending,
    /// Effective parameters changed; the list must be reloaded.
    ParamsChanged,
}

/// Search input plus the parameters currently in effect.
#[derive(Debug, Clone, Default)]
pub struct ListQueryState {
    params: ListQueryParams,
    search_input: String,
}

impl ListQueryState {
    pub fn new(page_size: u32) -> Self {
        Self {
            params: ListQueryParams::default().with_limit(page_size),
            search_input: String::new(),
        }
    }

    pub fn params(&self) -> &ListQueryParams {
        &self.params
    }

    /// Text in the search box, which may be ahead of the committed search.
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn query_key(&self) -> QueryKey {
        self.params.query_key()
    }

    pub fn apply(&mut self, event: ListEvent) -> Transition {
        match event {
            ListEvent::SearchInput(text) => {
                self.search_input = text.chars().take(MAX_SEARCH_CHARS).collect();
                Transition::SearchPending
            }
            ListEvent::SearchSettled => {
                let trimmed = self.search_input.trim();
                let committed = (!trimmed.is_empty()).then(|| trimmed.to_string());
                if committed == self.params.search {
                    return Transition::Unchanged;
                }
                self.params.search = committed;
                self.params.offset = 0;
                Transition::ParamsChanged
            }
            ListEvent::StatusFilter(status) => {
                if status == self.params.status {
                    return Transition::Unchanged;
                }
                self.params.status = status;
                self.params.offset = 0;
                Transition::ParamsChanged
            }
            ListEvent::SortClicked(column) => {
                if column == self.params.sort_by {
                    self.params.sort_order = self.params.sort_order.flipped();
                } else {
                    self.params.sort_by = column;
                    self.params.sort_order = SortOrder::Asc;
                }
                self.params.offset = 0;
                Transition::ParamsChanged
            }
            ListEvent::PageChanged(page_index) => {
                let offset = page_index.saturating_mul(self.params.limit);
                if offset == self.params.offset {
                    return Transition::Unchanged;
                }
                self.params.offset = offset;
                Transition::ParamsChanged
            }
            ListEvent::PageSizeChanged(size) => {
                let limit = ListQueryParams::clamp_limit(size);
                if limit == self.params.limit {
                    return Transition::Unchanged;
                }
                self.params.limit = limit;
                self.params.offset = 0;
                Transition::ParamsChanged
            }
        }
    }
}
