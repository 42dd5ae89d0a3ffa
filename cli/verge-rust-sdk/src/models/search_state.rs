//! The synchronous core of search orchestration.
//!
//! [SearchState] records edits, decides what a settled edit turns into
//! (a local filter over the [Snapshot] or a remote search),
//! and reconciles completed searches using sequence numbers.
//! It owns no timers and performs no I/O;
//! [crate::providers::orchestrator] drives it.

use std::collections::BTreeMap;

use tracing::{debug, trace};
use verge_catalog::{ResultSet, SearchRequest};

use super::query::{
    Facet,
    FacetValue,
    RawFilters,
    normalize,
};
use super::snapshot::Snapshot;

/// Sequence number assigned to each settled search, in settle order.
pub type Seq = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing pending, showing the last results
    Idle,
    /// An edit is waiting for the debounce period to pass
    Pending,
    /// A remote search that can still be applied has not completed
    InFlight,
}

/// A single user edit.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    Text(String),
    Filter(Facet, FacetValue),
    ClearFilters { preserve_text: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Local,
    Remote,
}

/// What a settled edit resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// Answered from the snapshot; the results are already displayed.
    Local { seq: Seq, results: ResultSet },
    /// The caller must run this search and report back via [SearchState::complete].
    Issue { seq: Seq, request: SearchRequest },
    /// The request equals the last settled one and skipping is enabled.
    Unchanged,
}

/// Result of reporting a finished remote search.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion<E> {
    /// The results replaced the displayed set.
    Applied { seq: Seq, results: ResultSet },
    /// The search failed; the displayed set is unchanged.
    Failed { seq: Seq, failure: E },
    /// A newer search settled first, the outcome was dropped.
    Discarded { seq: Seq },
}

#[derive(Debug)]
pub struct SearchState {
    text: String,
    filters: RawFilters,
    limit: Option<i64>,
    skip_unchanged: bool,

    snapshot: Option<Snapshot>,
    displayed: ResultSet,

    pending: bool,
    next_seq: Seq,
    /// Highest sequence number that has been applied or has failed
    latest_settled: Option<Seq>,
    /// Issued remote searches that have not completed
    outstanding: BTreeMap<Seq, SearchRequest>,
    last_request: Option<SearchRequest>,
}

impl SearchState {
    /// Create a state showing the snapshot, if any.
    pub fn new(snapshot: Option<Snapshot>, limit: Option<i64>, skip_unchanged: bool) -> Self {
        let displayed = snapshot
            .as_ref()
            .map(|snapshot| snapshot.items().clone())
            .unwrap_or_default();

        SearchState {
            text: String::new(),
            filters: RawFilters::default(),
            limit,
            skip_unchanged,
            snapshot,
            displayed,
            pending: false,
            next_seq: 1,
            latest_settled: None,
            outstanding: BTreeMap::new(),
            last_request: None,
        }
    }

    pub fn current_results(&self) -> &ResultSet {
        &self.displayed
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn phase(&self) -> Phase {
        if self.pending {
            return Phase::Pending;
        }
        let applicable = self
            .outstanding
            .keys()
            .any(|seq| self.latest_settled.is_none_or(|settled| *seq > settled));
        if applicable {
            Phase::InFlight
        } else {
            Phase::Idle
        }
    }

    /// The request the current edits would produce.
    pub fn request(&self) -> SearchRequest {
        normalize(&self.text, &self.filters, self.limit)
    }

    /// Record an edit; the caller restarts its debounce timer.
    pub fn record_edit(&mut self, edit: Edit) {
        trace!(?edit, "recording edit");
        match edit {
            Edit::Text(text) => self.text = text,
            Edit::Filter(facet, value) => self.filters.set(facet, value),
            Edit::ClearFilters { preserve_text } => {
                self.filters = RawFilters::default();
                if !preserve_text {
                    self.text.clear();
                }
            },
        }
        self.pending = true;
    }

    /// Resolve the pending edits once the debounce period has passed.
    ///
    /// Returns `None` if nothing is pending.
    pub fn settle(&mut self) -> Option<Settled> {
        if !self.pending {
            return None;
        }
        self.pending = false;

        let request = self.request();
        if self.skip_unchanged && self.last_request.as_ref() == Some(&request) {
            debug!("request unchanged, not searching again");
            return Some(Settled::Unchanged);
        }
        self.last_request = Some(request.clone());

        let seq = self.next_seq;
        self.next_seq += 1;

        let local = self
            .snapshot
            .as_ref()
            .filter(|_| request.text_query.is_empty());
        if let Some(snapshot) = local {
            let results = snapshot.filter(&request.text_query);
            debug!(seq, n_results = results.len(), "answering from snapshot");
            self.latest_settled = Some(seq);
            self.displayed = results.clone();
            return Some(Settled::Local { seq, results });
        }

        debug!(seq, "issuing remote search");
        self.outstanding.insert(seq, request.clone());
        Some(Settled::Issue { seq, request })
    }

    /// Report the outcome of the remote search issued as `seq`.
    ///
    /// The outcome is applied only if no newer search has settled.
    /// Failures settle their sequence number too,
    /// so an older success arriving after a newer failure is discarded.
    pub fn complete<E>(&mut self, seq: Seq, outcome: Result<ResultSet, E>) -> Completion<E> {
        let Some(request) = self.outstanding.remove(&seq) else {
            debug!(seq, "completion for unknown search");
            return Completion::Discarded { seq };
        };

        if self.latest_settled.is_some_and(|settled| seq < settled) {
            debug!(seq, latest_settled = ?self.latest_settled, "discarding stale outcome");
            return Completion::Discarded { seq };
        }
        self.latest_settled = Some(seq);

        match outcome {
            Ok(results) => {
                if request.is_unconstrained() {
                    debug!(seq, n_items = results.len(), "capturing snapshot");
                    self.snapshot = Some(Snapshot::new(results.clone()));
                }
                self.displayed = results.clone();
                Completion::Applied { seq, results }
            },
            Err(failure) => {
                // a failed request must not suppress the next identical one
                if self.last_request.as_ref() == Some(&request) {
                    self.last_request = None;
                }
                Completion::Failed { seq, failure }
            },
        }
    }
}
