//! Debounced search orchestration over a catalog client.
//!
//! [SearchOrchestrator::new] returns a cloneable handle and an
//! [OrchestratorDriver]. The driver is a single cooperative task that owns
//! the [SearchState], the debounce timer and every in-flight search.
//! Handles talk to it over channels and never block.
//!
//! ```ignore
//! let (orchestrator, driver) = SearchOrchestrator::new(client, config, None);
//! let local = tokio::task::LocalSet::new();
//! local.spawn_local(driver.run());
//! orchestrator.set_text("dress")?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};
use verge_catalog::{ClientTrait, RemoteFailure, ResultSet};

use crate::models::query::{Facet, FacetValue};
use crate::models::search_state::{
    Completion,
    Edit,
    Phase,
    ResultSource,
    SearchState,
    Seq,
    Settled,
};
use crate::models::snapshot::Snapshot;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Quiet period after the last edit before a search settles
    pub debounce: Duration,
    /// Raw result limit, normalized like any other input
    pub limit: Option<i64>,
    /// Do not search again when the settled request equals the previous one
    pub skip_unchanged: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            debounce: DEFAULT_DEBOUNCE,
            limit: None,
            skip_unchanged: false,
        }
    }
}

/// Notifications for status displays.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// The displayed results were replaced.
    ResultsChanged { seq: Seq, source: ResultSource },
    /// A remote search failed, the displayed results are unchanged.
    SearchFailed {
        seq: Seq,
        failure: Arc<RemoteFailure>,
    },
    /// An outcome arrived after a newer search had settled.
    Discarded { seq: Seq },
}

#[derive(Debug, Error)]
#[error("search orchestrator is no longer running")]
pub struct OrchestratorStopped;

/// Handle to a running search orchestration.
#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    edits: mpsc::UnboundedSender<Edit>,
    results: watch::Receiver<ResultSet>,
    phase: watch::Receiver<Phase>,
    events: broadcast::Sender<SearchEvent>,
}

impl SearchOrchestrator {
    /// Create a handle and the driver that must be run for it to make progress.
    ///
    /// With a `snapshot`, empty-text searches are answered locally from the start.
    /// Without one, the first applied empty unconstrained search becomes the snapshot.
    pub fn new<C: ClientTrait>(
        client: C,
        config: OrchestratorConfig,
        snapshot: Option<ResultSet>,
    ) -> (Self, OrchestratorDriver<C>) {
        let state = SearchState::new(
            snapshot.map(Snapshot::new),
            config.limit,
            config.skip_unchanged,
        );

        let (edits_tx, edits_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = watch::channel(state.current_results().clone());
        let (phase_tx, phase_rx) = watch::channel(state.phase());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = SearchOrchestrator {
            edits: edits_tx,
            results: results_rx,
            phase: phase_rx,
            events: events_tx.clone(),
        };
        let driver = OrchestratorDriver {
            client,
            state,
            debounce: config.debounce,
            edits: edits_rx,
            results: results_tx,
            phase: phase_tx,
            events: events_tx,
        };
        (handle, driver)
    }

    fn send(&self, edit: Edit) -> Result<(), OrchestratorStopped> {
        self.edits.send(edit).map_err(|_| OrchestratorStopped)
    }

    pub fn set_text(&self, text: impl Into<String>) -> Result<(), OrchestratorStopped> {
        self.send(Edit::Text(text.into()))
    }

    /// Replace the value of a single facet.
    pub fn set_filter(&self, facet: Facet, value: FacetValue) -> Result<(), OrchestratorStopped> {
        self.send(Edit::Filter(facet, value))
    }

    /// Reset every facet to its default, and the text unless `preserve_text`.
    pub fn clear_filters(&self, preserve_text: bool) -> Result<(), OrchestratorStopped> {
        self.send(Edit::ClearFilters { preserve_text })
    }

    /// The currently displayed results.
    pub fn current_results(&self) -> ResultSet {
        self.results.borrow().clone()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Events emitted after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }
}

/// The task behind a [SearchOrchestrator].
///
/// Runs until every handle is dropped and no work remains,
/// then returns the results displayed last.
/// Client futures need not be `Send`, so run it on a `LocalSet`
/// or await it directly.
pub struct OrchestratorDriver<C> {
    client: C,
    state: SearchState,
    debounce: Duration,
    edits: mpsc::UnboundedReceiver<Edit>,
    results: watch::Sender<ResultSet>,
    phase: watch::Sender<Phase>,
    events: broadcast::Sender<SearchEvent>,
}

impl<C: ClientTrait> OrchestratorDriver<C> {
    #[instrument(name = "orchestrator", skip_all)]
    pub async fn run(self) -> ResultSet {
        let OrchestratorDriver {
            client,
            mut state,
            debounce,
            mut edits,
            results,
            phase,
            events,
        } = self;

        let emit = |event: SearchEvent| {
            // no subscribers is fine
            let _ = events.send(event);
        };

        let mut in_flight = FuturesUnordered::new();
        let timer = tokio::time::sleep(debounce);
        tokio::pin!(timer);
        let mut edits_open = true;

        loop {
            phase.send_if_modified(|current| {
                let next = state.phase();
                let changed = *current != next;
                *current = next;
                changed
            });

            if !edits_open && !state.is_pending() && in_flight.is_empty() {
                debug!("all handles dropped, stopping");
                break;
            }

            tokio::select! {
                edit = edits.recv(), if edits_open => match edit {
                    Some(edit) => {
                        state.record_edit(edit);
                        timer.as_mut().reset(Instant::now() + debounce);
                    },
                    None => edits_open = false,
                },
                () = &mut timer, if state.is_pending() => match state.settle() {
                    Some(Settled::Local { seq, results: local }) => {
                        results.send_replace(local);
                        emit(SearchEvent::ResultsChanged { seq, source: ResultSource::Local });
                    },
                    Some(Settled::Issue { seq, request }) => {
                        let client = &client;
                        in_flight.push(async move {
                            (seq, client.search_catalog(&request).await)
                        });
                    },
                    Some(Settled::Unchanged) | None => {},
                },
                Some((seq, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    match state.complete(seq, outcome.map_err(Arc::new)) {
                        Completion::Applied { seq, results: remote } => {
                            results.send_replace(remote);
                            emit(SearchEvent::ResultsChanged { seq, source: ResultSource::Remote });
                        },
                        Completion::Failed { seq, failure } => {
                            warn!(seq, error = %failure, "search failed, keeping results");
                            emit(SearchEvent::SearchFailed { seq, failure });
                        },
                        Completion::Discarded { seq } => {
                            emit(SearchEvent::Discarded { seq });
                        },
                    }
                },
                else => break,
            }
        }

        state.current_results().clone()
    }
}
