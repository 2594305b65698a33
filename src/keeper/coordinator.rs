use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::error::{CoordinatorError, SourceError};
use crate::events::{MarketCreated, MarketId, StatusEvent};
use crate::keeper::lifecycle::{self, shutdown_requested, Exit, LifecycleContext};
use crate::keeper::{
    ChainClock, DeadlineScheduler, DetailFetcher, EventSource, IndeterminatePolicy, Oracle, Submitter,
};
use crate::state::{MarketRegistry, Phase};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub indeterminate: IndeterminatePolicy,
    /// Longest single sleep while waiting for a deadline.
    pub max_poll: Duration,
    /// Drop terminal records from the registry (ids stay known).
    pub evict_terminal: bool,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            indeterminate: IndeterminatePolicy::default(),
            max_poll: Duration::from_secs(60),
            evict_terminal: false,
        }
    }
}

/// Counters for one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub discovered: usize,
    pub duplicates: usize,
    pub malformed: usize,
    pub resolved: usize,
    pub failed: usize,
    pub interrupted: usize,
}

/// Dispatcher: turns creation events into lifecycle tasks.
pub struct Coordinator {
    fetcher: Arc<dyn DetailFetcher>,
    clock: Arc<dyn ChainClock>,
    oracle: Arc<dyn Oracle>,
    submitter: Arc<dyn Submitter>,
    registry: MarketRegistry,
    settings: CoordinatorSettings,
    status_tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

/// Why intake stopped.
enum Stop {
    Shutdown,
    SourceEnded,
    SourceFailed(String),
}

impl Coordinator {
    pub fn new(
        fetcher: Arc<dyn DetailFetcher>,
        clock: Arc<dyn ChainClock>,
        oracle: Arc<dyn Oracle>,
        submitter: Arc<dyn Submitter>,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            fetcher,
            clock,
            oracle,
            submitter,
            registry: MarketRegistry::new(),
            settings,
            status_tx: None,
        }
    }

    /// Send every phase change to `tx` as a `StatusEvent`.
    pub fn with_status_sink(mut self, tx: mpsc::UnboundedSender<StatusEvent>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Handle for inspecting market state while `run` is going.
    pub fn registry(&self) -> MarketRegistry {
        self.registry.clone()
    }

    /// Consume `source` until shutdown, a clean end of stream, or a source
    /// failure. Lifecycles are spawned per new market and never awaited on
    /// the intake path. Before returning, all lifecycles are allowed to
    /// finish (clean end) or told to stop (shutdown, source failure).
    pub async fn run<S: EventSource>(
        self,
        mut source: S,
        shutdown: watch::Receiver<bool>,
    ) -> Result<RunReport, CoordinatorError> {
        let evict_terminal = self.settings.evict_terminal;
        let registry = self.registry.clone();
        let ctx = Arc::new(LifecycleContext {
            fetcher: self.fetcher,
            scheduler: DeadlineScheduler::new(self.clock, self.settings.max_poll),
            oracle: self.oracle,
            submitter: self.submitter,
            registry: self.registry,
            policy: self.settings.indeterminate,
            status_tx: self.status_tx,
        });

        // Lifecycles listen here; flipped on external shutdown or source failure.
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut external = shutdown;

        let mut tasks: JoinSet<Exit> = JoinSet::new();
        let mut task_markets: HashMap<Id, MarketId> = HashMap::new();
        let mut report = RunReport::default();

        info!("coordinator started");

        let stop = loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut external) => break Stop::Shutdown,
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    reap(joined, &mut task_markets, &registry, &ctx, evict_terminal, &mut report).await;
                }
                next = source.next_event() => match next {
                    Ok(Some(event)) => {
                        dispatch(event, &ctx, &stop_rx, &mut tasks, &mut task_markets, &mut report).await;
                    }
                    Ok(None) => break Stop::SourceEnded,
                    Err(SourceError::Discovery(e)) => {
                        report.malformed += 1;
                        warn!(error = %e, "dropping malformed creation event");
                    }
                    Err(SourceError::Transport(reason)) => break Stop::SourceFailed(reason),
                },
            }
        };

        match &stop {
            Stop::Shutdown => {
                info!(in_flight = tasks.len(), "shutdown requested, stopping lifecycles");
                let _ = stop_tx.send(true);
            }
            Stop::SourceFailed(reason) => {
                error!(error = %reason, in_flight = tasks.len(), "event source failed, stopping lifecycles");
                let _ = stop_tx.send(true);
            }
            Stop::SourceEnded => {
                info!(in_flight = tasks.len(), "event stream ended, draining lifecycles");
            }
        }

        // On a clean end of stream an external shutdown still stops the drain.
        let mut stop_sent = !matches!(stop, Stop::SourceEnded);
        while !tasks.is_empty() {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut external), if !stop_sent => {
                    info!(in_flight = tasks.len(), "shutdown requested during drain");
                    let _ = stop_tx.send(true);
                    stop_sent = true;
                }
                Some(joined) = tasks.join_next_with_id() => {
                    reap(joined, &mut task_markets, &registry, &ctx, evict_terminal, &mut report).await;
                }
            }
        }

        info!(
            discovered = report.discovered,
            duplicates = report.duplicates,
            malformed = report.malformed,
            resolved = report.resolved,
            failed = report.failed,
            interrupted = report.interrupted,
            "coordinator stopped"
        );

        match stop {
            Stop::SourceFailed(reason) => Err(CoordinatorError::EventSource(reason)),
            Stop::Shutdown | Stop::SourceEnded => Ok(report),
        }
    }
}

/// Claim the id and spawn its lifecycle, or drop the event as a duplicate.
async fn dispatch(
    event: MarketCreated,
    ctx: &Arc<LifecycleContext>,
    stop_rx: &watch::Receiver<bool>,
    tasks: &mut JoinSet<Exit>,
    task_markets: &mut HashMap<Id, MarketId>,
    report: &mut RunReport,
) {
    let id = event.market_id;
    if !ctx.registry.claim(id).await {
        report.duplicates += 1;
        debug!(market = %id, "duplicate creation event ignored");
        return;
    }

    report.discovered += 1;
    info!(market = %id, block = ?event.block_number, tx = ?event.tx_hash, "market discovered");
    ctx.emit(id, Phase::Discovered, None);

    let handle = tasks.spawn(lifecycle::run(Arc::clone(ctx), id, stop_rx.clone()));
    task_markets.insert(handle.id(), id);
}

/// Account for a finished lifecycle task.
async fn reap(
    joined: Result<(Id, Exit), JoinError>,
    task_markets: &mut HashMap<Id, MarketId>,
    registry: &MarketRegistry,
    ctx: &LifecycleContext,
    evict_terminal: bool,
    report: &mut RunReport,
) {
    let (task_id, exit) = match joined {
        Ok((task_id, exit)) => (task_id, Some(exit)),
        Err(e) => {
            error!(error = %e, "lifecycle task panicked");
            (e.id(), None)
        }
    };
    let Some(id) = task_markets.remove(&task_id) else {
        return;
    };

    match exit {
        Some(Exit::Resolved(_)) => report.resolved += 1,
        Some(Exit::Failed(_)) => report.failed += 1,
        Some(Exit::Interrupted(_)) => report.interrupted += 1,
        None => {
            report.failed += 1;
            ctx.record_failure(id, "lifecycle task panicked".to_string()).await;
        }
    }

    if evict_terminal && registry.evict(id).await.is_some() {
        debug!(market = %id, "evicted terminal market");
    }
}
