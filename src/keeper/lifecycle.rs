use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::error::{LifecycleError, PhaseError};
use crate::events::{MarketId, StatusEvent};
use crate::keeper::{
    DeadlineScheduler, DetailFetcher, IndeterminatePolicy, Oracle, Submission, Submitter, Verdict,
};
use crate::state::{MarketRegistry, Phase};

/// Everything a lifecycle task needs, shared by all of them.
pub(crate) struct LifecycleContext {
    pub fetcher: Arc<dyn DetailFetcher>,
    pub scheduler: DeadlineScheduler,
    pub oracle: Arc<dyn Oracle>,
    pub submitter: Arc<dyn Submitter>,
    pub registry: MarketRegistry,
    pub policy: IndeterminatePolicy,
    pub status_tx: Option<mpsc::UnboundedSender<StatusEvent>>,
}

impl LifecycleContext {
    pub fn emit(&self, id: MarketId, phase: Phase, detail: Option<String>) {
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(StatusEvent::new(id, phase, detail));
        }
    }

    /// Mark `id` failed and emit the status. Nothing is emitted when the
    /// registry refuses the transition.
    pub async fn record_failure(&self, id: MarketId, reason: String) -> bool {
        match self.registry.fail(id, reason.clone()).await {
            Ok(_) => {
                self.emit(id, Phase::Failed, Some(reason));
                true
            }
            Err(e) => {
                error!(market = %id, error = %e, reason = %reason, "failed market could not be recorded");
                false
            }
        }
    }
}

/// How a lifecycle task ended.
#[derive(Debug)]
pub(crate) enum Exit {
    Resolved(Submission),
    Failed(String),
    /// Shutdown was requested; the market keeps this non-terminal phase.
    Interrupted(Phase),
}

/// Resolves once `shutdown` holds `true`. Never resolves if the sender is
/// dropped without requesting shutdown.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            if *shutdown.borrow() {
                return;
            }
            std::future::pending::<()>().await;
        }
    }
}

/// Run `fut` unless shutdown comes first. `None` means shutdown won.
async fn until_shutdown<F: Future>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = shutdown_requested(shutdown) => None,
        out = fut => Some(out),
    }
}

/// Unwrap an interruptible step: return `Ok(None)` from the caller on
/// shutdown, propagate step errors with `?`.
macro_rules! step {
    ($shutdown:expr, $fut:expr) => {
        match until_shutdown($shutdown, $fut).await {
            Some(result) => result?,
            None => return Ok(None),
        }
    };
}

struct Lifecycle {
    ctx: Arc<LifecycleContext>,
    id: MarketId,
    phase: Phase,
    shutdown: watch::Receiver<bool>,
}

/// Carry one market from `Discovered` to `Resolved` or `Failed`.
pub(crate) async fn run(ctx: Arc<LifecycleContext>, id: MarketId, shutdown: watch::Receiver<bool>) -> Exit {
    let mut lifecycle = Lifecycle {
        ctx: Arc::clone(&ctx),
        id,
        phase: Phase::Discovered,
        shutdown,
    };

    match lifecycle.drive().await {
        Ok(Some(submission)) => match ctx.registry.resolve(id, submission).await {
            Ok(_) => {
                info!(
                    market = %id,
                    resolve_tx = %submission.resolve_tx,
                    distribute_tx = %submission.distribute_tx,
                    "market resolved"
                );
                ctx.emit(id, Phase::Resolved, Some(submission.distribute_tx.to_string()));
                Exit::Resolved(submission)
            }
            Err(e) => {
                error!(
                    market = %id,
                    resolve_tx = %submission.resolve_tx,
                    distribute_tx = %submission.distribute_tx,
                    error = %e,
                    "market submitted on chain but could not be recorded as resolved"
                );
                let reason = format!(
                    "resolve {} and distribute {} sent but not recorded: {e}",
                    submission.resolve_tx, submission.distribute_tx
                );
                ctx.record_failure(id, reason.clone()).await;
                Exit::Failed(reason)
            }
        },
        Ok(None) => {
            info!(market = %id, phase = %lifecycle.phase, "shutdown requested, leaving market");
            Exit::Interrupted(lifecycle.phase)
        }
        Err(e) => {
            let reason = e.to_string();
            warn!(market = %id, phase = %lifecycle.phase, error = %reason, "market lifecycle failed");
            ctx.record_failure(id, reason.clone()).await;
            Exit::Failed(reason)
        }
    }
}

impl Lifecycle {
    /// `Ok(None)` when interrupted by shutdown.
    async fn drive(&mut self) -> Result<Option<Submission>, LifecycleError> {
        let ctx = Arc::clone(&self.ctx);
        let id = self.id;

        // 1. Details
        let details = step!(&mut self.shutdown, ctx.fetcher.fetch(id));
        ctx.registry.set_details(id, &details).await?;
        self.entered(
            Phase::DetailsFetched,
            Some(format!("contract {} deadline {}", details.contract_address, details.deadline)),
        );

        // 2. Deadline, in chain time
        let remaining = step!(&mut self.shutdown, ctx.scheduler.remaining(details.deadline));
        if remaining > 0 {
            self.enter(Phase::AwaitingDeadline, Some(format!("{remaining}s until deadline")))
                .await?;
            let observed = step!(&mut self.shutdown, ctx.scheduler.wait_until(details.deadline));
            info!(market = %id, deadline = details.deadline, chain_time = observed, "deadline reached");
        } else {
            info!(market = %id, deadline = details.deadline, "deadline already passed");
        }

        // 3. Oracle
        self.enter(Phase::AwaitingOracle, None).await?;
        let verdict = step!(&mut self.shutdown, ctx.oracle.ask(&details.question));
        let code = match ctx.policy.outcome(verdict) {
            Some(code) => code,
            None => return Err(LifecycleError::Indeterminate),
        };
        if verdict == Verdict::Indeterminate {
            warn!(
                market = %id,
                question = %details.question,
                "oracle answer indeterminate, resolving as yes"
            );
        }
        info!(market = %id, question = %details.question, verdict = %verdict, code = code.as_u8(), "oracle answered");

        // 4. Submit. Once started the pair is not interrupted.
        if *self.shutdown.borrow() {
            return Ok(None);
        }
        self.enter(Phase::Resolving, Some(format!("resolve({})", code.as_u8())))
            .await?;
        let submission = ctx.submitter.submit(details.contract_address, code).await?;

        Ok(Some(submission))
    }

    async fn enter(&mut self, phase: Phase, detail: Option<String>) -> Result<(), PhaseError> {
        self.ctx.registry.advance(self.id, phase).await?;
        self.entered(phase, detail);
        Ok(())
    }

    /// Bookkeeping after the registry accepted `phase`.
    fn entered(&mut self, phase: Phase, detail: Option<String>) {
        info!(market = %self.id, from = %self.phase, to = %phase, "phase change");
        self.phase = phase;
        self.ctx.emit(self.id, phase, detail);
    }
}
