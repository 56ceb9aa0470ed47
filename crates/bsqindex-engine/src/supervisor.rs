//! Async driver for the [`ReloadMachine`].
//!
//! Owns the watchers and the running reload task. Every input (watch events,
//! timer deadlines, ledger heights, manual requests, reload completion) is fed
//! to the machine; the returned actions are carried out here.

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;

use bsqindex_core::config::EngineConfig;
use bsqindex_core::dump::DumpLayout;
use bsqindex_core::error::DumpError;
use bsqindex_core::loader::{LoadSummary, SnapshotLoader};

use crate::error::EngineError;
use crate::machine::{Action, MachineTiming, ReloadMachine};
use crate::watcher::{Scope, ScopeEvent, ScopeWatcher};

/// Outcome of one reload, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadEvent {
    /// A new snapshot is live.
    Published(LoadSummary),
    /// The pipeline failed; the previous snapshot is still served.
    Failed(String),
}

/// Requests from the [`Engine`](crate::Engine) handle.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Command {
    Reload,
    LedgerHeight(u64),
}

type ReloadResult = Result<Result<LoadSummary, DumpError>, JoinError>;

pub(crate) struct Supervisor {
    machine: ReloadMachine,
    loader: SnapshotLoader,
    layout: DumpLayout,
    height_tolerance: u64,
    scope_tx: mpsc::UnboundedSender<ScopeEvent>,
    scope_rx: mpsc::UnboundedReceiver<ScopeEvent>,
    commands: mpsc::Receiver<Command>,
    reloads: broadcast::Sender<ReloadEvent>,
    outer: Option<ScopeWatcher>,
    inner: Option<ScopeWatcher>,
    generation: u64,
    running: Option<JoinHandle<Result<LoadSummary, DumpError>>>,
}

impl Supervisor {
    pub(crate) fn new(
        config: &EngineConfig,
        loader: SnapshotLoader,
        commands: mpsc::Receiver<Command>,
        reloads: broadcast::Sender<ReloadEvent>,
    ) -> Self {
        let timing = MachineTiming {
            inner_debounce: config.inner_debounce(),
            restart_settle: config.restart_settle(),
            restart_cooldown: config.restart_cooldown(),
            rearm_retry: config.rearm_retry(),
        };
        let (scope_tx, scope_rx) = mpsc::unbounded_channel();
        Self {
            machine: ReloadMachine::new(timing),
            loader,
            layout: config.layout(),
            height_tolerance: config.height_tolerance,
            scope_tx,
            scope_rx,
            commands,
            reloads,
            outer: None,
            inner: None,
            generation: 0,
            running: None,
        }
    }

    /// Arm both watchers, then process inputs until `shutdown` fires or the
    /// engine handle goes away.
    pub(crate) async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        self.apply(vec![Action::ArmOuter, Action::ArmInner]);

        loop {
            let deadline = self.machine.next_deadline();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                Some(event) = self.scope_rx.recv() => self.on_scope_event(event),
                command = self.commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                result = join_running(&mut self.running), if self.running.is_some() => {
                    self.on_reload_done(result);
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let actions = self.machine.poll(Instant::now());
                    self.apply(actions);
                }
            }
        }

        if let Some(handle) = self.running.take() {
            handle.abort();
        }
        self.inner = None;
        self.outer = None;
        tracing::debug!("Reload supervisor stopped");
    }

    fn on_scope_event(&mut self, event: ScopeEvent) {
        let armed = match event.scope {
            Scope::Outer => self.outer.as_ref(),
            Scope::Inner => self.inner.as_ref(),
        };
        if armed.map(ScopeWatcher::generation) != Some(event.generation) {
            tracing::trace!(?event, "Dropping event from a retired watcher");
            return;
        }

        let now = Instant::now();
        let actions = match event.scope {
            Scope::Outer => self.machine.outer_changed(now),
            Scope::Inner => self.machine.inner_changed(now),
        };
        self.apply(actions);
    }

    fn on_command(&mut self, command: Command) {
        let now = Instant::now();
        let actions = match command {
            Command::Reload => {
                tracing::debug!("Manual reload requested");
                self.machine.request_reload(now)
            }
            Command::LedgerHeight(height) => {
                let last = self.loader.store().current().latest_height();
                if !self.diverged(last, height) {
                    return;
                }
                tracing::warn!(
                    ledger_height = height,
                    dump_height = last,
                    "Dump is lagging the ledger, re-arming watchers"
                );
                self.machine.ledger_diverged(now)
            }
        };
        self.apply(actions);
    }

    /// A zero dump height means nothing was loaded yet and never diverges.
    fn diverged(&self, dump_height: u64, ledger_height: u64) -> bool {
        dump_height != 0 && ledger_height > dump_height.saturating_add(self.height_tolerance)
    }

    fn on_reload_done(&mut self, result: ReloadResult) {
        self.running = None;
        let event = match result {
            Ok(Ok(summary)) => ReloadEvent::Published(summary),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Reload failed, keeping current snapshot");
                ReloadEvent::Failed(e.to_string())
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload task aborted");
                ReloadEvent::Failed(e.to_string())
            }
        };
        // No subscribers is fine.
        let _ = self.reloads.send(event);

        let actions = self.machine.reload_finished(Instant::now());
        self.apply(actions);
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ArmOuter => self.arm_outer(),
                Action::ArmInner => self.arm_inner(),
                Action::DisarmInner => {
                    if self.inner.take().is_some() {
                        tracing::debug!("Inner watcher disarmed");
                    }
                }
                Action::StartReload => self.start_reload(),
            }
        }
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    fn arm_outer(&mut self) {
        self.outer = None;
        let generation = self.next_generation();
        match ScopeWatcher::arm(Scope::Outer, &self.layout.outer_dir, generation, self.scope_tx.clone()) {
            Ok(w) => self.outer = Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to watch producer output directory, will retry");
                self.machine.outer_arm_failed(Instant::now());
            }
        }
    }

    fn arm_inner(&mut self) {
        self.inner = None;
        match self.try_arm_inner() {
            Ok(w) => self.inner = Some(w),
            Err(e) => {
                tracing::warn!(error = %e, "Unable to watch dump directory, will retry");
                self.machine.inner_arm_failed(Instant::now());
            }
        }
    }

    fn try_arm_inner(&mut self) -> Result<ScopeWatcher, EngineError> {
        if !self.layout.dump_file.is_file() {
            return Err(EngineError::Watch(format!(
                "{} doesn't exist",
                self.layout.dump_file.display()
            )));
        }
        let generation = self.next_generation();
        ScopeWatcher::arm(Scope::Inner, &self.layout.inner_dir, generation, self.scope_tx.clone())
    }

    fn start_reload(&mut self) {
        if self.running.is_some() {
            return;
        }
        let loader = self.loader.clone();
        self.running = Some(tokio::spawn(async move { loader.reload().await }));
    }
}

async fn join_running(
    running: &mut Option<JoinHandle<Result<LoadSummary, DumpError>>>,
) -> ReloadResult {
    match running {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
