//! Reload state machine.
//!
//! Pure logic: every transition takes the current time and returns the
//! side effects the supervisor has to carry out. No timers, no I/O.
//!
//! ```text
//!            inner change                deadline
//!   Idle ───────────────► Settling ───────────────► Reloading
//!    ▲                     │  ▲ inner change          │   │ inner change
//!    │                     └──┘ (reset deadline)      │   └──► pending = true
//!    └──────────────────────────────────────────────┘
//!                 finished (pending → Settling)
//! ```
//!
//! An outer change starts a structural phase (producer restart) which
//! disarms the inner watcher, waits for the outer scope to settle, then for a
//! cooldown, then re-arms both watchers and forces one reload.

use std::time::Duration;

use tokio::time::Instant;

/// Where the reload pipeline stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadPhase {
    /// No change pending.
    Idle,
    /// A change was seen; reload at `deadline` unless more changes arrive.
    Settling { deadline: Instant },
    /// Pipeline running. `pending` records changes seen meanwhile.
    Reloading { pending: bool },
}

/// Producer restart handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralPhase {
    /// Outer scope still changing; each change pushes `deadline` out.
    Settling { deadline: Instant },
    /// Waiting for the producer to finish its rewrite.
    Cooldown { deadline: Instant },
}

/// Side effects requested by the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ArmOuter,
    ArmInner,
    DisarmInner,
    StartReload,
}

/// Timing knobs for [`ReloadMachine`].
#[derive(Debug, Clone, Copy)]
pub struct MachineTiming {
    pub inner_debounce: Duration,
    pub restart_settle: Duration,
    pub restart_cooldown: Duration,
    pub rearm_retry: Duration,
}

#[derive(Debug)]
pub struct ReloadMachine {
    timing: MachineTiming,
    phase: ReloadPhase,
    structural: Option<StructuralPhase>,
    inner_retry_at: Option<Instant>,
    outer_retry_at: Option<Instant>,
}

impl ReloadMachine {
    pub fn new(timing: MachineTiming) -> Self {
        Self {
            timing,
            phase: ReloadPhase::Idle,
            structural: None,
            inner_retry_at: None,
            outer_retry_at: None,
        }
    }

    pub fn phase(&self) -> ReloadPhase {
        self.phase
    }

    pub fn structural(&self) -> Option<StructuralPhase> {
        self.structural
    }

    /// Returns `true` while a producer restart is being waited out.
    pub fn in_structural_event(&self) -> bool {
        self.structural.is_some()
    }

    /// The dump directory changed.
    pub fn inner_changed(&mut self, now: Instant) -> Vec<Action> {
        if self.structural.is_some() {
            return vec![];
        }
        match self.phase {
            ReloadPhase::Idle | ReloadPhase::Settling { .. } => {
                self.phase = ReloadPhase::Settling {
                    deadline: now + self.timing.inner_debounce,
                };
            }
            ReloadPhase::Reloading { .. } => {
                self.phase = ReloadPhase::Reloading { pending: true };
            }
        }
        vec![]
    }

    /// The producer's output tree changed.
    pub fn outer_changed(&mut self, now: Instant) -> Vec<Action> {
        let first = self.structural.is_none();
        self.structural = Some(StructuralPhase::Settling {
            deadline: now + self.timing.restart_settle,
        });
        self.inner_retry_at = None;
        self.phase = match self.phase {
            ReloadPhase::Reloading { .. } => ReloadPhase::Reloading { pending: false },
            _ => ReloadPhase::Idle,
        };
        if first {
            tracing::debug!("Producer restart suspected, inner watcher suspended");
        }
        vec![Action::DisarmInner]
    }

    /// Force a reload through the single-flight path.
    pub fn request_reload(&mut self, _now: Instant) -> Vec<Action> {
        match self.phase {
            ReloadPhase::Idle | ReloadPhase::Settling { .. } => {
                self.phase = ReloadPhase::Reloading { pending: false };
                vec![Action::StartReload]
            }
            ReloadPhase::Reloading { .. } => {
                self.phase = ReloadPhase::Reloading { pending: true };
                vec![]
            }
        }
    }

    /// The ledger ran ahead of the dump: watchers are presumed dead.
    pub fn ledger_diverged(&mut self, now: Instant) -> Vec<Action> {
        if self.structural.is_some() {
            return vec![];
        }
        self.inner_retry_at = None;
        self.outer_retry_at = None;
        let mut actions = vec![Action::ArmOuter, Action::ArmInner];
        actions.extend(self.request_reload(now));
        actions
    }

    /// The running pipeline finished (successfully or not).
    pub fn reload_finished(&mut self, now: Instant) -> Vec<Action> {
        self.phase = match self.phase {
            ReloadPhase::Reloading { pending: true } if self.structural.is_none() => {
                ReloadPhase::Settling {
                    deadline: now + self.timing.inner_debounce,
                }
            }
            _ => ReloadPhase::Idle,
        };
        vec![]
    }

    /// Arming the inner watcher failed; try again later.
    pub fn inner_arm_failed(&mut self, now: Instant) {
        if self.structural.is_none() {
            self.inner_retry_at = Some(now + self.timing.rearm_retry);
        }
    }

    /// Arming the outer watcher failed; try again later.
    pub fn outer_arm_failed(&mut self, now: Instant) {
        self.outer_retry_at = Some(now + self.timing.rearm_retry);
    }

    /// Earliest time [`Self::poll`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let settle = match self.phase {
            ReloadPhase::Settling { deadline } => Some(deadline),
            _ => None,
        };
        let structural = self.structural.map(|s| match s {
            StructuralPhase::Settling { deadline } | StructuralPhase::Cooldown { deadline } => deadline,
        });
        [settle, structural, self.outer_retry_at, self.inner_retry_at]
            .into_iter()
            .flatten()
            .min()
    }

    /// Fire every deadline that has passed.
    pub fn poll(&mut self, now: Instant) -> Vec<Action> {
        let mut actions = Vec::new();

        match self.structural {
            Some(StructuralPhase::Settling { deadline }) if deadline <= now => {
                tracing::debug!(
                    cooldown_ms = self.timing.restart_cooldown.as_millis() as u64,
                    "Producer restart detected, resetting watchers after cooldown"
                );
                self.structural = Some(StructuralPhase::Cooldown {
                    deadline: now + self.timing.restart_cooldown,
                });
            }
            Some(StructuralPhase::Cooldown { deadline }) if deadline <= now => {
                self.structural = None;
                actions.push(Action::ArmOuter);
                actions.push(Action::ArmInner);
                actions.extend(self.request_reload(now));
            }
            _ => {}
        }

        if let ReloadPhase::Settling { deadline } = self.phase {
            if deadline <= now && self.structural.is_none() {
                tracing::debug!("Change detected in the dump directory");
                self.phase = ReloadPhase::Reloading { pending: false };
                actions.push(Action::StartReload);
            }
        }

        if let Some(at) = self.outer_retry_at {
            if at <= now {
                self.outer_retry_at = None;
                actions.push(Action::ArmOuter);
            }
        }

        if let Some(at) = self.inner_retry_at {
            if at <= now {
                self.inner_retry_at = None;
                actions.push(Action::ArmInner);
            }
        }

        actions
    }
}
