//! PiP actuator: issues enter/exit requests against the host.
//!
//! Enter retries every rejection with exponential backoff until the
//! attempt budget is spent; the reason is only reported. Host state is
//! re-read before every request, so a retry never outlives the condition
//! that started it. Exit is never retried. The actuator reports outcomes
//! and leaves all state writes to the orchestrator.

use std::sync::Arc;

use autopip_core::{BackoffPolicy, QuirkClass};
use autopip_host::{CapabilityProbe, PipHost, PipRejection, VideoElement};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    /// Host accepted request number `attempt` (1-based within the cycle).
    Entered { attempt: u32 },
    /// Host already reports a session; nothing was requested.
    AlreadyActive,
    /// Host has no PiP capability.
    Unsupported,
    /// The tab came to the foreground before a hidden-tab request was issued.
    Superseded { failures: u32 },
    /// Every allowed request was rejected.
    Exhausted {
        failures: u32,
        last: Option<PipRejection>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited,
    /// Host reports no session; nothing was requested.
    NotActive,
    Rejected(PipRejection),
}

/// Host condition that must still hold before each enter request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryGuard {
    /// Hidden-tab automation: stop as soon as the tab is visible.
    WhileHidden,
    /// Explicit activation: visibility does not matter.
    Always,
}

pub struct PipActuator<H: PipHost> {
    host: Arc<H>,
    probe: Arc<CapabilityProbe<H>>,
    policy: BackoffPolicy,
}

impl<H: PipHost> PipActuator<H> {
    pub fn new(host: Arc<H>, probe: Arc<CapabilityProbe<H>>, policy: BackoffPolicy) -> Self {
        Self {
            host,
            probe,
            policy,
        }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Request PiP for `element`, continuing a cycle that has already seen
    /// `prior_failures` rejections. `on_rejected` receives the running
    /// failure total after each rejection.
    pub async fn enter<F>(
        &self,
        element: &H::Element,
        prior_failures: u32,
        guard: RetryGuard,
        mut on_rejected: F,
    ) -> EnterOutcome
    where
        F: FnMut(u32) + Send,
    {
        if !self.probe.supports_pip() {
            debug!("host has no picture-in-picture support");
            return EnterOutcome::Unsupported;
        }

        let mut failures = prior_failures;
        let mut last = None;
        while self.policy.allows(failures) {
            // A session may have started some other way during backoff.
            if self.host.pip_active() {
                debug!("host already in picture-in-picture, skipping request");
                return EnterOutcome::AlreadyActive;
            }
            if guard == RetryGuard::WhileHidden && self.host.visible() {
                debug!(failures, "tab visible again, abandoning enter");
                return EnterOutcome::Superseded { failures };
            }

            self.prepare(element).await;
            match self.host.request_enter(element).await {
                Ok(()) => {
                    let attempt = failures - prior_failures + 1;
                    info!(attempt, "entered picture-in-picture");
                    return EnterOutcome::Entered { attempt };
                }
                Err(reason) => {
                    warn!(attempt = failures + 1, reason = %reason, "picture-in-picture request rejected");
                    let delay = self.policy.delay_for(failures);
                    failures += 1;
                    on_rejected(failures);
                    last = Some(reason);
                    if !self.policy.allows(failures) {
                        break;
                    }
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        EnterOutcome::Exhausted { failures, last }
    }

    /// Per-environment pre-steps before a request.
    async fn prepare(&self, element: &H::Element) {
        match self.probe.environment_quirk_class() {
            QuirkClass::RequiresFocusKick => {
                element.focus();
                if let Err(e) = element.nudge_playback().await {
                    debug!(error = %e, "playback nudge failed");
                }
            }
            QuirkClass::Standard | QuirkClass::Unknown => {}
        }
    }

    pub async fn exit(&self) -> ExitOutcome {
        if !self.host.pip_active() {
            return ExitOutcome::NotActive;
        }
        match self.host.request_exit().await {
            Ok(()) => {
                info!("exited picture-in-picture");
                ExitOutcome::Exited
            }
            Err(reason) => {
                warn!(reason = %reason, "picture-in-picture exit rejected");
                ExitOutcome::Rejected(reason)
            }
        }
    }
}
