//! Orchestration state machine: the single task that owns ControllerState.
//!
//! Host notifications arrive over one mpsc channel and are handled to
//! completion one at a time. Suspension happens only inside element lookup
//! retries, actuation backoff, and the timers multiplexed in [`Orchestrator::run`]
//! (visibility debounce, mutation debounce, scheduled enter/decide, monitor).
//! Events that arrive while an actuation is awaited queue in the channel and
//! are evaluated once it settles.

use std::sync::{Arc, Weak};

use autopip_core::{ControllerState, EnterCredit, HostEvent, InFlight, NowPlaying, PipPhase};
use autopip_host::{CapabilityProbe, PipHost, VideoElement};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actuator::{EnterOutcome, ExitOutcome, PipActuator, RetryGuard};
use crate::config::{SiteProfile, Timings};
use crate::debounce::{Debounce, sleep_until_deadline};
use crate::locator::ElementLocator;

/// Published after every handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub state: ControllerState,
    pub phase: PipPhase,
}

/// What started an enter decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Hidden,
    Navigation,
    MediaSession,
    Click,
}

impl Trigger {
    fn credit(self) -> EnterCredit {
        match self {
            Self::Hidden | Self::Navigation => EnterCredit::HiddenTab,
            Self::MediaSession | Self::Click => EnterCredit::Activation,
        }
    }

    /// Hidden-tab triggers lose their reason to act once the tab is visible.
    fn retry_guard(self) -> RetryGuard {
        match self {
            Self::Hidden | Self::Navigation => RetryGuard::WhileHidden,
            Self::MediaSession | Self::Click => RetryGuard::Always,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Navigation => "navigation",
            Self::MediaSession => "media_session",
            Self::Click => "click",
        }
    }
}

enum Action<E> {
    /// Re-run the hidden-tab decision from scratch.
    Decide,
    /// Issue the enter request for an already-gated element.
    Enter { element: Weak<E>, trigger: Trigger },
}

struct Scheduled<E> {
    at: Instant,
    action: Action<E>,
}

pub struct Orchestrator<H: PipHost> {
    host: Arc<H>,
    probe: Arc<CapabilityProbe<H>>,
    locator: ElementLocator<H>,
    actuator: PipActuator<H>,
    site: SiteProfile,
    timings: Timings,
    state: ControllerState,
    in_flight: Option<InFlight>,
    visibility: Debounce<bool>,
    mutation: Debounce<()>,
    scheduled: Option<Scheduled<H::Element>>,
    events: mpsc::UnboundedReceiver<HostEvent>,
    state_tx: watch::Sender<StateSnapshot>,
    cancel: CancellationToken,
}

impl<H: PipHost> Orchestrator<H> {
    pub fn new(
        host: Arc<H>,
        site: SiteProfile,
        timings: Timings,
        events: mpsc::UnboundedReceiver<HostEvent>,
        cancel: CancellationToken,
    ) -> Self {
        let probe = Arc::new(CapabilityProbe::new(Arc::clone(&host)));
        let locator = ElementLocator::new(
            Arc::clone(&host),
            site.selectors.clone(),
            timings.locate_policy(),
        );
        let actuator = PipActuator::new(Arc::clone(&host), Arc::clone(&probe), timings.enter_policy());

        let tab_active = host.visible();
        let state = ControllerState::new(tab_active);
        let (state_tx, _) = watch::channel(StateSnapshot {
            state: state.clone(),
            phase: state.phase(None),
        });

        // Evaluate the initial visibility like any other notification.
        let mut visibility = Debounce::new(timings.visibility_debounce());
        visibility.push(tab_active, Instant::now());

        Self {
            host,
            probe,
            locator,
            actuator,
            site,
            mutation: Debounce::new(timings.mutation_debounce()),
            timings,
            state,
            in_flight: None,
            visibility,
            scheduled: None,
            events,
            state_tx,
            cancel,
        }
    }

    pub fn subscribe_state(&self) -> watch::Receiver<StateSnapshot> {
        self.state_tx.subscribe()
    }

    /// Event loop. Runs until cancelled or every sender is gone; returns the
    /// final state.
    pub async fn run(mut self) -> ControllerState {
        info!(site = %self.site.name, tab_active = self.state.tab_active, "orchestrator started");
        let mut monitor = self.timings.monitor_interval().map(|period| {
            let mut iv = tokio::time::interval_at(Instant::now() + period, period);
            iv.set_missed_tick_behavior(MissedTickBehavior::Delay);
            iv
        });

        loop {
            let visibility_at = self.visibility.deadline();
            let mutation_at = self.mutation.deadline();
            let scheduled_at = self.scheduled.as_ref().map(|s| s.at);

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!("orchestrator: cancellation requested, shutting down");
                    break;
                }
                event = self.events.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => {
                        info!("orchestrator: event channel closed, shutting down");
                        break;
                    }
                },
                () = sleep_until_deadline(visibility_at) => {
                    if let Some(visible) = self.visibility.take_due(Instant::now()) {
                        self.on_visibility_settled(visible).await;
                    }
                }
                () = sleep_until_deadline(mutation_at) => {
                    if self.mutation.take_due(Instant::now()).is_some() {
                        self.on_mutation_settled();
                    }
                }
                () = sleep_until_deadline(scheduled_at) => self.run_scheduled().await,
                () = next_tick(&mut monitor) => self.monitor(),
            }
            self.publish();
        }

        self.state
    }

    // ─── Inbound events ─────────────────────────────────────────

    async fn dispatch(&mut self, event: HostEvent) {
        debug!(event = event.topic_kind(), "host event");
        match event {
            HostEvent::VisibilityChanged { visible } => {
                self.state.on_visibility(visible);
                self.visibility.push(visible, Instant::now());
            }
            HostEvent::PipEntered => {
                self.state.on_pip_entered();
                debug!(
                    self_initiated = self.state.pip_originated_while_inactive,
                    "picture-in-picture entered"
                );
            }
            HostEvent::PipExited => {
                self.state.on_pip_exited();
                debug!("picture-in-picture exited");
            }
            HostEvent::Navigated => {
                self.locator.invalidate();
                if !self.state.tab_active {
                    self.schedule(self.timings.navigation_settle(), Action::Decide);
                }
            }
            HostEvent::DocumentMutated => self.mutation.push((), Instant::now()),
            HostEvent::MediaSessionEnterRequested => self.enable_now(Trigger::MediaSession).await,
            HostEvent::VideoClicked => {
                let element = match self.locator.cached() {
                    Some(el) => Some(el),
                    None => self.locator.scan(),
                };
                if element.is_some_and(|el| !el.playback().paused) {
                    self.enable_now(Trigger::Click).await;
                }
            }
        }
    }

    /// Debounced visibility: evaluated once against the net final state.
    async fn on_visibility_settled(&mut self, visible: bool) {
        if visible {
            if self.scheduled.take().is_some() {
                debug!("tab visible again, dropping pending enter");
            }
            if self.state.should_auto_exit() {
                self.exit().await;
            } else if self.state.pip_believed_active {
                debug!("leaving externally started picture-in-picture alone");
            }
        } else {
            self.state.begin_cycle();
            self.decide_enter(Trigger::Hidden).await;
        }
    }

    fn on_mutation_settled(&mut self) {
        if self.locator.on_mutation_settled().is_some() {
            self.advertise_if_fresh();
        }
    }

    // ─── Enter path ─────────────────────────────────────────────

    /// Hidden-tab decision: locate, gate, then enter after the settle delay.
    async fn decide_enter(&mut self, trigger: Trigger) {
        if !self.ready_to_enter() {
            return;
        }
        let Some(element) = self.locate_playing().await else {
            return;
        };
        let settle = self.timings.settle_for(self.probe.environment_quirk_class());
        self.schedule(
            settle,
            Action::Enter {
                element: Arc::downgrade(&element),
                trigger,
            },
        );
    }

    /// Explicit activation: enter immediately, with a fresh attempt budget.
    async fn enable_now(&mut self, trigger: Trigger) {
        if self.state.pip_believed_active {
            return;
        }
        self.state.begin_cycle();
        if !self.ready_to_enter() {
            return;
        }
        if let Some(element) = self.locate_playing().await {
            self.actuate_enter(&element, trigger).await;
        }
    }

    fn ready_to_enter(&self) -> bool {
        if !self.probe.supports_pip() {
            debug!("picture-in-picture unsupported, nothing to do");
            return false;
        }
        let max = self.actuator.policy().max_attempts;
        if !self.state.may_attempt_enter(max) {
            debug!(
                pip_believed_active = self.state.pip_believed_active,
                attempt_count = self.state.attempt_count,
                "enter not attempted"
            );
            return false;
        }
        true
    }

    async fn locate_playing(&mut self) -> Option<Arc<H::Element>> {
        let element = self.locator.locate().await?;
        self.advertise_if_fresh();
        if !autopip_core::is_playing(Some(&element.playback())) {
            debug!("video is not playing, nothing to do");
            return None;
        }
        Some(element)
    }

    async fn run_scheduled(&mut self) {
        let Some(scheduled) = self.scheduled.take() else {
            return;
        };
        match scheduled.action {
            Action::Decide => {
                if !self.state.tab_active {
                    self.decide_enter(Trigger::Navigation).await;
                }
            }
            Action::Enter { element, trigger } => {
                if self.state.tab_active {
                    debug!("tab visible again, dropping pending enter");
                    return;
                }
                let live = element
                    .upgrade()
                    .filter(|el| el.is_connected() && autopip_core::is_playing(Some(&el.playback())));
                match live {
                    Some(el) if self.ready_to_enter() => self.actuate_enter(&el, trigger).await,
                    Some(_) => {}
                    None => debug!("video changed while settling, skipping enter"),
                }
            }
        }
    }

    async fn actuate_enter(&mut self, element: &H::Element, trigger: Trigger) {
        self.in_flight = Some(InFlight::Enter);
        self.publish();

        let max = self.actuator.policy().max_attempts;
        let prior = self.state.attempt_count;
        let state = &mut self.state;
        let state_tx = &self.state_tx;
        let outcome = self
            .actuator
            .enter(element, prior, trigger.retry_guard(), |failures| {
                state.on_enter_rejected(failures, max);
                state_tx.send_replace(StateSnapshot {
                    state: state.clone(),
                    phase: state.phase(Some(InFlight::Enter)),
                });
            })
            .await;
        self.in_flight = None;

        match outcome {
            EnterOutcome::Entered { attempt } => {
                self.state.on_enter_succeeded(trigger.credit());
                debug!(trigger = trigger.as_str(), attempt, "enter request accepted");
            }
            EnterOutcome::AlreadyActive => {
                debug!("session already active, awaiting host notification");
            }
            EnterOutcome::Unsupported => {}
            EnterOutcome::Superseded { failures } => {
                debug!(
                    trigger = trigger.as_str(),
                    failures, "tab visible before the request, enter abandoned"
                );
            }
            EnterOutcome::Exhausted { failures, last } => {
                warn!(
                    trigger = trigger.as_str(),
                    failures,
                    last = ?last,
                    "giving up on picture-in-picture until the next cycle"
                );
            }
        }
    }

    // ─── Exit path ──────────────────────────────────────────────

    async fn exit(&mut self) {
        self.in_flight = Some(InFlight::Exit);
        self.publish();
        let outcome = self.actuator.exit().await;
        self.in_flight = None;

        match outcome {
            ExitOutcome::Exited => self.state.on_exit_completed(),
            ExitOutcome::NotActive => {
                debug!("host reports no session, reconciling");
                self.state.on_exit_completed();
            }
            // Left for the next host notification to reconcile.
            ExitOutcome::Rejected(_) => {}
        }
    }

    // ─── Helpers ────────────────────────────────────────────────

    /// Replace any pending scheduled action.
    fn schedule(&mut self, after: std::time::Duration, action: Action<H::Element>) {
        self.scheduled = Some(Scheduled {
            at: Instant::now() + after,
            action,
        });
    }

    fn advertise_if_fresh(&mut self) {
        if !self.locator.take_fresh() {
            return;
        }
        let Some(title) = self.host.document_title() else {
            return;
        };
        let now_playing = NowPlaying {
            title,
            site: self.site.name.clone(),
        };
        if let Err(e) = self.host.advertise_metadata(&now_playing) {
            debug!(error = %e, "metadata advertisement ignored");
        }
    }

    fn monitor(&self) {
        if self.state.tab_active || self.state.pip_believed_active {
            return;
        }
        let playing = self
            .locator
            .cached()
            .is_some_and(|el| autopip_core::is_playing(Some(&el.playback())));
        if playing {
            debug!(
                attempt_count = self.state.attempt_count,
                "tab hidden with playing video, awaiting a qualifying activation"
            );
        }
    }

    fn publish(&self) {
        let settling = matches!(
            self.scheduled,
            Some(Scheduled {
                action: Action::Enter { .. },
                ..
            })
        );
        let in_flight = self
            .in_flight
            .or_else(|| settling.then_some(InFlight::Enter));
        self.state_tx.send_replace(StateSnapshot {
            state: self.state.clone(),
            phase: self.state.phase(in_flight),
        });
    }
}

async fn next_tick(monitor: &mut Option<Interval>) {
    match monitor {
        Some(iv) => {
            iv.tick().await;
        }
        None => std::future::pending().await,
    }
}
