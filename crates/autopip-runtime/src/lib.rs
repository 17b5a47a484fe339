//! autopip-runtime: visibility-driven picture-in-picture automation.
//!
//! Wires the host boundary into a single orchestration task:
//! router → orchestrator → (locator, gate) → actuator → host → router.

pub mod actuator;
pub mod config;
pub mod debounce;
pub mod locator;
pub mod machine;
pub mod replay;
pub mod router;

use std::sync::Arc;

use autopip_core::{ControllerState, Topic};
use autopip_host::PipHost;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub use config::{AutopipConfig, ConfigError, SiteProfile, Timings};
pub use machine::{Orchestrator, StateSnapshot};
pub use router::EventRouter;

/// A running automation instance for one page.
pub struct AutoPip {
    router: EventRouter,
    task: JoinHandle<ControllerState>,
    state_rx: watch::Receiver<StateSnapshot>,
    site: SiteProfile,
}

impl AutoPip {
    /// Subscribe to `host` and spawn the orchestrator on the current runtime.
    pub fn launch<H: PipHost>(host: Arc<H>, config: &AutopipConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let site = config.profile_for(&host.host_name());
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();

        let router = EventRouter::attach(host.as_ref(), &site, &tx, cancel.clone());
        if !router.is_subscribed(&Topic::Visibility) {
            warn!(site = %site.name, "no visibility notifications, hidden-tab entry disabled");
        }
        // Only the host subscriptions hold senders from here on.
        drop(tx);

        let orchestrator = Orchestrator::new(host, site.clone(), config.timings.clone(), rx, cancel);
        let state_rx = orchestrator.subscribe_state();
        let task = tokio::spawn(orchestrator.run());

        Ok(Self {
            router,
            task,
            state_rx,
            site,
        })
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    /// Latest published state.
    pub fn snapshot(&self) -> StateSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<StateSnapshot> {
        self.state_rx.clone()
    }

    /// Page teardown: release every subscription, stop the orchestrator,
    /// and return its final state.
    pub async fn teardown(self) -> ControllerState {
        self.router.teardown();
        match self.task.await {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "orchestrator task failed");
                self.state_rx.borrow().state.clone()
            }
        }
    }
}
