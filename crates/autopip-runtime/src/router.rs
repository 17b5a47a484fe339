//! Event router: owns every host subscription feeding the orchestrator.
//!
//! Hosts push notifications straight into the shared sink, unmodified.
//! Teardown releases all subscriptions (including the mutation observer)
//! and stops the orchestrator.

use autopip_core::Topic;
use autopip_host::{EventSink, PipHost, Subscription};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SiteProfile;

pub struct EventRouter {
    subscriptions: Vec<Subscription>,
    cancel: CancellationToken,
}

/// Topics the orchestrator listens to on `site`.
pub fn topics_for(site: &SiteProfile) -> Vec<Topic> {
    let mut topics = vec![
        Topic::Visibility,
        Topic::PipEntered,
        Topic::PipExited,
        Topic::Mutation,
        Topic::MediaSessionEnter,
        Topic::VideoClick,
    ];
    if let Some(event) = &site.navigation_event {
        topics.push(Topic::Navigation {
            event: event.clone(),
        });
    }
    topics
}

impl EventRouter {
    pub fn attach<H: PipHost>(
        host: &H,
        site: &SiteProfile,
        sink: &EventSink,
        cancel: CancellationToken,
    ) -> Self {
        let mut subscriptions = Vec::new();
        for topic in topics_for(site) {
            match host.subscribe(&topic, sink.clone()) {
                Ok(sub) => subscriptions.push(sub),
                // Optional host hook; older hosts lack the action.
                Err(e) if topic == Topic::MediaSessionEnter => {
                    debug!(error = %e, "media session enter action unavailable");
                }
                Err(e) => warn!(topic = %topic, error = %e, "host subscription failed"),
            }
        }
        info!(
            site = %site.name,
            subscriptions = subscriptions.len(),
            "event router attached"
        );
        Self {
            subscriptions,
            cancel,
        }
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.subscriptions.iter().any(|s| s.topic() == topic)
    }

    /// Release every subscription and stop the orchestrator.
    pub fn teardown(self) {
        let count = self.subscriptions.len();
        for sub in self.subscriptions {
            sub.unsubscribe();
        }
        self.cancel.cancel();
        info!(released = count, "event router torn down");
    }
}
