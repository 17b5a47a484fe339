//! Host page traits. Implemented by the real page bindings and by
//! [`crate::sim::SimHost`] for mock-injectable testing.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use autopip_core::{HostEvent, NowPlaying, PlaybackSnapshot, RawCapabilities, Topic};
use tokio::sync::mpsc;

use crate::error::{HostError, PipRejection};

/// Channel end hosts push notifications into.
pub type EventSink = mpsc::UnboundedSender<HostEvent>;

/// A video element owned by the host document.
pub trait VideoElement: Send + Sync + 'static {
    /// Still attached to the document.
    fn is_connected(&self) -> bool;

    fn playback(&self) -> PlaybackSnapshot;

    fn focus(&self);

    /// Ask the element to (re)start playback. Used as a pre-step on hosts
    /// that refuse PiP for an element that was not recently driven.
    fn nudge_playback(&self) -> impl Future<Output = Result<(), HostError>> + Send;
}

/// The hosting page and its PiP capability.
pub trait PipHost: Send + Sync + 'static {
    type Element: VideoElement;

    /// Host name of the current page, e.g. `www.youtube.com`.
    fn host_name(&self) -> String;

    fn raw_capabilities(&self) -> RawCapabilities;

    /// Current foreground state; read once at startup, notifications after.
    fn visible(&self) -> bool;

    fn query_selector(&self, selector: &str) -> Option<Arc<Self::Element>>;

    /// Whether the host reports an active PiP session for this document.
    fn pip_active(&self) -> bool;

    fn request_enter(
        &self,
        element: &Self::Element,
    ) -> impl Future<Output = Result<(), PipRejection>> + Send;

    fn request_exit(&self) -> impl Future<Output = Result<(), PipRejection>> + Send;

    /// Start delivering `topic` notifications into `sink`.
    fn subscribe(&self, topic: &Topic, sink: EventSink) -> Result<Subscription, HostError>;

    fn document_title(&self) -> Option<String>;

    /// Advisory; callers ignore failures.
    fn advertise_metadata(&self, now_playing: &NowPlaying) -> Result<(), HostError>;
}

type Release = Box<dyn FnOnce() + Send>;

/// Live host subscription. Released on [`Subscription::unsubscribe`] or drop.
pub struct Subscription {
    topic: Topic,
    release: Option<Release>,
}

impl Subscription {
    pub fn new(topic: Topic, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            topic,
            release: Some(Box::new(release)),
        }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("live", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn unsubscribe_releases_once() {
        let released = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&released);
        let sub = Subscription::new(Topic::Visibility, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(sub.topic(), &Topic::Visibility);
        sub.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let released = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&released);
        {
            let _sub = Subscription::new(Topic::Mutation, move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
