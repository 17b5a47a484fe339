//! In-memory host page for tests and scenario replay.
//!
//! Behaves like a browser document with a PiP capability: successful
//! requests echo `PipEntered` / `PipExited` to subscribers, scripted
//! results let callers inject rejections, and every request is recorded.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use autopip_core::{HostEvent, NowPlaying, PlaybackSnapshot, RawCapabilities, Topic};
use tokio::time::Instant;

use crate::error::{HostError, PipRejection};
use crate::host::{EventSink, PipHost, Subscription, VideoElement};

/// User agent reported by a default [`SimHost`] (Chromium, no quirks).
pub const SIM_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                                  (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Selector matching every video element, like `querySelector("video")`.
const ANY_VIDEO: &str = "video";

// ─── Element ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SimElement {
    id: u64,
    connected: AtomicBool,
    playback: Mutex<PlaybackSnapshot>,
    focus_count: AtomicU32,
    nudge_count: AtomicU32,
}

impl SimElement {
    pub fn new(id: u64, playback: PlaybackSnapshot) -> Arc<Self> {
        Arc::new(Self {
            id,
            connected: AtomicBool::new(true),
            playback: Mutex::new(playback),
            focus_count: AtomicU32::new(0),
            nudge_count: AtomicU32::new(0),
        })
    }

    /// An attached element mid-playback.
    pub fn playing(id: u64) -> Arc<Self> {
        Self::new(id, PlaybackSnapshot::playing_at(42.0))
    }

    pub fn paused(id: u64) -> Arc<Self> {
        Self::new(id, PlaybackSnapshot::paused_at(42.0))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn set_playback(&self, playback: PlaybackSnapshot) {
        *lock(&self.playback) = playback;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn focus_count(&self) -> u32 {
        self.focus_count.load(Ordering::SeqCst)
    }

    pub fn nudge_count(&self) -> u32 {
        self.nudge_count.load(Ordering::SeqCst)
    }
}

impl VideoElement for SimElement {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn playback(&self) -> PlaybackSnapshot {
        *lock(&self.playback)
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }

    fn nudge_playback(&self) -> impl Future<Output = Result<(), HostError>> + Send {
        self.nudge_count.fetch_add(1, Ordering::SeqCst);
        let result = if self.is_connected() {
            lock(&self.playback).paused = false;
            Ok(())
        } else {
            Err(HostError::Playback(format!("element {} is detached", self.id)))
        };
        std::future::ready(result)
    }
}

// ─── Host ────────────────────────────────────────────────────────

struct Subscriber {
    id: u64,
    topic: Topic,
    sink: EventSink,
}

struct SimInner {
    host_name: String,
    raw: RawCapabilities,
    visible: bool,
    title: Option<String>,
    elements: Vec<(String, Arc<SimElement>)>,
    pip_element: Option<u64>,
    enter_script: VecDeque<Result<(), PipRejection>>,
    exit_script: VecDeque<Result<(), PipRejection>>,
    enter_times: Vec<Instant>,
    exit_requests: u32,
    capability_queries: u32,
    advertised: Vec<NowPlaying>,
    refused_topics: Vec<String>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

impl SimInner {
    fn emit(&mut self, event: &HostEvent) {
        self.subscribers.retain(|s| !s.sink.is_closed());
        for sub in &self.subscribers {
            if sub.topic.carries(event) {
                // Receiver may be mid-teardown.
                let _ = sub.sink.send(event.clone());
            }
        }
    }
}

/// Scriptable in-memory [`PipHost`]. Cheap to share behind an `Arc`.
pub struct SimHost {
    inner: Arc<Mutex<SimInner>>,
}

impl SimHost {
    /// A visible Chromium-like page with PiP support and no elements.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimInner {
                host_name: host_name.into(),
                raw: RawCapabilities {
                    pip_enabled: true,
                    document_pip_available: false,
                    user_agent: SIM_USER_AGENT.to_string(),
                },
                visible: true,
                title: Some("Untitled video".to_string()),
                elements: Vec::new(),
                pip_element: None,
                enter_script: VecDeque::new(),
                exit_script: VecDeque::new(),
                enter_times: Vec::new(),
                exit_requests: 0,
                capability_queries: 0,
                advertised: Vec::new(),
                refused_topics: Vec::new(),
                subscribers: Vec::new(),
                next_subscriber: 0,
            })),
        }
    }

    #[must_use]
    pub fn with_capabilities(self, raw: RawCapabilities) -> Self {
        self.state().raw = raw;
        self
    }

    #[must_use]
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.state().raw.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn with_visible(self, visible: bool) -> Self {
        self.state().visible = visible;
        self
    }

    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.state().title = Some(title.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, SimInner> {
        lock(&self.inner)
    }

    // ── Document ──

    pub fn insert_element(&self, selector: impl Into<String>, element: Arc<SimElement>) {
        let mut st = self.state();
        element.set_connected(true);
        st.elements.push((selector.into(), element));
        st.emit(&HostEvent::DocumentMutated);
    }

    /// Detach the element with `id` from the document.
    pub fn remove_element(&self, id: u64) {
        let mut st = self.state();
        st.elements.retain(|(_, el)| {
            if el.id() == id {
                el.set_connected(false);
                false
            } else {
                true
            }
        });
        st.emit(&HostEvent::DocumentMutated);
    }

    /// Swap every element under `selector` for `element` in one mutation.
    pub fn replace_element(&self, selector: &str, element: Arc<SimElement>) {
        let mut st = self.state();
        st.elements.retain(|(sel, el)| {
            if sel == selector {
                el.set_connected(false);
                false
            } else {
                true
            }
        });
        element.set_connected(true);
        st.elements.push((selector.to_string(), element));
        st.emit(&HostEvent::DocumentMutated);
    }

    pub fn element(&self, id: u64) -> Option<Arc<SimElement>> {
        self.state()
            .elements
            .iter()
            .find(|(_, el)| el.id() == id)
            .map(|(_, el)| Arc::clone(el))
    }

    // ── Scripting ──

    /// Queue results for upcoming enter requests; an empty queue accepts.
    pub fn script_enter(&self, results: impl IntoIterator<Item = Result<(), PipRejection>>) {
        self.state().enter_script.extend(results);
    }

    pub fn script_exit(&self, results: impl IntoIterator<Item = Result<(), PipRejection>>) {
        self.state().exit_script.extend(results);
    }

    /// Make subscriptions to topics named `topic` fail.
    pub fn refuse_subscription(&self, topic: &str) {
        self.state().refused_topics.push(topic.to_string());
    }

    // ── Notifications ──

    pub fn set_visible(&self, visible: bool) {
        let mut st = self.state();
        st.visible = visible;
        st.emit(&HostEvent::VisibilityChanged { visible });
    }

    pub fn navigate(&self) {
        self.state().emit(&HostEvent::Navigated);
    }

    pub fn click_video(&self) {
        self.state().emit(&HostEvent::VideoClicked);
    }

    pub fn media_session_enter(&self) {
        self.state().emit(&HostEvent::MediaSessionEnterRequested);
    }

    /// PiP opened outside the automation (user gesture, browser heuristics).
    pub fn user_enters_pip(&self, id: u64) {
        let mut st = self.state();
        st.pip_element = Some(id);
        st.emit(&HostEvent::PipEntered);
    }

    pub fn user_exits_pip(&self) {
        let mut st = self.state();
        if st.pip_element.take().is_some() {
            st.emit(&HostEvent::PipExited);
        }
    }

    // ── Inspection ──

    pub fn enter_requests(&self) -> u32 {
        u32::try_from(self.state().enter_times.len()).unwrap_or(u32::MAX)
    }

    pub fn enter_request_times(&self) -> Vec<Instant> {
        self.state().enter_times.clone()
    }

    pub fn exit_requests(&self) -> u32 {
        self.state().exit_requests
    }

    pub fn pip_element(&self) -> Option<u64> {
        self.state().pip_element
    }

    pub fn subscriber_count(&self) -> usize {
        self.state()
            .subscribers
            .iter()
            .filter(|s| !s.sink.is_closed())
            .count()
    }

    pub fn advertised(&self) -> Vec<NowPlaying> {
        self.state().advertised.clone()
    }

    pub fn capability_queries(&self) -> u32 {
        self.state().capability_queries
    }
}

impl PipHost for SimHost {
    type Element = SimElement;

    fn host_name(&self) -> String {
        self.state().host_name.clone()
    }

    fn raw_capabilities(&self) -> RawCapabilities {
        let mut st = self.state();
        st.capability_queries += 1;
        st.raw.clone()
    }

    fn visible(&self) -> bool {
        self.state().visible
    }

    fn query_selector(&self, selector: &str) -> Option<Arc<SimElement>> {
        self.state()
            .elements
            .iter()
            .find(|(sel, el)| (sel == selector || selector == ANY_VIDEO) && el.is_connected())
            .map(|(_, el)| Arc::clone(el))
    }

    fn pip_active(&self) -> bool {
        self.state().pip_element.is_some()
    }

    fn request_enter(
        &self,
        element: &SimElement,
    ) -> impl Future<Output = Result<(), PipRejection>> + Send {
        let inner = Arc::clone(&self.inner);
        let id = element.id();
        let connected = element.is_connected();
        async move {
            let mut st = lock(&inner);
            st.enter_times.push(Instant::now());
            if !connected {
                return Err(PipRejection::InvalidState("element is detached".into()));
            }
            let result = st.enter_script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                st.pip_element = Some(id);
                st.emit(&HostEvent::PipEntered);
            }
            result
        }
    }

    fn request_exit(&self) -> impl Future<Output = Result<(), PipRejection>> + Send {
        let inner = Arc::clone(&self.inner);
        async move {
            let mut st = lock(&inner);
            st.exit_requests += 1;
            if st.pip_element.is_none() {
                return Err(PipRejection::InvalidState("no active session".into()));
            }
            let result = st.exit_script.pop_front().unwrap_or(Ok(()));
            if result.is_ok() {
                st.pip_element = None;
                st.emit(&HostEvent::PipExited);
            }
            result
        }
    }

    fn subscribe(&self, topic: &Topic, sink: EventSink) -> Result<Subscription, HostError> {
        let mut st = self.state();
        if st.refused_topics.iter().any(|t| t == topic.as_str()) {
            return Err(HostError::Subscribe {
                topic: topic.to_string(),
                detail: "refused by host".into(),
            });
        }
        let id = st.next_subscriber;
        st.next_subscriber += 1;
        st.subscribers.push(Subscriber {
            id,
            topic: topic.clone(),
            sink,
        });

        let weak: Weak<Mutex<SimInner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(topic.clone(), move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).subscribers.retain(|s| s.id != id);
            }
        }))
    }

    fn document_title(&self) -> Option<String> {
        self.state().title.clone()
    }

    fn advertise_metadata(&self, now_playing: &NowPlaying) -> Result<(), HostError> {
        self.state().advertised.push(now_playing.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn query_selector_skips_detached() {
        let host = SimHost::new("www.youtube.com");
        host.insert_element(".html5-main-video", SimElement::playing(1));
        assert_eq!(
            host.query_selector(".html5-main-video").map(|e| e.id()),
            Some(1)
        );
        host.remove_element(1);
        assert!(host.query_selector(".html5-main-video").is_none());
    }

    #[tokio::test]
    async fn nudging_detached_element_fails() {
        let el = SimElement::paused(3);
        el.nudge_playback().await.expect("attached nudge");
        assert!(!el.playback().paused);

        el.set_connected(false);
        el.set_playback(PlaybackSnapshot::paused_at(1.0));
        let err = el.nudge_playback().await.unwrap_err();
        assert!(matches!(err, HostError::Playback(_)));
        assert!(el.playback().paused);
        assert_eq!(el.nudge_count(), 2);
    }

    #[test]
    fn generic_video_selector_matches_any() {
        let host = SimHost::new("example.org");
        host.insert_element("#player video", SimElement::playing(7));
        assert_eq!(host.query_selector("video").map(|e| e.id()), Some(7));
        assert!(host.query_selector(".html5-main-video").is_none());
    }

    #[test]
    fn replace_detaches_old_element() {
        let host = SimHost::new("www.youtube.com");
        let old = SimElement::playing(1);
        host.insert_element(".html5-main-video", Arc::clone(&old));
        host.replace_element(".html5-main-video", SimElement::playing(2));
        assert!(!old.is_connected());
        assert_eq!(
            host.query_selector(".html5-main-video").map(|e| e.id()),
            Some(2)
        );
    }

    #[tokio::test]
    async fn enter_echoes_notification() {
        let host = SimHost::new("www.youtube.com");
        let el = SimElement::playing(1);
        host.insert_element("video", Arc::clone(&el));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _sub = host.subscribe(&Topic::PipEntered, tx).expect("subscribe");

        host.request_enter(&el).await.expect("accepted");
        assert!(host.pip_active());
        assert_eq!(host.pip_element(), Some(1));
        assert_eq!(rx.recv().await, Some(HostEvent::PipEntered));
    }

    #[tokio::test]
    async fn scripted_rejection_is_returned() {
        let host = SimHost::new("www.youtube.com");
        let el = SimElement::playing(1);
        host.script_enter([Err(PipRejection::NotAllowed)]);
        assert_eq!(host.request_enter(&el).await, Err(PipRejection::NotAllowed));
        assert!(!host.pip_active());
        assert!(host.request_enter(&el).await.is_ok());
        assert_eq!(host.enter_requests(), 2);
    }

    #[tokio::test]
    async fn exit_without_session_is_rejected() {
        let host = SimHost::new("www.youtube.com");
        assert!(matches!(
            host.request_exit().await,
            Err(PipRejection::InvalidState(_))
        ));
        assert_eq!(host.exit_requests(), 1);
    }

    #[test]
    fn unsubscribe_removes_subscriber() {
        let host = SimHost::new("www.youtube.com");
        let (tx, _rx) = mpsc::unbounded_channel();
        let sub = host.subscribe(&Topic::Visibility, tx).expect("subscribe");
        assert_eq!(host.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(host.subscriber_count(), 0);
    }

    #[test]
    fn refused_topic_fails_subscription() {
        let host = SimHost::new("www.youtube.com");
        host.refuse_subscription("media_session_enter");
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = host
            .subscribe(&Topic::MediaSessionEnter, tx)
            .expect_err("refused");
        assert!(err.to_string().contains("media_session_enter"));
    }

    #[test]
    fn visibility_is_delivered_to_visibility_topic_only() {
        let host = SimHost::new("www.youtube.com");
        let (vis_tx, mut vis_rx) = mpsc::unbounded_channel();
        let (nav_tx, mut nav_rx) = mpsc::unbounded_channel();
        let _a = host.subscribe(&Topic::Visibility, vis_tx).expect("subscribe");
        let _b = host
            .subscribe(
                &Topic::Navigation {
                    event: "yt-navigate-finish".into(),
                },
                nav_tx,
            )
            .expect("subscribe");

        host.set_visible(false);
        assert_eq!(
            vis_rx.try_recv().ok(),
            Some(HostEvent::VisibilityChanged { visible: false })
        );
        assert!(nav_rx.try_recv().is_err());
        assert!(!host.visible());
    }
}
