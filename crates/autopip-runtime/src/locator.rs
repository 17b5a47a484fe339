//! Element locator: finds the page's primary video and caches it weakly.
//!
//! The cache never keeps an element alive and is revalidated on every
//! read: an element that was dropped or detached from the document reads
//! as absent and forces a fresh scan.

use std::sync::{Arc, Weak};

use autopip_core::LinearBackoff;
use autopip_host::{PipHost, VideoElement};
use tracing::{debug, trace};

pub struct ElementLocator<H: PipHost> {
    host: Arc<H>,
    selectors: Vec<String>,
    policy: LinearBackoff,
    cached: Option<Weak<H::Element>>,
    /// Set when a scan caches a different element than before.
    fresh: bool,
}

impl<H: PipHost> ElementLocator<H> {
    pub fn new(host: Arc<H>, selectors: Vec<String>, policy: LinearBackoff) -> Self {
        Self {
            host,
            selectors,
            policy,
            cached: None,
            fresh: false,
        }
    }

    /// Cached element, if it is still alive and attached.
    pub fn cached(&self) -> Option<Arc<H::Element>> {
        self.cached
            .as_ref()
            .and_then(Weak::upgrade)
            .filter(|el| el.is_connected())
    }

    /// One pass over the selectors. Caches and returns the first match.
    pub fn scan(&mut self) -> Option<Arc<H::Element>> {
        let found = self.selectors.iter().find_map(|selector| {
            let el = self.host.query_selector(selector)?;
            trace!(selector = %selector, "video element matched");
            Some(el)
        })?;
        let previous = self.cached.as_ref().and_then(Weak::upgrade);
        if !previous.is_some_and(|p| Arc::ptr_eq(&p, &found)) {
            self.fresh = true;
        }
        self.cached = Some(Arc::downgrade(&found));
        Some(found)
    }

    /// Cached element, else scan, retrying with growing delay while the
    /// page is still being built.
    pub async fn locate(&mut self) -> Option<Arc<H::Element>> {
        if let Some(el) = self.cached() {
            return Some(el);
        }
        if let Some(el) = self.scan() {
            return Some(el);
        }
        for retry in 0..self.policy.retries {
            let delay = self.policy.delay_for(retry);
            debug!(
                retry = retry + 1,
                delay_ms = delay.as_millis() as u64,
                "video element not found, retrying"
            );
            tokio::time::sleep(delay).await;
            if let Some(el) = self.scan() {
                return Some(el);
            }
        }
        debug!(
            retries = self.policy.retries,
            "video element not found, giving up this cycle"
        );
        None
    }

    /// Debounced document-mutation hook: a single lookup, only when the
    /// cached element is gone.
    pub fn on_mutation_settled(&mut self) -> Option<Arc<H::Element>> {
        if let Some(el) = self.cached() {
            return Some(el);
        }
        let found = self.scan();
        if found.is_none() {
            self.cached = None;
        }
        found
    }

    /// Forget the cached element; the next `locate` scans.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// Whether a different element was cached since the last call.
    pub fn take_fresh(&mut self) -> bool {
        std::mem::take(&mut self.fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopip_host::{SimElement, SimHost};
    use std::time::Duration;
    use tokio::time::Instant;

    fn youtube_selectors() -> Vec<String> {
        vec![".html5-main-video".into(), "video".into()]
    }

    fn locator(host: &Arc<SimHost>) -> ElementLocator<SimHost> {
        ElementLocator::new(Arc::clone(host), youtube_selectors(), LinearBackoff::default())
    }

    #[tokio::test(start_paused = true)]
    async fn cached_element_is_reused() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let mut loc = locator(&host);

        let first = loc.locate().await.expect("found");
        assert!(loc.take_fresh());
        let second = loc.locate().await.expect("found");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!loc.take_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn selectors_are_tried_in_order() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        host.insert_element("#secondary video", SimElement::playing(9));
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let mut loc = locator(&host);
        assert_eq!(loc.locate().await.map(|e| e.id()), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn detached_element_triggers_rescan() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let mut loc = locator(&host);
        assert_eq!(loc.locate().await.map(|e| e.id()), Some(1));
        let _ = loc.take_fresh();

        host.replace_element(".html5-main-video", SimElement::playing(2));
        assert!(loc.cached().is_none());
        assert_eq!(loc.locate().await.map(|e| e.id()), Some(2));
        assert!(loc.take_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_element_reads_as_absent() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        let mut loc = locator(&host);
        {
            let el = SimElement::playing(1);
            loc.cached = Some(Arc::downgrade(&el));
        }
        assert!(loc.cached().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_with_growing_delay_then_gives_up() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        let mut loc = locator(&host);
        let start = Instant::now();

        assert!(loc.locate().await.is_none());
        // 200 + 400 + 600 + 800 + 1000
        assert_eq!(Instant::now() - start, Duration::from_millis(3_000));
    }

    #[tokio::test(start_paused = true)]
    async fn finds_element_that_appears_during_retries() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        let late = Arc::clone(&host);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            late.insert_element(".html5-main-video", SimElement::playing(3));
        });

        let mut loc = locator(&host);
        let start = Instant::now();
        assert_eq!(loc.locate().await.map(|e| e.id()), Some(3));
        // Found on the retry after 200 + 400 ms.
        assert_eq!(Instant::now() - start, Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_rescan_only_when_stale() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let mut loc = locator(&host);
        let _ = loc.locate().await;
        let _ = loc.take_fresh();

        // Unrelated mutation: cache still valid, no new element.
        host.insert_element("#ad video", SimElement::playing(5));
        assert_eq!(loc.on_mutation_settled().map(|e| e.id()), Some(1));
        assert!(!loc.take_fresh());

        host.remove_element(1);
        assert_eq!(loc.on_mutation_settled().map(|e| e.id()), Some(5));
        assert!(loc.take_fresh());
    }

    #[tokio::test(start_paused = true)]
    async fn invalidate_forces_scan() {
        let host = Arc::new(SimHost::new("www.youtube.com"));
        host.insert_element(".html5-main-video", SimElement::playing(1));
        let mut loc = locator(&host);
        let _ = loc.locate().await;
        loc.invalidate();
        assert!(loc.cached().is_none());
        assert_eq!(loc.locate().await.map(|e| e.id()), Some(1));
    }
}
