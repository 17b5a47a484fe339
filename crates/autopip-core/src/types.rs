use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quirk::{QuirkClass, classify_user_agent};

// ─── Host Events ──────────────────────────────────────────────────

/// Notification emitted by the host page and forwarded, unmodified, into
/// the orchestration task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// The tab became the foreground tab (`visible = true`) or was hidden.
    VisibilityChanged { visible: bool },
    /// A PiP session started, whoever requested it.
    PipEntered,
    /// The PiP session ended, whoever ended it.
    PipExited,
    /// In-page (single-page app) route change finished.
    Navigated,
    /// Nodes were inserted into or removed from the document.
    DocumentMutated,
    /// The host's media session asked the page to enter PiP.
    MediaSessionEnterRequested,
    /// The user clicked the page's video.
    VideoClicked,
}

impl HostEvent {
    /// Topic that produces this event.
    pub fn topic_kind(&self) -> &'static str {
        match self {
            Self::VisibilityChanged { .. } => "visibility",
            Self::PipEntered => "pip_entered",
            Self::PipExited => "pip_exited",
            Self::Navigated => "navigation",
            Self::DocumentMutated => "mutation",
            Self::MediaSessionEnterRequested => "media_session_enter",
            Self::VideoClicked => "video_click",
        }
    }
}

/// A host subscription target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Visibility,
    PipEntered,
    PipExited,
    /// Site-specific in-page navigation event, e.g. `yt-navigate-finish`.
    Navigation { event: String },
    Mutation,
    MediaSessionEnter,
    VideoClick,
}

impl Topic {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Visibility => "visibility",
            Self::PipEntered => "pip_entered",
            Self::PipExited => "pip_exited",
            Self::Navigation { event } => event,
            Self::Mutation => "mutation",
            Self::MediaSessionEnter => "media_session_enter",
            Self::VideoClick => "video_click",
        }
    }

    /// Whether `event` is delivered on this topic.
    pub fn carries(&self, event: &HostEvent) -> bool {
        matches!(
            (self, event),
            (Self::Visibility, HostEvent::VisibilityChanged { .. })
                | (Self::PipEntered, HostEvent::PipEntered)
                | (Self::PipExited, HostEvent::PipExited)
                | (Self::Navigation { .. }, HostEvent::Navigated)
                | (Self::Mutation, HostEvent::DocumentMutated)
                | (Self::MediaSessionEnter, HostEvent::MediaSessionEnterRequested)
                | (Self::VideoClick, HostEvent::VideoClicked)
        )
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Playback ─────────────────────────────────────────────────────

/// `HTMLMediaElement.readyState` levels.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    #[default]
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Point-in-time reading of a video element's playback fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub paused: bool,
    pub ended: bool,
    /// Playback position in seconds.
    pub current_time: f64,
    pub ready_state: ReadyState,
}

impl PlaybackSnapshot {
    /// A snapshot of a video that is mid-playback with plenty of data buffered.
    pub fn playing_at(current_time: f64) -> Self {
        Self {
            paused: false,
            ended: false,
            current_time,
            ready_state: ReadyState::HaveEnoughData,
        }
    }

    pub fn paused_at(current_time: f64) -> Self {
        Self {
            paused: true,
            ..Self::playing_at(current_time)
        }
    }
}

// ─── Capabilities ─────────────────────────────────────────────────

/// Unprocessed capability readings, straight from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapabilities {
    /// `document.pictureInPictureEnabled`.
    pub pip_enabled: bool,
    /// `"documentPictureInPicture" in window`.
    pub document_pip_available: bool,
    pub user_agent: String,
}

/// Classified host capabilities, computed once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_pip: bool,
    pub supports_alternate_pip: bool,
    pub quirk: QuirkClass,
}

impl Capabilities {
    pub fn from_raw(raw: &RawCapabilities) -> Self {
        Self {
            supports_pip: raw.pip_enabled,
            supports_alternate_pip: raw.document_pip_available,
            quirk: classify_user_agent(&raw.user_agent),
        }
    }
}

// ─── Metadata ─────────────────────────────────────────────────────

/// Now-playing metadata advertised to the host's media session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub site: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_carries_matching_events_only() {
        let nav = Topic::Navigation {
            event: "yt-navigate-finish".into(),
        };
        assert!(nav.carries(&HostEvent::Navigated));
        assert!(!nav.carries(&HostEvent::PipEntered));
        assert!(Topic::Visibility.carries(&HostEvent::VisibilityChanged { visible: false }));
        assert!(!Topic::PipExited.carries(&HostEvent::PipEntered));
        assert_eq!(nav.to_string(), "yt-navigate-finish");
    }

    #[test]
    fn capabilities_from_raw() {
        let raw = RawCapabilities {
            pip_enabled: true,
            document_pip_available: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Chrome/126.0 Safari/537.36".into(),
        };
        let caps = Capabilities::from_raw(&raw);
        assert!(caps.supports_pip);
        assert!(!caps.supports_alternate_pip);
        assert_eq!(caps.quirk, QuirkClass::Standard);
    }

    #[test]
    fn topic_kind_names() {
        assert_eq!(
            HostEvent::VisibilityChanged { visible: true }.topic_kind(),
            "visibility"
        );
        assert_eq!(HostEvent::Navigated.topic_kind(), "navigation");
        assert_eq!(
            HostEvent::MediaSessionEnterRequested.topic_kind(),
            "media_session_enter"
        );
    }
}
