//! Host environment classification used to pick PiP workarounds.
//!
//! New environments are added by extending [`QuirkClass`] and
//! [`classify_user_agent`]; the actuator branches on the class only.

use serde::{Deserialize, Serialize};

/// Environment class driving per-host pre-steps before a PiP request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuirkClass {
    /// Chromium family: the request is issued as-is.
    Standard,
    /// WebKit family: the element must be focused and playback nudged
    /// before the request is honoured.
    RequiresFocusKick,
    #[default]
    Unknown,
}

impl QuirkClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::RequiresFocusKick => "requires_focus_kick",
            Self::Unknown => "unknown",
        }
    }
}

const CHROMIUM_TOKENS: [&str; 4] = ["Chrome/", "Chromium/", "Edg/", "OPR/"];

/// Classify a user-agent string.
///
/// Chromium tokens win over `Safari/`, which every Chromium UA also carries.
pub fn classify_user_agent(user_agent: &str) -> QuirkClass {
    if CHROMIUM_TOKENS.iter().any(|t| user_agent.contains(t)) {
        return QuirkClass::Standard;
    }
    if user_agent.contains("AppleWebKit") && user_agent.contains("Safari/") {
        return QuirkClass::RequiresFocusKick;
    }
    QuirkClass::Unknown
}
