//! autopip-core: pure decision layer for visibility-driven picture-in-picture.
//! No async, no host access. Every input (time, host readings, events) is
//! passed in by the runtime, which keeps this crate fully unit-testable.

pub mod backoff;
pub mod gate;
pub mod quirk;
pub mod state;
pub mod types;

pub use backoff::{BackoffPolicy, LinearBackoff};
pub use gate::is_playing;
pub use quirk::{QuirkClass, classify_user_agent};
pub use state::{ControllerState, EnterCredit, InFlight, PipPhase};
pub use types::{
    Capabilities, HostEvent, NowPlaying, PlaybackSnapshot, RawCapabilities, ReadyState, Topic,
};
