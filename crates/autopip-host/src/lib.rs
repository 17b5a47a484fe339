//! autopip-host: host page IO boundary.
//! Defines the capabilities the orchestration core consumes from the
//! browser page (PiP requests, visibility and lifecycle notifications,
//! element queries), the memoized capability probe, and an in-memory
//! host for tests and scenario replay. No automation policy lives here.

pub mod error;
pub mod host;
pub mod probe;
pub mod sim;

pub use error::{HostError, PipRejection};
pub use host::{EventSink, PipHost, Subscription, VideoElement};
pub use probe::CapabilityProbe;
pub use sim::{SimElement, SimHost};
