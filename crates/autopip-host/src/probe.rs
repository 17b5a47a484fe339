//! Capability probe: one lazy host query per page, cached for its lifetime.
//!
//! Absence of a capability is a normal `false`, never an error.

use std::sync::{Arc, OnceLock};

use autopip_core::{Capabilities, QuirkClass};
use tracing::debug;

use crate::host::PipHost;

pub struct CapabilityProbe<H: PipHost> {
    host: Arc<H>,
    cache: OnceLock<Capabilities>,
}

impl<H: PipHost> CapabilityProbe<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            cache: OnceLock::new(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        *self.cache.get_or_init(|| {
            let caps = Capabilities::from_raw(&self.host.raw_capabilities());
            debug!(
                supports_pip = caps.supports_pip,
                supports_alternate_pip = caps.supports_alternate_pip,
                quirk = caps.quirk.as_str(),
                "probed host capabilities"
            );
            caps
        })
    }

    pub fn supports_pip(&self) -> bool {
        self.capabilities().supports_pip
    }

    /// Same-document PiP variant (document picture-in-picture).
    pub fn supports_alternate_pip(&self) -> bool {
        self.capabilities().supports_alternate_pip
    }

    pub fn environment_quirk_class(&self) -> QuirkClass {
        self.capabilities().quirk
    }
}
