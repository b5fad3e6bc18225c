//! # Shared Primitives
//!
//! Objects two execution contexts can both touch:
//!
//! - [`Bridge`]: exposed by a child, connected by its container after a
//!   token check.
//! - [`FrameElement`]: the child's embedding element, holding one receive
//!   slot per direction.
//! - [`RelayResource`]: a small document hosted by the receiver that the
//!   sender rewrites, versioned so readers can skip stale contents.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};

/// Bridge object a child exposes for its container.
#[derive(Debug)]
pub struct Bridge {
    token: RwLock<String>,
    connected: AtomicBool,
}

impl Bridge {
    /// Create an unconnected bridge guarded by `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
            connected: AtomicBool::new(false),
        }
    }

    /// Replace the guard token.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = token.into();
    }

    /// Connect if `token` matches. Returns whether the bridge is connected.
    pub fn connect(&self, token: &str) -> bool {
        if *self.token.read() != token {
            return false;
        }
        self.connected.store(true, Ordering::SeqCst);
        true
    }

    /// Whether a container has connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Function slots on a child's embedding element.
///
/// `g2c` receives gadget-to-container calls and is installed by the
/// container; `c2g` receives container-to-gadget calls and is installed by
/// the gadget.
#[derive(Debug, Default)]
pub struct FrameElement {
    g2c: AtomicBool,
    c2g: AtomicBool,
}

impl FrameElement {
    /// Create an element with both slots empty.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the container's receive slot.
    pub fn install_g2c(&self) {
        self.g2c.store(true, Ordering::SeqCst);
    }

    /// Install the gadget's receive slot.
    pub fn install_c2g(&self) {
        self.c2g.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn has_g2c(&self) -> bool {
        self.g2c.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_c2g(&self) -> bool {
        self.c2g.load(Ordering::SeqCst)
    }
}

/// A relay document rewritten by one peer and read by the other.
#[derive(Debug, Default)]
pub struct RelayResource {
    state: Mutex<(u64, String)>,
}

impl RelayResource {
    /// Create an empty resource at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents, returning the new version.
    pub fn write(&self, contents: impl Into<String>) -> u64 {
        let mut state = self.state.lock();
        state.0 += 1;
        state.1 = contents.into();
        state.0
    }

    /// Current `(version, contents)`.
    #[must_use]
    pub fn read(&self) -> (u64, String) {
        self.state.lock().clone()
    }

    /// Current version without copying the contents.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.lock().0
    }
}
