//! # Capabilities
//!
//! Which signaling primitives an execution context's host supports. The
//! router's transport probe reads these in order; the address-fragment
//! primitive is always available and therefore not listed.

/// Feature set of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Structured cross-context message channel with target-origin check.
    pub post_message: bool,
    /// Shared bridge object exposed by a child to its container.
    pub bridge: bool,
    /// Relay resources whose resize events can be observed.
    pub resize_relay: bool,
    /// Function slots on the embedding frame element.
    pub frame_element: bool,
}

impl Capabilities {
    /// Every primitive available.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            post_message: true,
            bridge: true,
            resize_relay: true,
            frame_element: true,
        }
    }

    /// Only the address fragment, which every host supports.
    #[must_use]
    pub const fn fragment_only() -> Self {
        Self {
            post_message: false,
            bridge: false,
            resize_relay: false,
            frame_element: false,
        }
    }

    /// Just the message channel.
    #[must_use]
    pub const fn post_message_only() -> Self {
        Self {
            post_message: true,
            ..Self::fragment_only()
        }
    }

    /// Just the bridge object.
    #[must_use]
    pub const fn bridge_only() -> Self {
        Self {
            bridge: true,
            ..Self::fragment_only()
        }
    }

    /// Just resize relays.
    #[must_use]
    pub const fn resize_relay_only() -> Self {
        Self {
            resize_relay: true,
            ..Self::fragment_only()
        }
    }

    /// Just frame-element slots.
    #[must_use]
    pub const fn frame_element_only() -> Self {
        Self {
            frame_element: true,
            ..Self::fragment_only()
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}
