//! # Signals
//!
//! Events delivered through an execution context's event queue. Every
//! inbound message, whatever primitive carried it, arrives as a `Signal`
//! and is handed to the context's listeners on its event loop.

use rpc_types::Envelope;

/// One event on a context's queue.
#[derive(Debug, Clone)]
pub enum Signal {
    /// Payload posted over the message channel.
    Message {
        /// Serialized payload.
        data: String,
        /// Origin of the posting context.
        origin: String,
    },

    /// Payload passed through a connected bridge object.
    BridgeMessage {
        /// Serialized payload.
        data: String,
    },

    /// A bridge connection attempt with `peer` completed.
    BridgeConnected {
        /// Peer id as seen by the receiving context.
        peer: String,
        /// False when the guard token was refused.
        success: bool,
    },

    /// Payload invoked through a frame-element function slot.
    FrameElementMessage {
        /// Serialized payload.
        data: String,
    },

    /// The relay resource written by `peer` was resized.
    RelayResized {
        /// Peer id as seen by the receiving context.
        peer: String,
    },

    /// A relay page of this context was navigated with `fragment`.
    FragmentNavigated {
        /// Text after `#`.
        fragment: String,
    },

    /// Envelope handed over directly by a same-origin peer.
    SameDomain(Envelope),
}

impl Signal {
    /// Short label for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Message { .. } => "message",
            Signal::BridgeMessage { .. } => "bridge_message",
            Signal::BridgeConnected { .. } => "bridge_connected",
            Signal::FrameElementMessage { .. } => "frame_element_message",
            Signal::RelayResized { .. } => "relay_resized",
            Signal::FragmentNavigated { .. } => "fragment_navigated",
            Signal::SameDomain(_) => "same_domain",
        }
    }
}
