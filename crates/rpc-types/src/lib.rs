//! # RPC Types Crate
//!
//! The message unit exchanged between execution contexts, its wire codecs,
//! origin helpers and the fault taxonomy shared by `rpc-host` and
//! `rpc-router`.
//!
//! ## Design Principles
//!
//! - **One envelope**: every transport carries the same [`Envelope`]; only
//!   the byte framing differs.
//! - **Sender authority**: the envelope's `f` field is the identity the
//!   receiver checks the auth token against.
//! - **Closed error set**: callers match on [`RpcError`] variants rather
//!   than strings.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod codec;
pub mod envelope;
pub mod errors;
pub mod origin;

pub use codec::{
    decode_fragment, decode_json, decode_value, encode_fragments, encode_json, FragmentAssembler,
    FragmentPacket, RelayBatch, RelayPacket, MAX_FRAGMENT_CHUNKS, MAX_PENDING_MESSAGES,
    MAX_PENDING_PER_SENDER,
};
pub use envelope::{
    is_reserved_service, Envelope, EnvelopeBuilder, ACK_SERVICE, CALLBACK_SERVICE,
    DEFAULT_SERVICE, NO_CALLBACK, PARENT_ID,
};
pub use errors::*;
pub use origin::{origin_of, percent_decode, percent_encode, resolve_relay_url, url_params};
