//! # Wire Codecs
//!
//! Three encodings of an [`Envelope`]:
//!
//! - **JSON**: the structured payload used by the message-channel, bridge,
//!   frame-element and resize-relay transports.
//! - **Fragment**: `target&from@msgId&total&index&chunk`, the percent-encoded
//!   JSON split into chunks that fit a navigable address fragment.
//! - **Legacy fragment**: the pre-JSON format spoken by old containers. Lossy:
//!   arguments decode as strings and the callback id is dropped.
//!
//! The resize-relay transport additionally wraps JSON payloads into
//! sequence-numbered [`RelayBatch`]es.

use crate::envelope::Envelope;
use crate::errors::CodecError;
use crate::origin::{percent_decode, percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};

// =============================================================================
// JSON
// =============================================================================

/// Serialize an envelope to its JSON wire form.
pub fn encode_json(envelope: &Envelope) -> Result<String, CodecError> {
    serde_json::to_string(envelope).map_err(|e| CodecError::Json(e.to_string()))
}

/// Parse and shape-check a JSON envelope.
///
/// Rejects payloads where `s` or `f` is not a string or `a` is not an array.
pub fn decode_json(data: &str) -> Result<Envelope, CodecError> {
    let value: Value = serde_json::from_str(data).map_err(|e| CodecError::Json(e.to_string()))?;
    decode_value(value)
}

/// Shape-check an already parsed JSON value.
pub fn decode_value(value: Value) -> Result<Envelope, CodecError> {
    let Value::Object(ref fields) = value else {
        return Err(CodecError::MalformedEnvelope("not an object".to_string()));
    };
    if !fields.get("s").is_some_and(Value::is_string) {
        return Err(CodecError::MalformedEnvelope("service is not a string".to_string()));
    }
    if !fields.get("f").is_some_and(Value::is_string) {
        return Err(CodecError::MalformedEnvelope("sender is not a string".to_string()));
    }
    if !fields.get("a").is_some_and(Value::is_array) {
        return Err(CodecError::MalformedEnvelope("args is not an array".to_string()));
    }
    serde_json::from_value(value).map_err(|e| CodecError::MalformedEnvelope(e.to_string()))
}

// =============================================================================
// ADDRESS FRAGMENT
// =============================================================================

/// Largest chunk count a fragment message may declare.
pub const MAX_FRAGMENT_CHUNKS: usize = 4096;

/// Incomplete messages kept per sender before the oldest is dropped.
pub const MAX_PENDING_PER_SENDER: usize = 16;

/// Incomplete messages kept across all senders before the oldest is dropped.
pub const MAX_PENDING_MESSAGES: usize = 256;

/// Build the fragments carrying `envelope` from `from` to `target`.
///
/// Each returned string is the part after `#` of one relay navigation.
/// `max_chunk` bounds the encoded payload per fragment.
pub fn encode_fragments(
    target: &str,
    from: &str,
    message_id: u64,
    envelope: &Envelope,
    max_chunk: usize,
) -> Result<Vec<String>, CodecError> {
    if envelope.is_legacy() {
        return Ok(vec![encode_legacy_fragment(from, message_id, envelope)]);
    }

    let payload = percent_encode(&encode_json(envelope)?);
    // The encoded payload is pure ASCII, so byte chunks are char boundaries.
    let chunks: Vec<&str> = payload
        .as_bytes()
        .chunks(max_chunk.max(1))
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    let total = chunks.len().max(1);
    if total > MAX_FRAGMENT_CHUNKS {
        return Err(CodecError::TooManyChunks(total));
    }
    let target = percent_encode(target);
    let from = percent_encode(from);

    if chunks.is_empty() {
        return Ok(vec![format!("{target}&{from}@{message_id}&1&0&")]);
    }
    Ok(chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| format!("{target}&{from}@{message_id}&{total}&{index}&{chunk}"))
        .collect())
}

fn encode_legacy_fragment(from: &str, message_id: u64, envelope: &Envelope) -> String {
    let mut inner = vec![
        percent_encode(from),
        percent_encode(envelope.service()),
        String::new(),
        String::new(),
        percent_encode(from),
    ];
    inner.extend(envelope.args().iter().map(|arg| match arg {
        Value::String(s) => percent_encode(s),
        other => percent_encode(&other.to_string()),
    }));
    let inner = inner.join("&");
    [
        percent_encode(from),
        message_id.to_string(),
        "1".to_string(),
        "0".to_string(),
        percent_encode(&inner),
    ]
    .join("&")
}

/// One parsed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentPacket {
    /// A chunk of a JSON envelope.
    Chunk {
        /// Sender id.
        from: String,
        /// Sender-local message id.
        message_id: u64,
        /// Number of chunks in the message.
        total: usize,
        /// Position of this chunk.
        index: usize,
        /// Percent-encoded payload slice.
        data: String,
    },
    /// A complete legacy-format message.
    Legacy(Envelope),
}

/// Parse the text after `#` of a relay navigation.
pub fn decode_fragment(fragment: &str) -> Result<FragmentPacket, CodecError> {
    let parts: Vec<&str> = fragment.split('&').collect();
    if parts.len() <= 4 {
        return Err(CodecError::MalformedFragment(format!(
            "expected at least 5 fields, got {}",
            parts.len()
        )));
    }

    if let Some((from, message_id)) = parts[1].split_once('@') {
        let message_id = parse_field::<u64>(message_id, "message id")?;
        let total = parse_field::<usize>(parts[2], "total")?;
        let index = parse_field::<usize>(parts[3], "index")?;
        if total > MAX_FRAGMENT_CHUNKS {
            return Err(CodecError::TooManyChunks(total));
        }
        if total == 0 || index >= total {
            return Err(CodecError::MalformedFragment(format!(
                "chunk {index} outside 0..{total}"
            )));
        }
        return Ok(FragmentPacket::Chunk {
            from: percent_decode(from)?,
            message_id,
            total,
            index,
            data: parts[parts.len() - 1].to_string(),
        });
    }

    decode_legacy(parts[parts.len() - 1]).map(FragmentPacket::Legacy)
}

fn decode_legacy(encoded: &str) -> Result<Envelope, CodecError> {
    let inner = percent_decode(encoded)?;
    let fields = inner
        .split('&')
        .map(percent_decode)
        .collect::<Result<Vec<_>, _>>()?;
    if fields.len() < 5 {
        return Err(CodecError::MalformedFragment(
            "legacy payload shorter than 5 fields".to_string(),
        ));
    }
    let args = fields[5..].iter().cloned().map(Value::String).collect();
    Ok(Envelope::builder(fields[1].clone(), fields[0].clone())
        .args(args)
        .legacy(true)
        .build())
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str) -> Result<T, CodecError> {
    raw.parse()
        .map_err(|_| CodecError::MalformedFragment(format!("{name} is not a number: {raw:?}")))
}

/// Chunks received so far for one message.
#[derive(Debug)]
struct Partial {
    total: usize,
    chunks: BTreeMap<usize, String>,
}

/// Reassembles chunked fragment messages keyed by `from@messageId`.
///
/// At most [`MAX_PENDING_PER_SENDER`] incomplete messages are kept per
/// sender and [`MAX_PENDING_MESSAGES`] overall; the oldest is dropped to
/// make room.
#[derive(Debug, Default)]
pub struct FragmentAssembler {
    partial: HashMap<(String, u64), Partial>,
    arrival: VecDeque<(String, u64)>,
}

impl FragmentAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet. Returns the envelope once every chunk has arrived.
    pub fn accept(&mut self, packet: FragmentPacket) -> Result<Option<Envelope>, CodecError> {
        let (from, message_id, total, index, data) = match packet {
            FragmentPacket::Legacy(envelope) => return Ok(Some(envelope)),
            FragmentPacket::Chunk {
                from,
                message_id,
                total,
                index,
                data,
            } => (from, message_id, total, index, data),
        };

        let key = (from, message_id);
        if !self.partial.contains_key(&key) {
            self.make_room(&key.0);
            self.arrival.push_back(key.clone());
        }
        let partial = self.partial.entry(key.clone()).or_insert_with(|| Partial {
            total,
            chunks: BTreeMap::new(),
        });
        if partial.total != total {
            self.forget(&key);
            return Err(CodecError::MalformedFragment(
                "chunk count changed mid-message".to_string(),
            ));
        }
        partial.chunks.insert(index, data);
        if partial.chunks.len() < total {
            return Ok(None);
        }

        let encoded: String = self
            .forget(&key)
            .map(|partial| partial.chunks.into_values().collect())
            .unwrap_or_default();
        decode_json(&percent_decode(&encoded)?).map(Some)
    }

    /// Number of messages still waiting for chunks.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.partial.len()
    }

    fn make_room(&mut self, from: &str) {
        let from_sender = self.arrival.iter().filter(|(sender, _)| sender == from).count();
        if from_sender >= MAX_PENDING_PER_SENDER {
            if let Some(oldest) = self.arrival.iter().find(|(sender, _)| sender == from).cloned() {
                self.forget(&oldest);
            }
        }
        if self.arrival.len() >= MAX_PENDING_MESSAGES {
            if let Some(oldest) = self.arrival.front().cloned() {
                self.forget(&oldest);
            }
        }
    }

    fn forget(&mut self, key: &(String, u64)) -> Option<Partial> {
        self.arrival.retain(|pending| pending != key);
        self.partial.remove(key)
    }
}

// =============================================================================
// RELAY BATCH
// =============================================================================

/// One sequenced payload inside a [`RelayBatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayPacket {
    /// Sender-local sequence number, starting at 1.
    pub seq: u64,
    /// JSON-encoded envelope.
    pub data: String,
}

/// Contents of a relay resource: the packets the writer has not seen
/// acknowledged, plus the highest sequence the writer has received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayBatch {
    /// Highest peer sequence number processed by the writer.
    pub ack: u64,
    /// Unacknowledged packets, ascending by `seq`.
    pub packets: Vec<RelayPacket>,
}

impl RelayBatch {
    /// Serialize for storage in a relay resource.
    pub fn encode(&self) -> Result<String, CodecError> {
        serde_json::to_string(self).map_err(|e| CodecError::MalformedBatch(e.to_string()))
    }

    /// Parse the contents of a relay resource.
    pub fn decode(data: &str) -> Result<Self, CodecError> {
        serde_json::from_str(data).map_err(|e| CodecError::MalformedBatch(e.to_string()))
    }
}
