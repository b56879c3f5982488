//! Wire framing for file transfers
//!
//! ```text
//! [ sender id: 32 bytes, space padded ][ JSON header: 128 bytes, space padded ][ ciphertext ... ]
//! ```
//!
//! Both leading fields are fixed width so a receiver can slice them without
//! any length prefix. The framed packet is then cut into [`CHUNK_SIZE`]
//! datagrams. A bare [`PUNCH_MARKER`] datagram is sent first and is never
//! part of a frame.

use serde::{Deserialize, Serialize};

/// Width of the sender id field
pub const ID_FIELD_LEN: usize = 32;
/// Width of the JSON header field
pub const HEADER_FIELD_LEN: usize = 128;
/// Bytes preceding the ciphertext in every frame
pub const FRAME_PREFIX_LEN: usize = ID_FIELD_LEN + HEADER_FIELD_LEN;
/// Size of each datagram a frame is split into
pub const CHUNK_SIZE: usize = 8 * 1024;
/// Literal warm-up datagram that opens a NAT binding
pub const PUNCH_MARKER: &[u8] = b"PUNCH";
/// Name used when a header carries no usable filename
pub const DEFAULT_FILENAME: &str = "sync_file.enc";

const PAD: u8 = b' ';

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("frame too short: {0} bytes")]
    TooShort(usize),
    #[error("sender id is not valid UTF-8")]
    InvalidSenderId,
    #[error("sender id is empty")]
    EmptySenderId,
    #[error("invalid header: {0}")]
    InvalidHeader(#[from] serde_json::Error),
    #[error("header is {0} bytes, limit is 128")]
    HeaderTooLarge(usize),
}

/// JSON header carried in the fixed 128-byte field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    pub filename: String,
    /// Ciphertext length in bytes; tells the receiver when a frame is complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl PacketHeader {
    pub fn new(filename: impl Into<String>, size: usize) -> Self {
        Self {
            filename: filename.into(),
            size: Some(size as u64),
        }
    }

    /// Total frame length implied by this header, if it states one
    ///
    /// A size that cannot be addressed saturates to `usize::MAX`, which no
    /// frame limit admits.
    pub fn frame_len(&self) -> Option<usize> {
        self.size.map(|size| {
            usize::try_from(size)
                .ok()
                .and_then(|size| FRAME_PREFIX_LEN.checked_add(size))
                .unwrap_or(usize::MAX)
        })
    }
}

/// A fully reassembled frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sender_id: String,
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

pub fn is_punch(data: &[u8]) -> bool {
    data == PUNCH_MARKER
}

/// Frame `payload` behind the fixed id and header fields
pub fn encode_frame(
    sender_id: &str,
    header: &PacketHeader,
    payload: &[u8],
) -> Result<Vec<u8>, PacketError> {
    let header_json = serde_json::to_vec(header)?;
    if header_json.len() > HEADER_FIELD_LEN {
        return Err(PacketError::HeaderTooLarge(header_json.len()));
    }

    let mut out = Vec::with_capacity(FRAME_PREFIX_LEN + payload.len());
    out.extend_from_slice(&fixed_width(truncate_utf8(sender_id, ID_FIELD_LEN), ID_FIELD_LEN));
    out.extend_from_slice(&fixed_width(&header_json, HEADER_FIELD_LEN));
    out.extend_from_slice(payload);
    Ok(out)
}

/// Read the sender id and header from the start of a frame
pub fn parse_prefix(data: &[u8]) -> Result<(String, PacketHeader), PacketError> {
    if data.len() < FRAME_PREFIX_LEN {
        return Err(PacketError::TooShort(data.len()));
    }

    let sender_id = std::str::from_utf8(&data[..ID_FIELD_LEN])
        .map_err(|_| PacketError::InvalidSenderId)?
        .trim_matches(|c: char| c == ' ' || c == '\0');
    if sender_id.is_empty() {
        return Err(PacketError::EmptySenderId);
    }

    let header_bytes = trim_padding(&data[ID_FIELD_LEN..FRAME_PREFIX_LEN]);
    let header: PacketHeader = serde_json::from_slice(header_bytes)?;

    Ok((sender_id.to_string(), header))
}

pub fn decode_frame(data: &[u8]) -> Result<Frame, PacketError> {
    let (sender_id, header) = parse_prefix(data)?;
    Ok(Frame {
        sender_id,
        header,
        payload: data[FRAME_PREFIX_LEN..].to_vec(),
    })
}

/// Split a framed packet into datagram-sized chunks, in order
pub fn chunks(packet: &[u8]) -> std::slice::Chunks<'_, u8> {
    packet.chunks(CHUNK_SIZE)
}

/// Reduce an untrusted filename to a single path component
pub fn sanitize_filename(name: &str) -> String {
    std::path::Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .unwrap_or(DEFAULT_FILENAME)
        .to_string()
}

fn fixed_width(bytes: &[u8], width: usize) -> Vec<u8> {
    let mut field = bytes[..bytes.len().min(width)].to_vec();
    field.resize(width, PAD);
    field
}

fn truncate_utf8(s: &str, max: usize) -> &[u8] {
    if s.len() <= max {
        return s.as_bytes();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s.as_bytes()[..end]
}

fn trim_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| *b != PAD && *b != 0)
        .map(|i| i + 1)
        .unwrap_or(0);
    &bytes[..end]
}
