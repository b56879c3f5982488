//! Per-sender frame reassembly
//!
//! Chunks carry no sequence numbers. Datagrams from one source address are
//! appended in the order they are handed in, and the first one must start a
//! frame. The header's `size` says when the frame is complete. Reordered or
//! lost datagrams produce a frame that fails to decrypt, which the handler
//! drops like any other bad packet.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use super::packet::{parse_prefix, PacketError};

/// How long a partial frame may sit idle before it is discarded
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_secs(30);
/// Largest frame a single sender may make us buffer
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;
/// How many senders may have a partial frame buffered at once
pub const DEFAULT_MAX_PENDING: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ReassemblyError {
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),
    #[error("frame of {0} bytes exceeds limit of {1}")]
    TooLarge(usize, usize),
}

#[derive(Debug)]
struct Pending {
    buf: Vec<u8>,
    expected: usize,
    last_seen: Instant,
}

#[derive(Debug)]
pub struct Reassembler {
    pending: HashMap<SocketAddr, Pending>,
    timeout: Duration,
    max_frame_size: usize,
    max_pending: usize,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new(
            DEFAULT_REASSEMBLY_TIMEOUT,
            DEFAULT_MAX_FRAME_SIZE,
            DEFAULT_MAX_PENDING,
        )
    }
}

impl Reassembler {
    pub fn new(timeout: Duration, max_frame_size: usize, max_pending: usize) -> Self {
        Self {
            pending: HashMap::new(),
            timeout,
            max_frame_size,
            max_pending: max_pending.max(1),
        }
    }

    /// Number of senders with a partial frame buffered
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Feed one datagram. Returns the full frame once its last chunk arrives.
    pub fn push(
        &mut self,
        from: SocketAddr,
        data: &[u8],
    ) -> Result<Option<Vec<u8>>, ReassemblyError> {
        let now = Instant::now();
        self.evict_stale(now);

        if let Some(pending) = self.pending.get_mut(&from) {
            pending.buf.extend_from_slice(data);
            pending.last_seen = now;
            if pending.buf.len() < pending.expected {
                return Ok(None);
            }
            let expected = pending.expected;
            let mut frame = self
                .pending
                .remove(&from)
                .map(|p| p.buf)
                .unwrap_or_default();
            frame.truncate(expected);
            return Ok(Some(frame));
        }

        let (_, header) = parse_prefix(data)?;
        let expected = header.frame_len().unwrap_or(data.len());
        if expected > self.max_frame_size {
            return Err(ReassemblyError::TooLarge(expected, self.max_frame_size));
        }

        if data.len() >= expected {
            return Ok(Some(data[..expected].to_vec()));
        }

        // The declared size is unauthenticated; grow with what actually arrives
        if self.pending.len() >= self.max_pending {
            self.evict_oldest();
        }
        self.pending.insert(
            from,
            Pending {
                buf: data.to_vec(),
                expected,
                last_seen: now,
            },
        );
        Ok(None)
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .pending
            .iter()
            .min_by_key(|(_, pending)| pending.last_seen)
            .map(|(from, _)| *from);
        if let Some(from) = oldest {
            self.pending.remove(&from);
            tracing::debug!(%from, "too many partial frames, dropping the oldest");
        }
    }

    fn evict_stale(&mut self, now: Instant) {
        let timeout = self.timeout;
        self.pending.retain(|from, pending| {
            let fresh = now.duration_since(pending.last_seen) < timeout;
            if !fresh {
                tracing::debug!(%from, buffered = pending.buf.len(), "dropping stale partial frame");
            }
            fresh
        });
    }
}
