//! WAN rendezvous
//!
//! Two peers that want to reach each other across NATs compute the same
//! room id (see [`crate::identity::compute_room_id`]) and each make one TCP
//! request to a shared matchmaker. The first is told to wait; the second is
//! handed the first peer's observed address and the room is discarded.

mod client;
mod messages;
mod server;

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt};

pub use client::request_match;
pub use messages::{MatchRequest, MatchResponse, PartnerInfo};
pub use server::{Matchmaker, MatchmakerConfig};

/// Well-known matchmaker port
pub const DEFAULT_MATCH_PORT: u16 = 9999;
/// Largest JSON message either side will read
pub const MAX_MESSAGE_SIZE: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum MatchmakerError {
    #[error("failed to bind matchmaker: {0}")]
    Bind(std::io::Error),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("message exceeds 1024 bytes")]
    TooLarge,
    #[error("room id must not be empty")]
    EmptyRoomId,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read from `reader` until a whole JSON value parses
///
/// Stops with an error on malformed input, on EOF before the value is
/// complete, or after [`MAX_MESSAGE_SIZE`] bytes.
pub(crate) async fn read_json<T, R>(reader: &mut R) -> Result<T, MatchmakerError>
where
    T: DeserializeOwned,
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(MAX_MESSAGE_SIZE);
    let mut chunk = [0u8; MAX_MESSAGE_SIZE];

    loop {
        let room = MAX_MESSAGE_SIZE - buf.len();
        let n = reader.read(&mut chunk[..room]).await?;
        buf.extend_from_slice(&chunk[..n]);

        match serde_json::from_slice::<T>(&buf) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_eof() && n > 0 && buf.len() < MAX_MESSAGE_SIZE => continue,
            Err(e) if e.is_eof() && buf.len() >= MAX_MESSAGE_SIZE => {
                return Err(MatchmakerError::TooLarge)
            }
            Err(e) => return Err(e.into()),
        }
    }
}
