use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use super::messages::{MatchRequest, MatchResponse};
use super::{read_json, MatchmakerError};

/// Ask the matchmaker at `server` for a partner in `room_id`
///
/// One request, one response; the server closes the connection afterwards.
pub async fn request_match(
    server: impl ToSocketAddrs,
    room_id: &str,
    ghost_id: &str,
) -> Result<MatchResponse, MatchmakerError> {
    let mut stream = TcpStream::connect(server).await?;
    let request = MatchRequest {
        room_id: room_id.to_string(),
        ghost_id: ghost_id.to_string(),
    };

    stream.write_all(&serde_json::to_vec(&request)?).await?;
    let response: MatchResponse = read_json(&mut stream).await?;

    tracing::debug!(room_id, ?response, "matchmaker replied");
    Ok(response)
}
