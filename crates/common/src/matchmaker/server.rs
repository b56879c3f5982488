use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use super::messages::{MatchRequest, MatchResponse, PartnerInfo};
use super::{read_json, MatchmakerError, DEFAULT_MATCH_PORT};

#[derive(Debug, Clone)]
pub struct MatchmakerConfig {
    pub listen_addr: SocketAddr,
    /// How long a room may wait for its second peer. `None` keeps rooms
    /// until they are matched.
    pub room_ttl: Option<Duration>,
}

impl Default for MatchmakerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DEFAULT_MATCH_PORT),
            room_ttl: None,
        }
    }
}

#[derive(Debug, Clone)]
struct WaitingRoom {
    first: PartnerInfo,
    opened_at: Instant,
}

/// Rendezvous service pairing the two peers that name the same room
///
/// Cheap to clone; clones share the room table.
#[derive(Debug, Clone, Default)]
pub struct Matchmaker {
    config: MatchmakerConfig,
    rooms: Arc<Mutex<HashMap<String, WaitingRoom>>>,
}

impl Matchmaker {
    pub fn new(config: MatchmakerConfig) -> Self {
        Self {
            config,
            rooms: Arc::default(),
        }
    }

    pub fn config(&self) -> &MatchmakerConfig {
        &self.config
    }

    /// Number of rooms waiting for a second peer
    pub fn waiting_rooms(&self) -> usize {
        self.rooms.lock().len()
    }

    /// Record `request` against the room table
    ///
    /// The first peer in a room waits; the second gets the first one's info
    /// and the room is gone. A peer repeating its own request keeps waiting
    /// instead of being matched with itself.
    pub fn pair(&self, request: &MatchRequest, addr: SocketAddr) -> MatchResponse {
        let me = PartnerInfo {
            ghost_id: request.ghost_id.clone(),
            ip: addr.ip(),
            port: addr.port(),
        };
        let now = Instant::now();

        let mut rooms = self.rooms.lock();
        if let Some(ttl) = self.config.room_ttl {
            rooms.retain(|room_id, room| {
                let alive = now.duration_since(room.opened_at) < ttl;
                if !alive {
                    tracing::debug!(room_id = %room_id, "room expired");
                }
                alive
            });
        }

        match rooms.remove(&request.room_id) {
            Some(room) if room.first.ghost_id != me.ghost_id => {
                tracing::info!(
                    room_id = %request.room_id,
                    first = %room.first.ghost_id,
                    second = %me.ghost_id,
                    "room matched"
                );
                MatchResponse::Match {
                    partner: room.first,
                }
            }
            _ => {
                tracing::info!(room_id = %request.room_id, ghost_id = %me.ghost_id, %addr, "peer waiting");
                rooms.insert(
                    request.room_id.clone(),
                    WaitingRoom {
                        first: me,
                        opened_at: now,
                    },
                );
                MatchResponse::Waiting
            }
        }
    }

    /// Serve one connection: read a request, answer it, close
    pub async fn handle_client(
        &self,
        mut stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<MatchResponse, MatchmakerError> {
        let request: MatchRequest = read_json(&mut stream).await?;
        if request.room_id.trim().is_empty() {
            return Err(MatchmakerError::EmptyRoomId);
        }

        let response = self.pair(&request, addr);
        if let Err(e) = write_response(&mut stream, &response).await {
            // The second peer never heard about the match; reopen the room for it
            if let MatchResponse::Match { partner } = &response {
                self.reopen(&request.room_id, partner.clone());
            }
            return Err(e);
        }
        Ok(response)
    }

    /// Accept connections until shutdown, one task per connection
    pub async fn serve(&self, listener: TcpListener, mut shutdown_rx: watch::Receiver<()>) {
        tracing::info!(addr = ?listener.local_addr().ok(), "matchmaker online");

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let this = self.clone();
                        tokio::spawn(async move {
                            if let Err(e) = this.handle_client(stream, addr).await {
                                tracing::warn!(%addr, "match error: {}", e);
                            }
                        });
                    }
                    Err(e) => tracing::warn!("accept failed: {}", e),
                },
                _ = shutdown_rx.changed() => break,
            }
        }

        tracing::info!("matchmaker stopped");
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self, shutdown_rx: watch::Receiver<()>) -> Result<(), MatchmakerError> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(MatchmakerError::Bind)?;
        self.serve(listener, shutdown_rx).await;
        Ok(())
    }

    fn reopen(&self, room_id: &str, first: PartnerInfo) {
        self.rooms
            .lock()
            .entry(room_id.to_string())
            .or_insert(WaitingRoom {
                first,
                opened_at: Instant::now(),
            });
    }
}

async fn write_response(
    stream: &mut TcpStream,
    response: &MatchResponse,
) -> Result<(), MatchmakerError> {
    let bytes = serde_json::to_vec(response)?;
    stream.write_all(&bytes).await?;
    stream.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(room_id: &str, ghost_id: &str) -> MatchRequest {
        MatchRequest {
            room_id: room_id.into(),
            ghost_id: ghost_id.into(),
        }
    }

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_second_arrival_gets_first_peer() {
        let matchmaker = Matchmaker::default();

        let first = matchmaker.pair(&request("room1", "alice"), addr("198.51.100.1:4000"));
        assert_eq!(first, MatchResponse::Waiting);
        assert_eq!(matchmaker.waiting_rooms(), 1);

        let second = matchmaker.pair(&request("room1", "bob"), addr("198.51.100.2:5000"));
        assert_eq!(
            second,
            MatchResponse::Match {
                partner: PartnerInfo {
                    ghost_id: "alice".into(),
                    ip: "198.51.100.1".parse().unwrap(),
                    port: 4000,
                }
            }
        );
        assert_eq!(matchmaker.waiting_rooms(), 0);

        // The room was single use
        let third = matchmaker.pair(&request("room1", "carol"), addr("198.51.100.3:6000"));
        assert_eq!(third, MatchResponse::Waiting);
    }

    #[test]
    fn test_rooms_are_independent() {
        let matchmaker = Matchmaker::default();
        matchmaker.pair(&request("room1", "alice"), addr("198.51.100.1:4000"));
        let other = matchmaker.pair(&request("room2", "bob"), addr("198.51.100.2:5000"));
        assert_eq!(other, MatchResponse::Waiting);
        assert_eq!(matchmaker.waiting_rooms(), 2);
    }

    #[test]
    fn test_repeat_request_does_not_self_match() {
        let matchmaker = Matchmaker::default();
        matchmaker.pair(&request("room1", "alice"), addr("198.51.100.1:4000"));
        let again = matchmaker.pair(&request("room1", "alice"), addr("198.51.100.1:4001"));
        assert_eq!(again, MatchResponse::Waiting);

        let MatchResponse::Match { partner } =
            matchmaker.pair(&request("room1", "bob"), addr("198.51.100.2:5000"))
        else {
            panic!("expected a match");
        };
        assert_eq!(partner.port, 4001);
    }

    #[test]
    fn test_expired_room_is_treated_as_empty() {
        let matchmaker = Matchmaker::new(MatchmakerConfig {
            room_ttl: Some(Duration::ZERO),
            ..MatchmakerConfig::default()
        });
        matchmaker.pair(&request("room1", "alice"), addr("198.51.100.1:4000"));
        let second = matchmaker.pair(&request("room1", "bob"), addr("198.51.100.2:5000"));
        assert_eq!(second, MatchResponse::Waiting);
    }
}
