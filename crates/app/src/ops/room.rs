use std::path::PathBuf;

use clap::Args;
use common::identity::compute_room_id;
use common::matchmaker::{request_match, MatchResponse, MatchmakerError, DEFAULT_MATCH_PORT};
use common::node::NodeError;
use common::peers::PeerRecord;
use common::transfer::TransferError;

use crate::state::StateError;

/// Meet a trusted peer through the matchmaker
///
/// Both sides run this with each other's alias. The first to arrive waits,
/// the second learns the first's public address and can send to it.
#[derive(Args, Debug, Clone)]
pub struct Room {
    /// Alias of the peer to meet
    pub alias: String,

    /// Matchmaker address as host:port (default: from config)
    #[arg(long)]
    pub matchmaker: Option<String>,

    /// Files to send once matched
    #[arg(long = "send")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("login failed: {0}")]
    Login(#[from] StateError),
    #[error("{0}")]
    Node(#[from] NodeError),
    #[error("no matchmaker configured. Pass --matchmaker or run 'ghost init --matchmaker'")]
    NoMatchmaker,
    #[error("matchmaker error: {0}")]
    Matchmaker(#[from] MatchmakerError),
    #[error("send failed: {0}")]
    Transfer(#[from] TransferError),
}

impl Room {
    fn matchmaker_addr(&self, configured: Option<&str>) -> Result<String, RoomError> {
        let addr = self
            .matchmaker
            .as_deref()
            .or(configured)
            .ok_or(RoomError::NoMatchmaker)?;
        // Bare hosts get the default port
        if addr.rsplit_once(':').is_some_and(|(_, port)| port.parse::<u16>().is_ok()) {
            Ok(addr.to_string())
        } else {
            Ok(format!("{}:{}", addr, DEFAULT_MATCH_PORT))
        }
    }
}

#[async_trait::async_trait]
impl crate::op::Op for Room {
    type Error = RoomError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let (state, session) = ctx.login()?;
        let server = self.matchmaker_addr(state.config.matchmaker_addr.as_deref())?;
        let node = session.node(&state.config)?;
        let (record, _) = node.resolve(&self.alias)?;

        let room_id = room_id(node.network_id(), &record);

        match request_match(server.as_str(), &room_id, node.network_id()).await? {
            MatchResponse::Waiting => Ok(format!(
                "Room {} open at {}; waiting for '{}'",
                room_id, server, self.alias
            )),
            MatchResponse::Match { partner } => {
                if partner.ghost_id != record.network_id {
                    tracing::warn!(
                        expected = %record.network_id,
                        got = %partner.ghost_id,
                        "room partner is not the expected peer"
                    );
                }

                let mut output = format!(
                    "Matched '{}' in room {} at {}",
                    self.alias,
                    room_id,
                    partner.addr()
                );
                if !self.files.is_empty() {
                    let target = std::net::SocketAddr::new(partner.ip, state.config.transfer_port);
                    node.transfer()
                        .send_files(target, &self.files, &record.exchange_public_key, |_, _| {})
                        .await?;
                    output.push_str(&format!("\nSent {} file(s) to {}", self.files.len(), target));
                }
                Ok(output)
            }
        }
    }
}

/// The room both sides of a pair derive from their network ids
fn room_id(my_network_id: &str, peer: &PeerRecord) -> String {
    compute_room_id(my_network_id, &peer.network_id)
}
