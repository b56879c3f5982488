use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

/// What a peer sends to ask for a partner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    pub room_id: String,
    pub ghost_id: String,
}

/// A peer as the matchmaker saw it: its id and the address it connected from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub ghost_id: String,
    pub ip: IpAddr,
    pub port: u16,
}

impl PartnerInfo {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Reply to a [`MatchRequest`]
///
/// Serialized as `{"status": "waiting"}` or `{"status": "match", "partner": {..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchResponse {
    Waiting,
    Match { partner: PartnerInfo },
}
