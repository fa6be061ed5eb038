// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! ICE Candidates and Credentials
//!
//! The unit exchanged between peers is [`IceCredentials`]: a ufrag/pwd pair
//! plus the gathered candidate list, serialized as JSON. Candidate kinds are
//! a closed enum.

use std::net::{IpAddr, SocketAddr};

use ring::digest;
use serde::{Deserialize, Serialize};

use super::error::ConnectivityError;

/// Kind of ICE candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandidateKind {
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "srflx")]
    ServerReflexive,
    #[serde(rename = "prflx")]
    PeerReflexive,
    #[serde(rename = "relay")]
    Relay,
}

impl CandidateKind {
    /// RFC 8445 type preference.
    fn type_preference(self) -> u32 {
        match self {
            CandidateKind::Host => 126,
            CandidateKind::PeerReflexive => 110,
            CandidateKind::ServerReflexive => 100,
            CandidateKind::Relay => 0,
        }
    }
}

/// A transport candidate advertised to the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    #[serde(rename = "type")]
    pub kind: CandidateKind,
    pub foundation: String,
    pub component: u16,
    pub protocol: String,
    pub priority: u32,
    pub ip: IpAddr,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_ip: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_port: Option<u16>,
}

impl IceCandidate {
    /// Builds a host candidate for a local socket address.
    pub fn host(addr: SocketAddr) -> Self {
        IceCandidate {
            kind: CandidateKind::Host,
            foundation: foundation(CandidateKind::Host, addr.ip()),
            component: 1,
            protocol: "udp".to_string(),
            priority: priority(CandidateKind::Host, 65535, 1),
            ip: addr.ip(),
            port: addr.port(),
            related_ip: None,
            related_port: None,
        }
    }

    /// Builds a server-reflexive candidate from a STUN mapping and its base.
    pub fn server_reflexive(public: SocketAddr, base: SocketAddr) -> Self {
        IceCandidate {
            kind: CandidateKind::ServerReflexive,
            foundation: foundation(CandidateKind::ServerReflexive, public.ip()),
            component: 1,
            protocol: "udp".to_string(),
            priority: priority(CandidateKind::ServerReflexive, 65535, 1),
            ip: public.ip(),
            port: public.port(),
            related_ip: Some(base.ip()),
            related_port: Some(base.port()),
        }
    }

    /// The candidate's socket address.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// Credentials and candidates for one agent, exchanged out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCredentials {
    pub ufrag: String,
    pub pwd: String,
    pub candidates: Vec<IceCandidate>,
}

impl IceCredentials {
    /// Serializes for the external exchange channel.
    pub fn to_json(&self) -> Result<String, ConnectivityError> {
        serde_json::to_string(self).map_err(|_| ConnectivityError::InvalidCredentials)
    }

    /// Parses credentials received from the peer.
    pub fn from_json(json: &str) -> Result<Self, ConnectivityError> {
        let creds: IceCredentials =
            serde_json::from_str(json).map_err(|_| ConnectivityError::InvalidCredentials)?;
        if creds.ufrag.is_empty() || creds.pwd.is_empty() {
            return Err(ConnectivityError::InvalidCredentials);
        }
        Ok(creds)
    }
}

/// RFC 8445 priority: `(2^24)·type_pref + (2^8)·local_pref + (256 − component)`.
pub fn priority(kind: CandidateKind, local_preference: u32, component: u16) -> u32 {
    (kind.type_preference() << 24)
        + (local_preference << 8)
        + (256 - u32::from(component))
}

fn foundation(kind: CandidateKind, ip: IpAddr) -> String {
    let input = format!("{:?}|{}", kind, ip);
    let hash = digest::digest(&digest::SHA256, input.as_bytes());
    hex::encode(&hash.as_ref()[..4])
}
