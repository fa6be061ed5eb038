// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! ICE-Style Agent
//!
//! Gathers host and server-reflexive candidates on a single UDP socket,
//! exposes them as [`IceCredentials`] for external exchange, and punches a
//! direct channel with HMAC-authenticated connectivity checks (short-term
//! credential style: requests are keyed with the receiver's pwd).
//!
//! Lifecycle: `New → Gathering → Connecting/Accepting → Connected → Closed`.
//! `close` is idempotent.

use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::Rng;
use ring::hmac;
use tracing::{debug, info, warn};

use super::candidate::{IceCandidate, IceCredentials};
use super::error::ConnectivityError;
use super::stun::{local_ip, query_binding, StunConfig};

/// Check message magic.
const CHECK_MAGIC: &[u8; 8] = b"CLNR-ICE";
/// Connectivity check request.
const CHECK_REQUEST: u8 = 0x01;
/// Connectivity check response.
const CHECK_RESPONSE: u8 = 0x02;
/// HMAC-SHA256 tag length.
const MAC_LEN: usize = 32;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct IceConfig {
    /// STUN settings used for server-reflexive gathering.
    pub stun: StunConfig,
    /// Upper bound on candidate gathering; partial results are kept.
    pub gather_timeout: Duration,
    /// Upper bound on connect/accept.
    pub connect_timeout: Duration,
    /// Pacing of check rounds and receive polling.
    pub check_interval: Duration,
}

impl Default for IceConfig {
    fn default() -> Self {
        IceConfig {
            stun: StunConfig::default(),
            gather_timeout: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(15),
            check_interval: Duration::from_millis(200),
        }
    }
}

/// Agent lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    New,
    Gathering,
    Connecting,
    Accepting,
    Connected,
    Closed,
}

/// An established peer-to-peer channel.
pub struct IceConnection {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl IceConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ConnectivityError> {
        Ok(self.socket.local_addr()?)
    }

    /// Sets the receive timeout; `None` blocks indefinitely.
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<(), ConnectivityError> {
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }

    /// Sends a datagram to the connected peer.
    pub fn send(&self, data: &[u8]) -> Result<usize, ConnectivityError> {
        Ok(self.socket.send_to(data, self.peer)?)
    }

    /// Receives the next datagram from the connected peer.
    ///
    /// Datagrams from other sources and connectivity checks still in flight
    /// are silently skipped; neither is application data.
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, ConnectivityError> {
        loop {
            let (len, from) = self.socket.recv_from(buf)?;
            if from != self.peer {
                continue;
            }
            if buf[..len].starts_with(CHECK_MAGIC) {
                continue;
            }
            return Ok(len);
        }
    }
}

/// ICE-style connectivity agent.
pub struct IceAgent {
    config: IceConfig,
    state: AgentState,
    socket: Option<UdpSocket>,
    local: Option<IceCredentials>,
}

impl IceAgent {
    pub fn new(config: IceConfig) -> Self {
        IceAgent {
            config,
            state: AgentState::New,
            socket: None,
            local: None,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Gathers local candidates, bounded by the gathering timeout.
    ///
    /// The host candidate is always present; server-reflexive gathering is
    /// best-effort — servers that do not answer in time are skipped and
    /// whatever arrived is used.
    pub fn gather(&mut self) -> Result<&IceCredentials, ConnectivityError> {
        if self.state != AgentState::New {
            return Err(ConnectivityError::InvalidState(
                "gathering already performed".into(),
            ));
        }
        self.state = AgentState::Gathering;

        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        let base = SocketAddr::new(local_ip(), socket.local_addr()?.port());

        let mut candidates = vec![IceCandidate::host(base)];

        let deadline = Instant::now() + self.config.gather_timeout;
        for server in &self.config.stun.servers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!("gathering timeout reached; using partial candidate set");
                break;
            }
            match query_binding(&socket, server, remaining.min(self.config.stun.timeout)) {
                Ok((public, _latency)) => {
                    let candidate = IceCandidate::server_reflexive(public, base);
                    if !candidates.iter().any(|c| c.addr() == candidate.addr()) {
                        debug!(%public, %server, "gathered server-reflexive candidate");
                        candidates.push(candidate);
                    }
                }
                Err(err) => {
                    warn!(%server, error = %err, "server-reflexive gathering failed");
                }
            }
        }

        self.socket = Some(socket);
        self.local = Some(IceCredentials {
            ufrag: random_token(8),
            pwd: random_token(24),
            candidates,
        });

        Ok(self.local.as_ref().expect("credentials just set"))
    }

    /// Returns the gathered credentials for external exchange.
    pub fn credentials(&self) -> Result<&IceCredentials, ConnectivityError> {
        self.local
            .as_ref()
            .ok_or_else(|| ConnectivityError::InvalidState("gather before credentials".into()))
    }

    /// Actively dials the remote peer's candidates.
    ///
    /// Blocks until a check round-trips or the connect timeout expires. On
    /// timeout the agent unwinds to the gathered state and can retry.
    pub fn connect(&mut self, remote: &IceCredentials) -> Result<IceConnection, ConnectivityError> {
        self.establish(remote, true)
    }

    /// Passively answers the remote peer's checks.
    ///
    /// Counterpart of [`IceAgent::connect`]; same blocking and timeout
    /// behavior.
    pub fn accept(&mut self, remote: &IceCredentials) -> Result<IceConnection, ConnectivityError> {
        self.establish(remote, false)
    }

    /// Tears down the agent. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.socket = None;
        self.local = None;
        self.state = AgentState::Closed;
    }

    fn establish(
        &mut self,
        remote: &IceCredentials,
        active: bool,
    ) -> Result<IceConnection, ConnectivityError> {
        match self.state {
            AgentState::Closed => return Err(ConnectivityError::Closed),
            AgentState::Gathering => {}
            _ => {
                return Err(ConnectivityError::InvalidState(
                    "connect/accept requires a gathered agent".into(),
                ))
            }
        }
        if remote.ufrag.is_empty() || remote.pwd.is_empty() {
            return Err(ConnectivityError::InvalidCredentials);
        }

        let local = self
            .local
            .as_ref()
            .ok_or(ConnectivityError::Closed)?
            .clone();
        let socket = self.socket.as_ref().ok_or(ConnectivityError::Closed)?;

        self.state = if active {
            AgentState::Connecting
        } else {
            AgentState::Accepting
        };

        let mut targets: Vec<IceCandidate> = remote.candidates.clone();
        targets.sort_by(|a, b| b.priority.cmp(&a.priority));

        // Usernames follow STUN convention: receiver's ufrag first.
        let outbound_username = format!("{}:{}", remote.ufrag, local.ufrag);
        let inbound_username = format!("{}:{}", local.ufrag, remote.ufrag);

        let txn_id: [u8; 12] = rand::random();
        let request = encode_check(CHECK_REQUEST, &txn_id, &outbound_username, &remote.pwd);

        let deadline = Instant::now() + self.config.connect_timeout;
        socket.set_read_timeout(Some(self.config.check_interval))?;

        let mut buf = [0u8; 1024];
        let selected = loop {
            if Instant::now() >= deadline {
                break None;
            }

            if active {
                for target in &targets {
                    socket.send_to(&request, target.addr())?;
                }
            }

            match socket.recv_from(&mut buf) {
                Ok((len, from)) => {
                    if let Some(message) = verify_check(&buf[..len], &local.pwd) {
                        // Authenticated request from the peer: answer it.
                        if message.kind == CHECK_REQUEST && message.username == inbound_username {
                            if !targets.iter().any(|c| c.addr() == from) {
                                debug!(%from, "check from peer-reflexive address");
                            }
                            let response = encode_check(
                                CHECK_RESPONSE,
                                &message.txn_id,
                                &inbound_username,
                                &local.pwd,
                            );
                            socket.send_to(&response, from)?;
                            if !active {
                                break Some(from);
                            }
                        }
                    } else if let Some(message) = verify_check(&buf[..len], &remote.pwd) {
                        // Our own request echoed back as an authenticated response.
                        if active
                            && message.kind == CHECK_RESPONSE
                            && message.txn_id == txn_id
                        {
                            break Some(from);
                        }
                    }
                }
                Err(e) if would_block(&e) => continue,
                Err(e) => {
                    self.state = AgentState::Gathering;
                    return Err(ConnectivityError::Io(e));
                }
            }
        };

        match selected {
            Some(peer) => {
                let connection = IceConnection {
                    socket: socket.try_clone()?,
                    peer,
                };
                connection.set_recv_timeout(None)?;
                self.state = AgentState::Connected;
                info!(%peer, active, "peer channel established");
                Ok(connection)
            }
            None => {
                // Unwind the attempt; the gathered candidates stay valid.
                self.state = AgentState::Gathering;
                Err(ConnectivityError::Timeout)
            }
        }
    }
}

struct CheckMessage {
    kind: u8,
    txn_id: [u8; 12],
    username: String,
}

fn encode_check(kind: u8, txn_id: &[u8; 12], username: &str, pwd: &str) -> Vec<u8> {
    let mut msg = Vec::with_capacity(8 + 1 + 12 + 2 + username.len() + MAC_LEN);
    msg.extend_from_slice(CHECK_MAGIC);
    msg.push(kind);
    msg.extend_from_slice(txn_id);
    msg.extend_from_slice(&(username.len() as u16).to_be_bytes());
    msg.extend_from_slice(username.as_bytes());

    let key = hmac::Key::new(hmac::HMAC_SHA256, pwd.as_bytes());
    let tag = hmac::sign(&key, &msg);
    msg.extend_from_slice(tag.as_ref());
    msg
}

/// Parses and authenticates a check message against `pwd`.
///
/// Returns `None` for anything structurally invalid or with a bad tag —
/// unauthenticated traffic is indistinguishable from noise.
fn verify_check(buf: &[u8], pwd: &str) -> Option<CheckMessage> {
    let min_len = 8 + 1 + 12 + 2 + MAC_LEN;
    if buf.len() < min_len || &buf[..8] != CHECK_MAGIC {
        return None;
    }

    let kind = buf[8];
    if kind != CHECK_REQUEST && kind != CHECK_RESPONSE {
        return None;
    }

    let mut txn_id = [0u8; 12];
    txn_id.copy_from_slice(&buf[9..21]);

    let username_len = u16::from_be_bytes([buf[21], buf[22]]) as usize;
    let mac_offset = 23 + username_len;
    if buf.len() != mac_offset + MAC_LEN {
        return None;
    }

    let key = hmac::Key::new(hmac::HMAC_SHA256, pwd.as_bytes());
    hmac::verify(&key, &buf[..mac_offset], &buf[mac_offset..]).ok()?;

    let username = std::str::from_utf8(&buf[23..mac_offset]).ok()?.to_string();
    Some(CheckMessage {
        kind,
        txn_id,
        username,
    })
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_roundtrip_authenticates() {
        let txn_id = [5u8; 12];
        let msg = encode_check(CHECK_REQUEST, &txn_id, "peer:me", "secret-pwd");

        let parsed = verify_check(&msg, "secret-pwd").expect("valid check");
        assert_eq!(parsed.kind, CHECK_REQUEST);
        assert_eq!(parsed.txn_id, txn_id);
        assert_eq!(parsed.username, "peer:me");
    }

    #[test]
    fn check_rejects_wrong_password() {
        let txn_id = [5u8; 12];
        let msg = encode_check(CHECK_REQUEST, &txn_id, "peer:me", "secret-pwd");

        assert!(verify_check(&msg, "other-pwd").is_none());
    }

    #[test]
    fn check_rejects_tampering() {
        let txn_id = [5u8; 12];
        let mut msg = encode_check(CHECK_REQUEST, &txn_id, "peer:me", "secret-pwd");
        msg[9] ^= 0xff;

        assert!(verify_check(&msg, "secret-pwd").is_none());
    }

    #[test]
    fn close_is_idempotent() {
        let mut agent = IceAgent::new(IceConfig::default());
        agent.close();
        agent.close();
        assert_eq!(agent.state(), AgentState::Closed);
    }
}
