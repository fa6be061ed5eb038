// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! STUN Public Address Discovery
//!
//! Sends RFC 5389 binding requests over UDP to an ordered list of servers,
//! parses XOR-MAPPED-ADDRESS (falling back to legacy MAPPED-ADDRESS), and
//! classifies the NAT from one or two mapping probes. Results are cached
//! under a read-write lock with lazy TTL expiry; there is no background
//! sweep.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::error::ConnectivityError;

/// Well-known public STUN servers, tried in order.
pub const DEFAULT_STUN_SERVERS: &[&str] = &[
    "stun.l.google.com:19302",
    "stun1.l.google.com:19302",
    "stun.cloudflare.com:3478",
];

/// STUN message header length.
const HEADER_LEN: usize = 20;
/// RFC 5389 magic cookie.
const MAGIC_COOKIE: u32 = 0x2112_A442;
/// Binding request message type.
const BINDING_REQUEST: u16 = 0x0001;
/// Binding success response message type.
const BINDING_SUCCESS: u16 = 0x0101;
/// MAPPED-ADDRESS attribute (legacy).
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
/// XOR-MAPPED-ADDRESS attribute.
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;

/// Inferred NAT behavior.
///
/// Restricted-cone and port-restricted classification needs more probes than
/// the two binding queries made here, so those cases surface as `Unknown`
/// rather than a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NatType {
    /// Local and public endpoints are equal; no NAT in the path.
    None,
    /// Two servers observed the same public mapping.
    FullCone,
    /// Two servers observed different public mappings.
    Symmetric,
    /// A single probe saw a differing endpoint; behavior undetermined.
    Unknown,
}

/// Result of a discovery run.
#[derive(Debug, Clone)]
pub struct StunResult {
    pub public_addr: SocketAddr,
    pub local_addr: SocketAddr,
    pub nat_type: NatType,
    pub latency: Duration,
}

/// STUN client configuration.
#[derive(Debug, Clone)]
pub struct StunConfig {
    /// Servers tried in order until one answers.
    pub servers: Vec<String>,
    /// Per-query read timeout.
    pub timeout: Duration,
    /// How long a discovery result stays valid.
    pub cache_ttl: Duration,
}

impl Default for StunConfig {
    fn default() -> Self {
        StunConfig {
            servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(3),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

struct CachedResult {
    result: StunResult,
    fetched_at: Instant,
}

/// STUN-based public address and NAT discovery.
pub struct StunClient {
    config: StunConfig,
    cache: RwLock<Option<CachedResult>>,
}

impl StunClient {
    pub fn new(config: StunConfig) -> Self {
        StunClient {
            config,
            cache: RwLock::new(None),
        }
    }

    /// Discovers this host's public endpoint.
    ///
    /// Returns the cached result while it is fresh. Otherwise tries each
    /// configured server in order and propagates the last error if all fail.
    pub fn discover_public_addr(&self) -> Result<StunResult, ConnectivityError> {
        if let Some(cached) = self.cached() {
            return Ok(cached);
        }

        if self.config.servers.is_empty() {
            return Err(ConnectivityError::NoServers);
        }

        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(self.config.timeout))?;
        let local_addr = SocketAddr::new(local_ip(), socket.local_addr()?.port());

        let mut last_err = ConnectivityError::NoServers;
        for server in &self.config.servers {
            match query_binding(&socket, server, self.config.timeout) {
                Ok((public_addr, latency)) => {
                    debug!(%server, %public_addr, ?latency, "STUN binding succeeded");
                    let nat_type = classify_nat(local_addr.ip(), &[public_addr]);
                    let result = StunResult {
                        public_addr,
                        local_addr,
                        nat_type,
                        latency,
                    };
                    self.store(result.clone());
                    return Ok(result);
                }
                Err(err) => {
                    warn!(%server, error = %err, "STUN binding failed");
                    last_err = err;
                }
            }
        }

        Err(last_err)
    }

    /// Classifies the NAT by comparing mappings from two servers.
    ///
    /// Falls back to the single-probe classification when only one server
    /// answers. Updates the cached result's NAT type.
    pub fn detect_nat(&self) -> Result<NatType, ConnectivityError> {
        if self.config.servers.is_empty() {
            return Err(ConnectivityError::NoServers);
        }

        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket.set_read_timeout(Some(self.config.timeout))?;
        let local = local_ip();

        let mut mappings = Vec::new();
        let mut last_err = ConnectivityError::NoServers;
        for server in self.config.servers.iter().take(2) {
            match query_binding(&socket, server, self.config.timeout) {
                Ok((mapped, _)) => mappings.push(mapped),
                Err(err) => {
                    warn!(%server, error = %err, "STUN probe failed");
                    last_err = err;
                }
            }
        }

        if mappings.is_empty() {
            return Err(last_err);
        }

        let nat_type = classify_nat(local, &mappings);

        let mut cache = self.cache.write().expect("stun cache lock");
        if let Some(cached) = cache.as_mut() {
            cached.result.nat_type = nat_type;
        }

        Ok(nat_type)
    }

    /// Drops any cached discovery result.
    pub fn clear_cache(&self) {
        *self.cache.write().expect("stun cache lock") = None;
    }

    fn cached(&self) -> Option<StunResult> {
        let cache = self.cache.read().expect("stun cache lock");
        match cache.as_ref() {
            Some(entry) if entry.fetched_at.elapsed() <= self.config.cache_ttl => {
                Some(entry.result.clone())
            }
            _ => None,
        }
    }

    fn store(&self, result: StunResult) {
        *self.cache.write().expect("stun cache lock") = Some(CachedResult {
            result,
            fetched_at: Instant::now(),
        });
    }
}

/// Pure NAT classification over observed mappings.
///
/// Equal local and public address means no NAT. With two probes, a stable
/// mapping is a full cone, a differing one symmetric. A single differing
/// probe stays `Unknown`.
pub fn classify_nat(local: IpAddr, mappings: &[SocketAddr]) -> NatType {
    if mappings.is_empty() {
        return NatType::Unknown;
    }
    if mappings.iter().all(|m| m.ip() == local) {
        return NatType::None;
    }
    if mappings.len() < 2 {
        return NatType::Unknown;
    }
    if mappings[0] == mappings[1] {
        NatType::FullCone
    } else {
        NatType::Symmetric
    }
}

/// Sends one binding request on `socket` and returns the mapped address
/// plus the query latency.
pub(crate) fn query_binding(
    socket: &UdpSocket,
    server: &str,
    timeout: Duration,
) -> Result<(SocketAddr, Duration), ConnectivityError> {
    let server_addr = server
        .to_socket_addrs()
        .map_err(|e| ConnectivityError::StunFailed(format!("{server}: {e}")))?
        .next()
        .ok_or_else(|| ConnectivityError::StunFailed(format!("{server}: no address")))?;

    let txn_id: [u8; 12] = rand::random();
    let request = encode_binding_request(&txn_id);

    let started = Instant::now();
    socket.send_to(&request, server_addr)?;

    let deadline = started + timeout;
    let mut buf = [0u8; 576];
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ConnectivityError::Timeout);
        }
        socket.set_read_timeout(Some(remaining))?;

        let (len, _from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if would_block(&e) => return Err(ConnectivityError::Timeout),
            Err(e) => return Err(ConnectivityError::Io(e)),
        };

        // Unrelated traffic on the socket is skipped, not fatal.
        if let Ok(mapped) = parse_binding_response(&buf[..len], &txn_id) {
            return Ok((mapped, started.elapsed()));
        }
    }
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// Encodes a binding request with the given transaction id.
pub(crate) fn encode_binding_request(txn_id: &[u8; 12]) -> [u8; HEADER_LEN] {
    let mut msg = [0u8; HEADER_LEN];
    msg[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
    // Attribute length stays zero for a bare binding request.
    msg[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
    msg[8..20].copy_from_slice(txn_id);
    msg
}

/// Parses a binding success response, preferring XOR-MAPPED-ADDRESS.
pub(crate) fn parse_binding_response(
    buf: &[u8],
    txn_id: &[u8; 12],
) -> Result<SocketAddr, ConnectivityError> {
    if buf.len() < HEADER_LEN {
        return Err(ConnectivityError::MalformedResponse);
    }

    let msg_type = u16::from_be_bytes([buf[0], buf[1]]);
    if msg_type != BINDING_SUCCESS {
        return Err(ConnectivityError::MalformedResponse);
    }

    let cookie = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    if cookie != MAGIC_COOKIE || &buf[8..20] != txn_id {
        return Err(ConnectivityError::MalformedResponse);
    }

    let msg_len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let attrs = &buf[HEADER_LEN..buf.len().min(HEADER_LEN + msg_len)];

    let mut mapped = None;
    let mut offset = 0;
    while offset + 4 <= attrs.len() {
        let attr_type = u16::from_be_bytes([attrs[offset], attrs[offset + 1]]);
        let attr_len = u16::from_be_bytes([attrs[offset + 2], attrs[offset + 3]]) as usize;
        let value_start = offset + 4;
        if value_start + attr_len > attrs.len() {
            break;
        }
        let value = &attrs[value_start..value_start + attr_len];

        match attr_type {
            ATTR_XOR_MAPPED_ADDRESS => {
                return decode_address(value, true, txn_id);
            }
            ATTR_MAPPED_ADDRESS => {
                mapped = decode_address(value, false, txn_id).ok();
            }
            _ => {}
        }

        // Attributes are padded to 4-byte boundaries.
        offset = value_start + attr_len.div_ceil(4) * 4;
    }

    mapped.ok_or(ConnectivityError::MalformedResponse)
}

fn decode_address(
    value: &[u8],
    xored: bool,
    txn_id: &[u8; 12],
) -> Result<SocketAddr, ConnectivityError> {
    if value.len() < 8 {
        return Err(ConnectivityError::MalformedResponse);
    }

    let family = value[1];
    let mut port = u16::from_be_bytes([value[2], value[3]]);
    if xored {
        port ^= (MAGIC_COOKIE >> 16) as u16;
    }

    let cookie = MAGIC_COOKIE.to_be_bytes();
    match family {
        0x01 => {
            let mut octets = [value[4], value[5], value[6], value[7]];
            if xored {
                for (octet, mask) in octets.iter_mut().zip(cookie.iter()) {
                    *octet ^= mask;
                }
            }
            Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(octets)), port))
        }
        0x02 => {
            if value.len() < 20 {
                return Err(ConnectivityError::MalformedResponse);
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            if xored {
                let mut mask = [0u8; 16];
                mask[..4].copy_from_slice(&cookie);
                mask[4..].copy_from_slice(txn_id);
                for (octet, m) in octets.iter_mut().zip(mask.iter()) {
                    *octet ^= m;
                }
            }
            Ok(SocketAddr::new(
                IpAddr::V6(std::net::Ipv6Addr::from(octets)),
                port,
            ))
        }
        _ => Err(ConnectivityError::MalformedResponse),
    }
}

/// Best-effort local interface address; loopback when undeterminable.
pub(crate) fn local_ip() -> IpAddr {
    UdpSocket::bind(("0.0.0.0", 0))
        .and_then(|socket| {
            socket.connect(("8.8.8.8", 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_with_attr(txn_id: &[u8; 12], attr_type: u16, value: &[u8]) -> Vec<u8> {
        let padded_len = value.len().div_ceil(4) * 4;
        let mut msg = Vec::new();
        msg.extend_from_slice(&BINDING_SUCCESS.to_be_bytes());
        msg.extend_from_slice(&((4 + padded_len) as u16).to_be_bytes());
        msg.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        msg.extend_from_slice(txn_id);
        msg.extend_from_slice(&attr_type.to_be_bytes());
        msg.extend_from_slice(&(value.len() as u16).to_be_bytes());
        msg.extend_from_slice(value);
        msg.resize(msg.len() + padded_len - value.len(), 0);
        msg
    }

    fn xor_mapped_v4(addr: Ipv4Addr, port: u16) -> Vec<u8> {
        let cookie = MAGIC_COOKIE.to_be_bytes();
        let xport = port ^ (MAGIC_COOKIE >> 16) as u16;
        let mut value = vec![0x00, 0x01];
        value.extend_from_slice(&xport.to_be_bytes());
        for (octet, mask) in addr.octets().iter().zip(cookie.iter()) {
            value.push(octet ^ mask);
        }
        value
    }

    #[test]
    fn parses_xor_mapped_address() {
        let txn_id = [7u8; 12];
        let value = xor_mapped_v4(Ipv4Addr::new(203, 0, 113, 5), 50052);
        let msg = response_with_attr(&txn_id, ATTR_XOR_MAPPED_ADDRESS, &value);

        let mapped = parse_binding_response(&msg, &txn_id).unwrap();
        assert_eq!(mapped, "203.0.113.5:50052".parse().unwrap());
    }

    #[test]
    fn falls_back_to_legacy_mapped_address() {
        let txn_id = [9u8; 12];
        let mut value = vec![0x00, 0x01];
        value.extend_from_slice(&41000u16.to_be_bytes());
        value.extend_from_slice(&[198, 51, 100, 7]);
        let msg = response_with_attr(&txn_id, ATTR_MAPPED_ADDRESS, &value);

        let mapped = parse_binding_response(&msg, &txn_id).unwrap();
        assert_eq!(mapped, "198.51.100.7:41000".parse().unwrap());
    }

    #[test]
    fn rejects_mismatched_transaction_id() {
        let txn_id = [1u8; 12];
        let value = xor_mapped_v4(Ipv4Addr::new(203, 0, 113, 5), 50052);
        let msg = response_with_attr(&txn_id, ATTR_XOR_MAPPED_ADDRESS, &value);

        assert!(parse_binding_response(&msg, &[2u8; 12]).is_err());
    }

    #[test]
    fn rejects_non_success_response() {
        let txn_id = [3u8; 12];
        let mut msg = response_with_attr(&txn_id, ATTR_XOR_MAPPED_ADDRESS, &[0u8; 8]);
        msg[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());

        assert!(parse_binding_response(&msg, &txn_id).is_err());
    }

    #[test]
    fn classify_equal_endpoints_is_no_nat() {
        let local: IpAddr = "192.0.2.10".parse().unwrap();
        let mappings = ["192.0.2.10:5000".parse().unwrap()];
        assert_eq!(classify_nat(local, &mappings), NatType::None);
    }

    #[test]
    fn classify_stable_mapping_is_full_cone() {
        let local: IpAddr = "10.0.0.2".parse().unwrap();
        let mapped: SocketAddr = "203.0.113.5:40000".parse().unwrap();
        assert_eq!(classify_nat(local, &[mapped, mapped]), NatType::FullCone);
    }

    #[test]
    fn classify_shifting_mapping_is_symmetric() {
        let local: IpAddr = "10.0.0.2".parse().unwrap();
        let mappings = [
            "203.0.113.5:40000".parse().unwrap(),
            "203.0.113.5:40001".parse().unwrap(),
        ];
        assert_eq!(classify_nat(local, &mappings), NatType::Symmetric);
    }

    #[test]
    fn classify_single_differing_probe_is_unknown() {
        let local: IpAddr = "10.0.0.2".parse().unwrap();
        let mappings = ["203.0.113.5:40000".parse().unwrap()];
        assert_eq!(classify_nat(local, &mappings), NatType::Unknown);
    }
}
