// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connectivity Tests
//!
//! Runs STUN discovery against a local mock server and punches a loopback
//! channel between two agents. No external network access is required.

use std::net::{SocketAddr, UdpSocket};
use std::thread;
use std::time::Duration;

use clonr_sync::connectivity::{
    AgentState, ConnectivityError, IceAgent, IceConfig, IceCredentials, NatType, StunClient,
    StunConfig,
};

// =============================================================================
// Mock STUN server
// =============================================================================

const MAGIC_COOKIE: u32 = 0x2112_A442;

/// Answers binding requests with a fixed XOR-MAPPED-ADDRESS, `answers` times.
fn spawn_stun_server(mapped: SocketAddr, answers: usize) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind mock STUN server");
    let server_addr = socket.local_addr().unwrap();

    thread::spawn(move || {
        let mut buf = [0u8; 576];
        for _ in 0..answers {
            let Ok((len, from)) = socket.recv_from(&mut buf) else {
                return;
            };
            if len < 20 {
                continue;
            }
            let mut txn_id = [0u8; 12];
            txn_id.copy_from_slice(&buf[8..20]);
            let response = binding_success(&txn_id, mapped);
            let _ = socket.send_to(&response, from);
        }
    });

    server_addr
}

fn binding_success(txn_id: &[u8; 12], mapped: SocketAddr) -> Vec<u8> {
    let SocketAddr::V4(v4) = mapped else {
        panic!("mock server only maps IPv4");
    };
    let cookie = MAGIC_COOKIE.to_be_bytes();

    let mut value = vec![0x00, 0x01];
    value.extend_from_slice(&(v4.port() ^ (MAGIC_COOKIE >> 16) as u16).to_be_bytes());
    for (octet, mask) in v4.ip().octets().iter().zip(cookie.iter()) {
        value.push(octet ^ mask);
    }

    let mut msg = Vec::new();
    msg.extend_from_slice(&0x0101u16.to_be_bytes());
    msg.extend_from_slice(&((4 + value.len()) as u16).to_be_bytes());
    msg.extend_from_slice(&cookie);
    msg.extend_from_slice(txn_id);
    msg.extend_from_slice(&0x0020u16.to_be_bytes());
    msg.extend_from_slice(&(value.len() as u16).to_be_bytes());
    msg.extend_from_slice(&value);
    msg
}

fn stun_config(servers: Vec<String>) -> StunConfig {
    StunConfig {
        servers,
        timeout: Duration::from_millis(500),
        cache_ttl: Duration::from_secs(300),
    }
}

// =============================================================================
// STUN discovery
// =============================================================================

#[test]
fn discovery_parses_the_mocked_mapping() {
    let mapped: SocketAddr = "203.0.113.9:42424".parse().unwrap();
    let server = spawn_stun_server(mapped, 1);

    let client = StunClient::new(stun_config(vec![server.to_string()]));
    let result = client.discover_public_addr().unwrap();

    assert_eq!(result.public_addr, mapped);
    // Mapped address differs from any local interface: single probe stays
    // undetermined.
    assert_eq!(result.nat_type, NatType::Unknown);
}

#[test]
fn discovery_result_is_cached() {
    let mapped: SocketAddr = "203.0.113.9:42424".parse().unwrap();
    // The mock answers exactly once; the second call must come from cache.
    let server = spawn_stun_server(mapped, 1);

    let client = StunClient::new(stun_config(vec![server.to_string()]));
    let first = client.discover_public_addr().unwrap();
    let second = client.discover_public_addr().unwrap();

    assert_eq!(first.public_addr, second.public_addr);
}

#[test]
fn cache_expires_by_ttl() {
    let mapped: SocketAddr = "203.0.113.9:42424".parse().unwrap();
    let server = spawn_stun_server(mapped, 2);

    let mut config = stun_config(vec![server.to_string()]);
    config.cache_ttl = Duration::ZERO;
    let client = StunClient::new(config);

    client.discover_public_addr().unwrap();
    // TTL zero: the entry is already stale, so this hits the server again.
    client.discover_public_addr().unwrap();
}

#[test]
fn discovery_falls_through_dead_servers() {
    let mapped: SocketAddr = "203.0.113.9:42424".parse().unwrap();
    let live = spawn_stun_server(mapped, 1);
    // A bound-but-silent socket stands in for an unreachable server.
    let dead = UdpSocket::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();

    let client = StunClient::new(stun_config(vec![
        dead_addr.to_string(),
        live.to_string(),
    ]));

    let result = client.discover_public_addr().unwrap();
    assert_eq!(result.public_addr, mapped);
}

#[test]
fn discovery_propagates_failure_when_all_servers_fail() {
    let dead = UdpSocket::bind("127.0.0.1:0").unwrap();
    let dead_addr = dead.local_addr().unwrap();

    let mut config = stun_config(vec![dead_addr.to_string()]);
    config.timeout = Duration::from_millis(100);
    let client = StunClient::new(config);

    assert!(client.discover_public_addr().is_err());
}

#[test]
fn agreeing_servers_classify_full_cone() {
    let mapped: SocketAddr = "203.0.113.9:42424".parse().unwrap();
    let a = spawn_stun_server(mapped, 1);
    let b = spawn_stun_server(mapped, 1);

    let client = StunClient::new(stun_config(vec![a.to_string(), b.to_string()]));
    assert_eq!(client.detect_nat().unwrap(), NatType::FullCone);
}

#[test]
fn disagreeing_servers_classify_symmetric() {
    let a = spawn_stun_server("203.0.113.9:42424".parse().unwrap(), 1);
    let b = spawn_stun_server("203.0.113.9:42425".parse().unwrap(), 1);

    let client = StunClient::new(stun_config(vec![a.to_string(), b.to_string()]));
    assert_eq!(client.detect_nat().unwrap(), NatType::Symmetric);
}

// =============================================================================
// ICE agent
// =============================================================================

fn ice_config() -> IceConfig {
    IceConfig {
        // No STUN servers: host candidates only, no network dependency.
        stun: stun_config(Vec::new()),
        gather_timeout: Duration::from_millis(200),
        connect_timeout: Duration::from_secs(5),
        check_interval: Duration::from_millis(50),
    }
}

/// Rewrites gathered candidates to loopback so checks stay on-host.
fn loopback_credentials(creds: &IceCredentials) -> IceCredentials {
    let mut creds = creds.clone();
    for candidate in &mut creds.candidates {
        candidate.ip = "127.0.0.1".parse().unwrap();
    }
    creds
}

#[test]
fn agents_punch_a_loopback_channel() {
    let mut active = IceAgent::new(ice_config());
    let mut passive = IceAgent::new(ice_config());

    let active_creds = loopback_credentials(active.gather().unwrap());
    let passive_creds = loopback_credentials(passive.gather().unwrap());
    assert!(!active_creds.candidates.is_empty());

    let acceptor = thread::spawn(move || {
        let connection = passive.accept(&active_creds).unwrap();

        let mut buf = [0u8; 64];
        let len = connection.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"ping");
        connection.send(b"pong").unwrap();
    });

    let connection = active.connect(&passive_creds).unwrap();
    assert_eq!(active.state(), AgentState::Connected);

    connection.send(b"ping").unwrap();
    connection
        .set_recv_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let mut buf = [0u8; 64];
    let len = connection.recv(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"pong");

    acceptor.join().unwrap();
}

#[test]
fn connect_times_out_against_a_silent_peer() {
    // A bound socket that never answers checks.
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let remote = IceCredentials {
        ufrag: "remoteuf".to_string(),
        pwd: "remote-password-material".to_string(),
        candidates: vec![clonr_sync::connectivity::IceCandidate::host(
            silent.local_addr().unwrap(),
        )],
    };

    let mut config = ice_config();
    config.connect_timeout = Duration::from_millis(400);
    let mut agent = IceAgent::new(config);
    agent.gather().unwrap();

    assert!(matches!(
        agent.connect(&remote),
        Err(ConnectivityError::Timeout)
    ));
    // The attempt unwinds; the gathered candidates remain usable.
    assert!(agent.credentials().is_ok());
}

#[test]
fn closed_agent_refuses_connect() {
    let mut agent = IceAgent::new(ice_config());
    agent.gather().unwrap();
    let creds = agent.credentials().unwrap().clone();

    agent.close();
    agent.close();
    assert_eq!(agent.state(), AgentState::Closed);

    assert!(matches!(
        agent.connect(&creds),
        Err(ConnectivityError::Closed)
    ));
}

#[test]
fn gathering_twice_is_an_error() {
    let mut agent = IceAgent::new(ice_config());
    agent.gather().unwrap();
    assert!(matches!(
        agent.gather(),
        Err(ConnectivityError::InvalidState(_))
    ));
}
