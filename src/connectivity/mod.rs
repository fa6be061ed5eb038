// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! NAT Traversal and Peer Connectivity
//!
//! STUN-based public-address discovery plus an ICE-style agent that opens a
//! direct UDP channel between paired instances. Credentials and candidates
//! are exchanged out-of-band as JSON; the transport of that JSON is external
//! to this crate.

pub mod candidate;
pub mod error;
pub mod ice;
pub mod stun;

pub use candidate::{CandidateKind, IceCandidate, IceCredentials};
pub use error::ConnectivityError;
pub use ice::{AgentState, IceAgent, IceConfig, IceConnection};
pub use stun::{NatType, StunClient, StunConfig, StunResult, DEFAULT_STUN_SERVERS};
