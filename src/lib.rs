//! Clonr Sync Core Library
//!
//! Lets two independent Clonr installations pair directly — no shared
//! backend — and exchange encrypted application state. Cryptographic
//! primitives use the audited `ring` crate, with Argon2id for memory-hard
//! password derivation.
//!
//! The moving parts, leaves first: a layered key-derivation/AEAD core
//! ([`crypto`]), sharable pairing keys and client connections ([`keys`]),
//! the challenge-response pairing handshake ([`handshake`]), STUN/ICE
//! connectivity ([`connectivity`]), the encrypted repository archive format
//! ([`archive`]), and the mailbox of received encrypted items ([`store`]).

pub mod archive;
pub mod connectivity;
pub mod crypto;
pub mod handshake;
pub mod keys;
pub mod store;

pub use archive::{
    create_repo_archive, extract_repo_archive, list_archive_contents, ArchiveError,
    ArchiveManifest, ArchiveOptions, RepoEntry,
};
pub use connectivity::{
    CandidateKind, ConnectivityError, IceAgent, IceCandidate, IceConfig, IceConnection,
    IceCredentials, NatType, StunClient, StunConfig, StunResult,
};
pub use crypto::{
    decrypt, decrypt_with_key, encrypt, encrypt_with_key, EncryptionError, SymmetricKey,
};
pub use handshake::{
    ClientRegistration, ClientStatus, Handshake, HandshakeError, HandshakeState, MachineInfo,
    RegisteredClient, ServerHandshake,
};
pub use keys::{
    create_connection, decode_shared_key, decrypt_connection, encode_for_sharing,
    generate_standalone_key, rotate_key, validate_key, KeyError, StandaloneConfig,
    StandaloneConnection, StandaloneKey,
};
pub use store::{
    DecryptAllOutcome, EncryptionKeyManager, KeyedStore, MemoryStore, SqliteStore, StoreError,
    SyncState, SyncStore, SyncedData,
};
