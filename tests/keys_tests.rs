// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pairing Key Management Tests

use std::time::{SystemTime, UNIX_EPOCH};

use clonr_sync::keys::{
    create_connection, decode_shared_key, decrypt_connection, encode_for_sharing,
    generate_standalone_key, rotate_key, validate_key, KeyError, SyncStatus,
    DEFAULT_EXPIRATION_DAYS, KEY_PREFIX,
};
use clonr_sync::keys::standalone::verify_api_key;

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// =============================================================================
// Generation
// =============================================================================

#[test]
fn generated_key_carries_endpoint_and_secrets() {
    let (key, config) = generate_standalone_key("203.0.113.5", 50052).unwrap();

    assert_eq!(key.host, "203.0.113.5");
    assert_eq!(key.port, 50052);
    assert!(!key.api_key.is_empty());
    assert!(!key.refresh_token.is_empty());
    assert_eq!(key.encryption_key_hint.len(), 4);
    assert_eq!(key.instance_id, config.instance_id);

    let expected_expiry = now_unix() + DEFAULT_EXPIRATION_DAYS * 24 * 60 * 60;
    assert!(key.expires_at.abs_diff(expected_expiry) <= 1);
}

#[test]
fn config_never_holds_the_raw_api_key() {
    let (key, config) = generate_standalone_key("example.net", 50052).unwrap();

    let serialized = serde_json::to_string(&config).unwrap();
    assert!(!serialized.contains(&key.api_key));
    assert!(!serialized.contains(&key.refresh_token));

    // But the hash still verifies the real key.
    assert!(verify_api_key(&config, &key.api_key));
    assert!(!verify_api_key(&config, "not-the-key"));
}

#[test]
fn generation_rejects_port_zero() {
    assert!(matches!(
        generate_standalone_key("example.net", 0),
        Err(KeyError::InvalidPort)
    ));
}

#[test]
fn keys_are_unique_per_generation() {
    let (a, _) = generate_standalone_key("example.net", 50052).unwrap();
    let (b, _) = generate_standalone_key("example.net", 50052).unwrap();

    assert_ne!(a.instance_id, b.instance_id);
    assert_ne!(a.api_key, b.api_key);
    assert_ne!(a.refresh_token, b.refresh_token);
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn expired_key_fails_validation() {
    let (mut key, _) = generate_standalone_key("example.net", 50052).unwrap();
    key.expires_at = now_unix() - 10;

    assert!(matches!(validate_key(&key), Err(KeyError::Expired)));
}

#[test]
fn newer_version_fails_validation() {
    let (mut key, _) = generate_standalone_key("example.net", 50052).unwrap();
    key.version = 99;

    assert!(matches!(
        validate_key(&key),
        Err(KeyError::UnsupportedVersion { found: 99, .. })
    ));
}

#[test]
fn missing_fields_fail_validation() {
    let (mut key, _) = generate_standalone_key("example.net", 50052).unwrap();
    key.host.clear();
    assert!(matches!(
        validate_key(&key),
        Err(KeyError::MissingField("host"))
    ));

    let (mut key, _) = generate_standalone_key("example.net", 50052).unwrap();
    key.api_key.clear();
    assert!(matches!(
        validate_key(&key),
        Err(KeyError::MissingField("api_key"))
    ));
}

// =============================================================================
// Share encoding
// =============================================================================

#[test]
fn share_encoding_roundtrips() {
    let (key, _) = generate_standalone_key("203.0.113.5", 50052).unwrap();

    let shared = encode_for_sharing(&key).unwrap();
    assert!(shared.starts_with(KEY_PREFIX));

    let decoded = decode_shared_key(&shared).unwrap();
    assert_eq!(decoded.instance_id, key.instance_id);
    assert_eq!(decoded.host, key.host);
    assert_eq!(decoded.port, key.port);
    assert_eq!(decoded.api_key, key.api_key);
}

#[test]
fn raw_json_is_accepted_on_decode() {
    let (key, _) = generate_standalone_key("203.0.113.5", 50052).unwrap();

    let json = serde_json::to_string(&key).unwrap();
    let decoded = decode_shared_key(&json).unwrap();

    assert_eq!(decoded.instance_id, key.instance_id);
    assert_eq!(decoded.host, key.host);
    assert_eq!(decoded.port, key.port);
}

#[test]
fn garbage_input_fails_decoding() {
    assert!(decode_shared_key("not a key at all").is_err());
    assert!(decode_shared_key("CLONR-SYNC:!!!not-base58!!!").is_err());
}

// =============================================================================
// Rotation
// =============================================================================

#[test]
fn rotation_keeps_instance_id_and_invalidates_old_pairings() {
    let (old_key, old_config) = generate_standalone_key("example.net", 50052).unwrap();
    let (new_key, new_config) = rotate_key(&old_config, "example.net", 50052).unwrap();

    assert_eq!(new_key.instance_id, old_key.instance_id);
    assert_ne!(new_key.api_key, old_key.api_key);

    // The old api_key no longer verifies against the rotated config.
    assert!(!verify_api_key(&new_config, &old_key.api_key));
    assert!(verify_api_key(&new_config, &new_key.api_key));
}

// =============================================================================
// Connections
// =============================================================================

#[test]
fn connection_roundtrips_under_local_password() {
    let (key, _) = generate_standalone_key("example.net", 50052).unwrap();
    let connection = create_connection("work-laptop", &key, "local secret").unwrap();

    assert_eq!(connection.name, "work-laptop");
    assert_eq!(connection.instance_id, key.instance_id);
    assert_eq!(connection.sync_status, SyncStatus::NeverSynced);

    let secrets = decrypt_connection(&connection, "local secret").unwrap();
    assert_eq!(secrets.api_key, key.api_key);
    assert_eq!(secrets.refresh_token, key.refresh_token);
}

#[test]
fn wrong_local_password_fails_closed() {
    let (key, _) = generate_standalone_key("example.net", 50052).unwrap();
    let connection = create_connection("work-laptop", &key, "local secret").unwrap();

    assert!(matches!(
        decrypt_connection(&connection, "not the secret"),
        Err(KeyError::WrongPassword)
    ));
}

#[test]
fn connection_creation_validates_the_key_first() {
    let (mut key, _) = generate_standalone_key("example.net", 50052).unwrap();
    key.expires_at = now_unix() - 1;

    assert!(matches!(
        create_connection("name", &key, "pw"),
        Err(KeyError::Expired)
    ));
}

#[test]
fn connection_record_does_not_leak_secrets() {
    let (key, _) = generate_standalone_key("example.net", 50052).unwrap();
    let connection = create_connection("work-laptop", &key, "local secret").unwrap();

    let serialized = serde_json::to_string(&connection).unwrap();
    assert!(!serialized.contains(&key.api_key));
    assert!(!serialized.contains(&key.refresh_token));
    assert!(!serialized.contains("local secret"));
}
