// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Data-at-Rest Key Management
//!
//! Gates a server instance's own storage encryption key behind an operator
//! password. Independent from any per-client pairing key: revoking a pairing
//! never touches the at-rest key, and vice versa.

use serde::{Deserialize, Serialize};

use super::{KeyedStore, StoreError};
use crate::crypto::{
    compute_key_hint, derive_key_argon2id, generate_salt, hash_password, verify_password,
    SymmetricKey,
};

/// Storage key for the persisted parameters.
const PARAMS_KEY: &str = "atrest/params";

/// Persisted verification and derivation parameters.
///
/// Only salts, the verification hash and the non-secret hint are stored.
/// The at-rest key itself exists only transiently after [`EncryptionKeyManager::unlock`].
#[derive(Debug, Serialize, Deserialize)]
struct AtRestParams {
    verify_hash: Vec<u8>,
    verify_salt: Vec<u8>,
    derive_salt: Vec<u8>,
    key_hint: String,
}

/// Server-side data-at-rest password manager.
pub struct EncryptionKeyManager<S: KeyedStore> {
    store: S,
}

impl<S: KeyedStore> EncryptionKeyManager<S> {
    pub fn new(store: S) -> Self {
        EncryptionKeyManager { store }
    }

    /// Returns true if an operator password has been set.
    pub fn is_initialized(&self) -> Result<bool, StoreError> {
        Ok(self.store.get(PARAMS_KEY)?.is_some())
    }

    /// Sets the operator password and returns the derived at-rest key.
    ///
    /// Fails if already initialized; changing the password would orphan data
    /// encrypted under the previous key.
    pub fn init(&self, operator_password: &str) -> Result<SymmetricKey, StoreError> {
        if self.is_initialized()? {
            return Err(StoreError::AlreadyInitialized);
        }

        let (verify_hash, verify_salt) =
            hash_password(operator_password).map_err(|_| StoreError::Serialization)?;
        let derive_salt = generate_salt().to_vec();
        let key = derive_key_argon2id(operator_password.as_bytes(), &derive_salt)
            .map_err(|_| StoreError::Serialization)?;

        let params = AtRestParams {
            verify_hash,
            verify_salt,
            derive_salt,
            key_hint: compute_key_hint(&key),
        };
        let encoded = serde_json::to_vec(&params).map_err(|_| StoreError::Serialization)?;
        self.store.put(PARAMS_KEY, &encoded)?;

        Ok(key)
    }

    /// Verifies the operator password and returns the at-rest key.
    ///
    /// Fails closed with a generic error on mismatch.
    pub fn unlock(&self, operator_password: &str) -> Result<SymmetricKey, StoreError> {
        let params = self.load()?;

        if !verify_password(operator_password, &params.verify_salt, &params.verify_hash) {
            return Err(StoreError::DecryptionFailed);
        }

        derive_key_argon2id(operator_password.as_bytes(), &params.derive_salt)
            .map_err(|_| StoreError::DecryptionFailed)
    }

    /// Verifies the operator password without deriving the key.
    pub fn verify(&self, operator_password: &str) -> Result<bool, StoreError> {
        let params = self.load()?;
        Ok(verify_password(
            operator_password,
            &params.verify_salt,
            &params.verify_hash,
        ))
    }

    /// Returns the non-secret hint for the at-rest key.
    pub fn key_hint(&self) -> Result<String, StoreError> {
        Ok(self.load()?.key_hint)
    }

    fn load(&self) -> Result<AtRestParams, StoreError> {
        let encoded = self
            .store
            .get(PARAMS_KEY)?
            .ok_or(StoreError::NotInitialized)?;
        serde_json::from_slice(&encoded).map_err(|_| StoreError::Serialization)
    }
}
