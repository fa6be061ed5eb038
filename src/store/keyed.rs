// SPDX-FileCopyrightText: 2026 Clonr Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Keyed Store Contract
//!
//! The relational store proper (schema, migrations) belongs to the host
//! application; this crate only consumes a plain keyed get/put/list contract.
//! Two implementations are provided: an in-memory map for tests and a
//! single-table SQLite store.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::StoreError;

/// Plain keyed get/put/list/remove contract.
///
/// Keys are flat strings; callers namespace them with `/`-separated prefixes
/// (e.g. `client/<uuid>`). Values are opaque bytes, typically JSON.
pub trait KeyedStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Lists `(key, value)` pairs whose key starts with `prefix`, key-ordered.
    fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;
    /// Removes a key. Returns true if it existed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// In-memory keyed store.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyedStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("memory store lock")
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("memory store lock")
            .get(key)
            .cloned())
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("memory store lock")
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .entries
            .lock()
            .expect("memory store lock")
            .remove(key)
            .is_some())
    }
}

/// SQLite-backed keyed store (single `kv` table).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Opens an in-memory store. Mostly useful in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            )",
            [],
        )?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyedStore for SqliteStore {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("sqlite store lock");
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn.lock().expect("sqlite store lock");
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let conn = self.conn.lock().expect("sqlite store lock");
        let mut stmt =
            conn.prepare("SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key")?;
        // Upper bound via prefix successor; avoids LIKE-escaping issues.
        let mut upper = prefix.to_string();
        match upper.pop() {
            Some(last) => upper.push((last as u8 + 1) as char),
            None => {
                // Empty prefix: full scan.
                let mut stmt = conn.prepare("SELECT key, value FROM kv ORDER BY key")?;
                let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
                return rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from);
            }
        }
        let rows = stmt.query_map(params![prefix, upper], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("sqlite store lock");
        let affected = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(store: &dyn KeyedStore) {
        store.put("client/a", b"1").unwrap();
        store.put("client/b", b"2").unwrap();
        store.put("config/x", b"3").unwrap();

        assert_eq!(store.get("client/a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("missing").unwrap(), None);

        let clients = store.list("client/").unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].0, "client/a");

        assert!(store.remove("client/a").unwrap());
        assert!(!store.remove("client/a").unwrap());
        assert_eq!(store.list("client/").unwrap().len(), 1);
    }

    #[test]
    fn memory_store_contract() {
        exercise(&MemoryStore::new());
    }

    #[test]
    fn sqlite_store_contract() {
        exercise(&SqliteStore::open_in_memory().unwrap());
    }
}
