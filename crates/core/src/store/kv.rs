//! Key-value cache operations.
//!
//! A Redis-shaped subset over two tables: plain keys (`kv`) and hashes
//! (`kv_hash`). Values are serde-JSON encoded, so any `Serialize` type can
//! be cached and read back as its `DeserializeOwned` counterpart.

use super::connection::Store;
use crate::Error;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

/// Hash holding downloaded sheet posts.
pub const SHEETS_HASH: &str = "sheets";

/// Raw cache key for a submission.
pub fn post_key(post_id: &str) -> String {
    format!("post:{post_id}")
}

/// Field of [`SHEETS_HASH`] for a sheet.
pub fn sheet_field(sheet_id: &str) -> String {
    format!("sheet:{sheet_id}")
}

/// Escape SQLite `GLOB` metacharacters so `s` matches only itself.
pub(crate) fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Translate a `*` glob into a case-sensitive SQLite `GLOB` pattern.
///
/// Only `*` is a wildcard; `?` and `[` match literally.
fn glob_pattern(pattern: &str) -> String {
    pattern.split('*').map(escape_glob).collect::<Vec<_>>().join("*")
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// Timestamp `days` days ago, or `InvalidInput` if it falls outside the representable range.
fn cutoff_timestamp(days: i64) -> Result<String, Error> {
    Duration::try_days(days)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .map(timestamp)
        .ok_or_else(|| Error::InvalidInput(format!("age of {days} days is out of range")))
}

fn stored_at_now() -> String {
    timestamp(Utc::now())
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

impl Store {
    /// Store a value under `key`, replacing any previous value.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), Error> {
        let key = key.to_string();
        let bytes = serde_json::to_vec(value)?;
        let now = stored_at_now();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv (key, value, stored_at) VALUES (?1, ?2, ?3)
                    ON CONFLICT(key) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at",
                    params![key, bytes, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Retrieve a cached value.
    ///
    /// Returns None if the key doesn't exist.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, Error> {
        let key = key.to_string();
        let bytes: Option<Vec<u8>> = self
            .conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
                    .optional()
                    .map_err(Error::from)
            })
            .await
            .map_err(Error::from)?;

        bytes.as_deref().map(decode).transpose()
    }

    /// Check if a key exists in the cache.
    pub async fn exists(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let found: bool =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM kv WHERE key = ?1)", params![key], |row| row.get(0))?;
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a key. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Keys matching a `*` glob, sorted.
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let glob = glob_pattern(pattern);
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM kv WHERE key GLOB ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![glob], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Set a field in a hash.
    pub async fn hset<T: Serialize + ?Sized>(&self, hash: &str, field: &str, value: &T) -> Result<(), Error> {
        let hash = hash.to_string();
        let field = field.to_string();
        let bytes = serde_json::to_vec(value)?;
        let now = stored_at_now();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO kv_hash (hash, field, value, stored_at) VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT(hash, field) DO UPDATE SET
                        value = excluded.value,
                        stored_at = excluded.stored_at",
                    params![hash, field, bytes, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the value of a field in a hash.
    pub async fn hget<T: DeserializeOwned>(&self, hash: &str, field: &str) -> Result<Option<T>, Error> {
        let hash = hash.to_string();
        let field = field.to_string();
        let bytes: Option<Vec<u8>> = self
            .conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                conn.query_row(
                    "SELECT value FROM kv_hash WHERE hash = ?1 AND field = ?2",
                    params![hash, field],
                    |row| row.get(0),
                )
                .optional()
                .map_err(Error::from)
            })
            .await
            .map_err(Error::from)?;

        bytes.as_deref().map(decode).transpose()
    }

    pub async fn hexists(&self, hash: &str, field: &str) -> Result<bool, Error> {
        let hash = hash.to_string();
        let field = field.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let found: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM kv_hash WHERE hash = ?1 AND field = ?2)",
                    params![hash, field],
                    |row| row.get(0),
                )?;
                Ok(found)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn hdel(&self, hash: &str, field: &str) -> Result<bool, Error> {
        let hash = hash.to_string();
        let field = field.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM kv_hash WHERE hash = ?1 AND field = ?2", params![hash, field])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// All `(field, value)` pairs of a hash whose field matches a `*` glob, ordered by field.
    ///
    /// A value that no longer decodes as `T` fails the whole scan.
    pub async fn hscan<T: DeserializeOwned>(&self, hash: &str, pattern: &str) -> Result<Vec<(String, T)>, Error> {
        let hash = hash.to_string();
        let glob = glob_pattern(pattern);
        let rows: Vec<(String, Vec<u8>)> = self
            .conn
            .call(move |conn| -> Result<Vec<(String, Vec<u8>)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT field, value FROM kv_hash
                    WHERE hash = ?1 AND field GLOB ?2
                    ORDER BY field",
                )?;
                let rows = stmt
                    .query_map(params![hash, glob], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(field, bytes)| decode(&bytes).map(|v| (field, v)))
            .collect()
    }

    /// Delete plain keys stored more than `days` ago.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_raw_older_than(&self, days: i64) -> Result<u64, Error> {
        let cutoff = cutoff_timestamp(days)?;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM kv WHERE stored_at <= ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete fields of `hash` stored more than `days` ago.
    ///
    /// Returns the number of deleted entries.
    pub async fn purge_hash_older_than(&self, hash: &str, days: i64) -> Result<u64, Error> {
        let hash = hash.to_string();
        let cutoff = cutoff_timestamp(days)?;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count =
                    conn.execute("DELETE FROM kv_hash WHERE hash = ?1 AND stored_at <= ?2", params![hash, cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        id: String,
        n: u32,
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(post_key("abc"), "post:abc");
        assert_eq!(sheet_field("xyz"), "sheet:xyz");
    }

    #[test]
    fn test_glob_pattern() {
        assert_eq!(glob_pattern("sheet:*"), "sheet:*");
        assert_eq!(glob_pattern("a_b%*"), "a_b%*");
        assert_eq!(glob_pattern("x?[y]*"), "x[?][[]y]*");
        assert_eq!(escape_glob("a*b"), "a[*]b");
    }

    #[tokio::test]
    async fn test_set_get_exists_delete() {
        let store = Store::open_in_memory().await.unwrap();
        let payload = Payload { id: "abc".into(), n: 3 };

        assert!(!store.exists("post:abc").await.unwrap());
        store.set("post:abc", &payload).await.unwrap();
        assert!(store.exists("post:abc").await.unwrap());

        let back: Payload = store.get("post:abc").await.unwrap().unwrap();
        assert_eq!(back, payload);

        assert!(store.delete("post:abc").await.unwrap());
        assert!(!store.delete("post:abc").await.unwrap());
        assert!(store.get::<Payload>("post:abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("k", &1u32).await.unwrap();
        store.set("k", &2u32).await.unwrap();
        assert_eq!(store.get::<u32>("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_get_wrong_type_is_codec_error() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("k", "text").await.unwrap();
        let err = store.get::<Payload>("k").await.unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
    }

    #[tokio::test]
    async fn test_keys_glob() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("post:b", &1u32).await.unwrap();
        store.set("post:a", &1u32).await.unwrap();
        store.set("other", &1u32).await.unwrap();
        assert_eq!(store.keys("post:*").await.unwrap(), vec!["post:a", "post:b"]);
    }

    #[tokio::test]
    async fn test_hash_roundtrip_and_scan() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .hset(SHEETS_HASH, "sheet:2", &Payload { id: "2".into(), n: 2 })
            .await
            .unwrap();
        store
            .hset(SHEETS_HASH, "sheet:1", &Payload { id: "1".into(), n: 1 })
            .await
            .unwrap();
        store.hset(SHEETS_HASH, "meta", &0u32).await.unwrap();
        store
            .hset("other", "sheet:3", &Payload { id: "3".into(), n: 3 })
            .await
            .unwrap();

        assert!(store.hexists(SHEETS_HASH, "sheet:1").await.unwrap());
        assert!(!store.hexists(SHEETS_HASH, "sheet:3").await.unwrap());

        let one: Payload = store.hget(SHEETS_HASH, "sheet:1").await.unwrap().unwrap();
        assert_eq!(one.n, 1);

        let scanned: Vec<(String, Payload)> = store.hscan(SHEETS_HASH, "sheet:*").await.unwrap();
        let fields: Vec<_> = scanned.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, vec!["sheet:1", "sheet:2"]);

        assert!(store.hdel(SHEETS_HASH, "sheet:1").await.unwrap());
        assert!(store.hget::<Payload>(SHEETS_HASH, "sheet:1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_older_than() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("fresh", &1u32).await.unwrap();
        store.hset(SHEETS_HASH, "sheet:fresh", &1u32).await.unwrap();

        store
            .conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO kv (key, value, stored_at) VALUES ('stale', X'31', '2000-01-01T00:00:00+00:00')",
                    [],
                )?;
                conn.execute(
                    "INSERT INTO kv_hash (hash, field, value, stored_at)
                     VALUES ('sheets', 'sheet:stale', X'31', '2000-01-01T00:00:00+00:00')",
                    [],
                )
            })
            .await
            .unwrap();

        assert_eq!(store.purge_raw_older_than(30).await.unwrap(), 1);
        assert!(store.exists("fresh").await.unwrap());
        assert!(!store.exists("stale").await.unwrap());

        assert_eq!(store.purge_hash_older_than(SHEETS_HASH, 30).await.unwrap(), 1);
        assert!(store.hexists(SHEETS_HASH, "sheet:fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_purge_out_of_range_age() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("fresh", &1u32).await.unwrap();
        store.hset(SHEETS_HASH, "sheet:fresh", &1u32).await.unwrap();

        let err = store.purge_raw_older_than(100_000_000).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        let err = store.purge_hash_older_than(SHEETS_HASH, i64::MAX).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        assert!(store.exists("fresh").await.unwrap());
        assert!(store.hexists(SHEETS_HASH, "sheet:fresh").await.unwrap());
    }

    #[tokio::test]
    async fn test_globs_are_case_sensitive() {
        let store = Store::open_in_memory().await.unwrap();
        store.set("post:abc", &1u32).await.unwrap();
        store.set("POST:ABC", &1u32).await.unwrap();
        store.set("post:a_c", &1u32).await.unwrap();
        assert_eq!(store.keys("post:*").await.unwrap(), vec!["post:a_c", "post:abc"]);
        assert_eq!(store.keys("post:a_c").await.unwrap(), vec!["post:a_c"]);

        store.hset(SHEETS_HASH, "sheet:AbC", &1u32).await.unwrap();
        store.hset(SHEETS_HASH, "sheet:abc", &2u32).await.unwrap();
        store.hset(SHEETS_HASH, "sheet:[x]", &3u32).await.unwrap();

        let scanned: Vec<(String, u32)> = store.hscan(SHEETS_HASH, "sheet:a*").await.unwrap();
        assert_eq!(scanned, vec![("sheet:abc".to_string(), 2)]);
        let scanned: Vec<(String, u32)> = store.hscan(SHEETS_HASH, "sheet:[x]").await.unwrap();
        assert_eq!(scanned, vec![("sheet:[x]".to_string(), 3)]);
    }
}
