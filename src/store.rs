//! Read-only access to Cursor's `state.vscdb` key/value tables.
//!
//! Each table is a plain `key TEXT, value BLOB` map holding JSON blobs. The
//! extraction code only needs two operations on it, exact lookup and a
//! substring scan over key names, so that is all [`KeyValueStore`] exposes.

use eyre::{Context, Result, eyre};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params_from_iter};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Key-name fragments used when no known key is present.
pub const SCAN_TERMS: [&str; 3] = ["chat", "conversation", "composer"];

/// Upper bound on candidates returned by a pattern scan.
pub const SCAN_LIMIT: usize = 20;

/// Table holding VS Code style state.
pub const ITEM_TABLE: &str = "ItemTable";

/// Cursor's own key/value table.
pub const CURSOR_DISK_KV: &str = "cursorDiskKV";

/// A raw key/value pair as stored. The value is JSON text that has not been parsed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRecord {
    pub key: String,
    pub raw_value: String,
}

pub trait KeyValueStore {
    /// Exact lookup. `Ok(None)` when the key is absent or its value is NULL.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Records whose key contains any of `terms`, at most `limit` of them.
    fn scan(&self, terms: &[&str], limit: usize) -> Result<Vec<StoreRecord>>;
}

/// A read-only SQLite connection. Closed when dropped; a failing close is
/// logged and otherwise ignored.
pub struct SqliteStore {
    conn: Option<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .wrap_err_with(|| format!("Failed to open database: {}", path.display()))?;
        debug!(path = %path.display(), "opened store");
        Ok(Self {
            conn: Some(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| eyre!("Store already closed: {}", self.path.display()))
    }

    pub fn tables(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .wrap_err("Failed to prepare table listing")?;
        stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()
            .wrap_err_with(|| format!("Failed to list tables in {}", self.path.display()))
    }

    pub fn has_table(&self, name: &str) -> Result<bool> {
        Ok(self.tables()?.iter().any(|t| t == name))
    }

    /// First of `candidates` that exists in this database.
    pub fn first_table<'a>(&self, candidates: &[&'a str]) -> Result<Option<&'a str>> {
        let tables = self.tables()?;
        Ok(candidates
            .iter()
            .copied()
            .find(|c| tables.iter().any(|t| t == c)))
    }

    /// View of one key/value table. The table is not checked for existence here.
    pub fn table(&self, name: &str) -> Result<Table<'_>> {
        Ok(Table {
            conn: self.conn()?,
            name: name.to_string(),
        })
    }

    /// Close explicitly, surfacing the error instead of logging it.
    pub fn close(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => conn
                .close()
                .map_err(|(_, e)| e)
                .wrap_err_with(|| format!("Failed to close database: {}", self.path.display())),
            None => Ok(()),
        }
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take()
            && let Err((_, e)) = conn.close()
        {
            warn!(path = %self.path.display(), error = %e, "failed to close store");
        }
    }
}

/// One table of a [`SqliteStore`].
pub struct Table<'s> {
    conn: &'s Connection,
    name: String,
}

impl Table<'_> {
    fn quoted_name(&self) -> String {
        format!("\"{}\"", self.name.replace('"', "\"\""))
    }
}

impl KeyValueStore for Table<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?1", self.quoted_name());
        let value = self
            .conn
            .query_row(&sql, [key], |row| Ok(value_text(row.get_ref(0)?)))
            .optional()
            .wrap_err_with(|| format!("Failed to read key {key:?} from {}", self.name))?;
        Ok(value.flatten())
    }

    fn scan(&self, terms: &[&str], limit: usize) -> Result<Vec<StoreRecord>> {
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let filter = vec!["key LIKE ?"; terms.len()].join(" OR ");
        let sql = format!(
            "SELECT key, value FROM {} WHERE {filter} LIMIT {limit}",
            self.quoted_name()
        );
        let patterns: Vec<String> = terms.iter().map(|t| format!("%{t}%")).collect();

        let mut stmt = self
            .conn
            .prepare(&sql)
            .wrap_err_with(|| format!("Failed to prepare scan of {}", self.name))?;
        let rows = stmt.query_map(params_from_iter(patterns.iter()), |row| {
            Ok((row.get::<_, String>(0)?, value_text(row.get_ref(1)?)))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (key, value) = row.wrap_err_with(|| format!("Failed to scan {}", self.name))?;
            if let Some(raw_value) = value {
                records.push(StoreRecord { key, raw_value });
            }
        }
        Ok(records)
    }
}

fn value_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        _ => None,
    }
}

/// A record found by [`probe`], with its value already parsed.
#[derive(Debug, Clone)]
pub struct Probed {
    pub record: StoreRecord,
    pub value: Value,
}

/// Look up `keys` in order and return the first one holding JSON. When none
/// does, scan for keys mentioning [`SCAN_TERMS`] and return the first
/// candidate whose parsed value satisfies `accept`.
///
/// Values that fail to parse are skipped; only store errors are returned.
pub fn probe(
    store: &dyn KeyValueStore,
    keys: &[&str],
    accept: impl Fn(&Value) -> bool,
) -> Result<Option<Probed>> {
    for &key in keys {
        let Some(raw_value) = store.get(key)? else {
            continue;
        };
        match serde_json::from_str::<Value>(&raw_value) {
            Ok(value) => {
                debug!(key, "known key hit");
                return Ok(Some(Probed {
                    record: StoreRecord {
                        key: key.to_string(),
                        raw_value,
                    },
                    value,
                }));
            }
            Err(e) => debug!(key, error = %e, "known key does not hold JSON"),
        }
    }

    for record in store.scan(&SCAN_TERMS, SCAN_LIMIT)? {
        let Ok(value) = serde_json::from_str::<Value>(&record.raw_value) else {
            debug!(key = %record.key, "skipping non-JSON candidate");
            continue;
        };
        if accept(&value) {
            debug!(key = %record.key, "pattern scan hit");
            return Ok(Some(Probed { record, value }));
        }
    }
    Ok(None)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Insertion-ordered in-memory store.
    #[derive(Default)]
    pub(crate) struct MemoryStore(pub Vec<StoreRecord>);

    impl MemoryStore {
        pub(crate) fn with(mut self, key: &str, value: &str) -> Self {
            self.0.push(StoreRecord {
                key: key.to_string(),
                raw_value: value.to_string(),
            });
            self
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self
                .0
                .iter()
                .find(|r| r.key == key)
                .map(|r| r.raw_value.clone()))
        }

        fn scan(&self, terms: &[&str], limit: usize) -> Result<Vec<StoreRecord>> {
            Ok(self
                .0
                .iter()
                .filter(|r| {
                    let key = r.key.to_lowercase();
                    terms.iter().any(|t| key.contains(&t.to_lowercase()))
                })
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn accept_messages(v: &Value) -> bool {
        v.get("messages").is_some()
    }

    #[test]
    fn known_keys_probed_in_order() {
        let store = MemoryStore::default()
            .with("b", r#"{"messages": [2]}"#)
            .with("a", r#"{"messages": [1]}"#);
        let hit = probe(&store, &["missing", "a", "b"], accept_messages)
            .unwrap()
            .unwrap();
        assert_eq!(hit.record.key, "a");
    }

    #[test]
    fn invalid_known_value_falls_through() {
        let store = MemoryStore::default()
            .with("a", "not json")
            .with("chat.data", r#"{"messages": []}"#);
        let hit = probe(&store, &["a"], accept_messages).unwrap().unwrap();
        assert_eq!(hit.record.key, "chat.data");
    }

    #[test]
    fn scan_skips_garbage_and_unrecognized() {
        let store = MemoryStore::default()
            .with("chat.garbage", "{{{")
            .with("chat.settings", r#"{"fontSize": 12}"#)
            .with("unrelated", r#"{"messages": []}"#)
            .with("myConversationStore", r#"{"messages": []}"#);
        let hit = probe(&store, &[], accept_messages).unwrap().unwrap();
        assert_eq!(hit.record.key, "myConversationStore");
    }

    #[test]
    fn nothing_found() {
        let store = MemoryStore::default().with("unrelated", r#"{"messages": []}"#);
        assert!(probe(&store, &["x"], accept_messages).unwrap().is_none());
    }

    #[test]
    fn sqlite_table_get_and_scan() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.vscdb");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);
                 INSERT INTO ItemTable VALUES ('aiChat.chatdata', '{\"tabs\": []}');
                 INSERT INTO ItemTable VALUES ('editor.fontSize', '12');
                 INSERT INTO ItemTable VALUES ('composer.blob', CAST('{\"a\":1}' AS BLOB));
                 INSERT INTO ItemTable VALUES ('chat.null', NULL);",
            )
            .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.has_table(ITEM_TABLE).unwrap());
        assert_eq!(
            store.first_table(&[CURSOR_DISK_KV, ITEM_TABLE]).unwrap(),
            Some(ITEM_TABLE)
        );

        let table = store.table(ITEM_TABLE).unwrap();
        assert_eq!(
            table.get("aiChat.chatdata").unwrap().as_deref(),
            Some("{\"tabs\": []}")
        );
        assert_eq!(table.get("composer.blob").unwrap().as_deref(), Some("{\"a\":1}"));
        assert_eq!(table.get("chat.null").unwrap(), None);
        assert_eq!(table.get("absent").unwrap(), None);

        let mut keys: Vec<String> = table
            .scan(&SCAN_TERMS, SCAN_LIMIT)
            .unwrap()
            .into_iter()
            .map(|r| r.key)
            .collect();
        keys.sort();
        assert_eq!(keys, ["aiChat.chatdata", "composer.blob"]);
        assert_eq!(table.scan(&SCAN_TERMS, 1).unwrap().len(), 1);

        store.close().unwrap();
    }

    #[test]
    fn open_missing_database_fails() {
        let tmp = TempDir::new().unwrap();
        assert!(SqliteStore::open(&tmp.path().join("missing.vscdb")).is_err());
    }
}
