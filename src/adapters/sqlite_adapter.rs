//! SQLite backend (via rusqlite).
//!
//! Each `open()` starts a numbered `dbbench_sqlite3-<n>.db` file in the
//! configured directory and applies the tuning pragmas: cache size, page
//! size (when not the 1024 default), WAL journal mode with a 4096-page
//! autocheckpoint, and exclusive locking. Keys and values are blobs in a
//! single `test` table keyed on `key`.

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection};

use super::{StorageAdapter, StorageOptions};
use crate::{BenchError, BenchResult};

pub struct SqliteAdapter {
    opts: StorageOptions,
    conn: Option<Connection>,
    db_index: u32,
    /// Current `PRAGMA synchronous` state; `None` until the first write.
    sync_full: Option<bool>,
}

impl SqliteAdapter {
    /// Prepare the adapter. Unless `use_existing` is set, stale benchmark
    /// database files from earlier runs are removed from the directory.
    pub fn new(opts: StorageOptions) -> BenchResult<Self> {
        if !opts.use_existing {
            remove_stale_databases(&opts.dir)?;
        }
        Ok(Self {
            opts,
            conn: None,
            db_index: 0,
            sync_full: None,
        })
    }

    fn conn(&self) -> BenchResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| BenchError::Storage("database is not open".into()))
    }
}

fn remove_stale_databases(dir: &Path) -> BenchResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry
            .file_name()
            .to_string_lossy()
            .starts_with("dbbench_sqlite3")
        {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> BenchError + '_ {
    move |e| BenchError::Storage(format!("{context}: {e}"))
}

impl StorageAdapter for SqliteAdapter {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn open(&mut self) -> BenchResult<()> {
        self.db_index += 1;
        let path = self
            .opts
            .dir
            .join(format!("dbbench_sqlite3-{}.db", self.db_index));
        let conn = Connection::open(&path).map_err(storage_err("open"))?;

        let mut pragmas = format!("PRAGMA cache_size = {};\n", self.opts.cache_pages);
        if self.opts.page_size != 1024 {
            pragmas.push_str(&format!("PRAGMA page_size = {};\n", self.opts.page_size));
        }
        if self.opts.wal {
            pragmas.push_str("PRAGMA journal_mode = WAL;\nPRAGMA wal_autocheckpoint = 4096;\n");
        }
        pragmas.push_str("PRAGMA locking_mode = EXCLUSIVE;");
        conn.execute_batch(&pragmas).map_err(storage_err("pragma"))?;

        conn.execute_batch("CREATE TABLE test (key blob, value blob, PRIMARY KEY (key))")
            .map_err(storage_err("create table"))?;

        self.sync_full = None;
        self.conn = Some(conn);
        Ok(())
    }

    fn begin_transaction(&mut self) -> BenchResult<()> {
        self.conn()?
            .execute_batch("BEGIN TRANSACTION")
            .map_err(storage_err("begin transaction"))
    }

    fn end_transaction(&mut self) -> BenchResult<()> {
        self.conn()?
            .execute_batch("END TRANSACTION")
            .map_err(storage_err("end transaction"))
    }

    fn write(&mut self, key: &[u8], value: &[u8], durable: bool) -> BenchResult<()> {
        if self.sync_full != Some(durable) {
            let pragma = if durable {
                "PRAGMA synchronous = FULL"
            } else {
                "PRAGMA synchronous = OFF"
            };
            self.conn()?
                .execute_batch(pragma)
                .map_err(storage_err("synchronous"))?;
            self.sync_full = Some(durable);
        }

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("REPLACE INTO test (key, value) VALUES (?1, ?2)")
            .map_err(storage_err("prepare write"))?;
        stmt.execute(params![key, value])
            .map_err(storage_err("write"))?;
        Ok(())
    }

    fn read(&mut self, key: &[u8]) -> BenchResult<Option<Vec<u8>>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare_cached("SELECT value FROM test WHERE key = ?1")
            .map_err(storage_err("prepare read"))?;
        match stmt.query_row(params![key], |row| row.get::<_, Vec<u8>>(0)) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(BenchError::Storage(format!("read: {e}"))),
        }
    }

    fn checkpoint(&mut self) -> BenchResult<()> {
        if !self.opts.wal {
            return Ok(());
        }
        // wal_checkpoint reports (busy, log, checkpointed); the row is not
        // interesting here, only the error status.
        match self
            .conn()?
            .query_row("PRAGMA wal_checkpoint(FULL)", [], |_row| Ok(()))
        {
            Ok(()) | Err(rusqlite::Error::QueryReturnedNoRows) => Ok(()),
            Err(e) => Err(BenchError::Storage(format!("checkpoint: {e}"))),
        }
    }

    fn close(&mut self) -> BenchResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close()
                .map_err(|(_, e)| BenchError::Storage(format!("close: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn adapter_in(dir: &TempDir) -> SqliteAdapter {
        let opts = StorageOptions {
            dir: dir.path().to_path_buf(),
            ..StorageOptions::default()
        };
        SqliteAdapter::new(opts).unwrap()
    }

    #[test]
    fn test_write_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut db = adapter_in(&dir);
        db.open().unwrap();
        db.write(b"0000000000000001", b"hello", false).unwrap();
        assert_eq!(
            db.read(b"0000000000000001").unwrap().as_deref(),
            Some(&b"hello"[..])
        );
        assert_eq!(db.read(b"0000000000000002").unwrap(), None);
        db.close().unwrap();
    }

    #[test]
    fn test_reopen_starts_fresh_database() {
        let dir = TempDir::new().unwrap();
        let mut db = adapter_in(&dir);
        db.open().unwrap();
        db.write(b"k", b"v", false).unwrap();
        db.close().unwrap();
        db.open().unwrap();
        assert_eq!(db.read(b"k").unwrap(), None);
        db.close().unwrap();
        // Two numbered database files were created.
        assert!(dir.path().join("dbbench_sqlite3-1.db").exists());
        assert!(dir.path().join("dbbench_sqlite3-2.db").exists());
    }

    #[test]
    fn test_transactions_and_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut db = adapter_in(&dir);
        db.open().unwrap();
        db.begin_transaction().unwrap();
        for i in 0..10u32 {
            let key = format!("{i:016}");
            db.write(key.as_bytes(), b"value", false).unwrap();
        }
        db.end_transaction().unwrap();
        db.checkpoint().unwrap();
        assert!(db.read(b"0000000000000009").unwrap().is_some());
        db.close().unwrap();
    }

    #[test]
    fn test_replace_overwrites() {
        let dir = TempDir::new().unwrap();
        let mut db = adapter_in(&dir);
        db.open().unwrap();
        db.write(b"k", b"first", false).unwrap();
        db.write(b"k", b"second", true).unwrap();
        assert_eq!(db.read(b"k").unwrap().as_deref(), Some(&b"second"[..]));
        db.close().unwrap();
    }

    #[test]
    fn test_stale_files_removed_unless_kept() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("dbbench_sqlite3-9.db");
        fs::write(&stale, b"stale").unwrap();

        let opts = StorageOptions {
            dir: dir.path().to_path_buf(),
            use_existing: true,
            ..StorageOptions::default()
        };
        let _kept = SqliteAdapter::new(opts).unwrap();
        assert!(stale.exists());

        let _fresh = adapter_in(&dir);
        assert!(!stale.exists());
    }
}
