/*!
 * Storage for geotagged records.
 *
 * Records live in one or more SQLite databases with a `geotweets` table. Tables are keyed on the
 * user id, and every query over several databases returns results in database order, then row
 * order.
 */
use crate::{HomeResult, Record};
use log::{debug, error, info};
use rusqlite::{Connection, OpenFlags, ToSql};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Connections to all the databases with records in them.
pub struct RecordStore {
    conns: Vec<Connection>,
}

impl RecordStore {
    /// Open a connection to each existing database.
    ///
    /// Directories are searched recursively for files ending in `.sqlite` or `.db`, and the files
    /// found are connected in sorted order. A path that does not exist is an error.
    pub fn connect<P: AsRef<Path>>(paths: &[P]) -> HomeResult<Self> {
        let mut conns = vec![];
        for path in expand_paths(paths)? {
            debug!("Connecting to {}", path.display());
            conns.push(Self::open_database(&path, OpenFlags::empty())?);
        }

        if conns.is_empty() {
            return Err("no record databases found".into());
        }

        info!("Connected to {} record database(s)", conns.len());

        Ok(RecordStore { conns })
    }

    /// Open a single database to add records to, creating it if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> HomeResult<Self> {
        let conn = Self::open_database(path.as_ref(), OpenFlags::SQLITE_OPEN_CREATE)?;
        Ok(RecordStore { conns: vec![conn] })
    }

    /// A single database that only lives in memory.
    pub fn open_in_memory() -> HomeResult<Self> {
        let conn = Connection::open_in_memory()?;
        const QUERY: &str = include_str!("database/create_record_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(RecordStore { conns: vec![conn] })
    }

    fn open_database(path: &Path, extra_flags: OpenFlags) -> HomeResult<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX | extra_flags,
        )?;

        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        const QUERY: &str = include_str!("database/create_record_db.sql");
        conn.execute_batch(QUERY)?;

        Ok(conn)
    }

    /// The number of connected databases.
    pub fn num_databases(&self) -> usize {
        self.conns.len()
    }

    /// Every record for a user, in stored order.
    pub fn records_for(&self, user_id: i64) -> HomeResult<Vec<Record>> {
        const QUERY: &str = include_str!("database/query_user_records.sql");

        let mut records = vec![];
        for conn in &self.conns {
            let mut stmt = conn.prepare(QUERY)?;
            let rows = stmt.query_and_then([user_id], |row| -> rusqlite::Result<Record> {
                Ok(Record {
                    created_at: row.get(0)?,
                    user_name: row.get(1)?,
                    user_id: row.get(2)?,
                    lon: row.get(3)?,
                    lat: row.get(4)?,
                })
            })?;

            for row in rows {
                records.push(row?);
            }
        }

        Ok(records)
    }

    /// Every user id in any database, ascending and without duplicates.
    pub fn user_ids(&self) -> HomeResult<Vec<i64>> {
        const QUERY: &str = include_str!("database/query_user_ids.sql");

        let mut ids = BTreeSet::new();
        for conn in &self.conns {
            let mut stmt = conn.prepare(QUERY)?;
            for id in stmt.query_and_then([], |row| row.get::<_, i64>(0))? {
                ids.insert(id?);
            }
        }

        Ok(ids.into_iter().collect())
    }

    /// Check if records from a file have already been loaded into any database.
    pub fn file_present(&self, filename: &str) -> HomeResult<bool> {
        const QUERY: &str = include_str!("database/query_file_present.sql");

        for conn in &self.conns {
            let num: i64 = conn.query_row(QUERY, [filename], |row| row.get(0))?;
            if num > 0 {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Prepare to add records to the first database.
    ///
    /// Everything added through the returned handle is committed when it is dropped.
    pub fn prepare_to_add_records(&self) -> HomeResult<AddRecordsTransaction<'_>> {
        let conn = self
            .conns
            .first()
            .ok_or("no database to add records to")?;

        let add_record_stmt = conn.prepare(include_str!("database/add_record.sql"))?;
        let add_file_stmt = conn.prepare(include_str!("database/add_file.sql"))?;

        conn.execute("BEGIN TRANSACTION", [])?;

        Ok(AddRecordsTransaction {
            add_record_stmt,
            add_file_stmt,
            conn,
        })
    }
}

/// Turn a list of files and directories into a list of database files.
fn expand_paths<P: AsRef<Path>>(paths: &[P]) -> HomeResult<Vec<PathBuf>> {
    let mut expanded = vec![];

    for path in paths {
        let path = path.as_ref();

        if !path.exists() {
            return Err(format!("no such record database: {}", path.display()).into());
        }

        if !path.is_dir() {
            expanded.push(path.to_path_buf());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|pth| {
                matches!(
                    pth.extension().and_then(|ext| ext.to_str()),
                    Some("sqlite") | Some("db")
                )
            })
            .collect();
        found.sort();

        expanded.extend(found);
    }

    Ok(expanded)
}

/// A handle for adding records to a database inside a single transaction.
pub struct AddRecordsTransaction<'a> {
    add_record_stmt: rusqlite::Statement<'a>,
    add_file_stmt: rusqlite::Statement<'a>,
    conn: &'a Connection,
}

impl<'a> AddRecordsTransaction<'a> {
    pub fn add_record(&mut self, record: &Record) -> HomeResult<()> {
        let _ = self.add_record_stmt.execute([
            &record.created_at as &dyn ToSql,
            &record.user_name,
            &record.user_id,
            &record.lon,
            &record.lat,
        ])?;

        Ok(())
    }

    /// Remember that the records from a file have been loaded.
    pub fn add_file(&mut self, filename: &str) -> HomeResult<()> {
        let _ = self.add_file_stmt.execute([filename])?;
        Ok(())
    }
}

impl<'a> Drop for AddRecordsTransaction<'a> {
    fn drop(&mut self) {
        if let Err(err) = self.conn.execute("COMMIT", []) {
            error!("Error committing records: {}", err);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(user_id: i64, user_name: &str, lon: f64) -> Record {
        Record {
            created_at: "Thu Jul 05 01:30:00 +0000 2018".to_owned(),
            user_name: user_name.to_owned(),
            user_id,
            lon,
            lat: 42.0,
        }
    }

    fn fill(store: &RecordStore, records: &[Record]) {
        let mut trans = store.prepare_to_add_records().unwrap();
        for rec in records {
            trans.add_record(rec).unwrap();
        }
    }

    #[test]
    fn test_records_in_stored_order() {
        let store = RecordStore::open_in_memory().unwrap();
        fill(
            &store,
            &[
                record(2, "b", -71.0),
                record(1, "a", -71.1),
                record(2, "bb", -71.2),
                record(3, "c", -71.3),
                record(2, "b", -71.4),
            ],
        );

        let recs = store.records_for(2).unwrap();
        let names: Vec<_> = recs.iter().map(|r| r.user_name.as_str()).collect();
        assert_eq!(names, vec!["b", "bb", "b"]);
        assert_eq!(recs[1], record(2, "bb", -71.2));

        assert!(store.records_for(10).unwrap().is_empty());
        assert_eq!(store.user_ids().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_files() {
        let store = RecordStore::open_in_memory().unwrap();
        assert!(!store.file_present("tweets_01.json").unwrap());

        {
            let mut trans = store.prepare_to_add_records().unwrap();
            trans.add_file("tweets_01.json").unwrap();
            trans.add_file("tweets_01.json").unwrap();
        }

        assert!(store.file_present("tweets_01.json").unwrap());
        assert!(!store.file_present("tweets_02.json").unwrap());
    }

    #[test]
    fn test_multiple_databases() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.sqlite");
        let second = dir.path().join("nested");
        std::fs::create_dir(&second).unwrap();
        let second = second.join("b.db");

        fill(
            &RecordStore::create(&first).unwrap(),
            &[record(5, "first", -71.0), record(7, "x", -71.0)],
        );
        fill(
            &RecordStore::create(&second).unwrap(),
            &[record(5, "second", -71.0), record(6, "y", -71.0)],
        );

        // Not a database, so it is skipped.
        std::fs::write(dir.path().join("notes.txt"), "nothing").unwrap();

        let store = RecordStore::connect(&[dir.path()]).unwrap();
        assert_eq!(store.num_databases(), 2);

        let names: Vec<_> = store
            .records_for(5)
            .unwrap()
            .into_iter()
            .map(|r| r.user_name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(store.user_ids().unwrap(), vec![5, 6, 7]);
    }

    #[test]
    fn test_no_databases() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RecordStore::connect(&[dir.path()]).is_err());
    }

    #[test]
    fn test_missing_database_is_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.sqlite");

        assert!(RecordStore::connect(&[&missing]).is_err());
        assert!(!missing.exists());

        // Once it exists it can be connected to.
        fill(&RecordStore::create(&missing).unwrap(), &[record(1, "a", -71.0)]);
        let store = RecordStore::connect(&[&missing]).unwrap();
        assert_eq!(store.user_ids().unwrap(), vec![1]);
    }
}
