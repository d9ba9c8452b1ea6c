//! The output file with one row of measures per user.

use crate::{
    csv::{CsvFile, CsvReader, CsvWriter},
    error::OutputSchemaError,
    measures::{MeasureRecord, USER_ID_KEY},
    HomeResult,
};
use log::{info, warn};
use rustc_hash::FxHashSet as HashSet;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

/// A measures file being appended to, one row per user.
pub struct MeasureOutputFile {
    out: CsvFile,
    header: Vec<String>,
    path: PathBuf,
}

impl MeasureOutputFile {
    /// Open an output file, or create it and write the header if it doesn't exist yet.
    ///
    /// When the file already has rows in it the header must match `header` exactly. The user ids
    /// that already have a row are returned so they can be skipped.
    pub fn open<P: AsRef<Path>>(path: P, header: &[&str]) -> HomeResult<(Self, HashSet<i64>)> {
        let path = path.as_ref();
        let header: Vec<String> = header.iter().map(|k| k.to_string()).collect();

        let existing = if path.exists() {
            read_existing(path, &header)?
        } else {
            None
        };

        let (out, done) = match existing {
            Some(done) => {
                info!(
                    "Resuming {} with {} users already done",
                    path.display(),
                    done.len()
                );
                (CsvFile::append(path)?, done)
            }
            None => {
                let mut out = CsvFile::create(path)?;
                out.write_record(&header)?;
                out.flush()?;
                (out, HashSet::default())
            }
        };

        Ok((
            MeasureOutputFile {
                out,
                header,
                path: path.to_path_buf(),
            },
            done,
        ))
    }

    /// Add a row for a user and make sure it reaches the disk.
    pub fn write(&mut self, record: &MeasureRecord) -> HomeResult<()> {
        let header: Vec<&str> = self.header.iter().map(String::as_str).collect();
        self.out.write_record(record.fields(&header))?;
        self.out.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Check the header of an existing file and collect the user ids in it.
///
/// Returns None if the file is empty.
fn read_existing(path: &Path, header: &[String]) -> HomeResult<Option<HashSet<i64>>> {
    let mut reader = CsvReader::new(BufReader::new(File::open(path)?));

    let found = match reader.read_record()? {
        Some(found) => found,
        None => return Ok(None),
    };

    if found != header {
        return Err(OutputSchemaError {
            expected: header.to_vec(),
            found,
        }
        .into());
    }

    let id_col = header
        .iter()
        .position(|k| k == USER_ID_KEY)
        .ok_or("output header has no user id")?;

    let mut done = HashSet::default();
    for row in reader {
        let row = row?;
        match row.get(id_col).map(|v| v.parse::<i64>()) {
            Some(Ok(id)) => {
                done.insert(id);
            }
            _ => warn!("Skipping row without a valid user id in {}", path.display()),
        }
    }

    Ok(Some(done))
}
