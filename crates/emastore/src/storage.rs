//! File-backed storage
//!
//! File layout:
//! - `emapuppy.kv`: magic header followed by an append-only record log
//!
//! The log is replayed into an in-memory index on open. `close()` compacts
//! the log down to live entries and fsyncs it.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::adapter::Backend;
use crate::error::{Error, Result};
use crate::index::OrderedIndex;
use crate::parser::{encode_remove, encode_set, parse_header, replay, Record, KV_MAGIC};

/// Default quota (5M characters, the usual browser storage allowance)
pub const DEFAULT_QUOTA: usize = 5_000_000;

const DATA_FILE: &str = "emapuppy.kv";

/// Persistent backend writing to a record log in a directory
pub struct FileBackend {
    /// Path to the data file
    path: PathBuf,

    /// Data file handle
    file: Mutex<File>,

    /// Live entries
    index: RwLock<OrderedIndex>,

    /// Is the store closed?
    closed: RwLock<bool>,
}

impl FileBackend {
    /// Open or create a store in the given directory with the default quota
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_quota(dir, DEFAULT_QUOTA)
    }

    /// Open or create a store in the given directory
    ///
    /// # Arguments
    /// * `dir` - Directory holding the data file
    /// * `quota` - Maximum live size in characters
    pub fn open_with_quota<P: AsRef<Path>>(dir: P, quota: usize) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(DATA_FILE);
        let (file, index) = if path.exists() {
            Self::open_existing(&path, quota)?
        } else {
            Self::create_new(&path, quota)?
        };

        info!(path = %path.display(), keys = index.len(), "key-value store opened");

        Ok(Self {
            path,
            file: Mutex::new(file),
            index: RwLock::new(index),
            closed: RwLock::new(false),
        })
    }

    fn open_existing(path: &Path, quota: usize) -> Result<(File, OrderedIndex)> {
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)?;

        let body = parse_header(&contents)?;
        let replay = replay(body)?;

        // Replayed entries were accepted once; they are not re-checked
        // against a possibly smaller quota.
        let mut index = OrderedIndex::new(Some(quota));
        for record in &replay.records {
            match record {
                Record::Set { key, value } => index.insert(key, value),
                Record::Remove { key } => {
                    index.remove(key);
                }
            }
        }

        let valid_len = (KV_MAGIC.len() + replay.consumed) as u64;
        if valid_len < contents.len() as u64 {
            debug!(
                dropped = contents.len() as u64 - valid_len,
                "truncating incomplete trailing record"
            );
            file.set_len(valid_len)?;
        }
        file.seek(SeekFrom::End(0))?;

        Ok((file, index))
    }

    fn create_new(path: &Path, quota: usize) -> Result<(File, OrderedIndex)> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.write_all(KV_MAGIC)?;

        Ok((file, OrderedIndex::new(Some(quota))))
    }

    fn ensure_open(&self) -> Result<()> {
        if *self.closed.read() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn append(&self, record: &[u8]) -> Result<()> {
        let mut file = self.file.lock();
        append_or_rollback(&mut file, |file| {
            file.write_all(record)?;
            file.flush()
        })
    }

    /// Path of the data file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Live size in characters
    pub fn used(&self) -> usize {
        self.index.read().used()
    }

    /// Rewrite the log so it holds only live entries
    pub fn compact(&self) -> Result<()> {
        self.ensure_open()?;

        let index = self.index.read();
        let tmp_path = self.path.with_extension("kv.compact");
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(KV_MAGIC)?;
            for (key, value) in index.iter() {
                tmp.write_all(&encode_set(key, value))?;
            }
            tmp.sync_all()?;
        }

        let mut file = self.file.lock();
        fs::rename(&tmp_path, &self.path)?;
        *file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;

        debug!(keys = index.len(), "log compacted");
        Ok(())
    }

    /// Compact, fsync and close the store
    pub fn close(&self) -> Result<()> {
        if *self.closed.read() {
            return Ok(());
        }

        self.compact()?;
        self.file.lock().sync_all()?;
        *self.closed.write() = true;

        Ok(())
    }
}

/// Run `write` at the end of the log. If it fails, the log is cut back to
/// its previous length so a torn record never precedes later ones.
fn append_or_rollback<F>(file: &mut File, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let end = file.seek(SeekFrom::End(0))?;

    if let Err(e) = write(file) {
        if let Err(cut) = file.set_len(end) {
            warn!(error = %cut, "failed to drop partial record");
        }
        let _ = file.seek(SeekFrom::Start(end));
        return Err(e.into());
    }
    Ok(())
}

impl Backend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.index.read().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;

        let mut index = self.index.write();
        index.check_fit(key, value)?;
        self.append(&encode_set(key, value))?;
        index.insert(key, value);

        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;

        let mut index = self.index.write();
        if index.get(key).is_none() {
            return Ok(());
        }
        self.append(&encode_remove(key))?;
        index.remove(key);

        Ok(())
    }

    fn count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.index.read().len())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        self.ensure_open()?;
        Ok(self.index.read().key_at(index).cloned())
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
