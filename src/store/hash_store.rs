//! In-memory set of seen fingerprints, loaded from the fingerprint log

use crate::store::fingerprint::{Fingerprint, FINGERPRINT_LEN};
use crate::{StoreError, StoreResult};
use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

/// Set of every fingerprint accepted so far
///
/// The store only answers membership and records inserts. Keeping the
/// on-disk log in step is the caller's job (see [`DedupEngine`]).
///
/// [`DedupEngine`]: crate::store::DedupEngine
#[derive(Debug, Default)]
pub struct HashStore {
    seen: HashSet<Fingerprint>,
}

impl HashStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Loads a store from a fingerprint log
    ///
    /// The file is read as consecutive 16-byte records. A missing file gives
    /// an empty store. A trailing partial record is reported as
    /// [`StoreError::Corrupt`].
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the fingerprint log
    ///
    /// # Returns
    ///
    /// * `Ok(HashStore)` - Store holding every record in the file
    /// * `Err(StoreError)` - The file could not be read or is truncated mid-record
    pub fn load(path: &Path) -> StoreResult<Self> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(
                    "Fingerprint log {} not found, starting empty",
                    path.display()
                );
                return Ok(Self::new());
            }
            Err(e) => return Err(io_error(path, e)),
        };

        let mut store = Self::new();
        let mut records = 0usize;
        let mut record = [0u8; FINGERPRINT_LEN];

        loop {
            let filled = read_record(&mut file, &mut record).map_err(|e| io_error(path, e))?;

            if filled == 0 {
                break;
            }

            if filled < FINGERPRINT_LEN {
                return Err(StoreError::Corrupt {
                    path: path.display().to_string(),
                    records,
                    trailing: filled,
                });
            }

            store.insert(Fingerprint::from_bytes(record));
            records += 1;
        }

        tracing::debug!(
            "Read {} records ({} distinct) from {}",
            records,
            store.size(),
            path.display()
        );

        Ok(store)
    }

    /// Returns true if `fp` has been seen
    pub fn contains(&self, fp: &Fingerprint) -> bool {
        self.seen.contains(fp)
    }

    /// Adds `fp`; returns false if it was already present
    pub fn insert(&mut self, fp: Fingerprint) -> bool {
        self.seen.insert(fp)
    }

    /// Number of distinct fingerprints
    pub fn size(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Fills `buf` from `reader`, returning how many bytes were read before EOF
fn read_record<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
