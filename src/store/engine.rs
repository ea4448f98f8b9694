//! Dedup and persistence engine
//!
//! The engine is the only consumer of harvested items. It owns the hash
//! store, both append-only logs and the run counters, so no locking is
//! needed: items are judged one at a time in channel order.

use crate::store::fingerprint::Fingerprint;
use crate::store::hash_store::HashStore;
use crate::{StoreError, StoreResult};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Separator written after every value log record
pub const RECORD_TERMINATOR: &str = "\n\n\n";

/// What the engine decided for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New value, appended to both logs
    Accepted,
    /// Already seen, nothing written
    Duplicate,
    /// Contains the record terminator, nothing written
    Rejected,
}

/// Counters snapshot emitted on every report tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    /// Distinct fingerprints in the store
    pub distinct: usize,
    /// Current consecutive-duplicate run
    pub duplicate_run: u64,
    /// Items seen since the previous report
    pub items: u64,
    /// Length of the report period
    pub interval: Duration,
}

impl StatusReport {
    /// Items per second over the report period
    pub fn throughput(&self) -> f64 {
        let secs = self.interval.as_secs_f64();
        if secs > 0.0 {
            self.items as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total {} / Duplicates {} ({:.1} records/sec)",
            self.distinct,
            self.duplicate_run,
            self.throughput()
        )
    }
}

/// One append-only file plus its committed length
#[derive(Debug)]
struct AppendLog {
    path: PathBuf,
    file: File,
    len: u64,
}

impl AppendLog {
    fn open(path: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error(path, e))?;
        let len = file.metadata().map_err(|e| io_error(path, e))?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
        })
    }

    fn append(&mut self, bytes: &[u8]) -> StoreResult<()> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.flush())
            .map_err(|e| io_error(&self.path, e))?;
        self.len += bytes.len() as u64;
        Ok(())
    }

    /// Cuts the file back to `len` bytes after a failed multi-file append
    fn truncate(&mut self, len: u64) {
        match self.file.set_len(len) {
            Ok(()) => self.len = len,
            Err(e) => tracing::error!(
                "Failed to roll back {} to {} bytes: {}",
                self.path.display(),
                len,
                e
            ),
        }
    }
}

/// Deduplicates items by fingerprint and persists each new one exactly once
///
/// Every accepted item produces one record in the fingerprint log and one in
/// the value log, in the same order. The in-memory store only learns a
/// fingerprint after both appends have succeeded.
#[derive(Debug)]
pub struct DedupEngine {
    store: HashStore,
    fingerprint_log: AppendLog,
    value_log: AppendLog,
    duplicate_run: u64,
    items_since_report: u64,
}

impl DedupEngine {
    /// Opens (creating if needed) both logs for appending
    ///
    /// # Arguments
    ///
    /// * `store` - Fingerprints loaded from `hash_file`
    /// * `hash_file` - Fingerprint log path
    /// * `quotes_file` - Value log path
    pub fn open(store: HashStore, hash_file: &Path, quotes_file: &Path) -> StoreResult<Self> {
        let fingerprint_log = AppendLog::open(hash_file)?;
        let value_log = AppendLog::open(quotes_file)?;

        Ok(Self {
            store,
            fingerprint_log,
            value_log,
            duplicate_run: 0,
            items_since_report: 0,
        })
    }

    /// Judges one item and persists it if new
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome)` - Whether the item was accepted, a duplicate, or rejected
    ///   because it would split a value log record
    /// * `Err(StoreError)` - An append failed; both logs were rolled back and
    ///   the item was not accepted
    pub fn ingest(&mut self, value: &str) -> StoreResult<Outcome> {
        self.items_since_report += 1;

        if value.contains(RECORD_TERMINATOR) {
            tracing::debug!("Rejected item containing the record terminator: {:?}", value);
            return Ok(Outcome::Rejected);
        }

        let fp = Fingerprint::of(value.as_bytes());

        if self.store.contains(&fp) {
            self.duplicate_run += 1;
            return Ok(Outcome::Duplicate);
        }

        self.persist(&fp, value)?;
        self.store.insert(fp);
        self.duplicate_run = 0;

        tracing::trace!("Accepted {} ({})", value, fp);
        Ok(Outcome::Accepted)
    }

    /// Appends one record to each log, or to neither
    fn persist(&mut self, fp: &Fingerprint, value: &str) -> StoreResult<()> {
        let fingerprint_mark = self.fingerprint_log.len;
        let value_mark = self.value_log.len;

        if let Err(e) = self.fingerprint_log.append(fp.as_bytes()) {
            self.fingerprint_log.truncate(fingerprint_mark);
            return Err(e);
        }

        let mut record = String::with_capacity(value.len() + RECORD_TERMINATOR.len());
        record.push_str(value);
        record.push_str(RECORD_TERMINATOR);

        if let Err(e) = self.value_log.append(record.as_bytes()) {
            self.value_log.truncate(value_mark);
            self.fingerprint_log.truncate(fingerprint_mark);
            return Err(e);
        }

        Ok(())
    }

    /// Snapshots the counters and starts a new report period
    ///
    /// Only the per-period item counter is reset.
    pub fn take_report(&mut self, interval: Duration) -> StatusReport {
        let report = StatusReport {
            distinct: self.store.size(),
            duplicate_run: self.duplicate_run,
            items: self.items_since_report,
            interval,
        };
        self.items_since_report = 0;
        report
    }

    /// Distinct fingerprints known, including those loaded at startup
    pub fn distinct(&self) -> usize {
        self.store.size()
    }

    pub fn duplicate_run(&self) -> u64 {
        self.duplicate_run
    }

    #[cfg(test)]
    pub(crate) fn items_since_report(&self) -> u64 {
        self.items_since_report
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fingerprint::FINGERPRINT_LEN;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: tempdir().unwrap(),
            }
        }

        fn hash_file(&self) -> PathBuf {
            self.dir.path().join("hash.bin")
        }

        fn quotes_file(&self) -> PathBuf {
            self.dir.path().join("quotes.txt")
        }

        fn open(&self) -> DedupEngine {
            let store = HashStore::load(&self.hash_file()).unwrap();
            DedupEngine::open(store, &self.hash_file(), &self.quotes_file()).unwrap()
        }

        fn fingerprint_records(&self) -> usize {
            let len = std::fs::metadata(self.hash_file()).unwrap().len() as usize;
            assert_eq!(len % FINGERPRINT_LEN, 0);
            len / FINGERPRINT_LEN
        }

        fn values(&self) -> Vec<String> {
            let text = std::fs::read_to_string(self.quotes_file()).unwrap();
            text.split_terminator(RECORD_TERMINATOR)
                .map(str::to_string)
                .collect()
        }
    }

    #[test]
    fn test_accept_then_duplicate_sequence() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();

        let mut outcomes = Vec::new();
        let mut runs = Vec::new();
        for item in ["a", "b", "a", "c"] {
            outcomes.push(engine.ingest(item).unwrap());
            runs.push(engine.duplicate_run());
        }

        assert_eq!(
            outcomes,
            vec![
                Outcome::Accepted,
                Outcome::Accepted,
                Outcome::Duplicate,
                Outcome::Accepted
            ]
        );
        assert_eq!(runs, vec![0, 0, 1, 0]);
        assert_eq!(engine.distinct(), 3);
        assert_eq!(fixture.values(), vec!["a", "b", "c"]);
        assert_eq!(fixture.fingerprint_records(), 3);
    }

    #[test]
    fn test_logs_stay_in_step() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();

        for item in ["x", "y", "x", "x", "z", "y", "w"] {
            engine.ingest(item).unwrap();
            assert_eq!(fixture.fingerprint_records(), fixture.values().len());
        }
        assert_eq!(fixture.fingerprint_records(), 4);
    }

    #[test]
    fn test_fingerprint_log_matches_value_order() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();
        for item in ["first", "second", "third"] {
            engine.ingest(item).unwrap();
        }

        let raw = std::fs::read(fixture.hash_file()).unwrap();
        let logged: Vec<_> = raw.chunks_exact(FINGERPRINT_LEN).collect();
        for (chunk, value) in logged.iter().zip(fixture.values()) {
            assert_eq!(*chunk, Fingerprint::of(value.as_bytes()).as_bytes());
        }
    }

    #[test]
    fn test_duplicate_run_counts_consecutive_repeats() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();

        engine.ingest("a").unwrap();
        for expected in 1..=4 {
            assert_eq!(engine.ingest("a").unwrap(), Outcome::Duplicate);
            assert_eq!(engine.duplicate_run(), expected);
        }

        engine.ingest("b").unwrap();
        assert_eq!(engine.duplicate_run(), 0);
    }

    #[test]
    fn test_restart_does_not_persist_again() {
        let fixture = Fixture::new();
        {
            let mut engine = fixture.open();
            engine.ingest("a").unwrap();
            engine.ingest("b").unwrap();
        }

        let mut engine = fixture.open();
        assert_eq!(engine.distinct(), 2);
        assert_eq!(engine.ingest("a").unwrap(), Outcome::Duplicate);
        assert_eq!(engine.ingest("b").unwrap(), Outcome::Duplicate);
        assert_eq!(engine.ingest("c").unwrap(), Outcome::Accepted);

        assert_eq!(fixture.values(), vec!["a", "b", "c"]);
        assert_eq!(fixture.fingerprint_records(), 3);
    }

    #[test]
    fn test_report_reads_counters_and_resets_items_only() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();
        for item in ["a", "b", "a", "a"] {
            engine.ingest(item).unwrap();
        }

        let report = engine.take_report(Duration::from_secs(2));
        assert_eq!(report.distinct, 2);
        assert_eq!(report.duplicate_run, 2);
        assert_eq!(report.items, 4);
        assert!((report.throughput() - 2.0).abs() < f64::EPSILON);

        assert_eq!(engine.items_since_report(), 0);
        assert_eq!(engine.duplicate_run(), 2);
        assert_eq!(engine.distinct(), 2);

        let quiet = engine.take_report(Duration::from_secs(2));
        assert_eq!(quiet.items, 0);
        assert_eq!(quiet.duplicate_run, 2);
    }

    #[test]
    fn test_report_line_format() {
        let report = StatusReport {
            distinct: 12,
            duplicate_run: 3,
            items: 25,
            interval: Duration::from_secs(10),
        };
        assert_eq!(
            report.to_string(),
            "Total 12 / Duplicates 3 (2.5 records/sec)"
        );
    }

    #[test]
    fn test_terminator_in_value_is_rejected() {
        let fixture = Fixture::new();
        let mut engine = fixture.open();
        engine.ingest("a").unwrap();
        engine.ingest("a").unwrap();

        let outcome = engine.ingest("https://example.com/x\n\n\ny").unwrap();

        assert_eq!(outcome, Outcome::Rejected);
        assert_eq!(engine.duplicate_run(), 1);
        assert_eq!(engine.distinct(), 1);
        assert_eq!(fixture.values(), vec!["a"]);
        assert_eq!(fixture.fingerprint_records(), 1);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_value_append_rolls_back_fingerprint() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let fixture = Fixture::new();
        let store = HashStore::load(&fixture.hash_file()).unwrap();
        let mut engine = DedupEngine::open(store, &fixture.hash_file(), full).unwrap();

        let result = engine.ingest("a");

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(std::fs::metadata(fixture.hash_file()).unwrap().len(), 0);
        assert_eq!(engine.distinct(), 0);
        assert!(!engine.store.contains(&Fingerprint::of(b"a")));
        assert_eq!(engine.duplicate_run(), 0);

        // Still not accepted on a second attempt
        assert!(engine.ingest("a").is_err());
        assert_eq!(std::fs::metadata(fixture.hash_file()).unwrap().len(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_fingerprint_append_writes_no_value() {
        let full = Path::new("/dev/full");
        if !full.exists() {
            return;
        }

        let fixture = Fixture::new();
        let mut engine =
            DedupEngine::open(HashStore::new(), full, &fixture.quotes_file()).unwrap();

        assert!(engine.ingest("a").is_err());
        assert_eq!(engine.distinct(), 0);
        assert!(fixture.values().is_empty());
    }

    #[test]
    fn test_open_appends_to_existing_logs() {
        let fixture = Fixture::new();
        std::fs::write(fixture.quotes_file(), "old\n\n\n").unwrap();
        std::fs::write(fixture.hash_file(), Fingerprint::of(b"old").as_bytes()).unwrap();

        let mut engine = fixture.open();
        engine.ingest("new").unwrap();

        assert_eq!(fixture.values(), vec!["old", "new"]);
        assert_eq!(fixture.fingerprint_records(), 2);
    }
}
