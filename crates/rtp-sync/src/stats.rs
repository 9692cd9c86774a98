//! Synchronization statistics recording
//!
//! Every processed packet can be mirrored into an injectable [`StatsSink`]
//! as a flat [`SyncStats`] record. Recording has no effect on
//! synchronization results; the synchronizer captures the record inside its
//! critical section and calls the sink only after releasing the lock, so a
//! slow sink never stalls the other stream's thread.

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::RtpSsrc;

/// One record per processed RTP packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    /// Wall-clock time when the packet entered the synchronizer, in
    /// nanoseconds since the UNIX epoch
    pub entry_time_ns: u64,

    /// Identifier of the thread that delivered the packet
    pub thread: String,

    /// SSRC of the source
    pub ssrc: RtpSsrc,

    /// Configured clock rate
    pub clock_rate: i32,

    /// Presentation timestamp the packet arrived with
    pub pts_orig_ns: u64,

    /// Presentation timestamp produced by the synchronizer
    pub pts_ns: u64,

    /// Decode timestamp / local arrival time, when the caller provided one
    pub dts_ns: Option<u64>,

    /// Extended RTP timestamp of the packet
    pub rtp_ext_ts: u64,

    /// NTP time of the last Sender Report, if any was received
    pub last_sr_ntp_ns: Option<u64>,

    /// Extended RTP timestamp of the last Sender Report, if any
    pub last_sr_ext_ts: Option<u64>,
}

/// Receiver for per-packet synchronization records.
///
/// Fire-and-forget: implementations must not call back into the
/// synchronizer and should keep `record` cheap or buffer internally.
pub trait StatsSink: Send + Sync {
    /// Record one processed packet
    fn record(&self, entry: &SyncStats);
}

/// CSV column header, one line per [`SyncStats`] record below it
const CSV_HEADER: &str =
    "ENTRY_TS,THREAD,SSRC,CLOCK_RATE,PTS_ORIG,PTS,DTS,EXT_RTP,SR_NTP_NS,SR_EXT_RTP";

/// [`StatsSink`] writing one CSV file per synchronizer.
///
/// The file is created as `<dir>/<YYYYmmddHHMMSS>_<name>.csv` with the
/// directory created on demand. Unset optional fields are written as empty
/// columns.
pub struct CsvStatsWriter {
    path: PathBuf,
    file: Mutex<BufWriter<File>>,
}

impl CsvStatsWriter {
    /// Environment variable naming the directory for stats files
    pub const PATH_ENV_VAR: &'static str = "RTP_SYNC_STATS_PATH";

    /// Create a writer under `dir`, creating the directory if needed
    pub fn create(dir: &Path, name: &str) -> io::Result<Self> {
        fs::create_dir_all(dir)?;

        let date = chrono::Local::now().format("%Y%m%d%H%M%S");
        let path = dir.join(format!("{}_{}.csv", date, name));
        let file = File::create(&path)?;

        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", CSV_HEADER)?;

        debug!(path = %path.display(), "file for stats");

        Ok(Self {
            path,
            file: Mutex::new(writer),
        })
    }

    /// Create a writer in the directory named by [`Self::PATH_ENV_VAR`].
    ///
    /// Returns `None` when the variable is unset or the file cannot be
    /// created, logging why, so callers can pass the result straight to the
    /// synchronizer constructor.
    pub fn from_env(name: &str) -> Option<Self> {
        let dir = match env::var(Self::PATH_ENV_VAR) {
            Ok(dir) => dir,
            Err(_) => {
                debug!(
                    "no path for stats; enable with env variable: '{}'",
                    Self::PATH_ENV_VAR
                );
                return None;
            }
        };

        match Self::create(Path::new(&dir), name) {
            Ok(writer) => Some(writer),
            Err(err) => {
                error!(dir = %dir, %err, "cannot open file for stats");
                None
            }
        }
    }

    /// Path of the CSV file being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn fmt_opt(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl StatsSink for CsvStatsWriter {
    fn record(&self, entry: &SyncStats) {
        let mut file = self.file.lock();
        let res = writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{}",
            entry.entry_time_ns,
            entry.thread,
            entry.ssrc,
            entry.clock_rate,
            entry.pts_orig_ns,
            entry.pts_ns,
            fmt_opt(entry.dts_ns),
            entry.rtp_ext_ts,
            fmt_opt(entry.last_sr_ntp_ns),
            fmt_opt(entry.last_sr_ext_ts),
        );
        if let Err(err) = res {
            error!(%err, "cannot write stats entry");
        }
    }
}

impl Drop for CsvStatsWriter {
    fn drop(&mut self) {
        if let Err(err) = self.file.lock().flush() {
            error!(%err, "cannot flush stats file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> SyncStats {
        SyncStats {
            entry_time_ns: 1_700_000_000_000_000_000,
            thread: "ThreadId(1)".into(),
            ssrc: 42,
            clock_rate: 90_000,
            pts_orig_ns: 1_000,
            pts_ns: 2_000,
            dts_ns: Some(1_500),
            rtp_ext_ts: 180_000,
            last_sr_ntp_ns: None,
            last_sr_ext_ts: None,
        }
    }

    #[test]
    fn test_csv_writer_emits_header_and_rows() {
        let dir = env::temp_dir().join(format!("rtp-sync-stats-{}", std::process::id()));
        let writer = CsvStatsWriter::create(&dir, "audio").unwrap();
        let path = writer.path().to_path_buf();

        writer.record(&sample_entry());
        drop(writer); // flush

        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("1700000000000000000,ThreadId(1),42,90000,1000,2000,1500,180000,,")
        );
        assert_eq!(lines.next(), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_file_name_carries_the_sink_name() {
        let dir = env::temp_dir().join(format!("rtp-sync-name-{}", std::process::id()));
        let writer = CsvStatsWriter::create(&dir, "video").unwrap();

        let file_name = writer.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(file_name.ends_with("_video.csv"));

        drop(writer);
        fs::remove_dir_all(&dir).unwrap();
    }
}
