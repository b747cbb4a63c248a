//! Process statistics from `/proc/self`
//!
//! Feeds the `flightbox.ProcessStatistics` events of a recording. Reading is
//! best effort: on platforms without procfs every read fails and the poller
//! simply records nothing.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use std::fs;
use std::thread::JoinHandle;
use std::time::Duration;

use flightbox_common::{RecordedEvent, PROCESS_STATISTICS};

use super::now_ms;

/// One statistics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub threads: u64,
    pub rss_kib: u64,
    pub cpu_time_ms: u64,
}

impl ProcessStats {
    /// Convert into a recording event stamped with `timestamp_ms`
    #[must_use]
    pub fn to_event(self, timestamp_ms: u64) -> RecordedEvent {
        RecordedEvent::new(PROCESS_STATISTICS, timestamp_ms)
            .with_field("threads", self.threads)
            .with_field("rss_kib", self.rss_kib)
            .with_field("cpu_time_ms", self.cpu_time_ms)
    }
}

/// Read a snapshot for the current process
///
/// # Errors
/// Returns an error if `/proc/self/status` or `/proc/self/stat` cannot be read or parsed
pub fn read_process_stats() -> Result<ProcessStats> {
    let status = fs::read_to_string("/proc/self/status").context("Failed to read /proc/self/status")?;
    let (threads, rss_kib) = parse_status(&status)?;

    let stat = fs::read_to_string("/proc/self/stat").context("Failed to read /proc/self/stat")?;
    let ticks = parse_stat_cpu_ticks(&stat)?;

    Ok(ProcessStats { threads, rss_kib, cpu_time_ms: ticks_to_ms(ticks) })
}

fn parse_status(status: &str) -> Result<(u64, u64)> {
    let field = |name: &str| -> Result<u64> {
        status
            .lines()
            .find_map(|line| line.strip_prefix(name))
            .and_then(|rest| rest.split_whitespace().next())
            .with_context(|| format!("{name} missing from /proc/self/status"))?
            .parse()
            .with_context(|| format!("{name} is not a number"))
    };

    Ok((field("Threads:")?, field("VmRSS:")?))
}

/// Sum of utime and stime (fields 14 and 15) in clock ticks
fn parse_stat_cpu_ticks(stat: &str) -> Result<u64> {
    // The command name (field 2) may contain spaces, so skip past its closing paren
    let after_comm = stat.rfind(')').map(|pos| &stat[pos + 1..]).context("Malformed /proc/self/stat")?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();

    // after_comm starts at field 3 (state)
    let utime: u64 = fields.get(11).context("utime missing")?.parse().context("utime")?;
    let stime: u64 = fields.get(12).context("stime missing")?.parse().context("stime")?;
    Ok(utime + stime)
}

#[allow(unsafe_code)] // sysconf is a plain libc query
fn ticks_to_ms(ticks: u64) -> u64 {
    // SAFETY: sysconf has no preconditions
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    let hz = u64::try_from(hz).ok().filter(|hz| *hz > 0).unwrap_or(100);
    ticks * 1000 / hz
}

/// Background thread that snapshots process statistics at a fixed interval
///
/// Records one snapshot immediately, one per interval, and one when stopped.
pub struct StatsPoller {
    stop_tx: Sender<()>,
    handle: JoinHandle<Vec<RecordedEvent>>,
}

impl StatsPoller {
    /// Start polling every `interval`
    ///
    /// # Errors
    /// Returns an error if the polling thread cannot be spawned
    pub fn start(interval: Duration) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
        let handle = std::thread::Builder::new()
            .name("flightbox-stats".to_string())
            .spawn(move || poll_until_stopped(&stop_rx, interval, read_process_stats))?;
        Ok(Self { stop_tx, handle })
    }

    /// Stop polling and collect the recorded events
    pub fn stop(self) -> Vec<RecordedEvent> {
        // The poller may already be gone if it panicked; join reports that
        let _ = self.stop_tx.send(());
        self.handle.join().unwrap_or_else(|_| {
            warn!("Process statistics poller panicked, statistics dropped");
            Vec::new()
        })
    }
}

fn poll_until_stopped(
    stop_rx: &Receiver<()>,
    interval: Duration,
    read: impl Fn() -> Result<ProcessStats>,
) -> Vec<RecordedEvent> {
    let mut events = Vec::new();
    let mut warned = false;
    let mut snapshot = |events: &mut Vec<RecordedEvent>| match read() {
        Ok(stats) => events.push(stats.to_event(now_ms())),
        Err(e) if !warned => {
            warned = true;
            warn!("Process statistics unavailable, skipping samples: {e:#}");
        }
        Err(e) => debug!("Skipping process statistics sample: {e:#}"),
    };

    snapshot(&mut events);
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => snapshot(&mut events),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    snapshot(&mut events);

    events
}
