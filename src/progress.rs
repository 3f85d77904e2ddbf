use std::{
    io::Write,
    time::{Duration, Instant},
};

use crate::units::{byte_size, human_speed};

/// Running counters of a single import, used only for reporting.
#[derive(Debug)]
pub struct Progress {
    written: u64,
    started: Instant,
    // width of the last status line, so a shorter one can blank it out
    last_width: usize,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            written: 0,
            started: Instant::now(),
            last_width: 0,
        }
    }

    pub fn record(&mut self, n: u64) {
        self.written += n;
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// `written 12.5M · 3M/s`
    pub fn status(&self) -> String {
        status_line(self.written, self.elapsed())
    }

    /// Overwrite the current terminal line with the latest status.
    pub fn report<W: Write>(&mut self, out: &mut W) -> std::io::Result<()> {
        let timestamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        let msg = format!("{} [io] {}", timestamp, self.status());
        self.last_width = overwrite_line(out, &msg, self.last_width)?;
        Ok(())
    }
}

pub fn status_line(written: u64, elapsed: Duration) -> String {
    format!(
        "written {} · {}",
        byte_size(written),
        human_speed(written, elapsed)
    )
}

/// Blank the line with spaces, then print `msg` from column zero without a
/// newline. Returns the width of `msg`.
fn overwrite_line<W: Write>(out: &mut W, msg: &str, previous: usize) -> std::io::Result<usize> {
    let width = msg.chars().count();
    write!(out, "\r{}\r{}", " ".repeat(width.max(previous) + 1), msg)?;
    out.flush()?;
    Ok(width)
}
