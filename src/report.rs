use std::io;

use console::{Term, style};

use crate::{
    models::{Outcome, RunSummary, Snapshot},
    utils::{bytes_to_mb, format_elapsed},
};

/// Receives the monitor's periodic snapshots and the final summary.
pub trait Reporter: Send {
    fn update(&mut self, snapshot: &Snapshot) -> io::Result<()>;

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()>;
}

pub fn status_line(snapshot: &Snapshot) -> String {
    format!(
        "elapsed: {} rxtx: {:.2}m ↑: {:.2}m/s ↓: {:.2}m/s",
        format_elapsed(snapshot.elapsed),
        bytes_to_mb(snapshot.total() as f64),
        bytes_to_mb(snapshot.upload_speed),
        bytes_to_mb(snapshot.download_speed),
    )
}

/// Rewrites a single status line in place on a terminal; falls back to one
/// line per update when stdout is redirected.
pub struct ConsoleReporter {
    term: Term,
}

impl ConsoleReporter {
    pub fn stdout() -> Self {
        Self {
            term: Term::stdout(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn update(&mut self, snapshot: &Snapshot) -> io::Result<()> {
        if self.term.is_term() {
            self.term.clear_line()?;
            self.term.write_str(&status_line(snapshot))?;
            self.term.flush()
        } else {
            self.term.write_line(&status_line(snapshot))
        }
    }

    fn finish(&mut self, summary: &RunSummary) -> io::Result<()> {
        if self.term.is_term() {
            self.term.clear_line()?;
        }
        self.term.write_line(&status_line(&summary.snapshot))?;

        let marker = match summary.outcome {
            Outcome::ThresholdReached => style("done!").green().bold(),
            Outcome::Interrupted => style("interrupted").yellow().bold(),
        };
        self.term.write_line(&marker.to_string())
    }
}
