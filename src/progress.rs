//! Progress display for a run.
//!
//! Reporters are passive: the runner tells them when a handle finished and
//! when the run is over, and nothing they do feeds back into the run.

use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};

use crate::process::ProcessHandle;

/// Observer notified as handles complete.
pub trait ProgressReporter: Send {
    /// Called once before any handle starts.
    fn start(&mut self, total: usize);
    /// Called once per exited handle, success or failure alike.
    fn advance(&mut self, handle: &ProcessHandle);
    /// Called once when every handle has exited.
    fn finish(&mut self);
}

/// Reporter that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&mut self, _total: usize) {}
    fn advance(&mut self, _handle: &ProcessHandle) {}
    fn finish(&mut self) {}
}

const BAR_WIDTH: usize = 24;
const LABEL_WIDTH: usize = 48;

/// Single-line bar redrawn in place: `[######------] 3/6 npm ci`.
#[derive(Debug)]
pub struct ProgressBar<W: Write> {
    writer: W,
    total: usize,
    done: usize,
    label: String,
}

impl ProgressBar<io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write> ProgressBar<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            total: 0,
            done: 0,
            label: String::new(),
        }
    }

    fn line(&self) -> String {
        let filled = if self.total == 0 {
            BAR_WIDTH
        } else {
            (self.done * BAR_WIDTH / self.total).min(BAR_WIDTH)
        };
        let mut line = format!(
            "[{}{}] {}/{}",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            self.done,
            self.total
        );
        if !self.label.is_empty() {
            line.push(' ');
            line.push_str(&truncate(&self.label, LABEL_WIDTH));
        }
        line
    }

    fn render(&mut self) -> io::Result<()> {
        let line = self.line();
        queue!(
            self.writer,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )?;
        self.writer.flush()
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.writer, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        self.writer.flush()
    }
}

impl<W: Write + Send> ProgressReporter for ProgressBar<W> {
    fn start(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.label.clear();
        let _ = self.render();
    }

    fn advance(&mut self, handle: &ProcessHandle) {
        self.done += 1;
        self.label = handle.command().to_string();
        let _ = self.render();
    }

    fn finish(&mut self) {
        let _ = self.clear();
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
