use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

/// Year-Monthname-Day-Hour-Minute-Second
const TIMESTAMP_FORMAT: &str = "%Y-%b-%d-%H:%M:%S";

/// Receives one message per pipeline milestone.
pub trait ProgressLog {
    fn milestone(&self, message: &str);
}

/// Appends `<timestamp> : <message>` lines to a text file.
pub struct FileLog {
    path: PathBuf,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLog { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl ProgressLog for FileLog {
    fn milestone(&self, message: &str) {
        info!("{}", message);
        let line = format_line(&Local::now().format(TIMESTAMP_FORMAT).to_string(), message);
        // A failed append never aborts a run.
        if let Err(e) = self.append(&line) {
            warn!("Could not write progress log {:?}: {}", self.path, e);
        }
    }
}

fn format_line(timestamp: &str, message: &str) -> String {
    format!("{} : {}", timestamp, message)
}

/// Keeps milestones in memory.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryLog {
    messages: std::cell::RefCell<Vec<String>>,
}

#[cfg(test)]
impl MemoryLog {
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

#[cfg(test)]
impl ProgressLog for MemoryLog {
    fn milestone(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
