use std::fs::{File, OpenOptions};
use std::io::Write;

use tracing::warn;

use crate::trace::trace::CrawlEvent;

/// Appends crawl events to a JSONL file. Failures never interrupt the crawl.
pub struct TraceLogger {
    file: Option<File>,
}

impl TraceLogger {
    pub fn new(path: &str) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self { file: Some(file) },
            Err(e) => {
                warn!(path, error = %e, "could not open trace file, tracing disabled");
                Self::disabled()
            }
        }
    }

    /// A logger that drops every event.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn log(&self, event: &CrawlEvent) {
        let Some(file) = &self.file else {
            return;
        };

        let mut line = match serde_json::to_vec(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "failed to serialize crawl event");
                return;
            }
        };
        line.push(b'\n');

        // One write per line keeps appends whole
        let mut writer = file;
        if let Err(e) = writer.write_all(&line) {
            warn!(error = %e, "failed to write crawl event");
        }
    }
}
