use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::screen::ScreenSignature;

/// What the explorer decided or observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlEventKind {
    RunStarted,
    ScreenEntered,
    AlreadyExplored,
    Tap,
    Navigated,
    Popup,
    NoChange,
    Filled,
    Toggled,
    Stuck,
    Incident,
    ReturnFailed,
    RunFinished,
}

/// One JSONL line of the crawl trace.
#[derive(Debug, Serialize)]
pub struct CrawlEvent {
    pub timestamp_ms: u128,
    pub depth: usize,
    pub kind: CrawlEventKind,

    pub screen: Option<String>,
    pub element: Option<String>,
    pub target: Option<String>,
    pub detail: Option<String>,
}

impl CrawlEvent {
    pub fn now(kind: CrawlEventKind, depth: usize) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            depth,
            kind,
            screen: None,
            element: None,
            target: None,
            detail: None,
        }
    }

    pub fn with_screen(mut self, screen: &ScreenSignature) -> Self {
        self.screen = Some(screen.to_string());
        self
    }

    pub fn with_element(mut self, element_id: &str) -> Self {
        self.element = Some(element_id.to_string());
        self
    }

    pub fn with_target(mut self, target: &ScreenSignature) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_detail(mut self, detail: impl ToString) -> Self {
        self.detail = Some(detail.to_string());
        self
    }
}
