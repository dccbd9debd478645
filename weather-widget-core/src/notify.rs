//! Non-blocking user notifications.

use std::fmt::Debug;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.level {
            NoticeLevel::Info => write!(f, "{}", self.message),
            NoticeLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Single sink for everything the user should be told about.
pub trait Notifier: Send + Sync + Debug {
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Info => info!(text = %notice.message, "notice"),
            NoticeLevel::Error => error!(text = %notice.message, "notice"),
        }
    }
}

/// Keeps notices in memory so they can be shown after a run.
#[derive(Debug, Default, Clone)]
pub struct CollectingNotifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut guard) => guard.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}
