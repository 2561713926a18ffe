//! Structured, append-only progress log
//!
//! Engines append events as they go; a presentation layer either registers a
//! listener for live rendering or walks the events afterwards. Each append is
//! also mirrored to the `log` facade.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Which stream an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Step-by-step narrative, including per-target failures
    Log,
    /// Fatal errors that stopped the operation before any mutation
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Info,
    Success,
    /// Explicit zero-result notices ("no matching objects", "nothing to copy")
    Notice,
    /// A single target failed; the run continued
    TargetFailure,
    Fatal,
}

impl EventKind {
    pub fn marker(&self) -> &'static str {
        match self {
            EventKind::Info => "",
            EventKind::Success => "[ok]",
            EventKind::Notice => "[none]",
            EventKind::TargetFailure => "[FAILED]",
            EventKind::Fatal => "[error]",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Position in the log, starting at 0
    pub seq: usize,
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub kind: EventKind,
    /// Index the event is about, when there is one
    pub target: Option<String>,
    pub message: String,
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = self.kind.marker();
        if !marker.is_empty() {
            write!(f, "{} ", marker)?;
        }
        if let Some(target) = &self.target {
            write!(f, "{}: ", target)?;
        }
        write!(f, "{}", self.message)
    }
}

type Listener = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Shared handle to one operation's event log; clones append to the same log
#[derive(Clone, Default)]
pub struct ProgressLog {
    events: Arc<Mutex<Vec<LogEvent>>>,
    listener: Option<Listener>,
}

impl fmt::Debug for ProgressLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressLog")
            .field("events", &self.len())
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke `listener` synchronously on every append
    pub fn with_listener<F>(listener: F) -> Self
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        Self {
            events: Arc::default(),
            listener: Some(Arc::new(listener)),
        }
    }

    fn append(&self, channel: Channel, kind: EventKind, target: Option<&str>, message: String) {
        match kind {
            EventKind::Fatal => log::error!("{}", message),
            EventKind::TargetFailure => log::warn!("{}: {}", target.unwrap_or("-"), message),
            EventKind::Notice => log::info!("{}", message),
            EventKind::Info | EventKind::Success => match target {
                Some(t) => log::info!("{}: {}", t, message),
                None => log::info!("{}", message),
            },
        }

        let event = {
            let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            let event = LogEvent {
                seq: events.len(),
                timestamp: Utc::now(),
                channel,
                kind,
                target: target.map(str::to_string),
                message,
            };
            events.push(event.clone());
            event
        };

        if let Some(listener) = &self.listener {
            listener(&event);
        }
    }

    pub fn info(&self, target: Option<&str>, message: impl Into<String>) {
        self.append(Channel::Log, EventKind::Info, target, message.into());
    }

    pub fn success(&self, target: Option<&str>, message: impl Into<String>) {
        self.append(Channel::Log, EventKind::Success, target, message.into());
    }

    pub fn notice(&self, target: Option<&str>, message: impl Into<String>) {
        self.append(Channel::Log, EventKind::Notice, target, message.into());
    }

    /// Per-target failure; stays on the log channel
    pub fn target_failure(&self, target: &str, message: impl Into<String>) {
        self.append(Channel::Log, EventKind::TargetFailure, Some(target), message.into());
    }

    /// Fatal error on the error channel
    pub fn error(&self, message: impl Into<String>) {
        self.append(Channel::Error, EventKind::Fatal, None, message.into());
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every event so far
    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Events appended at or after `cursor`, for incremental rendering
    pub fn since(&self, cursor: usize) -> Vec<LogEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.get(cursor..).map(<[LogEvent]>::to_vec).unwrap_or_default()
    }

    /// Lazy walk over the log. Each call starts from the beginning and also
    /// yields events appended while iterating.
    pub fn iter(&self) -> EventIter {
        EventIter {
            log: self.clone(),
            cursor: 0,
        }
    }

    /// First message on the error channel
    pub fn first_error(&self) -> Option<String> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.channel == Channel::Error)
            .map(|e| e.message.clone())
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

pub struct EventIter {
    log: ProgressLog,
    cursor: usize,
}

impl Iterator for EventIter {
    type Item = LogEvent;

    fn next(&mut self) -> Option<LogEvent> {
        let events = self.log.events.lock().unwrap_or_else(|e| e.into_inner());
        let event = events.get(self.cursor).cloned()?;
        self.cursor += 1;
        Some(event)
    }
}
