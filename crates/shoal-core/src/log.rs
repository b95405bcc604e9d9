use derive_more::Display;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering},
};

pub const DEFAULT_LOG_CAPACITY: usize = 4_096;

///
/// Level
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace, // least severe
    Debug,
    Info,
    Warn,
    Error, // most severe
}

impl Level {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Trace,
            1 => Self::Debug,
            3 => Self::Warn,
            4 => Self::Error,
            _ => Self::Info,
        }
    }
}

///
/// Topic
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[remain::sorted]
pub enum Topic {
    Compaction,
    Config,
    Marshalling,
    Store,
}

///
/// LogEntry
///

#[derive(Clone, Debug)]
pub struct LogEntry {
    pub seq: u64,
    pub level: Level,
    pub topic: Option<Topic>,
    pub message: String,
}

//
// Process-wide log state. Many caller threads append; the buffer is a
// bounded ring so a chatty workload cannot grow it without limit.
//

static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Info as u8);
static CAPACITY: AtomicUsize = AtomicUsize::new(DEFAULT_LOG_CAPACITY);
static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);
static ENTRIES: Mutex<VecDeque<LogEntry>> = Mutex::new(VecDeque::new());

///
/// Log
///

pub struct Log;

impl Log {
    pub fn set_level(threshold: Level) {
        THRESHOLD.store(threshold as u8, Ordering::Relaxed);
    }

    #[must_use]
    pub fn level() -> Level {
        Level::from_u8(THRESHOLD.load(Ordering::Relaxed))
    }

    /// Cheap enablement gate; callers check this before formatting.
    #[inline]
    #[must_use]
    pub fn enabled(level: Level) -> bool {
        level as u8 >= THRESHOLD.load(Ordering::Relaxed)
    }

    pub fn set_capacity(capacity: usize) {
        CAPACITY.store(capacity.max(1), Ordering::Relaxed);
    }

    pub fn append(topic: Option<Topic>, level: Level, message: &str) {
        if !Self::enabled(level) {
            return;
        }

        let entry = LogEntry {
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
            level,
            topic,
            message: message.to_string(),
        };

        let capacity = CAPACITY.load(Ordering::Relaxed);
        let mut entries = ENTRIES.lock();
        entries.push_back(entry);
        while entries.len() > capacity {
            entries.pop_front();
        }
    }

    #[must_use]
    pub fn snapshot() -> Vec<LogEntry> {
        ENTRIES.lock().iter().cloned().collect()
    }

    pub fn clear() {
        ENTRIES.lock().clear();
    }
}

#[macro_export]
macro_rules! log {
    // =========================================
    // (1) With topic (normal + trailing comma)
    // =========================================
    ($topic:expr, $level:ident, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        let level = $crate::log::Level::$level;
        if $crate::log::Log::enabled(level) {
            let message = format!($fmt $(, $arg)*);
            $crate::log::Log::append(Some($topic), level, &message);
        }
    }};

    // =========================================
    // (2) No topic (normal + trailing comma)
    // =========================================
    ($level:ident, $fmt:expr $(, $arg:expr)* $(,)?) => {{
        let level = $crate::log::Level::$level;
        if $crate::log::Log::enabled(level) {
            let message = format!($fmt $(, $arg)*);
            $crate::log::Log::append(None, level, &message);
        }
    }};
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn with_marker(marker: &str) -> Vec<LogEntry> {
        Log::snapshot()
            .into_iter()
            .filter(|entry| entry.message.contains(marker))
            .collect()
    }

    #[test]
    fn entries_below_the_threshold_are_dropped() {
        Log::append(Some(Topic::Marshalling), Level::Trace, "gate-test trace");
        Log::append(Some(Topic::Marshalling), Level::Warn, "gate-test warn");

        let hits = with_marker("gate-test");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].level, Level::Warn);
        assert_eq!(hits[0].topic, Some(Topic::Marshalling));
    }

    #[test]
    fn macro_formats_lazily_and_records() {
        crate::log!(Topic::Config, Info, "macro-test {}", 42);
        crate::log!(Info, "macro-test untopiced");

        let hits = with_marker("macro-test");
        assert!(hits.iter().any(|e| e.message == "macro-test 42"));
        assert!(
            hits.iter()
                .any(|e| e.message == "macro-test untopiced" && e.topic.is_none())
        );
    }

    #[test]
    fn level_round_trips_through_the_gate() {
        assert_eq!(Level::from_u8(Level::Trace as u8), Level::Trace);
        assert_eq!(Level::from_u8(Level::Error as u8), Level::Error);
        assert_eq!(Level::from_u8(99), Level::Info);
    }
}
