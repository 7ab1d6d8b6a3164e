// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [buffer]
/// capacity = 65536
///
/// [exec]
/// timeout_secs = 30
/// on_timeout = "abort"
///
/// [repeat]
/// count = -1
/// interval_ms = 500
/// ttl_secs = 3600
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Ring-buffer sizing from `[buffer]`.
    #[serde(default)]
    pub buffer: BufferSection,

    /// Per-invocation behaviour from `[exec]`.
    #[serde(default)]
    pub exec: ExecSection,

    /// Repeat-schedule defaults from `[repeat]`.
    #[serde(default)]
    pub repeat: RepeatSection,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            buffer: BufferSection::default(),
            exec: ExecSection::default(),
            repeat: RepeatSection::default(),
        }
    }
}

/// `[buffer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct BufferSection {
    /// Per-channel capacity in bytes. Fixed for the lifetime of a pipe.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    64 * 1024
}

impl Default for BufferSection {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

/// `[exec]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSection {
    /// Per-invocation timeout in seconds; absent means no timeout.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// `"abort"` or `"continue"`: what a single-iteration timeout does to a
    /// repeated sequence.
    #[serde(default = "default_on_timeout")]
    pub on_timeout: String,
}

fn default_on_timeout() -> String {
    "abort".to_string()
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            on_timeout: default_on_timeout(),
        }
    }
}

impl ExecSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// `[repeat]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RepeatSection {
    /// Invocation count; negative means unbounded, zero runs nothing.
    #[serde(default = "default_count")]
    pub count: i64,

    /// Interval between iteration starts, in milliseconds.
    #[serde(default)]
    pub interval_ms: u64,

    /// Time-to-live for the whole sequence, in seconds; absent means
    /// unbounded.
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

fn default_count() -> i64 {
    1
}

impl Default for RepeatSection {
    fn default() -> Self {
        Self {
            count: default_count(),
            interval_ms: 0,
            ttl_secs: None,
        }
    }
}

impl RepeatSection {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}
