//! Driver and worker settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for talking to the module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    /// How long to wait for a complete response frame
    #[serde(with = "duration_ms")]
    pub response_timeout: Duration,
    /// Largest chunk pulled from the transport per read
    pub read_chunk: usize,
    /// Baud rate the link is opened with
    pub initial_baud_rate: u32,
}

impl ModuleConfig {
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_initial_baud_rate(mut self, baud_rate: u32) -> Self {
        self.initial_baud_rate = baud_rate;
        self
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(500),
            read_chunk: 64,
            initial_baud_rate: 115200,
        }
    }
}

/// Bounds for discovering a bank's length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub word_low: u16,
    pub word_high: u16,
    /// Failed probes tolerated before giving up
    pub retries: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            word_low: 5,
            word_high: 100,
            retries: 3,
        }
    }
}

/// Banks copied onto a destination tag by the write use case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteMask {
    pub epc: bool,
    pub tid: bool,
    pub user: bool,
}

impl Default for WriteMask {
    fn default() -> Self {
        // TID is factory locked on nearly every tag
        Self {
            epc: true,
            tid: false,
            user: true,
        }
    }
}

/// Settings for the background worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Pause between unsuccessful polls
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Give up polling after this many attempts; `None` polls until stopped
    pub max_poll_attempts: Option<u32>,
    pub probe: ProbeConfig,
    pub write_mask: WriteMask,
    /// Attempts per select or bank write before the run fails
    pub write_retries: u32,
}

impl WorkerConfig {
    pub fn with_max_poll_attempts(mut self, attempts: u32) -> Self {
        self.max_poll_attempts = Some(attempts);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_write_mask(mut self, mask: WriteMask) -> Self {
        self.write_mask = mask;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            max_poll_attempts: None,
            probe: ProbeConfig::default(),
            write_mask: WriteMask::default(),
            write_retries: 3,
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
