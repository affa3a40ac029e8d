//! Types for RFID operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Baud rates the module accepts for its UART link.
pub const BAUD_RATES: [u32; 5] = [9600, 19200, 38400, 57600, 115200];

/// Transmit power levels (dBm) the module accepts.
pub const POWER_LEVELS_DBM: [u16; 5] = [18, 20, 22, 24, 26];

/// Structural or integrity problem with a received frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame incomplete: end marker not received")]
    Incomplete,

    #[error("frame too short: {0} bytes")]
    TooShort(usize),

    #[error("declared payload length {declared} does not match {actual} received bytes")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("checksum mismatch: frame carries 0x{found:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { found: u8, computed: u8 },

    #[error("EPC CRC mismatch: tag reports 0x{found:04X}, computed 0x{computed:04X}")]
    CrcMismatch { found: u16, computed: u16 },
}

impl FrameError {
    /// True for failures of a structurally complete frame.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            FrameError::ChecksumMismatch { .. } | FrameError::CrcMismatch { .. }
        )
    }
}

/// Errors that can occur during RFID operations
#[derive(Debug, Error)]
pub enum UhfError {
    /// Transport layer error (UART, serial, etc.)
    #[error("transport error: {0}")]
    Transport(String),

    /// No complete frame arrived within the response timeout
    #[error("timed out waiting for response")]
    Timeout,

    /// Frame was cut short or its length fields are inconsistent
    #[error("malformed frame: {0}")]
    Frame(FrameError),

    /// Checksum or CRC did not match
    #[error("integrity check failed: {0}")]
    Integrity(FrameError),

    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Well-formed frame with unexpected content
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The module answered with an error status
    #[error("module reported {0}")]
    Module(ModuleStatus),

    /// Bank data exceeds the bank capacity
    #[error("{bank:?} bank data of {len} bytes exceeds capacity")]
    BankOverflow { bank: MemoryBank, len: usize },

    /// A worker run is already in progress
    #[error("worker is busy")]
    WorkerBusy,
}

impl From<FrameError> for UhfError {
    fn from(err: FrameError) -> Self {
        if err.is_integrity() {
            UhfError::Integrity(err)
        } else {
            UhfError::Frame(err)
        }
    }
}

/// Status codes carried by the module's `FF` error responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Read failed: no tag answered or the EPC did not match
    ReadFail,
    WriteFail,
    KillFail,
    LockFail,
    /// Inventory round found no tag
    InventoryFail,
    AccessDenied,
    InvalidCommand,
    /// Read past the end of the bank
    ReadOverrun,
    /// Write past the end of the bank
    WriteOverrun,
    Unknown(u8),
}

impl From<u8> for ModuleStatus {
    fn from(code: u8) -> Self {
        match code {
            0x09 => ModuleStatus::ReadFail,
            0x10 => ModuleStatus::WriteFail,
            0x12 => ModuleStatus::KillFail,
            0x13 => ModuleStatus::LockFail,
            0x15 => ModuleStatus::InventoryFail,
            0x16 => ModuleStatus::AccessDenied,
            0x17 => ModuleStatus::InvalidCommand,
            0xA3 => ModuleStatus::ReadOverrun,
            0xB3 => ModuleStatus::WriteOverrun,
            other => ModuleStatus::Unknown(other),
        }
    }
}

impl From<ModuleStatus> for u8 {
    fn from(status: ModuleStatus) -> u8 {
        match status {
            ModuleStatus::ReadFail => 0x09,
            ModuleStatus::WriteFail => 0x10,
            ModuleStatus::KillFail => 0x12,
            ModuleStatus::LockFail => 0x13,
            ModuleStatus::InventoryFail => 0x15,
            ModuleStatus::AccessDenied => 0x16,
            ModuleStatus::InvalidCommand => 0x17,
            ModuleStatus::ReadOverrun => 0xA3,
            ModuleStatus::WriteOverrun => 0xB3,
            ModuleStatus::Unknown(code) => code,
        }
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} (0x{:02X})", self, u8::from(*self))
    }
}

/// Result of a bank read that reached the module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Success,
    MemoryOverrun,
    NoTagResponse,
}

/// Tag memory banks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MemoryBank {
    Reserved = 0x00,
    Epc = 0x01,
    Tid = 0x02,
    User = 0x03,
}

impl TryFrom<u8> for MemoryBank {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(MemoryBank::Reserved),
            0x01 => Ok(MemoryBank::Epc),
            0x02 => Ok(MemoryBank::Tid),
            0x03 => Ok(MemoryBank::User),
            other => Err(other),
        }
    }
}

/// Regulatory working area (frequency plan)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum WorkingArea {
    China900 = 0x01,
    Us = 0x02,
    Europe = 0x03,
    China800 = 0x04,
    Korea = 0x06,
}

impl TryFrom<u8> for WorkingArea {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(WorkingArea::China900),
            0x02 => Ok(WorkingArea::Us),
            0x03 => Ok(WorkingArea::Europe),
            0x04 => Ok(WorkingArea::China800),
            0x06 => Ok(WorkingArea::Korea),
            other => Err(other),
        }
    }
}

/// When the module sends its stored Select before tag operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SelectMode {
    /// Before every tag operation
    Always = 0x00,
    Disabled = 0x01,
    /// Before read, write, lock and kill but not before polling
    NonPolling = 0x02,
}

impl TryFrom<u8> for SelectMode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(SelectMode::Always),
            0x01 => Ok(SelectMode::Disabled),
            0x02 => Ok(SelectMode::NonPolling),
            other => Err(other),
        }
    }
}
