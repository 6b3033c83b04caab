// src/protocol/command.rs
//! Command codes on the FastDFS wire. These are the existing values —
//! not assigned here, just named.

/// Response frame, sent by both roles.
pub const RESPONSE: u8 = 100;

/// Tracker and storage command codes.
///
/// Only the most common codes are named explicitly; anything else decodes
/// to [`Command::Other`] rather than being rejected, since command dispatch
/// belongs to the application-level handlers above this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    // Tracker
    TrackerQueryStoreWithoutGroup,
    TrackerQueryFetchOne,
    TrackerQueryUpdate,
    TrackerQueryStoreWithGroup,
    TrackerQueryFetchAll,
    // Storage
    StorageUploadFile,
    StorageDeleteFile,
    StorageSetMetadata,
    StorageDownloadFile,
    StorageGetMetadata,
    StorageUploadSlaveFile,
    StorageQueryFileInfo,
    StorageUploadAppenderFile,
    StorageAppendFile,
    StorageModifyFile,
    StorageTruncateFile,
    // Both
    Response,
    /// Any code not named above.
    Other(u8),
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            101 => Command::TrackerQueryStoreWithoutGroup,
            102 => Command::TrackerQueryFetchOne,
            103 => Command::TrackerQueryUpdate,
            104 => Command::TrackerQueryStoreWithGroup,
            105 => Command::TrackerQueryFetchAll,
            11 => Command::StorageUploadFile,
            12 => Command::StorageDeleteFile,
            13 => Command::StorageSetMetadata,
            14 => Command::StorageDownloadFile,
            15 => Command::StorageGetMetadata,
            21 => Command::StorageUploadSlaveFile,
            22 => Command::StorageQueryFileInfo,
            23 => Command::StorageUploadAppenderFile,
            24 => Command::StorageAppendFile,
            34 => Command::StorageModifyFile,
            36 => Command::StorageTruncateFile,
            100 => Command::Response,
            other => Command::Other(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(cmd: Command) -> Self {
        match cmd {
            Command::TrackerQueryStoreWithoutGroup => 101,
            Command::TrackerQueryFetchOne => 102,
            Command::TrackerQueryUpdate => 103,
            Command::TrackerQueryStoreWithGroup => 104,
            Command::TrackerQueryFetchAll => 105,
            Command::StorageUploadFile => 11,
            Command::StorageDeleteFile => 12,
            Command::StorageSetMetadata => 13,
            Command::StorageDownloadFile => 14,
            Command::StorageGetMetadata => 15,
            Command::StorageUploadSlaveFile => 21,
            Command::StorageQueryFileInfo => 22,
            Command::StorageUploadAppenderFile => 23,
            Command::StorageAppendFile => 24,
            Command::StorageModifyFile => 34,
            Command::StorageTruncateFile => 36,
            Command::Response => RESPONSE,
            Command::Other(code) => code,
        }
    }
}
