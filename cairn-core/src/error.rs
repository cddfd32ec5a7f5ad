//! The shared error type for the cairn workspace.
//!
//! Every layer of the log reports through this enum so that trait seams
//! (node stores, seal getters, directory listers) compose without adapter
//! types. The variants distinguish the conditions an auditor needs to tell
//! apart: a malformed file, a wrong signing key, a tampered log and an
//! inconsistent extension are all different failures.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for cairn operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the cairn workspace.
#[derive(Debug, Error)]
pub enum Error {
    // ------------------------------------------------------------------
    // MMR algebra
    // ------------------------------------------------------------------
    /// The size is not a valid MMR size (a sibling exists without a parent).
    #[error("{0} is not a valid mmr size")]
    InvalidSize(u64),

    /// A node was requested that the store cannot serve.
    #[error("requested mmr index {0} not available")]
    GetIndexUnavailable(u64),

    /// A consistency proof did not carry one path per accumulator peak.
    #[error("a proof for each accumulator peak is required: expected {expected}, got {got}")]
    AccumulatorProofLen { expected: usize, got: usize },

    /// The proven roots do not fold into the target accumulator.
    #[error("consistency check failed")]
    ConsistencyCheck,

    // ------------------------------------------------------------------
    // Massif blob format
    // ------------------------------------------------------------------
    /// The file does not begin with a massif start header.
    #[error("the file is not recognized as a massif: {0}")]
    LogFileNoMagic(String),

    /// The massif start header was truncated or malformed.
    #[error("a massif file header was too short or badly formed: {0}")]
    LogFileBadHeader(String),

    /// The header height disagrees with the height the caller requires.
    #[error("massif height in header is {header}, required {required}")]
    MassifHeightHeader { header: u8, required: u8 },

    /// Two files in one directory claim the same massif index.
    #[error("log files with massif index {index} duplicated: {first} and {second}")]
    DuplicateMassifIndices {
        index: u64,
        first: PathBuf,
        second: PathBuf,
    },

    /// No massif file for the requested index.
    #[error("no log file for massif index {0}")]
    MassifNotFound(u64),

    /// No seal file for the requested index.
    #[error("no seal for massif index {0}")]
    SealNotFound(u64),

    // ------------------------------------------------------------------
    // Append engine
    // ------------------------------------------------------------------
    /// Append attempted on a blob that already holds its full node count.
    #[error("the current massif is full")]
    MassifFull,

    /// Rollover attempted on a blob that still has room.
    #[error("the current massif is not full")]
    MassifNotFull,

    /// The ancestor peak stack disagrees with the value derived from the
    /// header, or is misaligned.
    #[error("the ancestor peak stack is invalid: {0}")]
    AncestorStackInvalid(String),

    /// A log value was not exactly 32 bytes.
    #[error("log value size invalid: {0}")]
    LogValueBadSize(usize),

    /// An index entry was not exactly 64 bytes.
    #[error("index entry size invalid: {0}")]
    IndexEntryBadSize(usize),

    /// The application id is not strictly greater than the last recorded id.
    #[error("entry id {offered} is not greater than the last id {last}")]
    IdNotMonotonic { last: u64, offered: u64 },

    // ------------------------------------------------------------------
    // Seals and verification
    // ------------------------------------------------------------------
    /// The seal envelope could not be decoded.
    #[error("malformed seal: {0}")]
    SealMalformed(String),

    /// The key embedded in the seal does not match the trusted key.
    #[error("the seal signing key does not match the trusted key")]
    RemoteSealKeyMatchFailed,

    /// The seal signature did not verify.
    #[error("seal signature verification failed")]
    Verification,

    /// The sealed size falls outside the range covered by the massif.
    #[error("seal size {size} is outside massif range [{first_index}, {range_count}]")]
    SealNotConsistentWithMassif {
        size: u64,
        first_index: u64,
        range_count: u64,
    },

    /// The log state is inconsistent with a previously trusted state.
    #[error("inconsistent log state: {0}")]
    InconsistentState(String),

    // ------------------------------------------------------------------
    // Paths and IO
    // ------------------------------------------------------------------
    /// Expected an existing directory.
    #[error("expected the path to be an existing directory: {0}")]
    PathIsNotDir(PathBuf),

    /// A storage path did not match the massif naming schema.
    #[error("invalid massif path: {0}")]
    MassifPathFmt(String),

    /// A file write reported success but wrote fewer bytes than supplied.
    #[error("short write installing {0}")]
    WriteIncomplete(PathBuf),

    /// A hex value could not be parsed as a hash.
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// An underlying IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
