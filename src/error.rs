use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cli::Operation;

pub type Result<T> = std::result::Result<T, MemtoolError>;

/// Which command-line argument failed to parse as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericArg {
    Address,
    Value,
    Count,
}

impl fmt::Display for NumericArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumericArg::Address => "address (hex)",
            NumericArg::Value => "value (hex)",
            NumericArg::Count => "count (decimal)",
        };
        f.write_str(name)
    }
}

/// Unified error type for memtool operations.
///
/// Every variant is terminal for the invocation; nothing is retried.
#[derive(Debug, Error)]
pub enum MemtoolError {
    /// Wrong number of applet arguments. The binary answers this with the usage line.
    #[error("invalid argument count for {op}")]
    InvalidArgumentCount { op: Operation },

    #[error("invalid width suffix {suffix:?} (expected one of b, w, l, q)")]
    InvalidWidthSuffix { suffix: String },

    #[error("'{suffix}' is unsupported on 32-bit system")]
    UnsupportedWidthOnPlatform { suffix: char },

    #[error("address {paddr:08x} is not 32-bit aligned")]
    UnalignedAddress { paddr: u64 },

    #[error("{}: {source}", .path.display())]
    DeviceOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("mmap on given addr {page_base:#x}: {source}")]
    MapFailed {
        page_base: u64,
        #[source]
        source: io::Error,
    },

    #[error("invalid {arg}: {text:?}")]
    NumericParseFailure { arg: NumericArg, text: String },

    /// The object run `[offset, offset + count * width)` does not fit in the mapped page.
    #[error("{count} object(s) of {width} byte(s) at page offset {offset:#x} cross the page boundary")]
    RunExceedsPage {
        offset: usize,
        width: usize,
        count: usize,
    },

    #[error("write output: {0}")]
    Output(#[from] io::Error),
}

impl MemtoolError {
    /// Process exit status for this error: the negated OS error number where one exists.
    pub fn exit_code(&self) -> i32 {
        match self {
            MemtoolError::InvalidArgumentCount { .. } => 0,
            MemtoolError::UnalignedAddress { .. } => -1,
            MemtoolError::DeviceOpenFailed { source, .. }
            | MemtoolError::MapFailed { source, .. }
            | MemtoolError::Output(source) => negated_errno(source),
            MemtoolError::InvalidWidthSuffix { .. }
            | MemtoolError::UnsupportedWidthOnPlatform { .. }
            | MemtoolError::NumericParseFailure { .. }
            | MemtoolError::RunExceedsPage { .. } => -libc::EINVAL,
        }
    }
}

fn negated_errno(err: &io::Error) -> i32 {
    match err.raw_os_error() {
        Some(errno) if errno > 0 => -errno,
        _ => -1,
    }
}
