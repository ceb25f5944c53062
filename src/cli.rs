//! Applet argument handling for `md[.b|.w|.l|.q]` and `mw[.b|.w|.l|.q]`.
//!
//! Argument counts include the applet name itself, matching how the applets are invoked through
//! a symlink: `md.l <addr> [count]` is 2 or 3 arguments, `mw.l <addr> <val> [count]` is 3 or 4.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{MemtoolError, NumericArg, Result};
use crate::reader::DEFAULT_READ_COUNT;
use crate::width::{Arch, DataWidth};
use crate::writer::DEFAULT_WRITE_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    /// Operation named by the first two characters of an applet name, if any.
    pub fn from_applet(applet: &str) -> Option<Operation> {
        if applet.starts_with("md") {
            Some(Operation::Read)
        } else if applet.starts_with("mw") {
            Some(Operation::Write)
        } else {
            None
        }
    }

    const fn extra_args(self) -> usize {
        match self {
            Operation::Read => 0,
            Operation::Write => 1,
        }
    }

    pub const fn min_args(self) -> usize {
        2 + self.extra_args()
    }

    pub const fn max_args(self) -> usize {
        3 + self.extra_args()
    }

    pub const fn default_count(self) -> usize {
        match self {
            Operation::Read => DEFAULT_READ_COUNT,
            Operation::Write => DEFAULT_WRITE_COUNT,
        }
    }

    pub const fn usage(self) -> &'static str {
        match self {
            Operation::Read => "md.[b|w|l|q] <addr> [count]",
            Operation::Write => "mw.[b|w|l|q] <addr> <val> [count]",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Read => "md",
            Operation::Write => "mw",
        })
    }
}

/// An applet name such as `md.l`, checked to start with `md` or `mw`.
///
/// The width suffix is resolved later, together with the arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applet {
    name: String,
    op: Operation,
}

impl Applet {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates `args` (everything after the applet name) for this applet.
    pub fn invocation(&self, args: &[String], arch: Arch) -> Result<Invocation> {
        Invocation::parse(self.op, &self.name, args, arch)
    }
}

impl FromStr for Applet {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let name = applet_name(s);
        match Operation::from_applet(name) {
            Some(op) => Ok(Applet {
                name: name.to_string(),
                op,
            }),
            None => Err(format!(
                "unknown applet {s:?} (expected md[.b|.w|.l|.q] or mw[.b|.w|.l|.q])"
            )),
        }
    }
}

/// A fully validated applet invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    Read {
        width: DataWidth,
        paddr: u64,
        count: usize,
    },
    Write {
        width: DataWidth,
        paddr: u64,
        value: u64,
        count: usize,
    },
}

impl Invocation {
    /// Parses `args` for the applet `op`.
    ///
    /// The argument count is checked before the width suffix, so a wrong count always yields
    /// [`MemtoolError::InvalidArgumentCount`].
    pub fn parse(op: Operation, applet: &str, args: &[String], arch: Arch) -> Result<Invocation> {
        let argc = args.len() + 1;
        if argc < op.min_args() || argc > op.max_args() {
            return Err(MemtoolError::InvalidArgumentCount { op });
        }

        let width = DataWidth::from_applet(applet, arch)?;

        let count = match args.get(1 + op.extra_args()) {
            Some(text) => parse_count(text)?,
            None => op.default_count(),
        };
        let paddr = parse_hex(&args[0], NumericArg::Address)?;

        Ok(match op {
            Operation::Read => Invocation::Read {
                width,
                paddr,
                count,
            },
            Operation::Write => Invocation::Write {
                width,
                paddr,
                value: parse_hex(&args[1], NumericArg::Value)?,
                count,
            },
        })
    }

    pub fn paddr(&self) -> u64 {
        match *self {
            Invocation::Read { paddr, .. } | Invocation::Write { paddr, .. } => paddr,
        }
    }
}

/// Applet name from a program path: the file name, so `./md.l` and `/usr/local/bin/md.l` both
/// give `md.l`.
pub fn applet_name(program: &str) -> &str {
    Path::new(program)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(program)
}

/// Rewrites a multi-call command line (`md.l 1000 4`, invoked through a symlink) into the
/// front-end form (`memtool md.l 1000 4`). Other command lines are returned unchanged.
pub fn normalize_args(mut args: Vec<OsString>, bin_name: &str) -> Vec<OsString> {
    let applet = args
        .first()
        .and_then(|program| program.to_str())
        .map(applet_name)
        .filter(|name| Operation::from_applet(name).is_some())
        .map(OsString::from);

    if let Some(applet) = applet {
        args[0] = applet;
        args.insert(0, OsString::from(bin_name));
    }
    args
}

/// Parses a hexadecimal number with an optional `0x`/`0X` prefix.
pub fn parse_hex(text: &str, arg: NumericArg) -> Result<u64> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.starts_with('+') {
        return Err(numeric_failure(arg, text));
    }
    u64::from_str_radix(digits, 16).map_err(|_| numeric_failure(arg, text))
}

/// Parses a decimal object count.
pub fn parse_count(text: &str) -> Result<usize> {
    let trimmed = text.trim();
    if trimmed.starts_with('+') {
        return Err(numeric_failure(NumericArg::Count, text));
    }
    trimmed
        .parse::<usize>()
        .map_err(|_| numeric_failure(NumericArg::Count, text))
}

fn numeric_failure(arg: NumericArg, text: &str) -> MemtoolError {
    MemtoolError::NumericParseFailure {
        arg,
        text: text.to_string(),
    }
}
