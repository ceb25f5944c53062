//! Physical memory display (`md`) and modify (`mw`) through a single-page device mapping.
//!
//! An invocation maps the 4 KiB page that contains the requested physical address from the
//! physical-memory device (`/dev/mem` by default) and then either dumps a run of 1/2/4/8-byte
//! objects as hex plus ASCII, or writes one value repeatedly to a run of objects. All accesses to
//! the page are volatile.
//!
//! - [`width`] resolves `b`/`w`/`l`/`q` suffixes to object widths.
//! - [`mapper`] owns the page mapping and performs the raw accesses.
//! - [`reader`] formats dumps; [`writer`] fills runs.
//! - [`cli`] validates applet arguments; [`config`] carries the device path and log setup.
//!
//! A run never leaves the mapped page: runs that would are rejected before any access.

pub mod cli;
pub mod config;
pub mod error;
pub mod mapper;
pub mod reader;
pub mod width;
pub mod writer;

use std::io::Write;

pub use cli::{Applet, Invocation, Operation};
pub use config::Config;
pub use error::{MemtoolError, NumericArg, Result};
pub use mapper::{map_page, MappedRegion, PAGE_SIZE};
pub use width::{Arch, DataWidth};

/// Maps the page for `invocation` and performs it. Dump output goes to `out`.
///
/// The mapping and device handle are released before this returns, on success and on error.
pub fn execute<W: Write>(invocation: &Invocation, config: &Config, out: &mut W) -> Result<()> {
    let mut region = map_page(&config.device, invocation.paddr())?;

    match *invocation {
        Invocation::Read { width, count, .. } => {
            reader::dump(&region, width, count, out)?;
            out.flush()?;
        }
        Invocation::Write {
            width,
            value,
            count,
            ..
        } => writer::fill(&mut region, width, count, value)?,
    }
    Ok(())
}
