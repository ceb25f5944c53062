use crate::error::Result;
use crate::mapper::MappedRegion;
use crate::width::DataWidth;

/// Objects written when no count is given.
pub const DEFAULT_WRITE_COUNT: usize = 1;

/// Writes `value`, narrowed to `width`, into `count` consecutive objects starting at the region's
/// requested address. Nothing is read back.
pub fn fill(region: &mut MappedRegion, width: DataWidth, count: usize, value: u64) -> Result<()> {
    region.check_run(region.offset(), width, count)?;

    tracing::debug!(
        paddr = format_args!("{:08x}", region.paddr()),
        width = width.bytes(),
        count,
        value = format_args!("{value} ({value:016x})"),
        "writing memory"
    );

    let mut offset = region.offset();
    for _ in 0..count {
        region.write(offset, width, value)?;
        offset += width.bytes();
        tracing::trace!(next = format_args!("{:#x}", region.page_base() + offset as u64));
    }
    Ok(())
}
