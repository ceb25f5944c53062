//! Single-page mappings of the physical-memory device.
//!
//! [`map_page`] maps the 4 KiB page containing a physical address and returns a [`MappedRegion`]
//! that owns both the mapping and the device handle. Dropping the region unmaps the page and then
//! closes the device, so every exit path releases both exactly once.
//!
//! All object accesses are volatile and bounds-checked against the page.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;

use memmap2::{MmapMut, MmapOptions};

use crate::error::{MemtoolError, Result};
use crate::width::DataWidth;

/// Size of the one page that is ever mapped.
pub const PAGE_SIZE: usize = 4096;
pub const PAGE_MASK: u64 = PAGE_SIZE as u64 - 1;

/// Required alignment of the requested physical address.
pub const ADDRESS_ALIGNMENT: u64 = 4;

/// Page-aligned base of the page containing `paddr`.
#[inline]
pub const fn page_base(paddr: u64) -> u64 {
    paddr & !PAGE_MASK
}

/// Offset of `paddr` within its page.
#[inline]
pub const fn page_offset(paddr: u64) -> usize {
    (paddr & PAGE_MASK) as usize
}

/// Maps the page of `device` that contains `paddr`, read-write and shared.
///
/// The address is validated before the device is touched.
pub fn map_page(device: &Path, paddr: u64) -> Result<MappedRegion> {
    if paddr % ADDRESS_ALIGNMENT != 0 {
        return Err(MemtoolError::UnalignedAddress { paddr });
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_SYNC)
        .open(device)
        .map_err(|source| MemtoolError::DeviceOpenFailed {
            path: device.to_path_buf(),
            source,
        })?;

    let base = page_base(paddr);
    // SAFETY: the mapping is only ever accessed through raw volatile reads and writes, never
    // through references, so concurrent modification by hardware or other processes cannot
    // invalidate Rust aliasing assumptions.
    let map = unsafe { MmapOptions::new().offset(base).len(PAGE_SIZE).map_mut(&file) }
        .map_err(|source| MemtoolError::MapFailed {
            page_base: base,
            source,
        })?;

    tracing::debug!(
        device = %device.display(),
        paddr = format_args!("{paddr:08x}"),
        page_base = format_args!("{base:#x}"),
        vaddr = ?map.as_ptr().wrapping_add(page_offset(paddr)),
        "mapped page"
    );

    Ok(MappedRegion {
        map,
        device: Some(file),
        page_base: base,
        offset: page_offset(paddr),
    })
}

/// One mapped page plus the offset of the requested address inside it.
pub struct MappedRegion {
    // Declared before `device`: the page is unmapped before the handle is closed.
    map: MmapMut,
    device: Option<File>,
    page_base: u64,
    offset: usize,
}

impl MappedRegion {
    /// Backs a region with zeroed anonymous memory instead of a device page.
    ///
    /// The region reports `paddr` as its address, which needs no alignment here.
    #[cfg(test)]
    pub(crate) fn anonymous(paddr: u64) -> std::io::Result<MappedRegion> {
        Ok(MappedRegion {
            map: MmapMut::map_anon(PAGE_SIZE)?,
            device: None,
            page_base: page_base(paddr),
            offset: page_offset(paddr),
        })
    }

    /// Physical address of the first byte of the mapped page.
    pub fn page_base(&self) -> u64 {
        self.page_base
    }

    /// Offset of the requested address within the page.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The requested physical address.
    pub fn paddr(&self) -> u64 {
        self.page_base + self.offset as u64
    }

    /// Checks that `count` objects of `width` starting at page offset `offset` stay in the page.
    pub fn check_run(&self, offset: usize, width: DataWidth, count: usize) -> Result<()> {
        let end = count
            .checked_mul(width.bytes())
            .and_then(|len| len.checked_add(offset));
        match end {
            Some(end) if end <= PAGE_SIZE => Ok(()),
            _ => Err(MemtoolError::RunExceedsPage {
                offset,
                width: width.bytes(),
                count,
            }),
        }
    }

    /// Volatile read of one object at page offset `offset`, returned as native-endian bytes.
    ///
    /// An aligned object is read with a single access of its own width. An 8-byte object at an
    /// offset that is 4-aligned but not 8-aligned is read as two 4-byte accesses, lower address
    /// first, so the read is not atomic.
    pub fn load(&self, offset: usize, width: DataWidth) -> Result<[u8; 8]> {
        self.check_run(offset, width, 1)?;

        let mut raw = [0u8; 8];
        let unit = access_unit(offset, width);
        let mut pos = 0;
        while pos < width.bytes() {
            // SAFETY: `check_run` keeps `offset + pos + unit` inside the page, and the page base is
            // page aligned, so `offset + pos` (a multiple of `unit`) is aligned for `unit`.
            let value = unsafe { load_unit(self.map.as_ptr().add(offset + pos), unit) };
            raw[pos..pos + unit.bytes()].copy_from_slice(&unit.encode(value)[..unit.bytes()]);
            pos += unit.bytes();
        }
        Ok(raw)
    }

    /// Volatile read of one object at page offset `offset`.
    ///
    /// Splits a 4-aligned, non-8-aligned 8-byte object into two 4-byte accesses; see [`Self::load`].
    pub fn read(&self, offset: usize, width: DataWidth) -> Result<u64> {
        Ok(width.decode(&self.load(offset, width)?))
    }

    /// Volatile write of `value`, narrowed to `width`, at page offset `offset`.
    ///
    /// An 8-byte object at an offset that is 4-aligned but not 8-aligned is written as two 4-byte
    /// accesses, lower address first, so the write is not atomic. Aligned objects take one access.
    pub fn write(&mut self, offset: usize, width: DataWidth, value: u64) -> Result<()> {
        self.check_run(offset, width, 1)?;

        let raw = width.encode(value);
        let unit = access_unit(offset, width);
        let mut pos = 0;
        while pos < width.bytes() {
            let chunk = unit.decode(&raw[pos..]);
            // SAFETY: as in `load`.
            unsafe { store_unit(self.map.as_mut_ptr().add(offset + pos), unit, chunk) };
            pos += unit.bytes();
        }
        Ok(())
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        tracing::debug!(
            page_base = format_args!("{:#x}", self.page_base),
            device_backed = self.device.is_some(),
            "releasing mapped page"
        );
    }
}

/// Widest naturally aligned access that tiles `width` bytes starting at `offset`.
///
/// Only an 8-byte object on a 4-byte boundary ends up split (into two 4-byte halves); the
/// requested address is always 4-byte aligned.
fn access_unit(offset: usize, width: DataWidth) -> DataWidth {
    let mut unit = width;
    while offset % unit.bytes() != 0 {
        unit = match unit {
            DataWidth::Quad => DataWidth::Long,
            DataWidth::Long => DataWidth::Word,
            DataWidth::Word | DataWidth::Byte => DataWidth::Byte,
        };
    }
    unit
}

/// # Safety
///
/// `ptr` must be valid for a read of `unit.bytes()` bytes and aligned for `unit`.
unsafe fn load_unit(ptr: *const u8, unit: DataWidth) -> u64 {
    match unit {
        DataWidth::Byte => u64::from(ptr::read_volatile(ptr)),
        DataWidth::Word => u64::from(ptr::read_volatile(ptr.cast::<u16>())),
        DataWidth::Long => u64::from(ptr::read_volatile(ptr.cast::<u32>())),
        DataWidth::Quad => ptr::read_volatile(ptr.cast::<u64>()),
    }
}

/// # Safety
///
/// `ptr` must be valid for a write of `unit.bytes()` bytes and aligned for `unit`.
unsafe fn store_unit(ptr: *mut u8, unit: DataWidth, value: u64) {
    match unit {
        DataWidth::Byte => ptr::write_volatile(ptr, value as u8),
        DataWidth::Word => ptr::write_volatile(ptr.cast::<u16>(), value as u16),
        DataWidth::Long => ptr::write_volatile(ptr.cast::<u32>(), value as u32),
        DataWidth::Quad => ptr::write_volatile(ptr.cast::<u64>(), value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_arithmetic() {
        assert_eq!(page_base(0x1234_5678), 0x1234_5000);
        assert_eq!(page_offset(0x1234_5678), 0x678);
        assert_eq!(page_base(0x2000), 0x2000);
        assert_eq!(page_offset(0x2000), 0);
    }

    #[test]
    fn unaligned_address_is_rejected_before_opening_device() {
        let missing = Path::new("/nonexistent/memtool-device");
        for paddr in [0x1001u64, 0x1002, 0x1003, 0xffff_fffe] {
            let err = map_page(missing, paddr).err().unwrap();
            assert!(
                matches!(err, MemtoolError::UnalignedAddress { paddr: p } if p == paddr),
                "{paddr:#x}: {err}"
            );
        }
    }

    #[test]
    fn missing_device_reports_open_failure() {
        let err = map_page(Path::new("/nonexistent/memtool-device"), 0x1000)
            .err()
            .unwrap();
        match err {
            MemtoolError::DeviceOpenFailed { source, .. } => {
                assert_eq!(source.raw_os_error(), Some(libc::ENOENT));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn anonymous_region_tracks_offset() {
        let region = MappedRegion::anonymous(0x8000_0ff0).unwrap();
        assert_eq!(region.page_base(), 0x8000_0000);
        assert_eq!(region.offset(), 0xff0);
        assert_eq!(region.paddr(), 0x8000_0ff0);
    }

    #[test]
    fn write_then_read_each_width() {
        let mut region = MappedRegion::anonymous(0).unwrap();
        let v = 0x0102_0304_0506_0708_u64;
        for (i, width) in DataWidth::ALL.into_iter().enumerate() {
            let offset = 0x100 * (i + 1);
            region.write(offset, width, v).unwrap();
            assert_eq!(region.read(offset, width).unwrap(), width.truncate(v));
            // Neighbouring bytes are untouched.
            assert_eq!(region.read(offset + width.bytes(), DataWidth::Byte).unwrap(), 0);
        }
    }

    #[test]
    fn quad_on_long_boundary_is_split_but_exact() {
        assert_eq!(access_unit(4, DataWidth::Quad), DataWidth::Long);
        assert_eq!(access_unit(8, DataWidth::Quad), DataWidth::Quad);

        let mut region = MappedRegion::anonymous(0).unwrap();
        let v = 0xc0ff_ee00_dead_beef_u64;
        region.write(0x14, DataWidth::Quad, v).unwrap();
        assert_eq!(region.read(0x14, DataWidth::Quad).unwrap(), v);
        assert_eq!(region.load(0x14, DataWidth::Quad).unwrap(), v.to_ne_bytes());
    }

    #[test]
    fn accesses_past_the_page_are_rejected() {
        let mut region = MappedRegion::anonymous(0).unwrap();
        assert!(region.read(PAGE_SIZE - 4, DataWidth::Long).is_ok());
        assert!(matches!(
            region.read(PAGE_SIZE - 4, DataWidth::Quad),
            Err(MemtoolError::RunExceedsPage { .. })
        ));
        assert!(matches!(
            region.write(PAGE_SIZE, DataWidth::Byte, 0),
            Err(MemtoolError::RunExceedsPage { .. })
        ));
        assert!(region.check_run(0, DataWidth::Long, 1024).is_ok());
        assert!(region.check_run(4, DataWidth::Long, 1024).is_err());
        assert!(region.check_run(0, DataWidth::Quad, usize::MAX).is_err());
        assert!(region.check_run(PAGE_SIZE, DataWidth::Byte, 0).is_ok());
    }
}
