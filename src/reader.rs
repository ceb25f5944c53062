//! Hex + ASCII dump of a run of data objects.

use std::io::Write;

use crate::error::Result;
use crate::mapper::MappedRegion;
use crate::width::DataWidth;

/// Nominal number of objects per line before width scaling.
pub const MAX_OBJECTS_PER_LINE: usize = 16;
/// Upper bound on raw bytes rendered on one line.
pub const MAX_BYTES_PER_LINE: usize = 64;
/// Objects dumped when no count is given.
pub const DEFAULT_READ_COUNT: usize = 64;

/// Objects printed on each full line for `width`.
pub fn objects_per_line(width: DataWidth) -> usize {
    let w = width.bytes();
    let mut per_line = MAX_OBJECTS_PER_LINE / w;
    if per_line * w > MAX_BYTES_PER_LINE {
        per_line = MAX_BYTES_PER_LINE / w;
    }
    if per_line < 1 {
        per_line = MAX_BYTES_PER_LINE / w;
    }
    per_line
}

/// Raw bytes of the objects printed on the current line, kept for the ASCII column.
#[derive(Debug, Clone)]
pub struct LineBuffer {
    bytes: [u8; MAX_BYTES_PER_LINE],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            bytes: [0; MAX_BYTES_PER_LINE],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Appends raw object bytes. Bytes beyond the line budget are dropped.
    pub fn push(&mut self, raw: &[u8]) {
        let n = raw.len().min(MAX_BYTES_PER_LINE - self.len);
        self.bytes[self.len..self.len + n].copy_from_slice(&raw[..n]);
        self.len += n;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The buffered bytes with every non-printable or non-7-bit byte replaced by `.`.
    pub fn ascii(&self) -> String {
        self.as_bytes()
            .iter()
            .map(|&b| ascii_char(b))
            .collect()
    }
}

/// Printable 7-bit bytes render as themselves, anything else as `.`.
#[inline]
pub fn ascii_char(b: u8) -> char {
    if b.is_ascii_graphic() || b == b' ' {
        char::from(b)
    } else {
        '.'
    }
}

/// Dumps `count` objects of `width` starting at the region's requested address.
///
/// Each line is `<addr>:` followed by one ` <hex>` field per object, padding for missing objects
/// on a short final line, four spaces, and the ASCII rendering of the bytes read for that line.
/// Every object is read exactly once; the ASCII column reuses the line buffer.
pub fn dump<W: Write>(
    region: &MappedRegion,
    width: DataWidth,
    count: usize,
    out: &mut W,
) -> Result<()> {
    region.check_run(region.offset(), width, count)?;

    let per_line = objects_per_line(width);
    tracing::debug!(
        paddr = format_args!("{:08x}", region.paddr()),
        width = width.bytes(),
        count,
        per_line,
        "dumping memory"
    );

    let mut paddr = region.paddr();
    let mut offset = region.offset();
    let mut remaining = count;
    let mut line = LineBuffer::new();

    while remaining > 0 {
        write!(out, "{paddr:08x}:")?;

        let this_line = per_line.min(remaining);
        line.clear();
        for _ in 0..this_line {
            let raw = region.load(offset, width)?;
            let value = width.decode(&raw);
            write!(out, " {value:0digits$x}", digits = width.hex_digits())?;
            line.push(&raw[..width.bytes()]);
            offset += width.bytes();
        }

        for _ in this_line..per_line {
            write!(out, "{:pad$}", "", pad = width.hex_digits() + 1)?;
        }

        writeln!(out, "    {}", line.ascii())?;

        paddr += (this_line * width.bytes()) as u64;
        remaining -= this_line;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MemtoolError;
    use crate::mapper::PAGE_SIZE;
    use proptest::prelude::*;

    fn region_with(paddr: u64, data: &[u8]) -> MappedRegion {
        let mut region = MappedRegion::anonymous(paddr).unwrap();
        for (i, &b) in data.iter().enumerate() {
            region
                .write(region.offset() + i, DataWidth::Byte, u64::from(b))
                .unwrap();
        }
        region
    }

    fn dump_to_string(region: &MappedRegion, width: DataWidth, count: usize) -> String {
        let mut out = Vec::new();
        dump(region, width, count, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn objects_per_line_by_width() {
        assert_eq!(objects_per_line(DataWidth::Byte), 16);
        assert_eq!(objects_per_line(DataWidth::Word), 8);
        assert_eq!(objects_per_line(DataWidth::Long), 4);
        assert_eq!(objects_per_line(DataWidth::Quad), 2);
        for width in DataWidth::ALL {
            let w = width.bytes();
            let expected = (16 / w).clamp(1, 64 / w);
            assert_eq!(objects_per_line(width), expected);
        }
    }

    #[test]
    fn ascii_rendering() {
        assert_eq!(ascii_char(b'A'), 'A');
        assert_eq!(ascii_char(b' '), ' ');
        assert_eq!(ascii_char(b'~'), '~');
        assert_eq!(ascii_char(0x00), '.');
        assert_eq!(ascii_char(b'\n'), '.');
        assert_eq!(ascii_char(0x7f), '.');
        assert_eq!(ascii_char(0x80), '.');
        assert_eq!(ascii_char(0xff), '.');
    }

    #[test]
    fn line_buffer_is_bounded() {
        let mut line = LineBuffer::new();
        line.push(&[b'x'; 40]);
        line.push(&[b'y'; 40]);
        assert_eq!(line.as_bytes().len(), MAX_BYTES_PER_LINE);
        line.clear();
        assert!(line.as_bytes().is_empty());
        assert_eq!(line.ascii(), "");
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn long_dump_wraps_and_pads_last_line() {
        let region = region_with(0x1000, b"ABCDEFGHIJKLMNOPQRST");
        let text = dump_to_string(&region, DataWidth::Long, 5);
        let expected = format!(
            "00001000: 44434241 48474645 4c4b4a49 504f4e4d    ABCDEFGHIJKLMNOP\n\
             00001010: 54535251{}    QRST\n",
            " ".repeat(3 * 9)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn byte_dump_masks_unprintable() {
        let region = region_with(0x2004, &[0x00, 0x41, 0x7f, 0x80, 0x20]);
        let text = dump_to_string(&region, DataWidth::Byte, 5);
        let expected = format!("00002004: 00 41 7f 80 20{}    .A.. \n", " ".repeat(11 * 3));
        assert_eq!(text, expected);
    }

    #[cfg(target_endian = "little")]
    #[test]
    fn quad_dump_reflects_native_byte_order() {
        let region = region_with(0x3008, &[0xef, 0xbe, 0xad, 0xde, 0x00, 0xee, 0xff, 0xc0]);
        let text = dump_to_string(&region, DataWidth::Quad, 1);
        let expected = format!("00003008: c0ffee00deadbeef{}    ........\n", " ".repeat(17));
        assert_eq!(text, expected);
    }

    #[test]
    fn zero_count_prints_nothing() {
        let region = MappedRegion::anonymous(0x1000).unwrap();
        assert_eq!(dump_to_string(&region, DataWidth::Long, 0), "");
    }

    #[test]
    fn run_past_page_end_is_rejected_without_output() {
        let region = MappedRegion::anonymous(0x1ff8).unwrap();
        let mut out = Vec::new();
        let err = dump(&region, DataWidth::Long, 3, &mut out).unwrap_err();
        assert!(matches!(
            err,
            MemtoolError::RunExceedsPage {
                offset: 0xff8,
                width: 4,
                count: 3
            }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn full_page_dump_fits() {
        let region = MappedRegion::anonymous(0).unwrap();
        let text = dump_to_string(&region, DataWidth::Byte, PAGE_SIZE);
        assert_eq!(text.lines().count(), PAGE_SIZE / 16);
        assert!(text.ends_with("00000ff0: 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00 00    ................\n"));
    }

    fn width_strategy() -> impl Strategy<Value = DataWidth> {
        prop::sample::select(DataWidth::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn line_count_and_ascii_alignment(width in width_strategy(), count in 0usize..=200) {
            let region = MappedRegion::anonymous(0x4000).unwrap();
            let text = dump_to_string(&region, width, count);

            let w = width.bytes();
            let per_line = objects_per_line(width);
            let lines: Vec<&str> = text.lines().collect();
            prop_assert_eq!(lines.len(), (count + per_line - 1) / per_line);

            // Label (8 hex digits + ':'), full-width hex columns, then four spaces.
            let ascii_col = 9 + per_line * (2 * w + 1) + 4;
            let mut objects = 0;
            for line in &lines {
                prop_assert!(line.len() > ascii_col);
                prop_assert_eq!(&line[ascii_col - 4..ascii_col], "    ");
                let ascii = &line[ascii_col..];
                prop_assert_eq!(ascii.len() % w, 0);
                prop_assert!(ascii.chars().all(|c| c == '.'));
                objects += ascii.len() / w;
            }
            prop_assert_eq!(objects, count);
        }

        #[test]
        fn labels_advance_by_bytes_printed(width in width_strategy(), count in 1usize..=100) {
            let region = MappedRegion::anonymous(0x4000).unwrap();
            let text = dump_to_string(&region, width, count);
            let step = (objects_per_line(width) * width.bytes()) as u64;
            for (i, line) in text.lines().enumerate() {
                let label = format!("{:08x}:", 0x4000 + i as u64 * step);
                prop_assert!(line.starts_with(&label));
            }
        }
    }
}
