//! Hexdump rendering for diagnostics.

use std::cmp;
use std::fmt::Write;

const BYTES_PER_LINE: usize = 16;

/// Renders `data` as a canonical hexdump, one line per 16 bytes.
///
/// `offset` is added to the displayed addresses, which is useful when `data` is a window into a
/// larger buffer. If `highlight` is set, the byte at that index (relative to `data`) is wrapped in
/// brackets so that mismatches stand out in logs.
///
/// ```text
/// 00000000: 81 ec 00 01 00 00 c7 04 24 00 00 00 00 89 64 24  |........$.....d$|
/// ```
pub fn format_hexdump(data: &[u8], offset: usize, highlight: Option<usize>) -> String {
    let mut out = String::new();
    let mut address = 0;

    while address < data.len() {
        // Read next 16 bytes or until end of data
        let end = cmp::min(address + BYTES_PER_LINE, data.len());
        if address > 0 {
            out.push('\n');
        }
        write_line(
            &mut out,
            &data[address..end],
            address + offset,
            highlight.and_then(|h| h.checked_sub(address)),
        );
        address += BYTES_PER_LINE;
    }

    out
}

fn write_line(out: &mut String, line: &[u8], address: usize, highlight: Option<usize>) {
    // address (ex - 000000d0)
    let _ = write!(out, "{:08x}:", address);

    for (i, b) in line.iter().enumerate() {
        let separator = match highlight {
            Some(h) if h == i => '[',
            Some(h) if h + 1 == i => ']',
            _ => ' ',
        };
        out.push(separator);
        let _ = write!(out, "{:02x}", b);
    }
    if highlight.is_some_and(|h| h + 1 == line.len()) {
        out.push(']');
    } else {
        out.push(' ');
    }

    // align the ASCII column
    for _ in line.len()..BYTES_PER_LINE {
        out.push_str("   ");
    }

    out.push_str(" |");
    for c in line {
        // replace all non-printable chars with dots
        if c.is_ascii_graphic() || *c == b' ' {
            out.push(*c as char);
        } else {
            out.push('.');
        }
    }
    out.push('|');
}
