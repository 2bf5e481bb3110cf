//! Byte-slice utilities for fixed-offset access.
//!
//! Small helpers to read and write unsigned integers of a given octet width at fixed offsets in a
//! `&[u8]`, with a single bounds check per access.
//!
//! - All accessors are generic over [`byteorder::ByteOrder`]; callers pick the order once (see
//!   [`crate::TargetEndian`]) and thread it through.
//! - Out-of-bounds accesses return `None` so the caller can map them to its own error type.
//! - Widths are 1 to 8 octets. Callers validate widths up front (templates only carry
//!   [`crate::FieldWidth`] values), so these helpers do not re-check them.

use byteorder::ByteOrder;

/// Borrow `len` bytes at `offset`.
pub(crate) fn slice(buf: &[u8], offset: usize, len: usize) -> Option<&[u8]> {
    let end = offset.checked_add(len)?;
    buf.get(offset..end)
}

/// Mutably borrow `len` bytes at `offset`.
pub(crate) fn slice_mut(buf: &mut [u8], offset: usize, len: usize) -> Option<&mut [u8]> {
    let end = offset.checked_add(len)?;
    buf.get_mut(offset..end)
}

/// Read a `width`-byte unsigned integer at `offset`.
#[inline]
pub(crate) fn read_uint<B: ByteOrder>(buf: &[u8], offset: usize, width: usize) -> Option<u64> {
    let bytes = slice(buf, offset, width)?;
    Some(B::read_uint(bytes, width))
}

/// Write `value` as a `width`-byte unsigned integer at `offset`.
///
/// The caller is responsible for checking that `value` fits (see [`fits_width`]).
#[inline]
pub(crate) fn write_uint<B: ByteOrder>(
    buf: &mut [u8],
    offset: usize,
    value: u64,
    width: usize,
) -> Option<()> {
    let bytes = slice_mut(buf, offset, width)?;
    B::write_uint(bytes, value, width);
    Some(())
}

/// Whether `value` is representable in `width` octets.
#[inline]
pub(crate) fn fits_width(value: u64, width: usize) -> bool {
    match width {
        0 => value == 0,
        w if w >= 8 => true,
        w => value >> (w * 8) == 0,
    }
}

/// Index of the first position where `expected` and `actual` differ.
///
/// Only the common prefix is compared.
pub(crate) fn first_difference(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(actual.iter())
        .position(|(e, a)| e != a)
}
