// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Seekable little-endian reader/writer and word-offset arithmetic.
//!
//! The container addresses everything in 4-byte words. Two payloads embed
//! offsets relative to their own position:
//!
//! - STRING: `(header_pos + 4) / 4` with the top byte replaced by `0x80`
//! - SPLINE: `(header_pos + 8) / 4`
//!
//! All of that arithmetic lives here so the readers and writers never
//! compute offsets by hand.

use bytemuck::Pod;
use scriptpak_ident::Identifier;

use super::read::ParseError;

/// Word size of the container.
pub const WORD: usize = 4;

/// Top byte of a STRING payload's self-relative header.
pub const STRING_SENTINEL: u8 = 0x80;

/// Rounds `n` up to the next multiple of four.
#[must_use]
pub const fn align4(n: usize) -> usize {
    (n + 3) & !3
}

/// Converts a byte position to a word offset.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // containers are far below 16 GiB
pub const fn to_words(byte_pos: usize) -> u32 {
    (byte_pos / WORD) as u32
}

/// Converts a word offset to a byte position.
#[must_use]
pub const fn to_bytes(words: u32) -> usize {
    words as usize * WORD
}

/// Header word of a STRING payload whose header starts at `header_pos`.
#[must_use]
pub const fn encode_string_header(header_pos: usize) -> u32 {
    let words = to_words(header_pos + WORD);
    (words & 0x00FF_FFFF) | ((STRING_SENTINEL as u32) << 24)
}

/// Splits a STRING header word into `(word offset, sentinel byte)`.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // the shift leaves exactly one byte
pub const fn decode_string_header(raw: u32) -> (u32, u8) {
    (raw & 0x00FF_FFFF, (raw >> 24) as u8)
}

/// Header word of a SPLINE payload whose header starts at `header_pos`.
///
/// Points at the first spline point, just past the point count.
#[must_use]
pub const fn encode_spline_header(header_pos: usize) -> u32 {
    to_words(header_pos + 2 * WORD)
}

/// Byte position a SPLINE header word points at.
#[must_use]
pub const fn decode_spline_header(raw: u32) -> usize {
    to_bytes(raw)
}

/// Bounds-checked cursor over a fully addressable container buffer.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    /// Creates a cursor at byte 0.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Total buffer length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty buffer.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Moves to an absolute byte position.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] past the end of the buffer.
    pub fn seek(&mut self, pos: usize) -> Result<(), ParseError> {
        if pos > self.data.len() {
            return Err(ParseError::OutOfBounds {
                offset: pos,
                length: 0,
                size: self.data.len(),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Moves to an absolute word offset.
    ///
    /// # Errors
    ///
    /// See [`Cursor::seek`].
    pub fn seek_words(&mut self, words: u32) -> Result<(), ParseError> {
        self.seek(to_bytes(words))
    }

    /// Skips `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] when fewer bytes remain.
    pub fn skip(&mut self, len: usize) -> Result<(), ParseError> {
        self.take(len).map(|_| ())
    }

    /// Advances to the next 4-byte boundary.
    ///
    /// # Errors
    ///
    /// See [`Cursor::seek`].
    pub fn align(&mut self) -> Result<(), ParseError> {
        self.seek(align4(self.pos))
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ParseError::OutOfBounds {
                offset: self.pos,
                length: len,
                size: self.data.len(),
            })?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] at the end of the buffer.
    pub fn read_u32(&mut self) -> Result<u32, ParseError> {
        let raw = self.take(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Reads a little-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] at the end of the buffer.
    pub fn read_i32(&mut self) -> Result<i32, ParseError> {
        let raw = self.take(4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Reads a little-endian `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] at the end of the buffer.
    pub fn read_f32(&mut self) -> Result<f32, ParseError> {
        self.read_u32().map(f32::from_bits)
    }

    /// Reads an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] at the end of the buffer.
    pub fn read_id(&mut self) -> Result<Identifier, ParseError> {
        let raw = self.take(4)?;
        Ok(Identifier([raw[0], raw[1], raw[2], raw[3]]))
    }

    /// Copies one `Pod` row out of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] if the row extends past the end.
    pub fn read_row<T: Pod>(&mut self) -> Result<T, ParseError> {
        let raw = self.take(std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(raw))
    }

    /// Copies `count` consecutive `Pod` rows out of the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] if the rows extend past the end.
    pub fn read_rows<T: Pod>(&mut self, count: u32) -> Result<Vec<T>, ParseError> {
        let size = std::mem::size_of::<T>();
        let raw = self.take(size.saturating_mul(count as usize))?;
        Ok(raw
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Reads rows described by an offset pair, leaving the cursor after them.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OutOfBounds`] if the slice is not inside the
    /// buffer.
    pub fn read_slice<T: Pod>(
        &mut self,
        pair: super::types::OffsetPair,
    ) -> Result<Vec<T>, ParseError> {
        self.seek(pair.byte_offset())?;
        self.read_rows(pair.count())
    }

    /// Reads a NUL-terminated UTF-8 string, leaving the cursor after the NUL.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::UnterminatedString`] when no NUL follows and
    /// [`ParseError::InvalidUtf8`] for malformed text.
    pub fn read_cstr(&mut self) -> Result<&'a str, ParseError> {
        let start = self.pos;
        let rest = &self.data[start..];
        let len = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(ParseError::UnterminatedString { offset: start })?;
        let text = std::str::from_utf8(&rest[..len])
            .map_err(|_| ParseError::InvalidUtf8 { offset: start })?;
        self.pos = start + len + 1;
        Ok(text)
    }
}

/// Growable little-endian writer with back-patching.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current byte position (the buffer length).
    #[must_use]
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Current position as a word offset.
    #[must_use]
    pub fn position_words(&self) -> u32 {
        to_words(self.buf.len())
    }

    /// Writes raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `f32`.
    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    /// Writes an identifier.
    pub fn write_id(&mut self, id: Identifier) {
        self.buf.extend_from_slice(id.as_bytes());
    }

    /// Writes a `Pod` row as raw bytes.
    pub fn write_row<T: Pod>(&mut self, row: &T) {
        self.buf.extend_from_slice(bytemuck::bytes_of(row));
    }

    /// Writes a string followed by a NUL terminator.
    pub fn write_cstr(&mut self, text: &str) {
        self.buf.extend_from_slice(text.as_bytes());
        self.buf.push(0);
    }

    /// Pads with zeros up to the next 4-byte boundary.
    pub fn align(&mut self) {
        self.buf.resize(align4(self.buf.len()), 0);
    }

    /// Overwrites a previously written `u32` at byte `pos`.
    ///
    /// Positions past the end are ignored; callers only patch slots they
    /// reserved earlier.
    pub fn patch_u32(&mut self, pos: usize, value: u32) {
        if let Some(slot) = self.buf.get_mut(pos..pos + 4) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
    }

    /// Read-only view of the bytes written so far.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the writer and returns the buffer.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn align4_works() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(4), 4);
        assert_eq!(align4(5), 8);
    }

    #[test]
    fn string_header_points_past_itself_with_sentinel() {
        let raw = encode_string_header(28);
        let (words, sentinel) = decode_string_header(raw);
        assert_eq!(sentinel, STRING_SENTINEL);
        assert_eq!(to_bytes(words), 32);
        assert_eq!(raw.to_le_bytes()[3], 0x80);
    }

    #[test]
    fn spline_header_points_at_first_point() {
        let raw = encode_spline_header(100);
        assert_eq!(decode_spline_header(raw), 108);
    }

    #[test]
    fn cursor_reads_scalars_and_rejects_overrun() {
        let mut w = Writer::new();
        w.write_u32(7);
        w.write_i32(-3);
        w.write_f32(1.5);
        w.write_id(Identifier([1, 2, 3, 4]));
        let bytes = w.into_vec();

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_u32().unwrap(), 7);
        assert_eq!(c.read_i32().unwrap(), -3);
        assert_eq!(c.read_f32().unwrap(), 1.5);
        assert_eq!(c.read_id().unwrap(), Identifier([1, 2, 3, 4]));
        assert!(matches!(
            c.read_u32(),
            Err(ParseError::OutOfBounds { offset: 16, .. })
        ));
    }

    #[test]
    fn cstr_reads_to_nul_and_aligns() {
        let mut w = Writer::new();
        w.write_cstr("abc");
        w.align();
        w.write_u32(9);
        let bytes = w.into_vec();

        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_cstr().unwrap(), "abc");
        c.align().unwrap();
        assert_eq!(c.read_u32().unwrap(), 9);
    }

    #[test]
    fn cstr_without_terminator_is_an_error() {
        let mut c = Cursor::new(b"abc");
        assert!(matches!(
            c.read_cstr(),
            Err(ParseError::UnterminatedString { offset: 0 })
        ));
    }

    #[test]
    fn patch_overwrites_reserved_slot() {
        let mut w = Writer::new();
        w.write_u32(0);
        w.write_u32(0);
        w.patch_u32(4, 0xAABB_CCDD);
        assert_eq!(&w.as_slice()[4..8], &0xAABB_CCDDu32.to_le_bytes());
    }
}
