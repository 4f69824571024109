//! Sequential byte and bit reader over a tag body.
//!
//! Multi-byte integers are little-endian; bit fields are packed MSB-first.
//! Every byte-granular read discards any partially consumed byte, so bit
//! fields always restart on a byte boundary after a byte read.

use crate::error::{ParseError, Result};
use crate::model::{twips_to_px, ColorTransform, Rgba};
use kurbo::{Affine, Rect};

pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u8,
    bits_left: u8,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            bit_buf: 0,
            bits_left: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn out_of_bounds(&self, needed: usize) -> ParseError {
        ParseError::malformed(format!(
            "read of {needed} byte(s) at offset {} exceeds record length {}",
            self.pos,
            self.data.len()
        ))
    }

    pub fn byte_align(&mut self) {
        self.bits_left = 0;
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.byte_align();
        if self.remaining() < len {
            return Err(self.out_of_bounds(len));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Splits off a bounded reader for the next `len` bytes.
    pub fn sub_reader(&mut self, len: usize) -> Result<Reader<'a>> {
        self.read_bytes(len).map(Reader::new)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Signed 8.8 fixed point.
    pub fn read_fixed8(&mut self) -> Result<f32> {
        Ok(self.read_i16()? as f32 / 256.0)
    }

    /// Signed 16.16 fixed point.
    pub fn read_fixed(&mut self) -> Result<f32> {
        Ok(self.read_u32()? as i32 as f32 / 65536.0)
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        if self.bits_left == 0 {
            if self.pos >= self.data.len() {
                return Err(self.out_of_bounds(1));
            }
            self.bit_buf = self.data[self.pos];
            self.pos += 1;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.bit_buf >> self.bits_left) & 1 == 1)
    }

    pub fn read_ubits(&mut self, n: u32) -> Result<u32> {
        if n > 32 {
            return Err(ParseError::malformed(format!("bit field of width {n}")));
        }
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.read_bit()? as u32;
        }
        Ok(value)
    }

    pub fn read_sbits(&mut self, n: u32) -> Result<i32> {
        if n == 0 {
            return Ok(0);
        }
        let raw = self.read_ubits(n)?;
        let shift = 32 - n;
        Ok(((raw << shift) as i32) >> shift)
    }

    /// Signed 16.16 fixed point bit field.
    pub fn read_fbits(&mut self, n: u32) -> Result<f32> {
        Ok(self.read_sbits(n)? as f32 / 65536.0)
    }

    /// Null-terminated string, decoded lossily as UTF-8.
    pub fn read_string(&mut self) -> Result<String> {
        self.byte_align();
        let rest = &self.data[self.pos..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ParseError::malformed("unterminated string"))?;
        let s = String::from_utf8_lossy(&rest[..len]).into_owned();
        self.pos += len + 1;
        Ok(s)
    }

    /// RECT record, converted from twips to pixels.
    pub fn read_rect(&mut self) -> Result<Rect> {
        self.byte_align();
        let nbits = self.read_ubits(5)?;
        let x_min = self.read_sbits(nbits)?;
        let x_max = self.read_sbits(nbits)?;
        let y_min = self.read_sbits(nbits)?;
        let y_max = self.read_sbits(nbits)?;
        self.byte_align();
        Ok(Rect::new(
            twips_to_px(x_min),
            twips_to_px(y_min),
            twips_to_px(x_max),
            twips_to_px(y_max),
        ))
    }

    /// MATRIX record. Translation is converted to pixels.
    pub fn read_matrix(&mut self) -> Result<Affine> {
        self.byte_align();
        let (mut scale_x, mut scale_y) = (1.0, 1.0);
        if self.read_bit()? {
            let n = self.read_ubits(5)?;
            scale_x = self.read_fbits(n)? as f64;
            scale_y = self.read_fbits(n)? as f64;
        }
        let (mut skew0, mut skew1) = (0.0, 0.0);
        if self.read_bit()? {
            let n = self.read_ubits(5)?;
            skew0 = self.read_fbits(n)? as f64;
            skew1 = self.read_fbits(n)? as f64;
        }
        let n = self.read_ubits(5)?;
        let tx = self.read_sbits(n)?;
        let ty = self.read_sbits(n)?;
        self.byte_align();
        Ok(Affine::new([
            scale_x,
            skew0,
            skew1,
            scale_y,
            twips_to_px(tx),
            twips_to_px(ty),
        ]))
    }

    pub fn read_rgb(&mut self) -> Result<Rgba> {
        let b = self.read_bytes(3)?;
        Ok(Rgba::opaque(b[0], b[1], b[2]))
    }

    pub fn read_rgba(&mut self) -> Result<Rgba> {
        let b = self.read_bytes(4)?;
        Ok(Rgba::new(b[0], b[1], b[2], b[3]))
    }

    /// CXFORM / CXFORMWITHALPHA record.
    pub fn read_color_transform(&mut self, with_alpha: bool) -> Result<ColorTransform> {
        self.byte_align();
        let has_add = self.read_bit()?;
        let has_mult = self.read_bit()?;
        let n = self.read_ubits(4)?;
        let channels = if with_alpha { 4 } else { 3 };
        let mut cx = ColorTransform::IDENTITY;
        if has_mult {
            for i in 0..channels {
                cx.mult[i] = self.read_sbits(n)? as f32 / 256.0;
            }
        }
        if has_add {
            for i in 0..channels {
                cx.add[i] = self.read_sbits(n)? as f32 / 255.0;
            }
        }
        self.byte_align();
        Ok(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_are_little_endian() {
        let data = [0x34, 0x12, 0x78, 0x56, 0x34, 0x12];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_u16().unwrap(), 0x1234);
        assert_eq!(r.read_u32().unwrap(), 0x1234_5678);
        assert!(r.is_empty());
    }

    #[test]
    fn test_bits_are_msb_first() {
        // 1011_0010 0100_0000
        let data = [0b1011_0010, 0b0100_0000];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_ubits(3).unwrap(), 0b101);
        assert_eq!(r.read_ubits(6).unwrap(), 0b10010_0);
        assert!(r.read_bit().unwrap());
    }

    #[test]
    fn test_signed_bits_sign_extend() {
        let data = [0b1110_0000];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_sbits(3).unwrap(), -1);
        let data = [0b0110_0000];
        let mut r = Reader::new(&data);
        assert_eq!(r.read_sbits(3).unwrap(), 3);
    }

    #[test]
    fn test_byte_read_realigns() {
        let data = [0b1000_0000, 0xAB];
        let mut r = Reader::new(&data);
        assert!(r.read_bit().unwrap());
        assert_eq!(r.read_u8().unwrap(), 0xAB);
    }

    #[test]
    fn test_out_of_bounds_is_malformed() {
        let data = [0x01];
        let mut r = Reader::new(&data);
        assert!(matches!(r.read_u16(), Err(ParseError::MalformedRecord(_))));
        let mut r = Reader::new(&data);
        assert!(r.read_ubits(8).is_ok());
        assert!(matches!(r.read_bit(), Err(ParseError::MalformedRecord(_))));
    }

    #[test]
    fn test_read_string() {
        let data = b"frame_1\0rest";
        let mut r = Reader::new(data);
        assert_eq!(r.read_string().unwrap(), "frame_1");
        assert_eq!(r.remaining(), 4);
        let mut r = Reader::new(b"open");
        assert!(r.read_string().is_err());
    }

    #[test]
    fn test_read_rect_in_pixels() {
        // nbits = 9; x_min 0, x_max 200, y_min -20, y_max 40 (twips)
        let mut bits = crate::writer::BitWriter::new();
        bits.write_ubits(5, 9);
        for v in [0, 200, -20, 40] {
            bits.write_sbits(9, v);
        }
        let bytes = bits.into_bytes();
        let mut r = Reader::new(&bytes);
        let rect = r.read_rect().unwrap();
        assert_eq!(rect, Rect::new(0.0, -1.0, 10.0, 2.0));
        assert!(r.is_empty());
    }

    #[test]
    fn test_read_matrix() {
        let mut w = crate::writer::BitWriter::new();
        w.write_matrix(Affine::new([2.0, 0.0, 0.0, 0.5, 5.0, -3.0]));
        let bytes = w.into_bytes();
        let m = Reader::new(&bytes).read_matrix().unwrap();
        assert_eq!(m.as_coeffs(), [2.0, 0.0, 0.0, 0.5, 5.0, -3.0]);
    }

    #[test]
    fn test_sub_reader_is_bounded() {
        let data = [1, 2, 3, 4];
        let mut r = Reader::new(&data);
        let mut sub = r.sub_reader(2).unwrap();
        assert_eq!(sub.read_u16().unwrap(), 0x0201);
        assert!(sub.read_u8().is_err());
        assert_eq!(r.read_u8().unwrap(), 3);
    }
}
