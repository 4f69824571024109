use crate::error::{ParseError, Result};
use crate::reader::Reader;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagCode {
    End,
    ShowFrame,
    DefineShape,
    PlaceObject,
    RemoveObject,
    DefineBits,
    DefineButton,
    JpegTables,
    SetBackgroundColor,
    DefineFont,
    DefineText,
    DoAction,
    DefineSound,
    DefineBitsLossless,
    DefineBitsJpeg2,
    DefineShape2,
    PlaceObject2,
    RemoveObject2,
    DefineShape3,
    DefineText2,
    DefineButton2,
    DefineBitsJpeg3,
    DefineBitsLossless2,
    DefineEditText,
    DefineSprite,
    FrameLabel,
    DefineMorphShape,
    DefineFont2,
    FileAttributes,
    PlaceObject3,
    DefineFont3,
    DefineShape4,
    DefineMorphShape2,
    Unknown(u16),
}

impl TagCode {
    pub fn from_u16(code: u16) -> Self {
        match code {
            0 => TagCode::End,
            1 => TagCode::ShowFrame,
            2 => TagCode::DefineShape,
            4 => TagCode::PlaceObject,
            5 => TagCode::RemoveObject,
            6 => TagCode::DefineBits,
            7 => TagCode::DefineButton,
            8 => TagCode::JpegTables,
            9 => TagCode::SetBackgroundColor,
            10 => TagCode::DefineFont,
            11 => TagCode::DefineText,
            12 => TagCode::DoAction,
            14 => TagCode::DefineSound,
            20 => TagCode::DefineBitsLossless,
            21 => TagCode::DefineBitsJpeg2,
            22 => TagCode::DefineShape2,
            26 => TagCode::PlaceObject2,
            28 => TagCode::RemoveObject2,
            32 => TagCode::DefineShape3,
            33 => TagCode::DefineText2,
            34 => TagCode::DefineButton2,
            35 => TagCode::DefineBitsJpeg3,
            36 => TagCode::DefineBitsLossless2,
            37 => TagCode::DefineEditText,
            39 => TagCode::DefineSprite,
            43 => TagCode::FrameLabel,
            46 => TagCode::DefineMorphShape,
            48 => TagCode::DefineFont2,
            69 => TagCode::FileAttributes,
            70 => TagCode::PlaceObject3,
            75 => TagCode::DefineFont3,
            83 => TagCode::DefineShape4,
            84 => TagCode::DefineMorphShape2,
            other => TagCode::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            TagCode::End => 0,
            TagCode::ShowFrame => 1,
            TagCode::DefineShape => 2,
            TagCode::PlaceObject => 4,
            TagCode::RemoveObject => 5,
            TagCode::DefineBits => 6,
            TagCode::DefineButton => 7,
            TagCode::JpegTables => 8,
            TagCode::SetBackgroundColor => 9,
            TagCode::DefineFont => 10,
            TagCode::DefineText => 11,
            TagCode::DoAction => 12,
            TagCode::DefineSound => 14,
            TagCode::DefineBitsLossless => 20,
            TagCode::DefineBitsJpeg2 => 21,
            TagCode::DefineShape2 => 22,
            TagCode::PlaceObject2 => 26,
            TagCode::RemoveObject2 => 28,
            TagCode::DefineShape3 => 32,
            TagCode::DefineText2 => 33,
            TagCode::DefineButton2 => 34,
            TagCode::DefineBitsJpeg3 => 35,
            TagCode::DefineBitsLossless2 => 36,
            TagCode::DefineEditText => 37,
            TagCode::DefineSprite => 39,
            TagCode::FrameLabel => 43,
            TagCode::DefineMorphShape => 46,
            TagCode::DefineFont2 => 48,
            TagCode::FileAttributes => 69,
            TagCode::PlaceObject3 => 70,
            TagCode::DefineFont3 => 75,
            TagCode::DefineShape4 => 83,
            TagCode::DefineMorphShape2 => 84,
            TagCode::Unknown(code) => code,
        }
    }

    /// Tags whose body starts with a character id.
    pub fn is_definition(self) -> bool {
        matches!(
            self,
            TagCode::DefineShape
                | TagCode::DefineShape2
                | TagCode::DefineShape3
                | TagCode::DefineShape4
                | TagCode::DefineMorphShape
                | TagCode::DefineMorphShape2
                | TagCode::DefineSprite
                | TagCode::DefineBits
                | TagCode::DefineBitsJpeg2
                | TagCode::DefineBitsJpeg3
                | TagCode::DefineBitsLossless
                | TagCode::DefineBitsLossless2
                | TagCode::DefineButton
                | TagCode::DefineButton2
                | TagCode::DefineFont
                | TagCode::DefineFont2
                | TagCode::DefineFont3
                | TagCode::DefineText
                | TagCode::DefineText2
                | TagCode::DefineEditText
                | TagCode::DefineSound
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRecord {
    pub code: TagCode,
    /// Offset of the tag header in the scanned buffer.
    pub header_offset: usize,
    pub body_offset: usize,
    pub body_length: usize,
}

/// Walks the tag records of a buffer.
///
/// A truncated header or a body running past the end of the buffer yields one
/// `MalformedRecord` and ends the iteration, since no later tag boundary can be
/// trusted.
pub struct TagStream<'a> {
    reader: Reader<'a>,
    base_offset: usize,
    done: bool,
}

impl<'a> TagStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_base_offset(data, 0)
    }

    /// `base_offset` is added to reported offsets, for streams nested in a
    /// larger buffer.
    pub fn with_base_offset(data: &'a [u8], base_offset: usize) -> Self {
        Self {
            reader: Reader::new(data),
            base_offset,
            done: false,
        }
    }

    fn read_next(&mut self) -> Result<(TagRecord, &'a [u8])> {
        let header_offset = self.base_offset + self.reader.position();
        let code_and_length = self.reader.read_u16()?;
        let code = TagCode::from_u16(code_and_length >> 6);
        let mut length = (code_and_length & 0x3F) as usize;
        if length == 0x3F {
            length = self.reader.read_u32()? as usize;
        }
        let body_offset = self.base_offset + self.reader.position();
        let body = self.reader.read_bytes(length).map_err(|_| {
            ParseError::malformed(format!(
                "{code:?} at offset {header_offset} declares {length} byte(s) past the end of the buffer"
            ))
        })?;
        Ok((
            TagRecord {
                code,
                header_offset,
                body_offset,
                body_length: length,
            },
            body,
        ))
    }
}

impl<'a> Iterator for TagStream<'a> {
    type Item = Result<(TagRecord, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.reader.is_empty() {
            return None;
        }
        let item = self.read_next();
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::TagWriter;

    #[test]
    fn test_code_round_trip_for_known_tags() {
        for code in [0u16, 1, 2, 26, 39, 46, 70, 83, 84] {
            assert_eq!(TagCode::from_u16(code).code(), code);
        }
        assert_eq!(TagCode::from_u16(999), TagCode::Unknown(999));
    }

    #[test]
    fn test_short_and_long_headers() {
        let mut w = TagWriter::new();
        w.write_tag(TagCode::ShowFrame, &[]);
        w.write_tag(TagCode::DefineSprite, &[0u8; 100]);
        let bytes = w.into_bytes();
        // short header (2) + long header (6) + body
        assert_eq!(bytes.len(), 2 + 6 + 100);

        let tags: Vec<_> = TagStream::new(&bytes).collect::<Result<_>>().unwrap();
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].0.code, TagCode::ShowFrame);
        assert_eq!(tags[0].0.body_length, 0);
        assert_eq!(tags[1].0.code, TagCode::DefineSprite);
        assert_eq!(tags[1].0.header_offset, 2);
        assert_eq!(tags[1].0.body_offset, 8);
        assert_eq!(tags[1].1.len(), 100);
    }

    #[test]
    fn test_truncated_body_stops_stream() {
        // DefineShape claiming 10 bytes with only 3 present, followed by nothing.
        let header = ((2u16 << 6) | 10).to_le_bytes();
        let bytes = [header[0], header[1], 1, 2, 3];
        let mut stream = TagStream::new(&bytes);
        assert!(matches!(
            stream.next(),
            Some(Err(ParseError::MalformedRecord(_)))
        ));
        assert!(stream.next().is_none());
    }
}
