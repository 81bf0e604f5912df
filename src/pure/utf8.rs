use super::byte_at;

/// Why a byte sequence was not accepted as a single UTF-8 character.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum DecodeError {
    /// control character 0x{0:02X}
    ControlCharacter(u8),
    /// byte 0x{0:02X} cannot start a UTF-8 sequence
    InvalidLeadByte(u8),
    /// byte 0x{byte:02X} at position {position} is not a valid continuation byte
    InvalidContinuation { byte: u8, position: usize },
}

/// Decodes one character starting at `untrusted[at]`.
///
/// Returns the code point and the number of bytes it occupies (1 to 4).
/// The accepted grammar is RFC 3629 with ASCII control characters removed:
///
/// ```text
/// UTF8-1    = %x20-7F
/// UTF8-2    = %xC2-DF UTF8-tail
/// UTF8-3    = %xE0 %xA0-BF UTF8-tail / %xE1-EC 2( UTF8-tail ) /
///             %xED %x80-9F UTF8-tail / %xEE-EF 2( UTF8-tail )
/// UTF8-4    = %xF0 %x90-BF 2( UTF8-tail ) / %xF1-F3 3( UTF8-tail ) /
///             %xF4 %x80-8F 2( UTF8-tail )
/// UTF8-tail = %x80-BF
/// ```
///
/// Overlong forms, surrogates and values above U+10FFFF therefore never
/// decode.  Bytes are examined one at a time and a NUL (or the end of the
/// slice) is never a valid continuation, so nothing past the terminator is
/// read.
pub fn decode_one(untrusted: &[u8], at: usize) -> Result<(u32, usize), DecodeError> {
    let lead = byte_at(untrusted, at);
    // (width, initial code point bits, valid range of the second byte)
    let (width, bits, second) = match lead {
        0x00..=0x1F => return Err(DecodeError::ControlCharacter(lead)),
        0x20..=0x7F => return Ok((u32::from(lead), 1)),
        0xC2..=0xDF => (2, lead & 0x1F, 0x80..=0xBF),
        0xE0 => (3, lead & 0x0F, 0xA0..=0xBF),
        0xE1..=0xEC | 0xEE..=0xEF => (3, lead & 0x0F, 0x80..=0xBF),
        0xED => (3, lead & 0x0F, 0x80..=0x9F),
        0xF0 => (4, lead & 0x07, 0x90..=0xBF),
        0xF1..=0xF3 => (4, lead & 0x07, 0x80..=0xBF),
        0xF4 => (4, lead & 0x07, 0x80..=0x8F),
        _ => return Err(DecodeError::InvalidLeadByte(lead)),
    };

    let mut code_point = u32::from(bits);
    for offset in 1..width {
        let position = at + offset;
        let byte = byte_at(untrusted, position);
        let valid = if offset == 1 {
            second.contains(&byte)
        } else {
            (0x80..=0xBF).contains(&byte)
        };
        if !valid {
            return Err(DecodeError::InvalidContinuation { byte, position });
        }
        code_point = code_point << 6 | u32::from(byte & 0x3F);
    }

    Ok((code_point, width))
}
