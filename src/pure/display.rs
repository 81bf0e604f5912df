use super::byte_at;
use super::unicode_table::DISPLAY_SAFE_RANGES;
use super::utf8::{decode_one, DecodeError};

/// Why a string was found unsafe to display.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum DisplayError {
    /// string is empty
    Empty,
    /// line length limits are not implemented (requested {0})
    LineLengthUnsupported(usize),
    /// invalid UTF-8 at byte {position}: {source}
    Malformed {
        position: usize,
        #[source]
        source: DecodeError,
    },
    /// code point U+{code_point:04X} at byte {position} is not safe to display
    UnsafeCodePoint { code_point: u32, position: usize },
}

/// Returns true if `code_point` may appear in text shown to the user.
///
/// The allowed set is printable ASCII plus letters, digits, punctuation and
/// math/currency symbols from the Latin, Greek, Cyrillic, CJK, Braille,
/// Inherited and Common scripts whose bidirectional class is neutral,
/// European-number-like or left-to-right.  Marks, separators, controls,
/// format and private-use characters, noncharacters and symbols that need
/// complex rendering (emoji and the like) are all excluded.
pub fn code_point_safe_for_display(code_point: u32) -> bool {
    DISPLAY_SAFE_RANGES
        .binary_search_by(|&(first, last)| {
            if last < code_point {
                std::cmp::Ordering::Less
            } else if first > code_point {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

/// Decodes the character at `untrusted[at]` and checks it is safe to display.
pub(crate) fn safe_char_at(untrusted: &[u8], at: usize) -> Result<usize, DisplayError> {
    let byte = byte_at(untrusted, at);
    if (0x20..=0x7E).contains(&byte) {
        return Ok(1);
    }
    let (code_point, width) = decode_one(untrusted, at).map_err(|source| DisplayError::Malformed {
        position: at,
        source,
    })?;
    if !code_point_safe_for_display(code_point) {
        return Err(DisplayError::UnsafeCodePoint {
            code_point,
            position: at,
        });
    }
    Ok(width)
}

/// Checks that a whole string is valid UTF-8 made only of display-safe
/// characters.
///
/// `line_length` must be zero, meaning no line breaks are allowed.  Wrapping
/// policies are not implemented and any other value is refused.
pub fn check_string_safe_for_display(untrusted: &[u8], line_length: usize) -> Result<(), DisplayError> {
    if line_length != 0 {
        return Err(DisplayError::LineLengthUnsupported(line_length));
    }
    if byte_at(untrusted, 0) == 0 {
        return Err(DisplayError::Empty);
    }
    let mut i = 0;
    while byte_at(untrusted, i) != 0 {
        i += safe_char_at(untrusted, i)?;
    }
    Ok(())
}

pub fn string_safe_for_display(untrusted: &[u8], line_length: usize) -> bool {
    check_string_safe_for_display(untrusted, line_length).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(code_point: u32) -> Vec<u8> {
        // Encodes any value below 0x140000, including surrogates, the way a
        // hostile sender could.
        let c = code_point;
        match c {
            0..=0x7F => vec![c as u8],
            0x80..=0x7FF => vec![0xC0 | (c >> 6) as u8, 0x80 | (c & 0x3F) as u8],
            0x800..=0xFFFF => vec![
                0xE0 | (c >> 12) as u8,
                0x80 | ((c >> 6) & 0x3F) as u8,
                0x80 | (c & 0x3F) as u8,
            ],
            _ => vec![
                0xF0 | (c >> 18) as u8,
                0x80 | ((c >> 12) & 0x3F) as u8,
                0x80 | ((c >> 6) & 0x3F) as u8,
                0x80 | (c & 0x3F) as u8,
            ],
        }
    }

    fn must_be_allowed(c: u32) {
        assert!(code_point_safe_for_display(c), "U+{:X} should be allowed", c);
        assert!(string_safe_for_display(&encode(c), 0), "U+{:X} should be allowed", c);
    }

    fn must_be_forbidden(c: u32) {
        assert!(!code_point_safe_for_display(c), "U+{:X} should be forbidden", c);
        if c < 0x14_0000 {
            assert!(!string_safe_for_display(&encode(c), 0), "U+{:X} should be forbidden", c);
        }
    }

    #[test]
    fn test_table_is_sorted_and_disjoint() {
        for pair in DISPLAY_SAFE_RANGES.windows(2) {
            assert!(pair[0].0 <= pair[0].1);
            assert!(pair[0].1 + 1 < pair[1].0);
        }
    }

    #[test]
    fn test_printable_ascii_allowed() {
        for c in 0x20..0x7F {
            must_be_allowed(c);
        }
    }

    #[test]
    fn test_letters_allowed() {
        // Greek, Cyrillic, Latin-1, Hangul, kana, quotation marks
        for c in [0x3B1, 0x3B2, 0x400, 0xE9, 0xAC00, 0x3042, 0x30A2, 0x201C, 0x201D] {
            must_be_allowed(c);
        }
    }

    #[test]
    fn test_cjk_ideographs_allowed() {
        let ranges = [
            (0x03400, 0x04DBF),
            (0x04E00, 0x09FFC),
            (0x20000, 0x2A6DD),
            (0x2A700, 0x2B734),
            (0x2B740, 0x2B81D),
            (0x2B820, 0x2CEA1),
            (0x2CEB0, 0x2EBE0),
            (0x30000, 0x3134A),
            // Extension H, Unicode 15.0
            (0x31350, 0x323AF),
            // Extension I, Unicode 15.1
            (0x2EBF0, 0x2EE5D),
        ];
        for (first, last) in ranges {
            for c in first..=last {
                must_be_allowed(c);
            }
        }
    }

    #[test]
    fn test_forbidden_ranges() {
        let ranges: &[(u32, u32)] = &[
            // C0 controls and DEL/C1 controls
            (0x00, 0x1F),
            (0x7F, 0x9F),
            // private use
            (0xE000, 0xF8FF),
            // spaces
            (0xA0, 0xA0),
            (0x2000, 0x200A),
            (0x205F, 0x205F),
            (0x180E, 0x180E),
            (0x1680, 0x1680),
            // bidi embedding controls
            (0x202A, 0x202E),
            // noncharacters
            (0xFDD0, 0xFDEF),
            (0xFFFE, 0xFFFF),
            (0x1FFFE, 0x1FFFF),
            (0x2FFFE, 0x2FFFF),
            // surrogates
            (0xD800, 0xDFFF),
            // beyond the last assigned ideograph, and beyond Unicode
            (0x323B0, 0x13FFFF),
        ];
        for &(first, last) in ranges {
            for c in first..=last {
                must_be_forbidden(c);
            }
        }
        for c in [0x14_0000, 0x0100_0000, u32::MAX - 1, u32::MAX] {
            must_be_forbidden(c);
        }
    }

    #[test]
    fn test_complex_symbols_forbidden() {
        // flags, variation selectors, joiners, warning sign, emoji, cuneiform
        for s in ["\u{1f3f3}", "\u{fe0f}", "\u{200d}", "\u{26a0}", "\u{1f642}", "\u{12000}"] {
            assert!(!string_safe_for_display(s.as_bytes(), 0), "{:?}", s);
        }
    }

    #[test]
    fn test_right_to_left_and_complex_scripts_forbidden() {
        // Hebrew, Arabic, Devanagari, Thai, combining acute accent
        for c in [0x5D0, 0x627, 0x905, 0xE01, 0x301] {
            must_be_forbidden(c);
        }
    }

    #[test]
    fn test_surrogate_encodings_rejected() {
        for c in 0xD800u32..=0xDFFF {
            let bytes = encode(c);
            assert_eq!(bytes[0], 0xED);
            assert!(matches!(
                check_string_safe_for_display(&bytes, 0),
                Err(DisplayError::Malformed { position: 0, .. })
            ));
        }
    }

    #[test]
    fn test_values_above_unicode_rejected() {
        for i in 0x90..0xC0 {
            for j in 0x80..0xC0 {
                for k in 0x80..0xC0 {
                    assert!(!string_safe_for_display(&[0xF4, i, j, k, 0], 0));
                }
            }
        }
    }

    #[test]
    fn test_whole_string() {
        assert!(string_safe_for_display(b"simple_safe_filename.txt", 0));
        assert!(string_safe_for_display("\u{3b2}.txt\0\x01garbage".as_bytes(), 0));
        assert_eq!(
            check_string_safe_for_display(b"ab\ncd", 0),
            Err(DisplayError::Malformed {
                position: 2,
                source: DecodeError::ControlCharacter(b'\n'),
            })
        );
        assert_eq!(
            check_string_safe_for_display("a\u{a0}".as_bytes(), 0),
            Err(DisplayError::UnsafeCodePoint {
                code_point: 0xA0,
                position: 1
            })
        );
    }

    #[test]
    fn test_empty_string_rejected() {
        assert_eq!(check_string_safe_for_display(b"", 0), Err(DisplayError::Empty));
        assert_eq!(check_string_safe_for_display(b"\0abc", 0), Err(DisplayError::Empty));
    }

    #[test]
    fn test_nonzero_line_length_refused() {
        assert_eq!(
            check_string_safe_for_display(b"abc", 80),
            Err(DisplayError::LineLengthUnsupported(80))
        );
        assert!(!string_safe_for_display(b"abc", 80));
    }
}
