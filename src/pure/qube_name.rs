pub const MIN_QUBE_NAME_LEN: usize = 1;
pub const MAX_QUBE_NAME_LEN: usize = 31;

/// Why a qube name was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum QubeNameError {
    /// qube name is empty
    Empty,
    /// qube name is longer than 31 bytes
    TooLong,
    /// qube name must start with an ASCII letter
    InvalidFirstCharacter,
    /// qube name may only contain ASCII letters, digits, '_', '.' and '-'
    InvalidSubsequentCharacter,
    /// qube name is reserved
    Reserved,
}

/// Checks that `untrusted_name` is an acceptable qube name.
///
/// Unlike the path validators, the whole slice is the name: a NUL byte is an
/// invalid character, not a terminator.
pub fn validate_qube_name(untrusted_name: &[u8]) -> Result<(), QubeNameError> {
    if untrusted_name.len() < MIN_QUBE_NAME_LEN {
        return Err(QubeNameError::Empty);
    }
    if untrusted_name.len() > MAX_QUBE_NAME_LEN {
        return Err(QubeNameError::TooLong);
    }
    if !untrusted_name[0].is_ascii_alphabetic() {
        return Err(QubeNameError::InvalidFirstCharacter);
    }
    if !untrusted_name[1..]
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
    {
        return Err(QubeNameError::InvalidSubsequentCharacter);
    }

    // A name ending in "-dm" could be taken for a stubdomain.  "none" and
    // "default" mean something to the Admin API, and libxl calls dom0
    // "Domain-0".
    if untrusted_name.ends_with(b"-dm") || matches!(untrusted_name, b"none" | b"default" | b"Domain-0") {
        return Err(QubeNameError::Reserved);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["my-vm", "a", "work", "sys-net", "Domain-1", "nonE", "defaults", "vm_1.test", "dm"] {
            assert_eq!(validate_qube_name(name.as_bytes()), Ok(()), "{}", name);
        }
        assert_eq!(validate_qube_name(&[b'a'; 31]), Ok(()));
    }

    #[test]
    fn test_length() {
        assert_eq!(validate_qube_name(b""), Err(QubeNameError::Empty));
        assert_eq!(validate_qube_name(&[b'a'; 32]), Err(QubeNameError::TooLong));
    }

    #[test]
    fn test_first_character() {
        for name in ["1abc", "-dm", "_a", ".a", "\u{e9}a"] {
            assert_eq!(
                validate_qube_name(name.as_bytes()),
                Err(QubeNameError::InvalidFirstCharacter),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_subsequent_characters() {
        for name in [&b"a b"[..], b"a/b", b"a\0", b"a\xc3\xa9", b"a+"] {
            assert_eq!(validate_qube_name(name), Err(QubeNameError::InvalidSubsequentCharacter));
        }
    }

    #[test]
    fn test_reserved() {
        for name in ["Domain-0", "none", "default", "work-dm", "a-dm"] {
            assert_eq!(validate_qube_name(name.as_bytes()), Err(QubeNameError::Reserved), "{}", name);
        }
    }
}
