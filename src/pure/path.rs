use bitflags::bitflags;
use nix::errno::Errno;

use super::byte_at;
use super::display::safe_char_at;

bitflags! {
    /// Relaxations of the default (strictest) path rules.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PathFlags: u32 {
        /// Accept the empty path, which then has zero components.
        const ALLOW_EMPTY = 1 << 0;
        /// Accept repeated slashes and "." components.
        const ALLOW_NON_CANONICAL = 1 << 1;
        /// Accept a single slash at the end of the path.
        const ALLOW_TRAILING_SLASH = 1 << 2;
    }
}

/// Why an untrusted path was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
pub enum PathError {
    /// path is empty
    Empty,
    /// path is absolute
    Absolute,
    /// repeated slash at byte {0}
    RepeatedSlash(usize),
    /// path ends with a slash
    TrailingSlash,
    /// "." component at byte {0}
    DotComponent(usize),
    /// ".." component at byte {0} would leave the permitted directory
    DotDotComponent(usize),
    /// character at byte {0} is not safe in a file name
    InvalidCharacter(usize),
    /// symbolic link must not be a top-level entry
    TopLevelSymlink,
}

impl PathError {
    /// The errno value the file-copy protocol reports for this error.
    ///
    /// `ENOLINK` means the path could escape its directory tree, `EILSEQ`
    /// means it is not an acceptable file name.
    pub fn errno(&self) -> Errno {
        match self {
            PathError::Empty => Errno::ENOENT,
            PathError::Absolute | PathError::DotDotComponent(_) | PathError::TopLevelSymlink => Errno::ENOLINK,
            PathError::RepeatedSlash(_)
            | PathError::TrailingSlash
            | PathError::DotComponent(_)
            | PathError::InvalidCharacter(_) => Errno::EILSEQ,
        }
    }
}

/// Validates a relative path and counts its components.
///
/// Up to `allowed_leading_dotdot` ".." components may appear, and only
/// before every other component.  Every other byte must be printable ASCII
/// or part of a display-safe UTF-8 character.
///
/// Returns the number of components that are not "..".
pub fn validate_path(
    untrusted_name: &[u8],
    allowed_leading_dotdot: usize,
    flags: PathFlags,
) -> Result<usize, PathError> {
    let at = |i: usize| byte_at(untrusted_name, i);

    match at(0) {
        0 if flags.contains(PathFlags::ALLOW_EMPTY) => return Ok(0),
        0 => return Err(PathError::Empty),
        b'/' => return Err(PathError::Absolute),
        _ => {}
    }

    let non_canonical = flags.contains(PathFlags::ALLOW_NON_CANONICAL);
    let mut dotdot_budget = allowed_leading_dotdot;
    let mut components = 0;
    let mut i = 0;

    while at(i) != 0 {
        if i == 0 || at(i - 1) == b'/' {
            match (at(i), at(i + 1), at(i + 2)) {
                (b'/', _, _) => {
                    if !non_canonical {
                        return Err(PathError::RepeatedSlash(i));
                    }
                    i += 1;
                    continue;
                }
                (b'.', 0 | b'/', _) => {
                    if !non_canonical {
                        return Err(PathError::DotComponent(i));
                    }
                    i += 1;
                    continue;
                }
                (b'.', b'.', 0 | b'/') => {
                    if dotdot_budget == 0 {
                        return Err(PathError::DotDotComponent(i));
                    }
                    dotdot_budget -= 1;
                    i += 2;
                    continue;
                }
                _ => {
                    // ".." is only allowed as a prefix
                    dotdot_budget = 0;
                    components += 1;
                }
            }
        }
        i += safe_char_at(untrusted_name, i).map_err(|_| PathError::InvalidCharacter(i))?;
    }

    if at(i - 1) == b'/'
        && !flags.intersects(PathFlags::ALLOW_TRAILING_SLASH | PathFlags::ALLOW_NON_CANONICAL)
    {
        return Err(PathError::TrailingSlash);
    }

    Ok(components)
}

/// Validates a file name received from another qube.
///
/// The name must not be able to refer to anything outside the directory it
/// is extracted into.
pub fn validate_file_name(untrusted_name: &[u8], flags: PathFlags) -> Result<(), PathError> {
    let components = validate_path(untrusted_name, 0, flags)?;
    if components == 0 && !flags.contains(PathFlags::ALLOW_EMPTY) {
        return Err(PathError::Empty);
    }
    Ok(())
}

/// Validates a symbolic link `untrusted_name` pointing to `untrusted_target`.
///
/// The link may not be a top-level entry, and resolving the target from the
/// link's directory must stay inside the top-level directory containing the
/// link.  A trailing slash is always accepted in the target.
pub fn validate_symbolic_link(
    untrusted_name: &[u8],
    untrusted_target: &[u8],
    flags: PathFlags,
) -> Result<(), PathError> {
    let depth = validate_path(untrusted_name, 0, flags)?;
    if depth < 2 {
        return Err(PathError::TopLevelSymlink);
    }
    let target_flags = (flags - PathFlags::ALLOW_EMPTY) | PathFlags::ALLOW_TRAILING_SLASH;
    validate_path(untrusted_target, depth - 2, target_flags)?;
    Ok(())
}

pub fn is_valid_file_name(untrusted_name: &[u8]) -> bool {
    validate_file_name(untrusted_name, PathFlags::empty()).is_ok()
}

pub fn is_valid_symbolic_link(untrusted_name: &[u8], untrusted_target: &[u8]) -> bool {
    validate_symbolic_link(untrusted_name, untrusted_target, PathFlags::empty()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_names() {
        assert!(is_valid_file_name(b"simple_safe_filename.txt"));
        assert!(is_valid_file_name("\u{3b2}.txt".as_bytes()));
        assert!(is_valid_file_name("\u{3b1}.txt".as_bytes()));
        assert!(is_valid_file_name("\u{400}.txt".as_bytes()));
        assert!(is_valid_file_name("\u{201c}".as_bytes()));
        assert!(is_valid_file_name(b"with space/and more"));
    }

    #[test]
    fn test_component_count() {
        let flags = PathFlags::empty();
        assert_eq!(validate_path(b"a", 0, flags), Ok(1));
        assert_eq!(validate_path(b"a/b/c", 0, flags), Ok(3));
        assert_eq!(validate_path(b"../a", 1, flags), Ok(1));
        assert_eq!(validate_path(b"../../a/b", 2, flags), Ok(2));
        assert_eq!(validate_path(b"..", 1, flags), Ok(0));
    }

    #[test]
    fn test_revalidation_gives_same_count() {
        for (name, budget) in [(&b"a/b"[..], 0), (b"../x/y", 1), (b"q/\xce\xb1/r", 0)] {
            let first = validate_path(name, budget, PathFlags::empty()).unwrap();
            assert_eq!(validate_path(name, budget, PathFlags::empty()), Ok(first));
        }
    }

    #[test]
    fn test_directory_traversal() {
        for name in [&b".."[..], b"../..", b"a/..", b"a/../b", b"../a", b"a/../a"] {
            assert!(!is_valid_file_name(name), "{:?}", name);
        }
        assert_eq!(validate_path(b"a/../b", 0, PathFlags::empty()), Err(PathError::DotDotComponent(2)));
        assert_eq!(validate_path(b"a/../b", 5, PathFlags::empty()), Err(PathError::DotDotComponent(2)));
        assert_eq!(validate_path(b"../../a", 1, PathFlags::empty()), Err(PathError::DotDotComponent(3)));
        assert_eq!(PathError::DotDotComponent(0).errno(), Errno::ENOLINK);
    }

    #[test]
    fn test_absolute_paths() {
        for name in [&b"/"[..], b"//", b"///", b"/a", b"//a", b"///a"] {
            assert_eq!(validate_path(name, 0, PathFlags::all()), Err(PathError::Absolute));
        }
    }

    #[test]
    fn test_repeated_slashes() {
        assert_eq!(validate_path(b"a//b", 0, PathFlags::empty()), Err(PathError::RepeatedSlash(2)));
        assert_eq!(validate_path(b"a//b", 0, PathFlags::ALLOW_NON_CANONICAL), Ok(2));
    }

    #[test]
    fn test_dot_components() {
        for name in [&b"."[..], b"a/.", b"./a", b"a/./a"] {
            assert!(!is_valid_file_name(name), "{:?}", name);
        }
        assert_eq!(validate_path(b"a/./b", 0, PathFlags::empty()), Err(PathError::DotComponent(2)));
        assert_eq!(validate_path(b"a/./b", 0, PathFlags::ALLOW_NON_CANONICAL), Ok(2));
        // "." does not end the run of leading ".." components
        assert_eq!(validate_path(b"./../a", 1, PathFlags::ALLOW_NON_CANONICAL), Ok(1));
    }

    #[test]
    fn test_lookalikes_accepted() {
        assert!(is_valid_file_name(b".a"));
        assert!(is_valid_file_name(b"..a"));
        assert!(is_valid_file_name(b"..."));
        assert!(is_valid_file_name(b"a/.b/..c"));
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(validate_path(b"a/", 0, PathFlags::empty()), Err(PathError::TrailingSlash));
        assert_eq!(validate_path(b"a/", 0, PathFlags::ALLOW_TRAILING_SLASH), Ok(1));
        assert_eq!(validate_path(b"../", 1, PathFlags::ALLOW_TRAILING_SLASH), Ok(0));
        assert_eq!(
            validate_path(b"a//", 0, PathFlags::ALLOW_TRAILING_SLASH),
            Err(PathError::RepeatedSlash(2))
        );
    }

    #[test]
    fn test_empty() {
        assert_eq!(validate_path(b"", 0, PathFlags::empty()), Err(PathError::Empty));
        assert_eq!(validate_path(b"\0a", 0, PathFlags::empty()), Err(PathError::Empty));
        assert_eq!(validate_path(b"", 0, PathFlags::ALLOW_EMPTY), Ok(0));
        assert_eq!(validate_file_name(b"", PathFlags::ALLOW_EMPTY), Ok(()));
        assert_eq!(validate_file_name(b".", PathFlags::ALLOW_NON_CANONICAL), Err(PathError::Empty));
        assert_eq!(PathError::Empty.errno(), Errno::ENOENT);
    }

    #[test]
    fn test_bad_characters() {
        assert_eq!(validate_path(b"a\nb", 0, PathFlags::empty()), Err(PathError::InvalidCharacter(1)));
        assert_eq!(validate_path(b"a\x7f", 0, PathFlags::empty()), Err(PathError::InvalidCharacter(1)));
        assert_eq!(validate_path(b"ab/\xff", 0, PathFlags::empty()), Err(PathError::InvalidCharacter(3)));
        assert_eq!(
            validate_path("x/\u{202e}".as_bytes(), 0, PathFlags::empty()),
            Err(PathError::InvalidCharacter(2))
        );
        assert_eq!(PathError::InvalidCharacter(0).errno(), Errno::EILSEQ);
    }

    #[test]
    fn test_stops_at_nul() {
        assert_eq!(validate_path(b"a/b\0/../../..", 0, PathFlags::empty()), Ok(2));
    }

    #[test]
    fn test_symbolic_links() {
        // Top level cannot be a symlink
        assert_eq!(
            validate_symbolic_link(b"a", b"b", PathFlags::empty()),
            Err(PathError::TopLevelSymlink)
        );
        // Symlinks cannot escape
        assert!(!is_valid_symbolic_link(b"a/b", b"../a"));
        assert!(!is_valid_symbolic_link(b"a/b", b"../a/b/c"));
        assert!(!is_valid_symbolic_link(b"a/b/c", b"../../a"));
        assert!(is_valid_symbolic_link(b"a/b", b"a"));
        assert!(is_valid_symbolic_link(b"a/b/c", b"../a"));
        assert!(is_valid_symbolic_link(b"a/b/c/d", b"../../a"));
        // Absolute symlinks are rejected
        assert_eq!(
            validate_symbolic_link(b"a/b/c", b"/a", PathFlags::empty()),
            Err(PathError::Absolute)
        );
    }

    #[test]
    fn test_symbolic_link_target_rules() {
        assert!(is_valid_symbolic_link(b"a/b", b"c/"));
        assert!(!is_valid_symbolic_link(b"a/b", b""));
        assert!(!is_valid_symbolic_link(b"a/b", b"c//d"));
        assert!(!is_valid_symbolic_link(b"a/b/c", b"d/../e"));
        assert!(!is_valid_symbolic_link(b"a/../b", b"c"));
    }

    #[test]
    fn test_symbolic_link_matches_budget_rule() {
        let names = [&b"a"[..], b"a/b", b"a/b/c", b"a/b/c/d"];
        let targets = [&b"x"[..], b"../x", b"../../x", b"../../../x", b"x/y", b"/x"];
        for name in names {
            for target in targets {
                let depth = validate_path(name, 0, PathFlags::empty()).unwrap();
                let expected = depth >= 2
                    && validate_path(target, depth - 2, PathFlags::ALLOW_TRAILING_SLASH).is_ok();
                assert_eq!(is_valid_symbolic_link(name, target), expected, "{:?} -> {:?}", name, target);
            }
        }
    }
}
