//! Validators for untrusted strings and paths.
//!
//! Nothing in this module performs I/O or keeps state between calls, so every
//! function may be called concurrently from any thread.
//!
//! Inputs are byte slices that are *not* assumed to be valid UTF-8.  A slice
//! ends at its first NUL byte or at its end, whichever comes first, so both
//! NUL-terminated buffers and counted slices can be passed directly.

pub mod display;
pub mod filecopy;
pub mod path;
pub mod qube_name;
pub mod utf8;

mod unicode_table;

pub use display::{check_string_safe_for_display, code_point_safe_for_display, string_safe_for_display};
pub use path::{
    is_valid_file_name, is_valid_symbolic_link, validate_file_name, validate_path,
    validate_symbolic_link, PathError, PathFlags,
};
pub use qube_name::{validate_qube_name, QubeNameError};

/// Returns the byte at `index`, or NUL past the end of the slice.
#[inline]
pub(crate) fn byte_at(untrusted: &[u8], index: usize) -> u8 {
    untrusted.get(index).copied().unwrap_or(0)
}
