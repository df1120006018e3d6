//! Configuration options shared by every wire format.
//!
//! [`Options`] bundles the format independent knobs of a handle: strictness,
//! canonical ordering, allocation and depth limits. Format specific flags live
//! on the handles themselves ([`JsonHandle`](crate::JsonHandle),
//! [`CborHandle`](crate::CborHandle), [`SimpleHandle`](crate::SimpleHandle)).
//!
//! Options implement `serde::Serialize` and `serde::Deserialize`, so an
//! application can keep them in its own configuration files.
//!
//! ## Examples
//!
//! ```rust
//! use polycodec::{Handle, Options, SimpleHandle};
//!
//! let options = Options::new()
//!     .with_canonical(true)
//!     .with_error_if_no_field(true)
//!     .with_max_depth(64);
//! let handle = SimpleHandle::new().with_options(options);
//! assert!(handle.options().canonical);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum container nesting depth while decoding.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// How long to wait for elements when draining a [`Chan`](crate::Chan) during encode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChanTimeout {
    /// Take only what is immediately available.
    #[default]
    Immediate,
    /// Block until every sender is gone.
    UntilClosed,
    /// Block for at most this long in total.
    Duration(Duration),
}

/// Format independent configuration of a handle.
///
/// # Examples
///
/// ```rust
/// use polycodec::Options;
///
/// let options = Options::default();
/// assert_eq!(options.max_depth, 256);
/// assert!(!options.canonical);
/// assert!(!options.error_if_no_field);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Emit map entries in a deterministic, sorted order.
    pub canonical: bool,
    /// Encode every struct as a positional sequence instead of a keyed map.
    pub struct_to_array: bool,
    /// Let `omitempty` descend into structs, options and boxes.
    pub recursive_empty_check: bool,
    /// Emit strings as raw bytes in binary formats.
    pub string_to_raw: bool,
    /// Wait policy when draining channels during encode.
    pub chan_recv_timeout: ChanTimeout,
    /// Fail on incoming struct keys that have no matching field.
    pub error_if_no_field: bool,
    /// Fail when a fixed size array receives more elements than it can hold.
    pub error_if_no_array_expand: bool,
    /// Upper bound for any up-front allocation driven by a length prefix.
    /// `0` means "infer a sane bound from the element size".
    pub max_init_len: usize,
    /// Maximum container nesting depth while decoding.
    pub max_depth: usize,
    /// Reset existing map values to zero before decoding into them.
    pub map_value_reset: bool,
    /// Reset reused slice elements to zero before decoding into them.
    pub slice_element_reset: bool,
    /// Clear destination maps before decoding (replace instead of merge).
    pub replace_maps: bool,
    /// Decode untyped non-negative integers as signed.
    pub signed_integer: bool,
    /// Decode untyped raw bytes as strings.
    pub raw_to_string: bool,
    /// Let borrowed views alias the input slice instead of an internal copy.
    pub zero_copy: bool,
    /// Capacity of the buffer used by stream readers.
    pub reader_buffer_size: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            canonical: false,
            struct_to_array: false,
            recursive_empty_check: false,
            string_to_raw: false,
            chan_recv_timeout: ChanTimeout::default(),
            error_if_no_field: false,
            error_if_no_array_expand: false,
            max_init_len: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            map_value_reset: false,
            slice_element_reset: false,
            replace_maps: false,
            signed_integer: false,
            raw_to_string: false,
            zero_copy: true,
            reader_buffer_size: 8 * 1024,
        }
    }
}

impl Options {
    /// Creates default options: lenient, non-canonical, depth limit 256.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables canonical (sorted) map output.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Options;
    ///
    /// let options = Options::new().with_canonical(true);
    /// assert!(options.canonical);
    /// ```
    #[must_use]
    pub fn with_canonical(mut self, canonical: bool) -> Self {
        self.canonical = canonical;
        self
    }

    #[must_use]
    pub fn with_struct_to_array(mut self, to_array: bool) -> Self {
        self.struct_to_array = to_array;
        self
    }

    #[must_use]
    pub fn with_recursive_empty_check(mut self, recursive: bool) -> Self {
        self.recursive_empty_check = recursive;
        self
    }

    #[must_use]
    pub fn with_string_to_raw(mut self, to_raw: bool) -> Self {
        self.string_to_raw = to_raw;
        self
    }

    #[must_use]
    pub fn with_chan_recv_timeout(mut self, timeout: ChanTimeout) -> Self {
        self.chan_recv_timeout = timeout;
        self
    }

    /// Makes unknown struct keys a decode error instead of silently draining them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use polycodec::Options;
    ///
    /// let strict = Options::new().with_error_if_no_field(true);
    /// assert!(strict.error_if_no_field);
    /// ```
    #[must_use]
    pub fn with_error_if_no_field(mut self, strict: bool) -> Self {
        self.error_if_no_field = strict;
        self
    }

    #[must_use]
    pub fn with_error_if_no_array_expand(mut self, strict: bool) -> Self {
        self.error_if_no_array_expand = strict;
        self
    }

    /// Caps up-front allocations driven by length prefixes.
    #[must_use]
    pub fn with_max_init_len(mut self, max: usize) -> Self {
        self.max_init_len = max;
        self
    }

    /// Sets the maximum nesting depth accepted while decoding.
    #[must_use]
    pub fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }

    #[must_use]
    pub fn with_map_value_reset(mut self, reset: bool) -> Self {
        self.map_value_reset = reset;
        self
    }

    #[must_use]
    pub fn with_slice_element_reset(mut self, reset: bool) -> Self {
        self.slice_element_reset = reset;
        self
    }

    #[must_use]
    pub fn with_replace_maps(mut self, replace: bool) -> Self {
        self.replace_maps = replace;
        self
    }

    #[must_use]
    pub fn with_signed_integer(mut self, signed: bool) -> Self {
        self.signed_integer = signed;
        self
    }

    #[must_use]
    pub fn with_raw_to_string(mut self, to_string: bool) -> Self {
        self.raw_to_string = to_string;
        self
    }

    #[must_use]
    pub fn with_zero_copy(mut self, zero_copy: bool) -> Self {
        self.zero_copy = zero_copy;
        self
    }

    #[must_use]
    pub fn with_reader_buffer_size(mut self, size: usize) -> Self {
        self.reader_buffer_size = size;
        self
    }

    /// Number of elements to pre-allocate for a container announced with
    /// `announced` elements of `elem_size` bytes each.
    ///
    /// Unknown lengths get a small default; known lengths are capped by
    /// [`max_init_len`](Self::max_init_len), or, when that is `0`, by a budget
    /// of 256 KiB with a floor of 4096 elements.
    #[must_use]
    pub fn infer_len(&self, announced: Option<usize>, elem_size: usize) -> usize {
        const LEN_IF_UNKNOWN: usize = 8;
        let announced = match announced {
            Some(0) => return 0,
            Some(n) => n,
            None => return LEN_IF_UNKNOWN,
        };
        if elem_size == 0 {
            return announced;
        }
        let max = if self.max_init_len > 0 {
            self.max_init_len
        } else if elem_size < 64 {
            256 * 1024 / elem_size
        } else {
            4 * 1024
        };
        announced.min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_len_caps_adversarial_lengths() {
        let options = Options::new();
        assert_eq!(options.infer_len(Some(0), 8), 0);
        assert_eq!(options.infer_len(None, 8), 8);
        assert_eq!(options.infer_len(Some(10), 8), 10);
        assert_eq!(options.infer_len(Some(usize::MAX), 8), 256 * 1024 / 8);
        assert_eq!(options.infer_len(Some(usize::MAX), 128), 4096);

        let capped = Options::new().with_max_init_len(16);
        assert_eq!(capped.infer_len(Some(1_000_000), 1), 16);
    }

    #[test]
    fn test_options_load_from_json_config() {
        let options: Options =
            serde_json::from_str(r#"{"canonical": true, "max_depth": 32}"#).unwrap();
        assert!(options.canonical);
        assert_eq!(options.max_depth, 32);
        assert!(options.zero_copy);
    }
}
