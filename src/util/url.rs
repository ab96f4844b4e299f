//! URL normalization applied before a request leaves the scheduler.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Bytes escaped besides non-ASCII: C0 controls and DEL. `%` is kept so
/// already-encoded sequences pass through.
const UNSAFE: &AsciiSet = CONTROLS;

/// Percent-encode every non-ASCII character of `url` as UTF-8 bytes.
///
/// Printable ASCII (including already-encoded `%XX` sequences) is left untouched, so
/// the function is idempotent. Latin-1 characters are encoded like any other
/// non-ASCII character.
#[must_use]
pub fn fix_url(url: &str) -> String {
    utf8_percent_encode(url, UNSAFE).to_string()
}
