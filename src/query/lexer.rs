//! Splits one query line into words.
//!
//! Words are separated by whitespace or commas; a `"`- or `'`-quoted run
//! is kept as a single word with the quotes stripped, so a format string
//! containing spaces can be matched literally. A `#` outside quotes
//! starts a comment that runs to the end of the line. The word count is
//! bounded (a query line only ever needs a handful of `key=value` pairs
//! plus a flagspec) so tokenizing never allocates.

use arrayvec::ArrayVec;

/// Maximum words accepted from one query line: six `key value` pairs
/// plus a trailing flag-spec. Anything past this is a malformed query,
/// not a crate limitation worth lifting.
pub const MAX_WORDS: usize = 13;

pub type Words<'a> = ArrayVec<&'a str, MAX_WORDS>;

/// Tokenize `line`, returning `None` if it has more than [`MAX_WORDS`]
/// words or an unterminated quote.
pub fn tokenize(line: &str) -> Option<Words<'_>> {
    let mut words = Words::new();
    let bytes = line.as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t' || bytes[i] == b',') {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        if bytes[i] == b'#' {
            break;
        }
        let start;
        let end;
        if bytes[i] == b'"' || bytes[i] == b'\'' {
            let quote = bytes[i];
            i += 1;
            start = i;
            while i < bytes.len() && bytes[i] != quote {
                i += 1;
            }
            if i >= bytes.len() {
                return None;
            }
            end = i;
            i += 1;
        } else {
            start = i;
            while i < bytes.len()
                && bytes[i] != b' '
                && bytes[i] != b'\t'
                && bytes[i] != b','
                && bytes[i] != b'#'
            {
                i += 1;
            }
            end = i;
        }
        if words.try_push(&line[start..end]).is_err() {
            return None;
        }
    }
    Some(words)
}
