//! Parses one tokenized query line into a [`Query`]: a set of selector
//! terms (module/func/file/format/line/class), a flag modification, and
//! an optional trace-destination routing change — or, alternatively, a
//! trace-instance `open`/`close` command.
//!
//! Unlike a `key=value` mini-language, this follows the original's own
//! grammar: a key and its value are two separate whitespace-separated
//! tokens (`func probe`, not `func=probe`), and the very last token of
//! every non-trace-command query is always the flag-spec.

use alloc::string::{String, ToString};
use arrayvec::ArrayVec;

use crate::descriptor::Flags;
use crate::error::{Error, Result};
use crate::query::lexer::{self, MAX_WORDS};

/// A `line` selector term.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LineSpec {
    /// `line 100`
    Single(u32),
    /// `line 100-200`
    Range(u32, u32),
    /// `line 100-` (100 to end of file)
    Tail(u32),
}

impl LineSpec {
    /// `true` if `lineno` falls inside this spec. Lineno 0 is a wildcard
    /// on the descriptor side (a site with an unknown/unset line number
    /// matches any `line` query) and `Single(0)` is a wildcard on the
    /// query side (`line 0` matches every descriptor).
    pub fn contains(self, lineno: u32) -> bool {
        match self {
            LineSpec::Single(0) => true,
            LineSpec::Single(n) => lineno == n,
            LineSpec::Range(lo, hi) => lineno >= lo && lineno <= hi,
            LineSpec::Tail(lo) => lineno >= lo,
        }
    }

    fn parse(s: &str) -> Result<Self> {
        if let Some((lo, hi)) = s.split_once('-') {
            let lo: u32 = if lo.is_empty() {
                0
            } else {
                lo.parse().map_err(|_| Error::invalid())?
            };
            if hi.is_empty() {
                return Ok(LineSpec::Tail(lo));
            }
            let hi: u32 = hi.parse().map_err(|_| Error::invalid())?;
            if hi < lo {
                return Err(Error::invalid());
            }
            Ok(LineSpec::Range(lo, hi))
        } else {
            Ok(LineSpec::Single(s.parse().map_err(|_| Error::invalid())?))
        }
    }
}

/// How a flagspec's letters should be combined with a site's existing
/// flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum FlagOp {
    #[default]
    Add,
    Remove,
    Set,
}

/// `open <name>` / `close <name>`, the two commands that aren't
/// selector+flagspec queries at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TraceCmd {
    Open(String),
    Close(String),
}

const FLAG_LETTERS: &[(char, Flags)] = &[
    ('p', Flags::PRINT),
    ('T', Flags::TRACE),
    ('m', Flags::INCL_MODNAME),
    ('f', Flags::INCL_FUNCNAME),
    ('s', Flags::INCL_SOURCENAME),
    ('l', Flags::INCL_LINENO),
    ('t', Flags::INCL_TID),
];

/// Parsed flagspec: the op, the resulting flag bits, whether the `T`
/// letter itself was present (distinct from the bit being set by `=`
/// with `T` absent — `select_trace_dst` cares about the letter, not the
/// resulting bit), and an optional `:name` destination-by-name suffix.
struct FlagSpec {
    op: FlagOp,
    flags: Flags,
    trace_letter: bool,
    dst_name: Option<String>,
}

fn parse_flagspec(word: &str) -> Result<FlagSpec> {
    let mut chars = word.chars();
    let op = match chars.next().ok_or_else(Error::invalid)? {
        '+' => FlagOp::Add,
        '-' => FlagOp::Remove,
        '=' => FlagOp::Set,
        _ => return Err(Error::invalid()),
    };
    let mut flags = Flags::empty();
    let mut trace_letter = false;
    let mut dst_name = None;
    while let Some(c) = chars.next() {
        if c == ':' {
            let name: String = chars.as_str().to_string();
            if name.is_empty() {
                return Err(Error::invalid());
            }
            dst_name = Some(name);
            break;
        }
        if c == '_' {
            continue;
        }
        let (_, bit) = FLAG_LETTERS
            .iter()
            .find(|(l, _)| *l == c)
            .ok_or_else(Error::invalid)?;
        flags |= *bit;
        if c == 'T' {
            trace_letter = true;
        }
    }
    Ok(FlagSpec {
        op,
        flags,
        trace_letter,
        dst_name,
    })
}

/// `format <s>`'s value, after stripping a leading `^` anchor marker and
/// unescaping octal/C-style escape sequences (the same unescaping a
/// quoted shell argument or a `printf`-style format string would get).
fn unescape_format(raw: &str) -> (bool, String) {
    let (anchored, body) = match raw.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(d) if d.is_digit(8) => {
                let mut val = d.to_digit(8).unwrap();
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            val = val * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(val) {
                    out.push(ch);
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    (anchored, out)
}

/// A parsed, not-yet-matched query. Selector fields are `None` when the
/// query did not constrain that axis (matches anything). `trace_cmd`,
/// when set, means this query was an `open`/`close` instance command and
/// every other field is left at its default.
#[derive(Default, Debug, Clone)]
pub struct Query {
    pub module: Option<String>,
    pub func: Option<String>,
    pub file: Option<String>,
    pub line: Option<LineSpec>,
    pub format: Option<String>,
    pub format_anchor: bool,
    /// Class selector by name; resolved against the live class map at
    /// match time rather than here, since the parser has no registry
    /// access.
    pub class: Option<String>,
    pub op: FlagOp,
    pub flags: Flags,
    /// Whether the flagspec's letters included `T` (distinct from the
    /// resulting `flags` bit, which `-T` would clear rather than set).
    pub trace_letter: bool,
    /// The `:<name>` suffix on the flagspec, if present.
    pub trace_dst_name: Option<String>,
    pub trace_cmd: Option<TraceCmd>,
}

fn set_once<T>(slot: &mut Option<T>, value: T) -> Result<()> {
    if slot.is_some() {
        return Err(Error::invalid());
    }
    *slot = Some(value);
    Ok(())
}

impl Query {
    pub fn parse(line: &str) -> Result<Self> {
        let words: ArrayVec<&str, MAX_WORDS> =
            lexer::tokenize(line).ok_or_else(Error::too_big)?;

        if words.len() == 2 && (words[0] == "open" || words[0] == "close") {
            let name = words[1].to_string();
            let cmd = if words[0] == "open" {
                TraceCmd::Open(name)
            } else {
                TraceCmd::Close(name)
            };
            return Ok(Query {
                trace_cmd: Some(cmd),
                ..Query::default()
            });
        }

        if words.is_empty() {
            return Ok(Query::default());
        }

        // The grammar is `<pair>* <flagspec>`: pairs contribute an even
        // number of tokens, and the flagspec is exactly one more. If the
        // split leaves an odd number of tokens ahead of it, a key is
        // missing its value (or vice versa).
        let (pairs, last) = words.split_at(words.len() - 1);
        if pairs.len() % 2 != 0 {
            return Err(Error::invalid());
        }

        let mut q = Query::default();
        let mut i = 0;
        while i < pairs.len() {
            let key = pairs[i];
            let value = pairs[i + 1];
            match key {
                "module" => set_once(&mut q.module, value.to_string())?,
                "func" => set_once(&mut q.func, value.to_string())?,
                "class" => set_once(&mut q.class, value.to_string())?,
                "format" => {
                    if q.format.is_some() {
                        return Err(Error::invalid());
                    }
                    let (anchor, unescaped) = unescape_format(value);
                    q.format = Some(unescaped);
                    q.format_anchor = anchor;
                }
                "line" => {
                    if q.line.is_some() {
                        return Err(Error::invalid());
                    }
                    q.line = Some(LineSpec::parse(value)?);
                }
                "file" => {
                    if q.file.is_some() {
                        return Err(Error::invalid());
                    }
                    if let Some((path, tail)) = value.rsplit_once(':') {
                        q.file = Some(path.to_string());
                        let first = tail.as_bytes().first().copied();
                        match first {
                            Some(b) if b.is_ascii_alphabetic() || b == b'*' || b == b'?' => {
                                set_once(&mut q.func, tail.to_string())?;
                            }
                            _ => {
                                if q.line.is_some() {
                                    return Err(Error::invalid());
                                }
                                q.line = Some(LineSpec::parse(tail)?);
                            }
                        }
                    } else {
                        q.file = Some(value.to_string());
                    }
                }
                _ => return Err(Error::invalid()),
            }
            i += 2;
        }

        let spec = parse_flagspec(last[0])?;
        q.op = spec.op;
        q.flags = spec.flags;
        q.trace_letter = spec.trace_letter;
        q.trace_dst_name = spec.dst_name;
        Ok(q)
    }

    /// `true` if this query carries no selector terms at all (only a
    /// flagspec, or nothing): such a query matches every descriptor.
    pub fn matches_everything(&self) -> bool {
        self.module.is_none()
            && self.func.is_none()
            && self.file.is_none()
            && self.line.is_none()
            && self.format.is_none()
            && self.class.is_none()
    }
}
