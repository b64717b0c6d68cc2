//! Errno-style error codes, in the same spirit as the host's own error
//! taxonomy (see `crate::syscall::error::Error` in a typical kernel tree).

use core::fmt;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

/// A small errno-style error code. Never carries a heap-allocated message;
/// callers that want detail should log it themselves (the `log` facade is
/// always available) and return the stable code to their own caller.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Error(ErrorKind);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ErrorKind {
    Invalid,
    NotFound,
    NoSpace,
    TooBig,
    NoMemory,
    Busy,
}

impl Error {
    pub const fn invalid() -> Self {
        Error(ErrorKind::Invalid)
    }
    pub const fn not_found() -> Self {
        Error(ErrorKind::NotFound)
    }
    pub const fn no_space() -> Self {
        Error(ErrorKind::NoSpace)
    }
    pub const fn too_big() -> Self {
        Error(ErrorKind::TooBig)
    }
    pub const fn no_memory() -> Self {
        Error(ErrorKind::NoMemory)
    }
    pub const fn busy() -> Self {
        Error(ErrorKind::Busy)
    }

    pub fn is_not_found(self) -> bool {
        self.0 == ErrorKind::NotFound
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self.0 {
            ErrorKind::Invalid => "invalid input",
            ErrorKind::NotFound => "not found",
            ErrorKind::NoSpace => "no space left",
            ErrorKind::TooBig => "input too big",
            ErrorKind::NoMemory => "out of memory",
            ErrorKind::Busy => "resource busy",
        };
        f.write_str(s)
    }
}
