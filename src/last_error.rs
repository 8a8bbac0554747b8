//! Process-wide record of the most recent failure, for callers that can only receive an error
//! code and have to ask for the details afterwards.
//!
//! Rust callers get the same information from [`AclNativeError`] directly and never need this.

use crate::error::AclNativeError;
use crate::util::describe_errno;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// An OS error code and its description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    pub code: i32,
    pub description: String,
}

/// Whether [`LastError::copy_description`] fit the whole description into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Complete,
    Truncated,
}

impl LastError {
    #[must_use]
    pub fn from_error(err: &AclNativeError) -> LastError {
        let code = err.errno();
        let description = match err.io_error().raw_os_error() {
            Some(errno) => describe_errno(errno),
            None => err.io_error().to_string(),
        };
        LastError { code, description }
    }

    /// Copy the description into `buf` as a NUL-terminated string. Truncation never splits a
    /// UTF-8 character. An empty `buf` receives nothing.
    pub fn copy_description(&self, buf: &mut [u8]) -> CopyOutcome {
        copy_c_string(&self.description, buf)
    }
}

pub(crate) fn copy_c_string(text: &str, buf: &mut [u8]) -> CopyOutcome {
    let Some(room) = buf.len().checked_sub(1) else {
        return if text.is_empty() {
            CopyOutcome::Complete
        } else {
            CopyOutcome::Truncated
        };
    };
    let mut len = text.len().min(room);
    while !text.is_char_boundary(len) {
        len -= 1;
    }
    buf[..len].copy_from_slice(&text.as_bytes()[..len]);
    buf[len] = 0;
    if len == text.len() {
        CopyOutcome::Complete
    } else {
        CopyOutcome::Truncated
    }
}

static LAST_ERROR: Mutex<Option<LastError>> = Mutex::new(None);

fn slot() -> MutexGuard<'static, Option<LastError>> {
    LAST_ERROR.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Forget any previous failure. Runs at the start of every boundary call.
pub fn reset() {
    *slot() = None;
}

/// Remember `err` as the most recent failure.
pub fn record(err: &AclNativeError) {
    *slot() = Some(LastError::from_error(err));
}

/// The most recent failure, or `None` if the last operation succeeded.
#[must_use]
pub fn snapshot() -> Option<LastError> {
    slot().clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sample() -> LastError {
        LastError::from_error(&AclNativeError::with_errno(
            ErrorKind::OpenFailed,
            libc::ENOENT,
        ))
    }

    #[test]
    fn from_error() {
        assert_eq!(
            sample(),
            LastError {
                code: libc::ENOENT,
                description: "No such file or directory".into()
            }
        );
    }

    #[test]
    fn copy_fits() {
        let mut buf = [0xffu8; 64];
        assert_eq!(sample().copy_description(&mut buf), CopyOutcome::Complete);
        assert_eq!(&buf[..26], b"No such file or directory\0");
    }

    #[test]
    fn copy_truncates() {
        let mut buf = [0xffu8; 8];
        assert_eq!(sample().copy_description(&mut buf), CopyOutcome::Truncated);
        assert_eq!(&buf, b"No such\0");
    }

    #[test]
    fn copy_respects_char_boundary() {
        let mut buf = [0xffu8; 3];
        // "é" is two bytes; only one fits next to "a".
        assert_eq!(copy_c_string("aé", &mut buf), CopyOutcome::Truncated);
        assert_eq!(&buf[..2], b"a\0");
    }

    #[test]
    fn empty_buffer() {
        assert_eq!(copy_c_string("", &mut []), CopyOutcome::Complete);
        assert_eq!(copy_c_string("x", &mut []), CopyOutcome::Truncated);
    }
}
