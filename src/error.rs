use std::io;
use thiserror::Error;

/// Identifies which underlying call failed. Every fallible step maps to exactly one kind.
///
/// The discriminants are the codes handed across the native boundary; `0` is reserved for
/// success and has no variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(i32)]
pub enum ErrorKind {
    #[error("open failed")]
    OpenFailed = 1,
    #[error("fstat failed")]
    FstatFailed = 2,
    #[error("reading ACL failed")]
    GetAclFailed = 3,
    #[error("acl_get_entry failed")]
    GetEntryFailed = 4,
    #[error("acl_get_tag_type failed")]
    GetTagTypeFailed = 5,
    #[error("acl_get_qualifier failed")]
    GetQualifierFailed = 6,
    #[error("acl_get_permset failed")]
    GetPermsetFailed = 7,
    #[error("acl_get_perm failed")]
    GetPermFailed = 8,
    #[error("fchown failed")]
    ChownFailed = 9,
    #[error("fchmod failed")]
    ChmodFailed = 10,
    #[error("acl_init failed")]
    InitAclFailed = 11,
    #[error("acl_create_entry failed")]
    CreateEntryFailed = 12,
    #[error("invalid ACL entry tag type")]
    InvalidTagType = 13,
    #[error("acl_set_tag_type failed")]
    SetTagTypeFailed = 14,
    #[error("acl_set_qualifier failed")]
    SetQualifierFailed = 15,
    #[error("acl_clear_perms failed")]
    ClearPermsFailed = 16,
    #[error("acl_add_perm failed")]
    AddPermFailed = 17,
    #[error("ACL failed validation")]
    ValidateAclFailed = 18,
    #[error("writing ACL failed")]
    SetAclFailed = 19,
    #[error("ACL entry has an unknown tag type")]
    UnknownTagType = 20,
    #[error("default ACL requested for a non-directory")]
    DefaultAclOnNonDirectory = 21,
    #[error("ACL entry count does not match")]
    EntryCountMismatch = 22,
    #[error("invalid argument")]
    InvalidArgument = 23,
    #[error("another read session is still open")]
    SessionBusy = 24,
    #[error("no read session is open")]
    NoOpenSession = 25,
    #[error("acl_calc_mask failed")]
    CalcMaskFailed = 26,
}

impl ErrorKind {
    /// Fixed-width code used at the native boundary.
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Error type from ACL operations: the failing step plus the OS error captured right after it.
#[derive(Debug, Error)]
#[error("{kind}: {source}")]
pub struct AclNativeError {
    kind: ErrorKind,
    source: io::Error,
}

impl AclNativeError {
    pub(crate) fn new(kind: ErrorKind, source: io::Error) -> AclNativeError {
        AclNativeError { kind, source }
    }

    /// Capture `errno` for the call that just failed. Must run before anything else touches
    /// `errno`.
    pub(crate) fn last_os_error(kind: ErrorKind) -> AclNativeError {
        AclNativeError::new(kind, io::Error::last_os_error())
    }

    /// For failures that have no OS call behind them.
    pub(crate) fn with_errno(kind: ErrorKind, errno: i32) -> AclNativeError {
        AclNativeError::new(kind, io::Error::from_raw_os_error(errno))
    }

    /// Which step failed.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The OS error code. Errors without a raw code (e.g. a path with an interior NUL byte)
    /// report `EINVAL`.
    #[must_use]
    pub fn errno(&self) -> i32 {
        self.source.raw_os_error().unwrap_or(libc::EINVAL)
    }

    /// The captured OS error.
    #[must_use]
    pub fn io_error(&self) -> &io::Error {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ErrorKind::OpenFailed.code(), 1);
        assert_eq!(ErrorKind::GetPermsetFailed.code(), 7);
        assert_eq!(ErrorKind::SetAclFailed.code(), 19);
        assert_eq!(ErrorKind::CalcMaskFailed.code(), 26);
    }

    #[test]
    fn display() {
        let err = AclNativeError::with_errno(ErrorKind::OpenFailed, libc::ENOENT);
        assert_eq!(
            err.to_string(),
            "open failed: No such file or directory (os error 2)"
        );
        assert_eq!(err.errno(), libc::ENOENT);
        assert_eq!(err.io_error().kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn errno_without_raw_code() {
        let err = AclNativeError::new(
            ErrorKind::OpenFailed,
            io::Error::new(io::ErrorKind::InvalidInput, "nul byte"),
        );
        assert_eq!(err.errno(), libc::EINVAL);
    }
}
