//! acl-native exposes POSIX file permissions and ACLs of a file or directory to a managed caller.
//! It uses the operating system's C API (libacl) internally.
//!
//! Rust code uses [`ReadSession`] / [`read_all`] to read and [`write_all`] to write. The
//! [`ffi`] module wraps the same operations in a C calling convention, with a process-wide
//! [`last_error`] record for the error details.
//!
//! ```no_run
//! use acl_native::{read_all, AclKind};
//! let (data, entries) = read_all("/etc/shells", AclKind::Access).unwrap();
//! assert_eq!(data.acl_size, entries.len());
//! ```

mod acl;
mod entry;
mod error;
pub mod ffi;
mod iter;
pub mod last_error;
mod perm;
mod session;
mod util;

pub use acl::{AclKind, PosixAcl};
pub use entry::{AclEntry, AclEntryTagType, Qualifier};
pub use error::{AclNativeError, ErrorKind};
pub use perm::{decode_mode, encode_mode, FilePermission, ModePermissions, MODE_MASK};
pub use session::{
    apply_ownership_and_mode, read_all, write_all, write_all_with, FileStat, FileTarget,
    PermissionDataContainer, ReadSession, WriteOptions,
};

#[cfg(test)]
mod tests;
