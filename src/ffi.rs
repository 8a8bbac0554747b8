//! C calling convention surface for the managed caller.
//!
//! Every export resets the last-error record, runs one operation, records the failure (if any)
//! and returns its code; `0` means success. Struct layouts are fixed: 3 and 6 32-bit fields.
//!
//! The two read phases are separate calls, so the pending [`ReadSession`] lives in a single
//! process-wide slot. Starting a second read before the first one finished is rejected with
//! `SessionBusy`. Writes do not use the slot.

use crate::acl::AclKind;
use crate::entry::{AclEntry, AclEntryTagType, Qualifier};
use crate::error::{AclNativeError, ErrorKind};
use crate::last_error::{self, copy_c_string};
use crate::perm::{FilePermission, ModePermissions};
use crate::session::{write_all, PermissionDataContainer, ReadSession};
use log::debug;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::slice;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Wire form of [`AclEntry`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawAclEntry {
    pub tag_type: i32,
    pub tag_qualifier: i32,
    pub permissions: u32,
}

/// Wire form of [`PermissionDataContainer`].
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawPermissionDataContainer {
    pub owner_id: i32,
    pub owner_permissions: u32,
    pub group_id: i32,
    pub group_permissions: u32,
    pub other_permissions: u32,
    pub acl_size: i32,
}

const _: () = assert!(std::mem::size_of::<RawAclEntry>() == 3 * 4);
const _: () = assert!(std::mem::size_of::<RawPermissionDataContainer>() == 6 * 4);

fn invalid_argument() -> AclNativeError {
    AclNativeError::with_errno(ErrorKind::InvalidArgument, libc::EINVAL)
}

fn no_open_session() -> AclNativeError {
    AclNativeError::with_errno(ErrorKind::NoOpenSession, libc::EBADF)
}

// UIDs and GIDs travel as the bit pattern of an `int32_t`.
impl From<&AclEntry> for RawAclEntry {
    fn from(entry: &AclEntry) -> RawAclEntry {
        RawAclEntry {
            tag_type: entry.qual.tag_type().code(),
            tag_qualifier: entry.qual.qualifier() as i32,
            permissions: (entry.perm & FilePermission::RWX).bits(),
        }
    }
}

impl TryFrom<RawAclEntry> for AclEntry {
    type Error = AclNativeError;

    /// Fails with `InvalidTagType` for tag codes outside the six known tags.
    fn try_from(raw: RawAclEntry) -> Result<AclEntry, AclNativeError> {
        let tag_type = AclEntryTagType::from_code(raw.tag_type)
            .ok_or_else(|| AclNativeError::with_errno(ErrorKind::InvalidTagType, libc::EINVAL))?;
        Ok(AclEntry {
            qual: Qualifier::from_parts(tag_type, raw.tag_qualifier as u32),
            perm: FilePermission::from_bits_truncate(raw.permissions) & FilePermission::RWX,
        })
    }
}

impl From<&PermissionDataContainer> for RawPermissionDataContainer {
    fn from(data: &PermissionDataContainer) -> RawPermissionDataContainer {
        RawPermissionDataContainer {
            owner_id: data.owner_id as i32,
            owner_permissions: data.permissions.owner.bits(),
            group_id: data.group_id as i32,
            group_permissions: data.permissions.group.bits(),
            other_permissions: data.permissions.other.bits(),
            acl_size: i32::try_from(data.acl_size).unwrap_or(i32::MAX),
        }
    }
}

impl TryFrom<RawPermissionDataContainer> for PermissionDataContainer {
    type Error = AclNativeError;

    /// Fails with `InvalidArgument` for a negative ACL size.
    fn try_from(
        raw: RawPermissionDataContainer,
    ) -> Result<PermissionDataContainer, AclNativeError> {
        let acl_size = usize::try_from(raw.acl_size).map_err(|_| invalid_argument())?;
        Ok(PermissionDataContainer {
            owner_id: raw.owner_id as u32,
            group_id: raw.group_id as u32,
            permissions: ModePermissions {
                owner: FilePermission::from_bits_truncate(raw.owner_permissions),
                group: FilePermission::from_bits_truncate(raw.group_permissions),
                other: FilePermission::from_bits_truncate(raw.other_permissions),
            },
            acl_size,
        })
    }
}

static READ_SESSION: Mutex<Option<ReadSession>> = Mutex::new(None);

fn read_session() -> MutexGuard<'static, Option<ReadSession>> {
    READ_SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record a failure and turn the outcome into a wire code.
fn finish_call(result: Result<(), AclNativeError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            debug!("native call failed: {}", err);
            last_error::record(&err);
            err.kind().code()
        }
    }
}

unsafe fn path_arg<'a>(file_name: *const c_char) -> Result<&'a Path, AclNativeError> {
    if file_name.is_null() {
        return Err(invalid_argument());
    }
    let bytes = CStr::from_ptr(file_name).to_bytes();
    Ok(Path::new(std::ffi::OsStr::from_bytes(bytes)))
}

/// Open `file_name`, fill `data_container` with its ownership, mode and ACL size, and keep the
/// ACL loaded for [`read_file_acl_and_close`].
///
/// # Safety
/// `file_name` must be a NUL-terminated string and `data_container` must point to writable
/// memory for one container.
#[export_name = "OpenFileAndReadPermissionData"]
pub unsafe extern "C" fn open_file_and_read_permission_data(
    file_name: *const c_char,
    load_default_acl: i32,
    data_container: *mut RawPermissionDataContainer,
) -> i32 {
    last_error::reset();
    finish_call((|| {
        if data_container.is_null() {
            return Err(invalid_argument());
        }
        let path = path_arg(file_name)?;
        let mut slot = read_session();
        if slot.is_some() {
            return Err(AclNativeError::with_errno(
                ErrorKind::SessionBusy,
                libc::EBUSY,
            ));
        }
        let session = ReadSession::open(path, AclKind::from_flag(load_default_acl))?;
        *data_container = RawPermissionDataContainer::from(session.permission_data());
        *slot = Some(session);
        Ok(())
    })())
}

/// Decode the pending ACL into `entries` (exactly `entry_count` elements, as reported by
/// [`open_file_and_read_permission_data`]) and close the file. The pending session is released
/// whether this succeeds or not.
///
/// # Safety
/// `entries` must point to writable memory for `entry_count` entries (it may be null when
/// `entry_count` is 0).
#[export_name = "ReadFileAclAndClose"]
pub unsafe extern "C" fn read_file_acl_and_close(
    entries: *mut RawAclEntry,
    entry_count: i32,
) -> i32 {
    last_error::reset();
    finish_call((|| {
        let session = read_session().take().ok_or_else(no_open_session)?;
        let count = usize::try_from(entry_count).map_err(|_| invalid_argument())?;
        if entries.is_null() && count > 0 {
            return Err(invalid_argument());
        }
        let decoded = session.finish(count)?;
        if count > 0 {
            let out = slice::from_raw_parts_mut(entries, count);
            for (slot, entry) in out.iter_mut().zip(&decoded) {
                *slot = RawAclEntry::from(entry);
            }
        }
        Ok(())
    })())
}

/// Replace owner, group, mode and the access (or, with `set_default_acl`, default) ACL of
/// `file_name`. The number of entries is taken from `data_container.acl_size`.
///
/// Ownership and mode stay changed if a later ACL step fails. Tag codes are checked before
/// anything is changed.
///
/// # Safety
/// `file_name` must be a NUL-terminated string, `data_container` must point to one container
/// and `entries` to `acl_size` entries (it may be null when `acl_size` is 0).
#[export_name = "SetFilePermissionDataAndAcl"]
pub unsafe extern "C" fn set_file_permission_data_and_acl(
    file_name: *const c_char,
    set_default_acl: i32,
    data_container: *const RawPermissionDataContainer,
    entries: *const RawAclEntry,
) -> i32 {
    last_error::reset();
    finish_call((|| {
        if data_container.is_null() {
            return Err(invalid_argument());
        }
        let path = path_arg(file_name)?;
        let data = PermissionDataContainer::try_from(*data_container)?;
        if entries.is_null() && data.acl_size > 0 {
            return Err(invalid_argument());
        }
        let raw: &[RawAclEntry] = if data.acl_size == 0 {
            &[]
        } else {
            slice::from_raw_parts(entries, data.acl_size)
        };
        let typed = raw
            .iter()
            .map(|&e| AclEntry::try_from(e))
            .collect::<Result<Vec<_>, _>>()?;
        write_all(path, AclKind::from_flag(set_default_acl), &data, &typed)
    })())
}

/// Return the `errno` of the last failed call (0 if the last call succeeded) and copy its
/// description into `errno_string_buffer`, truncated to `errno_string_buffer_length` bytes
/// including the terminating NUL. Use [`get_last_errno_description_length`] to detect
/// truncation.
///
/// # Safety
/// `errno_string_buffer` must point to `errno_string_buffer_length` writable bytes, or be null.
#[export_name = "GetLastErrnoValue"]
pub unsafe extern "C" fn get_last_errno_value(
    errno_string_buffer: *mut c_char,
    errno_string_buffer_length: i32,
) -> i64 {
    let buf: &mut [u8] = match usize::try_from(errno_string_buffer_length) {
        Ok(len) if len > 0 && !errno_string_buffer.is_null() => {
            slice::from_raw_parts_mut(errno_string_buffer as *mut u8, len)
        }
        _ => &mut [],
    };
    match last_error::snapshot() {
        Some(err) => {
            err.copy_description(buf);
            i64::from(err.code)
        }
        None => {
            copy_c_string("", buf);
            0
        }
    }
}

/// Length in bytes of the last error description, excluding the terminating NUL.
#[export_name = "GetLastErrnoDescriptionLength"]
pub extern "C" fn get_last_errno_description_length() -> i32 {
    let len = last_error::snapshot().map_or(0, |err| err.description.len());
    i32::try_from(len).unwrap_or(i32::MAX)
}
