use crate::error::{AclNativeError, ErrorKind};
use crate::perm::FilePermission;
use crate::util::AutoPtr;
use crate::Qualifier::*;
use acl_sys::{
    acl_add_perm, acl_clear_perms, acl_entry_t, acl_get_permset, acl_get_qualifier,
    acl_get_tag_type, acl_permset_t, acl_set_qualifier, acl_set_tag_type, ACL_EXECUTE, ACL_GROUP,
    ACL_GROUP_OBJ, ACL_MASK, ACL_OTHER, ACL_READ, ACL_USER, ACL_USER_OBJ, ACL_WRITE,
};
use log::trace;
use std::os::raw::{c_int, c_void};
use std::ptr::null_mut;

// Linux extension from <acl/libacl.h>.
#[link(name = "acl")]
extern "C" {
    fn acl_get_perm(permset_d: acl_permset_t, perm: u32) -> c_int;
}

/// Pairs of our flag and the platform permission bit, in the order they are queried.
const PERM_BITS: [(FilePermission, u32); 3] = [
    (FilePermission::READ, ACL_READ),
    (FilePermission::WRITE, ACL_WRITE),
    (FilePermission::EXECUTE, ACL_EXECUTE),
];

/// Fixed-width tag codes used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum AclEntryTagType {
    /// Permissions for the owning user.
    UserObj = 1,
    /// Permissions for a specific user.
    User = 2,
    /// Permissions for the owning group.
    GroupObj = 3,
    /// Permissions for a specific group.
    Group = 4,
    /// Upper bound for named users/groups and the owning group.
    Mask = 5,
    /// Permissions for everyone else.
    Other = 6,
}

impl AclEntryTagType {
    /// Decode a wire code. `None` for anything outside the six known tags.
    #[must_use]
    pub fn from_code(code: i32) -> Option<AclEntryTagType> {
        Some(match code {
            1 => AclEntryTagType::UserObj,
            2 => AclEntryTagType::User,
            3 => AclEntryTagType::GroupObj,
            4 => AclEntryTagType::Group,
            5 => AclEntryTagType::Mask,
            6 => AclEntryTagType::Other,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// The subject of a permission grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// Permissions for owner of the file
    UserObj,
    /// Permissions for user with UID `u32` value
    User(u32),
    /// Permissions for owning group of the file
    GroupObj,
    /// Permissions for group with GID `u32` value
    Group(u32),
    /// Maximum permissions for named entries and the owning group
    Mask,
    /// Permissions for everyone else not covered by the ACL
    Other,
}

impl Qualifier {
    /// Build from a wire tag and qualifier. The qualifier is ignored unless the tag names a
    /// specific user or group.
    #[must_use]
    pub fn from_parts(tag_type: AclEntryTagType, qualifier: u32) -> Qualifier {
        match tag_type {
            AclEntryTagType::UserObj => UserObj,
            AclEntryTagType::User => User(qualifier),
            AclEntryTagType::GroupObj => GroupObj,
            AclEntryTagType::Group => Group(qualifier),
            AclEntryTagType::Mask => Mask,
            AclEntryTagType::Other => Other,
        }
    }

    #[must_use]
    pub fn tag_type(&self) -> AclEntryTagType {
        match self {
            UserObj => AclEntryTagType::UserObj,
            User(_) => AclEntryTagType::User,
            GroupObj => AclEntryTagType::GroupObj,
            Group(_) => AclEntryTagType::Group,
            Mask => AclEntryTagType::Mask,
            Other => AclEntryTagType::Other,
        }
    }

    /// UID or GID for named entries.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        match self {
            User(id) | Group(id) => Some(*id),
            _ => None,
        }
    }

    /// Wire qualifier: the UID/GID for named entries, zero otherwise.
    #[must_use]
    pub fn qualifier(&self) -> u32 {
        self.id().unwrap_or(0)
    }

    pub(crate) fn platform_tag(&self) -> i32 {
        match self {
            UserObj => ACL_USER_OBJ,
            User(_) => ACL_USER,
            GroupObj => ACL_GROUP_OBJ,
            Group(_) => ACL_GROUP,
            Mask => ACL_MASK,
            Other => ACL_OTHER,
        }
    }

    /// Convert C type acl_entry_t to Rust Qualifier
    pub(crate) fn from_entry(entry: acl_entry_t) -> Result<Qualifier, AclNativeError> {
        let mut tag_type: i32 = 0;
        let ret = unsafe { acl_get_tag_type(entry, &mut tag_type) };
        if ret != 0 {
            return Err(AclNativeError::last_os_error(ErrorKind::GetTagTypeFailed));
        }
        Ok(match tag_type {
            ACL_USER_OBJ => UserObj,
            ACL_GROUP_OBJ => GroupObj,
            ACL_USER => User(Qualifier::get_entry_uid(entry)?),
            ACL_GROUP => Group(Qualifier::get_entry_uid(entry)?),
            ACL_MASK => Mask,
            ACL_OTHER => Other,
            // ACL_UNDEFINED_TAG or something this library does not know about.
            _ => {
                return Err(AclNativeError::with_errno(
                    ErrorKind::UnknownTagType,
                    libc::EINVAL,
                ))
            }
        })
    }

    /// Helper function for from_entry()
    fn get_entry_uid(entry: acl_entry_t) -> Result<u32, AclNativeError> {
        let uid = AutoPtr(unsafe { acl_get_qualifier(entry) } as *mut u32);
        if uid.0.is_null() {
            return Err(AclNativeError::last_os_error(ErrorKind::GetQualifierFailed));
        }
        Ok(unsafe { *uid.0 })
    }
}

/// One ACL entry: who it applies to and what they may do.
///
/// Only the read/write/execute bits of `perm` are representable in an ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AclEntry {
    pub qual: Qualifier,
    pub perm: FilePermission,
}

impl AclEntry {
    #[must_use]
    pub fn new(qual: Qualifier, perm: FilePermission) -> AclEntry {
        AclEntry { qual, perm }
    }
}

fn get_permset(entry: acl_entry_t) -> Result<acl_permset_t, AclNativeError> {
    let mut permset: acl_permset_t = null_mut();
    let ret = unsafe { acl_get_permset(entry, &mut permset) };
    if ret != 0 {
        return Err(AclNativeError::last_os_error(ErrorKind::GetPermsetFailed));
    }
    Ok(permset)
}

/// Convert C type acl_entry_t to Rust AclEntry
pub(crate) fn decode_entry(entry: acl_entry_t) -> Result<AclEntry, AclNativeError> {
    let qual = Qualifier::from_entry(entry)?;
    let permset = get_permset(entry)?;

    let mut perm = FilePermission::empty();
    for (flag, bit) in PERM_BITS {
        match unsafe { acl_get_perm(permset, bit) } {
            0 => {}
            ret if ret > 0 => perm |= flag,
            _ => return Err(AclNativeError::last_os_error(ErrorKind::GetPermFailed)),
        }
    }

    trace!("decoded ACL entry {:?} {:?}", qual, perm);
    Ok(AclEntry { qual, perm })
}

/// Fill a freshly created acl_entry_t from `value`: tag, qualifier, then permissions one bit at
/// a time.
pub(crate) fn encode_entry(entry: acl_entry_t, value: &AclEntry) -> Result<(), AclNativeError> {
    let ret = unsafe { acl_set_tag_type(entry, value.qual.platform_tag()) };
    if ret != 0 {
        return Err(AclNativeError::last_os_error(ErrorKind::SetTagTypeFailed));
    }
    if let Some(id) = value.qual.id() {
        let ret = unsafe { acl_set_qualifier(entry, &id as *const u32 as *const c_void) };
        if ret != 0 {
            return Err(AclNativeError::last_os_error(ErrorKind::SetQualifierFailed));
        }
    }

    let permset = get_permset(entry)?;
    if unsafe { acl_clear_perms(permset) } != 0 {
        return Err(AclNativeError::last_os_error(ErrorKind::ClearPermsFailed));
    }
    for (flag, bit) in PERM_BITS {
        if value.perm.contains(flag) && unsafe { acl_add_perm(permset, bit) } != 0 {
            return Err(AclNativeError::last_os_error(ErrorKind::AddPermFailed));
        }
    }

    trace!("encoded ACL entry {:?} {:?}", value.qual, value.perm);
    Ok(())
}
