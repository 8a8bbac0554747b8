use crate::entry::{decode_entry, encode_entry, AclEntry};
use crate::error::{AclNativeError, ErrorKind};
use crate::iter::RawAclIterator;
use crate::util::{path_to_cstring, AutoPtr};
use acl_sys::{
    acl_calc_mask, acl_create_entry, acl_entry_t, acl_get_fd, acl_get_file, acl_init, acl_set_fd,
    acl_set_file, acl_t, acl_to_text, acl_type_t, acl_valid, ACL_TYPE_ACCESS, ACL_TYPE_DEFAULT,
};
use libc::ssize_t;
use log::warn;
use std::fmt;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::ptr::null_mut;
use std::slice::from_raw_parts;

/// Which of an object's ACLs an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AclKind {
    /// The ACL that governs access to the object itself.
    #[default]
    Access,
    /// The template new children of a directory inherit. Directories only.
    Default,
}

impl AclKind {
    /// Map the boundary's integer flag (non-zero selects the default ACL).
    #[must_use]
    pub fn from_flag(flag: i32) -> AclKind {
        if flag != 0 {
            AclKind::Default
        } else {
            AclKind::Access
        }
    }

    fn acl_type(self) -> acl_type_t {
        match self {
            AclKind::Access => ACL_TYPE_ACCESS,
            AclKind::Default => ACL_TYPE_DEFAULT,
        }
    }
}

impl fmt::Display for AclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AclKind::Access => "access",
            AclKind::Default => "default",
        })
    }
}

/// An ACL handle owned by this process, freed exactly once on drop.
///
/// Either loaded from a file object or built entry by entry for writing.
pub struct PosixAcl {
    pub(crate) acl: acl_t,
}

// The handle is plain heap memory owned by libacl; nothing ties it to the creating thread.
unsafe impl Send for PosixAcl {}

/// Custom debug formatting, since output `PosixAcl { acl: 0x7fd74c000ca8 }` is not very helpful.
impl fmt::Debug for PosixAcl {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Not really a tuple, but tuple formatting is compact.
        fmt.debug_tuple("PosixAcl")
            .field(&self.compact_text())
            .finish()
    }
}

impl Drop for PosixAcl {
    fn drop(&mut self) {
        AutoPtr(self.acl);
    }
}

impl PosixAcl {
    /// Create an empty ACL with room for `capacity` entries. NB! Empty ACLs are NOT considered
    /// valid.
    ///
    /// # Errors
    /// * `InitAclFailed`
    pub fn with_capacity(capacity: usize) -> Result<PosixAcl, AclNativeError> {
        let capacity = i32::try_from(capacity)
            .map_err(|_| AclNativeError::with_errno(ErrorKind::InitAclFailed, libc::EINVAL))?;
        let acl = unsafe { acl_init(capacity) };
        if acl.is_null() {
            Err(AclNativeError::last_os_error(ErrorKind::InitAclFailed))
        } else {
            Ok(PosixAcl { acl })
        }
    }

    /// Load an ACL of an already opened object.
    ///
    /// The access ACL is read through the descriptor. The platform has no descriptor-based call
    /// for default ACLs, so those are read through `path`.
    ///
    /// # Errors
    /// * `GetAclFailed`
    pub fn load<F: AsRawFd>(
        file: &F,
        path: &Path,
        kind: AclKind,
    ) -> Result<PosixAcl, AclNativeError> {
        let acl: acl_t = match kind {
            AclKind::Access => unsafe { acl_get_fd(file.as_raw_fd()) },
            AclKind::Default => {
                let c_path = path_to_cstring(path)
                    .map_err(|e| AclNativeError::new(ErrorKind::GetAclFailed, e))?;
                unsafe { acl_get_file(c_path.as_ptr(), kind.acl_type()) }
            }
        };
        if acl.is_null() {
            Err(AclNativeError::last_os_error(ErrorKind::GetAclFailed))
        } else {
            Ok(PosixAcl { acl })
        }
    }

    /// Install this ACL on an opened object, replacing its existing ACL of the same kind.
    /// Same descriptor/path split as [`PosixAcl::load`].
    ///
    /// # Errors
    /// * `SetAclFailed`
    pub fn apply<F: AsRawFd>(
        &self,
        file: &F,
        path: &Path,
        kind: AclKind,
    ) -> Result<(), AclNativeError> {
        let ret = match kind {
            AclKind::Access => unsafe { acl_set_fd(file.as_raw_fd(), self.acl) },
            AclKind::Default => {
                let c_path = path_to_cstring(path)
                    .map_err(|e| AclNativeError::new(ErrorKind::SetAclFailed, e))?;
                unsafe { acl_set_file(c_path.as_ptr(), kind.acl_type(), self.acl) }
            }
        };
        if ret == 0 {
            Ok(())
        } else {
            Err(AclNativeError::last_os_error(ErrorKind::SetAclFailed))
        }
    }

    /// Iterator of `acl_entry_t`, unsafe
    pub(crate) unsafe fn raw_iter(&self) -> RawAclIterator<'_> {
        RawAclIterator::new(self)
    }

    /// Count entries by walking the ACL.
    ///
    /// # Errors
    /// * `GetEntryFailed`
    pub fn entry_count(&self) -> Result<usize, AclNativeError> {
        let mut count = 0;
        for entry in unsafe { self.raw_iter() } {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Decode all entries. The POSIX ACL C API does not allow multiple parallel iterators so we
    /// return a materialized vector.
    ///
    /// # Errors
    /// * `GetEntryFailed` or any decoding error of the first entry that fails.
    pub fn entries(&self) -> Result<Vec<AclEntry>, AclNativeError> {
        unsafe { self.raw_iter() }
            .map(|entry| decode_entry(entry?))
            .collect()
    }

    /// Append a new entry.
    ///
    /// # Errors
    /// * `CreateEntryFailed` or any encoding error.
    pub fn push(&mut self, value: &AclEntry) -> Result<(), AclNativeError> {
        let mut entry: acl_entry_t = null_mut();
        let ret = unsafe { acl_create_entry(&mut self.acl, &mut entry) };
        if ret != 0 {
            return Err(AclNativeError::last_os_error(ErrorKind::CreateEntryFailed));
        }
        encode_entry(entry, value)
    }

    /// Re-calculate the `Qualifier::Mask` entry, creating it if needed.
    ///
    /// # Errors
    /// * `CalcMaskFailed`
    pub fn fix_mask(&mut self) -> Result<(), AclNativeError> {
        if unsafe { acl_calc_mask(&mut self.acl) } != 0 {
            return Err(AclNativeError::last_os_error(ErrorKind::CalcMaskFailed));
        }
        Ok(())
    }

    /// Call the platform's validation function.
    ///
    /// # Errors
    /// * `ValidateAclFailed`: mainly required entries are missing (`UserObj`, `GroupObj`,
    ///   `Other`, plus `Mask` when named entries exist) or entries are not unique.
    pub fn validate(&self) -> Result<(), AclNativeError> {
        if unsafe { acl_valid(self.acl) } == 0 {
            return Ok(());
        }
        let err = AclNativeError::last_os_error(ErrorKind::ValidateAclFailed);
        warn!("ACL failed validation: {}", self.compact_text());
        Err(err)
    }

    /// Return the textual representation of the ACL. Individual entries are separated by newline
    /// (`'\n'`).
    ///
    /// UID/GID are automatically resolved to names by the platform. Returns an empty string if
    /// the platform cannot render the ACL.
    #[must_use]
    pub fn as_text(&self) -> String {
        let mut len: ssize_t = 0;
        let txt = AutoPtr(unsafe { acl_to_text(self.acl, &mut len) });
        if txt.0.is_null() {
            return String::new();
        }
        let chars = unsafe { from_raw_parts(txt.0 as *const u8, len as usize) };

        String::from_utf8_lossy(chars).into_owned()
    }

    fn compact_text(&self) -> String {
        self.as_text().trim_end().replace('\n', ",")
    }
}
