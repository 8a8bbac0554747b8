use crate::error::{AclNativeError, ErrorKind};
use crate::PosixAcl;
use acl_sys::{acl_entry_t, acl_get_entry, ACL_FIRST_ENTRY, ACL_NEXT_ENTRY};
use std::ptr::null_mut;

/// Walks an ACL from the first entry to the last. The C API keeps a single cursor per ACL, so
/// only one walk may be in progress at a time.
///
/// A walk error is yielded once, after which the iterator is exhausted.
pub(crate) struct RawAclIterator<'a> {
    acl: &'a PosixAcl,
    next: i32,
    done: bool,
}

impl<'a> RawAclIterator<'a> {
    pub(crate) fn new(acl: &'a PosixAcl) -> RawAclIterator<'a> {
        RawAclIterator {
            acl,
            next: ACL_FIRST_ENTRY,
            done: false,
        }
    }
}

impl<'a> Iterator for RawAclIterator<'a> {
    type Item = Result<acl_entry_t, AclNativeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut entry: acl_entry_t = null_mut();
        // The returned entry is owned by the ACL itself, no need to free it.
        let ret = unsafe { acl_get_entry(self.acl.acl, self.next, &mut entry) };
        match ret {
            1 => {
                self.next = ACL_NEXT_ENTRY;
                Some(Ok(entry))
            }
            0 => {
                self.done = true;
                None
            }
            _ => {
                self.done = true;
                Some(Err(AclNativeError::last_os_error(ErrorKind::GetEntryFailed)))
            }
        }
    }
}
