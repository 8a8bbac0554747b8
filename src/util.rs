//! This file is for small helpers & utilities that aren't exported by the library.
use acl_sys::acl_free;
use log::warn;
use std::ffi::{CStr, CString};
use std::io;
use std::os::raw::{c_char, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

/// NB! Unix-only
pub(crate) fn path_to_cstring(path: &Path) -> io::Result<CString> {
    let bytes = path.as_os_str().as_bytes();
    CString::new(bytes).map_err(|_| io::Error::from_raw_os_error(libc::EINVAL))
}

/// Safe wrapper around C pointers to automatically free when going out of scope.
pub(crate) struct AutoPtr<T>(pub(crate) *mut T);

impl<T> Drop for AutoPtr<T> {
    fn drop(&mut self) {
        if self.0.is_null() {
            return;
        }
        let ret = unsafe { acl_free(self.0 as *mut c_void) };
        if ret != 0 {
            // Nothing sensible to propagate from a destructor.
            warn!("acl_free failed: {}", io::Error::last_os_error());
        }
    }
}

/// Platform description of an `errno` value, as `strerror(3)` renders it.
pub(crate) fn describe_errno(errno: i32) -> String {
    let mut buf = [0 as c_char; 256];
    let ret = unsafe { libc::strerror_r(errno, buf.as_mut_ptr(), buf.len()) };
    if ret != 0 {
        return format!("Unknown error {}", errno);
    }
    unsafe { CStr::from_ptr(buf.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nul_in_path() {
        let err = path_to_cstring(Path::new("bad\0path")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    #[test]
    fn errno_text() {
        assert_eq!(describe_errno(libc::ENOENT), "No such file or directory");
        assert_eq!(describe_errno(libc::EACCES), "Permission denied");
    }
}
