//! Read and write sessions over one opened file object.
//!
//! A read is split into two phases: [`ReadSession::open`] returns the permission summary and
//! the number of ACL entries while keeping the file and the ACL handle open, and
//! [`ReadSession::finish`] decodes the entries and releases both. Both resources are owned by
//! the session value, so every exit path releases them exactly once.
//!
//! Writes are not transactional: ownership and mode are applied before the new ACL is built,
//! and stay in effect if a later ACL step fails.

use crate::acl::{AclKind, PosixAcl};
use crate::entry::AclEntry;
use crate::error::{AclNativeError, ErrorKind};
use crate::perm::{decode_mode, encode_mode, ModePermissions, MODE_MASK};
use log::{debug, warn};
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::{fchown, MetadataExt, PermissionsExt};
use std::path::Path;

/// Per-object permission summary exchanged ahead of the ACL entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PermissionDataContainer {
    pub owner_id: u32,
    pub group_id: u32,
    pub permissions: ModePermissions,
    /// Number of entries in the ACL that was loaded (read) or is supplied (write). A write
    /// rejects a container whose size differs from the entry list it comes with.
    pub acl_size: usize,
}

/// What `fstat` reports that the sessions care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub is_dir: bool,
}

/// Ownership and mode operations on an opened file object.
///
/// Implemented for [`File`]; tests substitute a recording fake.
pub trait FileTarget {
    fn stat(&self) -> io::Result<FileStat>;
    /// `None` leaves the owner or group unchanged.
    fn chown(&mut self, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;
    fn chmod(&mut self, mode: u32) -> io::Result<()>;
}

impl FileTarget for File {
    fn stat(&self) -> io::Result<FileStat> {
        let meta = self.metadata()?;
        Ok(FileStat {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode(),
            is_dir: meta.is_dir(),
        })
    }

    fn chown(&mut self, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        fchown(&*self, uid, gid)
    }

    fn chmod(&mut self, mode: u32) -> io::Result<()> {
        self.set_permissions(fs::Permissions::from_mode(mode))
    }
}

fn open(path: &Path) -> Result<File, AclNativeError> {
    File::open(path).map_err(|e| AclNativeError::new(ErrorKind::OpenFailed, e))
}

fn stat<T: FileTarget>(target: &T) -> Result<FileStat, AclNativeError> {
    target
        .stat()
        .map_err(|e| AclNativeError::new(ErrorKind::FstatFailed, e))
}

fn check_kind(stat: &FileStat, kind: AclKind) -> Result<(), AclNativeError> {
    if kind == AclKind::Default && !stat.is_dir {
        return Err(AclNativeError::with_errno(
            ErrorKind::DefaultAclOnNonDirectory,
            libc::ENOTDIR,
        ));
    }
    Ok(())
}

/// A read in progress: the file is open and its ACL is loaded.
#[derive(Debug)]
pub struct ReadSession {
    // Held open until the session ends.
    _file: File,
    acl: PosixAcl,
    data: PermissionDataContainer,
}

impl ReadSession {
    /// First phase: open `path`, read its ownership and mode, load the requested ACL and count
    /// its entries.
    ///
    /// # Errors
    /// * `OpenFailed`, `FstatFailed`, `DefaultAclOnNonDirectory`, `GetAclFailed`,
    ///   `GetEntryFailed`
    pub fn open<P: AsRef<Path>>(path: P, kind: AclKind) -> Result<ReadSession, AclNativeError> {
        let path = path.as_ref();
        let file = open(path)?;
        let st = stat(&file)?;
        check_kind(&st, kind)?;

        let acl = PosixAcl::load(&file, path, kind)?;
        let acl_size = acl.entry_count()?;
        debug!(
            "loaded {} ACL of {} with {} entries",
            kind,
            path.display(),
            acl_size
        );

        Ok(ReadSession {
            _file: file,
            acl,
            data: PermissionDataContainer {
                owner_id: st.uid,
                group_id: st.gid,
                permissions: decode_mode(st.mode & MODE_MASK),
                acl_size,
            },
        })
    }

    /// The permission summary gathered by [`ReadSession::open`].
    #[must_use]
    pub fn permission_data(&self) -> &PermissionDataContainer {
        &self.data
    }

    /// Second phase: decode the held ACL into exactly `entry_count` entries and close the file.
    ///
    /// `entry_count` is the size the caller prepared from [`ReadSession::permission_data`]. The
    /// ACL is counted again first, and a different count fails instead of under- or overfilling
    /// the caller's buffer.
    ///
    /// # Errors
    /// * `EntryCountMismatch`, `GetEntryFailed` or any entry decoding error.
    pub fn finish(self, entry_count: usize) -> Result<Vec<AclEntry>, AclNativeError> {
        let actual = self.acl.entry_count()?;
        if actual != entry_count {
            debug!(
                "caller expects {} ACL entries, ACL holds {}",
                entry_count, actual
            );
            return Err(AclNativeError::with_errno(
                ErrorKind::EntryCountMismatch,
                libc::ESTALE,
            ));
        }
        let entries = self.acl.entries()?;
        debug!("read {} ACL entries, closing", entries.len());
        Ok(entries)
    }
}

/// Read the permission summary and all ACL entries in one call.
///
/// # Errors
/// Any error of [`ReadSession::open`] or [`ReadSession::finish`].
pub fn read_all<P: AsRef<Path>>(
    path: P,
    kind: AclKind,
) -> Result<(PermissionDataContainer, Vec<AclEntry>), AclNativeError> {
    let session = ReadSession::open(path, kind)?;
    let data = *session.permission_data();
    let entries = session.finish(data.acl_size)?;
    Ok((data, entries))
}

/// Knobs for [`write_all_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Which ACL to replace.
    pub kind: AclKind,
    /// Re-calculate the `Mask` entry before validation. Off by default, so the entries are
    /// written exactly as given.
    pub recalculate_mask: bool,
}

impl WriteOptions {
    #[must_use]
    pub fn new(kind: AclKind) -> WriteOptions {
        WriteOptions {
            kind,
            recalculate_mask: false,
        }
    }

    #[must_use]
    pub fn recalculate_mask(mut self, yes: bool) -> WriteOptions {
        self.recalculate_mask = yes;
        self
    }
}

/// Apply owner, group and mode from `data` to `target`.
///
/// Ownership is only changed when the owner or group differs from the current one; the mode is
/// always written. Returns the stat taken before any change.
///
/// # Errors
/// * `FstatFailed`, `DefaultAclOnNonDirectory`, `ChownFailed`, `ChmodFailed`
pub fn apply_ownership_and_mode<T: FileTarget>(
    target: &mut T,
    kind: AclKind,
    data: &PermissionDataContainer,
) -> Result<FileStat, AclNativeError> {
    let st = stat(target)?;
    check_kind(&st, kind)?;

    let new_owner = Some(data.owner_id).filter(|&uid| uid != st.uid);
    let new_group = Some(data.group_id).filter(|&gid| gid != st.gid);
    if new_owner.is_some() || new_group.is_some() {
        debug!("changing ownership to {:?}:{:?}", new_owner, new_group);
        target
            .chown(new_owner, new_group)
            .map_err(|e| AclNativeError::new(ErrorKind::ChownFailed, e))?;
    }

    let mode = encode_mode(&data.permissions);
    debug!("setting mode {:o}", mode);
    target
        .chmod(mode)
        .map_err(|e| AclNativeError::new(ErrorKind::ChmodFailed, e))?;
    Ok(st)
}

/// Build a new ACL from `entries`, validate it and install it on `file`.
fn install_acl(
    file: &File,
    path: &Path,
    options: &WriteOptions,
    entries: &[AclEntry],
) -> Result<(), AclNativeError> {
    let mut acl = PosixAcl::with_capacity(entries.len())?;
    for entry in entries {
        acl.push(entry)?;
    }
    if options.recalculate_mask {
        acl.fix_mask()?;
    }
    acl.validate()?;
    acl.apply(file, path, options.kind)?;
    debug!(
        "installed {} ACL with {} entries on {}",
        options.kind,
        entries.len(),
        path.display()
    );
    Ok(())
}

/// Replace owner, group, mode and the selected ACL of `path`.
///
/// # Errors
/// * `InvalidArgument` if `data.acl_size` is not `entries.len()`. Nothing is changed then.
/// * `OpenFailed`, any error of [`apply_ownership_and_mode`] or the ACL stage
///   (`InitAclFailed`, `CreateEntryFailed`, entry encoding errors, `ValidateAclFailed`,
///   `SetAclFailed`). An ACL-stage error leaves the ownership and mode changes in place.
pub fn write_all<P: AsRef<Path>>(
    path: P,
    kind: AclKind,
    data: &PermissionDataContainer,
    entries: &[AclEntry],
) -> Result<(), AclNativeError> {
    write_all_with(path, &WriteOptions::new(kind), data, entries)
}

/// [`write_all`] with explicit [`WriteOptions`].
///
/// # Errors
/// See [`write_all`].
pub fn write_all_with<P: AsRef<Path>>(
    path: P,
    options: &WriteOptions,
    data: &PermissionDataContainer,
    entries: &[AclEntry],
) -> Result<(), AclNativeError> {
    let path = path.as_ref();
    if data.acl_size != entries.len() {
        debug!(
            "container announces {} ACL entries, {} supplied",
            data.acl_size,
            entries.len()
        );
        return Err(AclNativeError::with_errno(
            ErrorKind::InvalidArgument,
            libc::EINVAL,
        ));
    }
    let mut file = open(path)?;
    apply_ownership_and_mode(&mut file, options.kind, data)?;

    install_acl(&file, path, options, entries).map_err(|err| {
        warn!(
            "{}: ownership and mode were updated but the ACL was not: {}",
            path.display(),
            err
        );
        err
    })
}
