//! Translation between the platform file mode and [`FilePermission`] flag sets.

use bitflags::bitflags;

bitflags! {
    /// Permission flags of one principal class (owner, group, other) or of one ACL entry.
    ///
    /// `SET_ID` is only meaningful for owner (setuid) and group (setgid), `STICKY` only for the
    /// owner. The type does not enforce this; bits a class cannot represent are dropped by
    /// [`encode_mode`].
    pub struct FilePermission: u32 {
        /// Execute a file, search a directory.
        const EXECUTE = 1;
        /// Write to a file.
        const WRITE = 2;
        /// Read a file, list a directory.
        const READ = 4;
        /// Set user/group ID on execution.
        const SET_ID = 8;
        /// Restricted deletion in directories.
        const STICKY = 16;
    }
}

impl FilePermission {
    /// The subset representable in an ACL entry.
    pub const RWX: FilePermission = FilePermission {
        bits: Self::READ.bits | Self::WRITE.bits | Self::EXECUTE.bits,
    };
}

impl Default for FilePermission {
    fn default() -> Self {
        FilePermission::empty()
    }
}

/// Owner/group/other permission triad extracted from a file mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModePermissions {
    pub owner: FilePermission,
    pub group: FilePermission,
    pub other: FilePermission,
}

const S_ISUID: u32 = 0o4000;
const S_ISGID: u32 = 0o2000;
const S_ISVTX: u32 = 0o1000;

/// All bits handled by the codec; file type bits are ignored.
pub const MODE_MASK: u32 = 0o7777;

/// Shift of the rwx triple for each class within the mode.
const OWNER_SHIFT: u32 = 6;
const GROUP_SHIFT: u32 = 3;
const OTHER_SHIFT: u32 = 0;

// r/w/x occupy the same relative bit positions in the mode as in `FilePermission`.
fn rwx_from_mode(mode: u32, shift: u32) -> FilePermission {
    FilePermission::from_bits_truncate((mode >> shift) & FilePermission::RWX.bits())
}

fn rwx_to_mode(perm: FilePermission, shift: u32) -> u32 {
    (perm & FilePermission::RWX).bits() << shift
}

/// Split a platform mode into per-class permissions.
///
/// setuid maps to owner `SET_ID`, setgid to group `SET_ID` and the sticky bit to owner
/// `STICKY`.
///
/// ```
/// use acl_native::{decode_mode, FilePermission};
/// let perms = decode_mode(0o4750);
/// assert_eq!(perms.owner, FilePermission::RWX | FilePermission::SET_ID);
/// assert_eq!(perms.group, FilePermission::READ | FilePermission::EXECUTE);
/// assert_eq!(perms.other, FilePermission::empty());
/// ```
#[must_use]
pub fn decode_mode(mode: u32) -> ModePermissions {
    let mut owner = rwx_from_mode(mode, OWNER_SHIFT);
    let mut group = rwx_from_mode(mode, GROUP_SHIFT);
    let other = rwx_from_mode(mode, OTHER_SHIFT);
    owner.set(FilePermission::SET_ID, mode & S_ISUID != 0);
    owner.set(FilePermission::STICKY, mode & S_ISVTX != 0);
    group.set(FilePermission::SET_ID, mode & S_ISGID != 0);
    ModePermissions {
        owner,
        group,
        other,
    }
}

/// Inverse of [`decode_mode`]: build the mode bits for `fchmod`.
#[must_use]
pub fn encode_mode(perms: &ModePermissions) -> u32 {
    let mut mode = rwx_to_mode(perms.owner, OWNER_SHIFT)
        | rwx_to_mode(perms.group, GROUP_SHIFT)
        | rwx_to_mode(perms.other, OTHER_SHIFT);
    if perms.owner.contains(FilePermission::SET_ID) {
        mode |= S_ISUID;
    }
    if perms.owner.contains(FilePermission::STICKY) {
        mode |= S_ISVTX;
    }
    if perms.group.contains(FilePermission::SET_ID) {
        mode |= S_ISGID;
    }
    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const NONE: FilePermission = FilePermission::empty();
    const R: FilePermission = FilePermission::READ;
    const W: FilePermission = FilePermission::WRITE;
    const X: FilePermission = FilePermission::EXECUTE;
    const RWX: FilePermission = FilePermission::RWX;
    const SET_ID: FilePermission = FilePermission::SET_ID;
    const STICKY: FilePermission = FilePermission::STICKY;

    #[rstest]
    #[case(0o000, NONE, NONE, NONE)]
    #[case(0o644, R | W, R, R)]
    #[case(0o751, RWX, R | X, X)]
    #[case(0o4700, RWX | SET_ID, NONE, NONE)]
    #[case(0o2070, NONE, RWX | SET_ID, NONE)]
    #[case(0o1777, RWX | STICKY, RWX, RWX)]
    fn decode(
        #[case] mode: u32,
        #[case] owner: FilePermission,
        #[case] group: FilePermission,
        #[case] other: FilePermission,
    ) {
        assert_eq!(
            decode_mode(mode),
            ModePermissions {
                owner,
                group,
                other
            }
        );
    }

    #[test]
    fn debug_lists_single_flags() {
        assert_eq!(format!("{:?}", RWX), "EXECUTE | WRITE | READ");
        assert_eq!(format!("{:?}", R | SET_ID), "READ | SET_ID");
    }

    #[test]
    fn ignores_file_type_bits() {
        // S_IFDIR | 0755
        assert_eq!(decode_mode(0o040755), decode_mode(0o755));
    }

    /// Bits a class cannot represent are dropped.
    #[test]
    fn encode_drops_unrepresentable() {
        let perms = ModePermissions {
            owner: FilePermission::READ,
            group: FilePermission::STICKY,
            other: FilePermission::SET_ID | FilePermission::STICKY | FilePermission::WRITE,
        };
        assert_eq!(encode_mode(&perms), 0o402);
    }

    proptest! {
        #[test]
        fn mode_round_trip(mode in 0u32..=MODE_MASK) {
            prop_assert_eq!(encode_mode(&decode_mode(mode)), mode);
        }

        #[test]
        fn perms_round_trip(owner in 0u32..32, group in 0u32..16, other in 0u32..8) {
            let group = FilePermission::from_bits_truncate(group) - FilePermission::STICKY;
            let perms = ModePermissions {
                owner: FilePermission::from_bits_truncate(owner),
                group,
                other: FilePermission::from_bits_truncate(other),
            };
            prop_assert_eq!(decode_mode(encode_mode(&perms)), perms);
        }
    }
}
