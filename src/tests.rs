//! Unit tests using internal API.
//!
//! For testing public API (e.g. integration tests), use `tests/main.rs` instead.

use crate::entry::{decode_entry, encode_entry};
use crate::Qualifier::*;
use crate::{AclEntry, AclEntryTagType, ErrorKind, FilePermission, PosixAcl, Qualifier};
use acl_sys::{acl_create_entry, acl_entry_t};
use proptest::prelude::*;
use rstest::rstest;
use std::ptr::null_mut;

/// Create an entry whose tag is still undefined.
fn blank_entry(acl: &mut PosixAcl) -> acl_entry_t {
    let mut entry: acl_entry_t = null_mut();
    assert_eq!(unsafe { acl_create_entry(&mut acl.acl, &mut entry) }, 0);
    entry
}

#[rstest]
#[case(UserObj)]
#[case(User(0))]
#[case(User(55555))]
#[case(GroupObj)]
#[case(Group(100))]
#[case(Group(55555))]
#[case(Mask)]
#[case(Other)]
fn entry_round_trip(#[case] qual: Qualifier) {
    let mut acl = PosixAcl::with_capacity(1).unwrap();
    for perm in [
        FilePermission::empty(),
        FilePermission::READ,
        FilePermission::READ | FilePermission::EXECUTE,
        FilePermission::RWX,
    ] {
        let entry = blank_entry(&mut acl);
        let value = AclEntry::new(qual, perm);
        encode_entry(entry, &value).unwrap();
        assert_eq!(decode_entry(entry).unwrap(), value);
    }
}

proptest! {
    /// Any tag with any qualifier and permission bits: named entries keep their id, unnamed ones
    /// read back as zero, and only the rwx bits survive.
    #[test]
    fn any_entry_round_trip(code in 1i32..=6, id in any::<u32>(), bits in any::<u32>()) {
        let tag = AclEntryTagType::from_code(code).unwrap();
        let perm = FilePermission::from_bits_truncate(bits);
        let mut acl = PosixAcl::with_capacity(1).unwrap();
        let entry = blank_entry(&mut acl);
        encode_entry(entry, &AclEntry::new(Qualifier::from_parts(tag, id), perm)).unwrap();

        let decoded = decode_entry(entry).unwrap();
        let named = matches!(tag, AclEntryTagType::User | AclEntryTagType::Group);
        prop_assert_eq!(decoded.qual.tag_type(), tag);
        prop_assert_eq!(decoded.qual.qualifier(), if named { id } else { 0 });
        prop_assert_eq!(decoded.perm, perm & FilePermission::RWX);
    }
}

/// SET_ID and STICKY have no ACL representation and vanish.
#[test]
fn entry_drops_special_bits() {
    let mut acl = PosixAcl::with_capacity(1).unwrap();
    let entry = blank_entry(&mut acl);
    let perm = FilePermission::READ | FilePermission::SET_ID | FilePermission::STICKY;
    encode_entry(entry, &AclEntry::new(UserObj, perm)).unwrap();
    assert_eq!(decode_entry(entry).unwrap().perm, FilePermission::READ);
}

/// A freshly created entry has ACL_UNDEFINED_TAG.
#[test]
fn decode_undefined_tag() {
    let mut acl = PosixAcl::with_capacity(1).unwrap();
    let entry = blank_entry(&mut acl);
    let err = decode_entry(entry).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTagType);
    assert_eq!(err.errno(), libc::EINVAL);
}

#[test]
fn count_and_entries() {
    let mut acl = PosixAcl::with_capacity(3).unwrap();
    assert_eq!(acl.entry_count().unwrap(), 0);
    assert_eq!(acl.entries().unwrap(), []);

    let entries = [
        AclEntry::new(UserObj, FilePermission::RWX),
        AclEntry::new(GroupObj, FilePermission::READ),
        AclEntry::new(Other, FilePermission::empty()),
    ];
    for entry in &entries {
        acl.push(entry).unwrap();
    }
    assert_eq!(acl.entry_count().unwrap(), 3);
    assert_eq!(acl.entries().unwrap(), entries);
    assert!(acl.validate().is_ok());
    assert_eq!(
        format!("{:?}", acl),
        "PosixAcl(\"user::rwx,group::r--,other::---\")"
    );
}

#[test]
fn validate_needs_mask_for_named_entries() {
    let mut acl = PosixAcl::with_capacity(4).unwrap();
    acl.push(&AclEntry::new(UserObj, FilePermission::RWX)).unwrap();
    acl.push(&AclEntry::new(User(55555), FilePermission::READ)).unwrap();
    acl.push(&AclEntry::new(GroupObj, FilePermission::READ)).unwrap();
    acl.push(&AclEntry::new(Other, FilePermission::empty())).unwrap();

    let err = acl.validate().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidateAclFailed);

    acl.fix_mask().unwrap();
    assert!(acl.validate().is_ok());
    assert_eq!(
        acl.as_text(),
        "user::rwx\nuser:55555:r--\ngroup::r--\nmask::r--\nother::---\n"
    );
}

#[test]
fn empty_acl_is_invalid() {
    let acl = PosixAcl::with_capacity(0).unwrap();
    assert_eq!(
        acl.validate().unwrap_err().kind(),
        ErrorKind::ValidateAclFailed
    );
}

/** Demonstrate that multiple iterators cannot exist in parallel :( */
#[test]
#[should_panic(expected = "left == right")]
fn multi_iterator() {
    let mut acl = PosixAcl::with_capacity(3).unwrap();
    acl.push(&AclEntry::new(UserObj, FilePermission::RWX)).unwrap();
    acl.push(&AclEntry::new(GroupObj, FilePermission::READ)).unwrap();
    acl.push(&AclEntry::new(Other, FilePermission::empty())).unwrap();
    unsafe { acl.raw_iter() }
        .zip(unsafe { acl.raw_iter() })
        .for_each(|(a, b)| assert_eq!(a.unwrap(), b.unwrap()))
}
