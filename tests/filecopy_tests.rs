//! A receiver's view of one transfer, entry by entry.

use nix::errno::Errno;
use qubes_pure::pure::filecopy::{
    encode_result, split_validated_path, CopyFlags, EntryKind, FileCopyError, FileHeader, ResultHeader,
    TransferLimits, TransferSession, FILE_HEADER_SIZE, RESULT_HEADER_SIZE,
};
use qubes_pure::pure::PathError;

const REGULAR: u32 = 0o100644;
const DIRECTORY: u32 = 0o040755;
const SYMLINK: u32 = 0o120777;

fn header(mode: u32, name: &[u8], filelen: u64) -> FileHeader {
    FileHeader {
        namelen: name.len() as u32 + 1,
        mode,
        filelen,
        ..Default::default()
    }
}

/// Sends the header through its wire form, as the receiver would see it.
fn receive(session: &mut TransferSession, hdr: FileHeader) -> FileHeader {
    let bytes = hdr.to_bytes();
    session.digest(&bytes);
    FileHeader::from_bytes(&bytes)
}

// ============================================================================
// Accepted transfers
// ============================================================================

#[test]
fn test_tree_with_relative_symlink() {
    let mut session = TransferSession::new(CopyFlags::default(), TransferLimits::default());

    let entries: [(u32, &[u8], u64, Option<&[u8]>, EntryKind); 4] = [
        (DIRECTORY, &b"docs"[..], 0, None, EntryKind::Directory),
        (DIRECTORY, &b"docs/sub"[..], 0, None, EntryKind::Directory),
        (REGULAR, &b"docs/a.txt"[..], 10, None, EntryKind::Regular),
        (SYMLINK, &b"docs/sub/link"[..], 8, Some(&b"../a.txt"[..]), EntryKind::Symlink),
    ];
    for (mode, name, len, target, kind) in entries {
        let hdr = receive(&mut session, header(mode, name, len));
        assert_eq!(session.begin_entry(&hdr), Ok(true));
        assert_eq!(session.check_entry(&hdr, name, target), Ok(kind));
    }

    let end = receive(&mut session, FileHeader::default());
    assert_eq!(session.begin_entry(&end), Ok(false));
    assert_eq!(session.total_files(), 4);
    assert_eq!(session.total_bytes(), 18);

    let (parents, last) = split_validated_path(b"docs/sub/link\0");
    assert_eq!(parents, vec![&b"docs"[..], &b"sub"[..]]);
    assert_eq!(last, b"link");
}

#[test]
fn test_result_header_carries_checksum() {
    let mut session = TransferSession::new(CopyFlags::default(), TransferLimits::default());
    receive(&mut session, header(REGULAR, b"a", 1));
    let crc = session.crc32();

    let reply = encode_result(0, crc, None);
    assert_eq!(reply.len(), RESULT_HEADER_SIZE);
    let mut bytes = [0u8; RESULT_HEADER_SIZE];
    bytes.copy_from_slice(&reply);
    let decoded = ResultHeader::from_bytes(&bytes);
    assert_eq!(decoded.error_code, 0);
    assert_eq!(decoded.crc32, crc);
}

// ============================================================================
// Refused entries
// ============================================================================

#[test]
fn test_symlink_escaping_transfer_root() {
    let mut session = TransferSession::new(CopyFlags::default(), TransferLimits::default());
    let hdr = header(SYMLINK, b"docs/link", 9);
    session.begin_entry(&hdr).unwrap();
    let err = session
        .check_entry(&hdr, b"docs/link", Some(&b"../../etc"[..]))
        .unwrap_err();
    assert!(matches!(err, FileCopyError::InvalidSymlink(PathError::DotDotComponent(_))));
    assert_eq!(err.errno(), Errno::EILSEQ);
}

#[test]
fn test_symlinks_disabled() {
    let mut session = TransferSession::new(CopyFlags::ALLOW_DIRECTORIES, TransferLimits::default());
    let hdr = header(SYMLINK, b"docs/link", 1);
    let err = session.check_entry(&hdr, b"docs/link", Some(&b"a"[..])).unwrap_err();
    assert_eq!(err, FileCopyError::UnsupportedType(SYMLINK));
    assert_eq!(err.errno(), Errno::EINVAL);
}

#[test]
fn test_absolute_name() {
    let mut session = TransferSession::new(CopyFlags::default(), TransferLimits::default());
    let hdr = header(REGULAR, b"/etc/passwd", 1);
    let err = session.check_entry(&hdr, b"/etc/passwd", None).unwrap_err();
    assert_eq!(err, FileCopyError::InvalidName(PathError::Absolute));
}

#[test]
fn test_file_count_quota() {
    let limits = TransferLimits {
        max_bytes: None,
        max_files: Some(2),
    };
    let mut session = TransferSession::new(CopyFlags::default(), limits);
    let hdr = header(REGULAR, b"f", 0);
    assert_eq!(session.begin_entry(&hdr), Ok(true));
    assert_eq!(session.begin_entry(&hdr), Ok(true));
    let err = session.begin_entry(&hdr).unwrap_err();
    assert_eq!(err, FileCopyError::QuotaExceeded);
    assert_eq!(err.errno(), Errno::EDQUOT);
}

#[test]
fn test_byte_quota() {
    let limits = TransferLimits {
        max_bytes: Some(100),
        max_files: None,
    };
    let mut session = TransferSession::new(CopyFlags::default(), limits);
    let first = header(REGULAR, b"a", 60);
    assert_eq!(session.check_entry(&first, b"a", None), Ok(EntryKind::Regular));
    let second = header(REGULAR, b"b", 41);
    assert_eq!(session.check_entry(&second, b"b", None), Err(FileCopyError::QuotaExceeded));
    assert_eq!(session.total_bytes(), 60);
}

#[test]
fn test_wire_header_size() {
    assert_eq!(header(REGULAR, b"a", 1).to_bytes().len(), FILE_HEADER_SIZE);
}
