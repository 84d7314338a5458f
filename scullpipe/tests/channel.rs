mod common;

use common::registry;
use scullpipe::{AccessMode, Fault, OpenFlags, PipeError, UserDestination, UserSource};

const NB: OpenFlags = OpenFlags::NONBLOCKING;

// Destination that refuses every copy
struct BadDestination(usize);

impl UserDestination for BadDestination {
    fn capacity(&self) -> usize {
        self.0
    }

    fn copy_to_user(&mut self, _data: &[u8]) -> Result<(), Fault> {
        Err(Fault)
    }
}

// Source that claims `len` bytes but cannot deliver them
struct BadSource(usize);

impl UserSource for BadSource {
    fn len(&self) -> usize {
        self.0
    }

    fn copy_from_user(&self, _dest: &mut [u8]) -> Result<(), Fault> {
        Err(Fault)
    }
}

#[test]
fn test_write_read() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    assert_eq!(writer.write(b"Hello"), Ok(5));

    let mut buf = [0u8; 10];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(n, 5);
    assert_eq!(&buf[..n], b"Hello");
}

#[test]
fn test_small_buffer_scenario() {
    let registry = registry(8);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    assert_eq!(writer.write(b"ABCDEFG"), Ok(7));
    assert_eq!(registry.status(0).unwrap().free, 0);
    assert_eq!(writer.write(b"H"), Err(PipeError::WouldBlock));

    assert_eq!(reader.read_to_vec(3).unwrap(), b"ABC");
    assert_eq!(registry.status(0).unwrap().free, 3);

    // One byte fits before the physical end, the other two after the wrap
    assert_eq!(writer.write(b"XYZ"), Ok(1));
    assert_eq!(writer.write(b"YZ"), Ok(2));
    assert_eq!(registry.status(0).unwrap().free, 0);

    assert_eq!(reader.read_to_vec(7).unwrap(), b"DEFGX");
    assert_eq!(reader.read_to_vec(7).unwrap(), b"YZ");
    assert_eq!(reader.read(&mut [0u8; 7]), Err(PipeError::WouldBlock));
}

#[test]
fn test_multiple_write_read_cycles() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    // Cycle 1: write-write-read
    assert_eq!(writer.write(b"Hello"), Ok(5));
    assert_eq!(writer.write(b" World"), Ok(6));
    assert_eq!(reader.read_to_vec(20).unwrap(), b"Hello World");

    // Cycle 2: single write, partial read
    assert_eq!(writer.write(b"LongMessage"), Ok(11));
    assert_eq!(reader.read_to_vec(5).unwrap(), b"LongM");
    assert_eq!(reader.read_to_vec(20).unwrap(), b"essage");
}

#[test]
fn test_wrap_preserves_order() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    // Park both cursors at C - 5
    writer.write_all(&[0u8; 35]).unwrap();
    assert_eq!(reader.read_to_vec(35).unwrap().len(), 35);

    let data: Vec<u8> = (b'a'..=b'z').chain(b'A'..=b'M').collect();
    assert_eq!(data.len(), 39);
    writer.write_all(&data).unwrap();
    assert_eq!(registry.status(0).unwrap().free, 0);

    let mut out = Vec::new();
    while out.len() < data.len() {
        out.extend(reader.read_to_vec(64).unwrap());
    }
    assert_eq!(out, data);
}

#[test]
fn test_short_write_then_remainder() {
    let registry = registry(8);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    // Move the cursors to offset 5: three bytes left before the end
    writer.write_all(b"-----").unwrap();
    reader.read_to_vec(5).unwrap();

    assert_eq!(writer.write(b"12345"), Ok(3));
    assert!(writer.poll(None).writable);
    assert_eq!(writer.write(b"45"), Ok(2));

    assert_eq!(reader.read_to_vec(8).unwrap(), b"123");
    assert_eq!(reader.read_to_vec(8).unwrap(), b"45");
}

#[test]
fn test_capacity_invariant_holds() {
    let registry = registry(8);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    for round in 0..20usize {
        let _ = writer.write(&vec![b'x'; round % 9]);
        let status = registry.status(0).unwrap();
        assert_eq!(status.free + status.occupied, 7);
        let _ = reader.read_to_vec(round % 4);
        let status = registry.status(0).unwrap();
        assert_eq!(status.free + status.occupied, 7);
    }
}

#[test]
fn test_zero_length_operations() {
    let registry = registry(8);
    let handle = registry
        .open(0, AccessMode::ReadWrite, OpenFlags::BLOCKING)
        .unwrap();

    // Empty buffer and blocking handle, yet no sleep for a zero-length read
    assert_eq!(handle.read(&mut []), Ok(0));
    assert_eq!(handle.write(b""), Ok(0));
    assert_eq!(registry.status(0).unwrap().occupied, 0);
}

#[test]
fn test_open_twice_close_once_keeps_buffer() {
    let registry = registry(40);
    let first = registry.open(0, AccessMode::ReadWrite, NB).unwrap();
    let second = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    first.write_all(b"data").unwrap();
    first.close();

    let status = registry.status(0).unwrap();
    assert!(status.materialized);
    assert_eq!(status.readers, 1);
    assert_eq!(status.writers, 0);
    assert_eq!(status.occupied, 4);
    assert_eq!(second.read_to_vec(10).unwrap(), b"data");

    second.close();
    let status = registry.status(0).unwrap();
    assert!(!status.materialized);
    assert_eq!(status.readers + status.writers, 0);

    // Reopen allocates again
    let third = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let status = registry.status(0).unwrap();
    assert!(status.materialized);
    assert_eq!(status.free, 39);
    assert_eq!(third.write(b"again"), Ok(5));
}

#[test]
fn test_drop_closes_handle() {
    let registry = registry(40);
    {
        let _handle = registry.open(1, AccessMode::ReadWrite, NB).unwrap();
        assert!(registry.status(1).unwrap().materialized);
    }
    let status = registry.status(1).unwrap();
    assert!(!status.materialized);
    assert_eq!(status.readers, 0);
    assert_eq!(status.writers, 0);
}

#[test]
fn test_reopen_discards_content() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    writer.write_all(b"stale").unwrap();
    writer.close();

    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();
    assert_eq!(reader.read_to_vec(10), Err(PipeError::WouldBlock));
}

#[test]
fn test_open_resets_for_attached_participants() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    writer.write_all(b"pending").unwrap();

    // A new participant empties the buffer for everyone
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();
    assert_eq!(reader.read_to_vec(10), Err(PipeError::WouldBlock));
    assert_eq!(registry.status(0).unwrap().occupied, 0);
}

#[test]
fn test_repeated_opens_are_all_counted() {
    let registry = registry(40);
    let handles: Vec<_> = (0..3)
        .map(|_| registry.open(0, AccessMode::ReadOnly, NB).unwrap())
        .collect();
    assert_eq!(registry.status(0).unwrap().readers, 3);

    let mut parties: Vec<_> = handles.iter().map(|h| h.party()).collect();
    parties.dedup();
    assert_eq!(parties.len(), 3);

    drop(handles);
    assert!(!registry.status(0).unwrap().materialized);
}

#[test]
fn test_access_mode_enforced() {
    let registry = registry(40);
    let writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    assert_eq!(writer.read(&mut [0u8; 4]), Err(PipeError::BadAccessMode));
    assert_eq!(reader.write(b"nope"), Err(PipeError::BadAccessMode));
    assert_eq!(registry.status(0).unwrap().occupied, 0);
}

#[test]
fn test_faulty_destination_leaves_data() {
    let registry = registry(40);
    let handle = registry.open(0, AccessMode::ReadWrite, NB).unwrap();
    handle.write_all(b"keep me").unwrap();

    let result = handle.read_into(&mut BadDestination(4));
    assert_eq!(result, Err(PipeError::FaultyDestination));
    assert_eq!(registry.status(0).unwrap().occupied, 7);
    assert_eq!(handle.read_to_vec(10).unwrap(), b"keep me");
}

#[test]
fn test_faulty_source_commits_nothing() {
    let registry = registry(40);
    let handle = registry.open(0, AccessMode::ReadWrite, NB).unwrap();
    let mut events = handle.set_async(true).unwrap();

    let result = handle.write_from(&BadSource(10));
    assert_eq!(result, Err(PipeError::FaultySource));

    let status = registry.status(0).unwrap();
    assert_eq!(status.occupied, 0);
    assert_eq!(status.free, 39);
    assert!(events.try_recv().is_err());
    assert_eq!(handle.read_to_vec(10), Err(PipeError::WouldBlock));
}

#[test]
fn test_short_destination_slice() {
    let registry = registry(40);
    let handle = registry.open(0, AccessMode::ReadWrite, NB).unwrap();
    handle.write_all(b"abcdef").unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(handle.read(&mut buf), Ok(4));
    assert_eq!(&buf, b"abcd");
    assert_eq!(handle.read_to_vec(4).unwrap(), b"ef");
}

#[test]
fn test_embedded_io_traits() {
    let registry = registry(40);
    let mut writer = registry.open(0, AccessMode::WriteOnly, NB).unwrap();
    let mut reader = registry.open(0, AccessMode::ReadOnly, NB).unwrap();

    assert_eq!(embedded_io::Write::write(&mut writer, b"trait"), Ok(5));
    embedded_io::Write::flush(&mut writer).unwrap();

    let mut buf = [0u8; 8];
    let n = embedded_io::Read::read(&mut reader, &mut buf).unwrap();
    assert_eq!(&buf[..n], b"trait");

    let err = embedded_io::Read::read(&mut reader, &mut buf).unwrap_err();
    assert_eq!(err, PipeError::WouldBlock);
}
