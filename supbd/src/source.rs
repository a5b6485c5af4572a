//! Random-access byte sources.
//!
//! Captions don't own their data.  Instead, they point at palette records
//! and image fragments by absolute offset into some larger source, which is
//! normally a `*.sup` file or a buffer holding one.

use std::io;

/// Something we can read individual bytes from by absolute offset.
///
/// Implementations should fail with an `io::Error` for offsets which are
/// out of range or can't be read.
pub trait ByteSource {
    /// Read the byte at `offset`.
    fn byte_at(&self, offset: u64) -> io::Result<u8>;

    /// Fill `buf` with the bytes starting at `offset`.
    ///
    /// The default implementation calls `byte_at` once per byte.  Sources
    /// which can do better should override it.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        for (i, b) in buf.iter_mut().enumerate() {
            let pos = offset
                .checked_add(i as u64)
                .ok_or_else(|| out_of_range(offset))?;
            *b = self.byte_at(pos)?;
        }
        Ok(())
    }
}

fn out_of_range(offset: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("offset 0x{:x} is past the end of the data", offset),
    )
}

impl ByteSource for [u8] {
    fn byte_at(&self, offset: u64) -> io::Result<u8> {
        usize::try_from(offset)
            .ok()
            .and_then(|i| self.get(i).copied())
            .ok_or_else(|| out_of_range(offset))
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let start = usize::try_from(offset).map_err(|_| out_of_range(offset))?;
        let bytes = start
            .checked_add(buf.len())
            .and_then(|end| self.get(start..end))
            .ok_or_else(|| out_of_range(offset))?;
        buf.copy_from_slice(bytes);
        Ok(())
    }
}

impl ByteSource for Vec<u8> {
    fn byte_at(&self, offset: u64) -> io::Result<u8> {
        self.as_slice().byte_at(offset)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.as_slice().read_exact_at(offset, buf)
    }
}

impl<'a, S: ByteSource + ?Sized> ByteSource for &'a S {
    fn byte_at(&self, offset: u64) -> io::Result<u8> {
        (**self).byte_at(offset)
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        (**self).read_exact_at(offset, buf)
    }
}

#[test]
fn read_bytes_from_memory() {
    let data = vec![1u8, 2, 3, 4, 5];
    assert_eq!(data.byte_at(0).unwrap(), 1);
    assert_eq!(data.byte_at(4).unwrap(), 5);

    let mut buf = [0u8; 3];
    data.read_exact_at(1, &mut buf).unwrap();
    assert_eq!(buf, [2, 3, 4]);
}

#[test]
fn reads_past_the_end_fail() {
    let data = vec![1u8, 2, 3];
    let err = data.byte_at(3).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

    let mut buf = [0u8; 2];
    let err = data.read_exact_at(2, &mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    let err = data.read_exact_at(u64::MAX, &mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn default_read_uses_byte_at() {
    /// A source which only knows how to read one byte at a time.
    struct Counting;

    impl ByteSource for Counting {
        fn byte_at(&self, offset: u64) -> io::Result<u8> {
            if offset < 10 {
                Ok(offset as u8 * 2)
            } else {
                Err(out_of_range(offset))
            }
        }
    }

    let mut buf = [0u8; 4];
    Counting.read_exact_at(3, &mut buf).unwrap();
    assert_eq!(buf, [6, 8, 10, 12]);
    assert!(Counting.read_exact_at(8, &mut buf).is_err());
}
