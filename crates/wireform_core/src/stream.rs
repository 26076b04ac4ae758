//! The abstract random-access byte stream atoms read from and write to.

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

/// Whence values for [`Stream::seek`], matching POSIX (`0=set, 1=cur, 2=end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// The byte stream contract the engine consumes. `read(n)` MUST error with
/// [`io::ErrorKind::UnexpectedEof`] if fewer than `n` bytes are available; greedy unpack paths
/// read one byte at a time instead and treat that specific error as "stop looping".
pub trait Stream {
    fn read_exact(&mut self, n: usize) -> io::Result<Vec<u8>>;
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn tell(&mut self) -> io::Result<u64>;
    fn seek_to(&mut self, offset: i64, whence: Whence) -> io::Result<u64>;
}

impl<T: Read + Write + Seek> Stream for T {
    fn read_exact(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        Read::read_exact(self, &mut buf)?;
        Ok(buf)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn seek_to(&mut self, offset: i64, whence: Whence) -> io::Result<u64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(offset as u64),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        self.seek(pos)
    }
}

/// Convenience in-memory stream, the one most tests drive the engine through.
pub fn memory_stream() -> Cursor<Vec<u8>> {
    Cursor::new(Vec::new())
}

/// Wraps a `Read + Seek` source (e.g. `Cursor<&[u8]>`) that doesn't implement `Write` into a
/// full [`Stream`], failing any write attempt instead of refusing to compile. Unpack-only call
/// sites (most tests, most real usage) reach for this instead of allocating a throwaway `Vec<u8>`
/// just to satisfy the `Write` bound.
pub struct ReadOnlyStream<R: Read + Seek>(pub R);

impl<R: Read + Seek> Stream for ReadOnlyStream<R> {
    fn read_exact(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        Read::read_exact(&mut self.0, &mut buf)?;
        Ok(buf)
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.0.read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn write_bytes(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream is read-only",
        ))
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.0.stream_position()
    }

    fn seek_to(&mut self, offset: i64, whence: Whence) -> io::Result<u64> {
        let pos = match whence {
            Whence::Start => SeekFrom::Start(offset as u64),
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        self.0.seek(pos)
    }
}

/// Reads a single byte, used by greedy loops (`Repeated`, `CString`) that need to distinguish
/// "exactly one more byte" EOF from any other failure.
pub fn read_one(stream: &mut dyn Stream) -> io::Result<u8> {
    Ok(stream.read_exact(1)?[0])
}

// `SeekableSpan` is a `Read + Seek` (not `Write`) type from another crate, so it goes through
// `ReadOnlyStream` above rather than a direct `impl Stream for SeekableSpan<T>`: the latter would
// conflict with the blanket `impl<T: Read + Write + Seek> Stream for T`, since rustc can't rule
// out `wireform_util` adding a `Write` impl for it in a future version.

#[cfg(test)]
mod tests {
    use super::*;
    use wireform_util::SeekableSpanExt;

    #[test]
    fn bounded_span_stops_a_greedy_read_at_its_own_end() {
        let cursor = Cursor::new(b"first.second.".to_vec());
        let mut stream = ReadOnlyStream(cursor.seekable_span(6).unwrap());
        assert_eq!(Stream::read_all(&mut stream).unwrap(), b"first.");
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut stream = memory_stream();
        stream.write_bytes(b"hello").unwrap();
        assert_eq!(stream.tell().unwrap(), 5);

        stream.seek_to(0, Whence::Start).unwrap();
        assert_eq!(Stream::read_exact(&mut stream, 5).unwrap(), b"hello");
    }

    #[test]
    fn short_read_is_an_error() {
        let mut stream = memory_stream();
        stream.write_bytes(b"ab").unwrap();
        stream.seek_to(0, Whence::Start).unwrap();
        assert!(Stream::read_exact(&mut stream, 5).is_err());
    }

    #[test]
    fn read_only_stream_rejects_writes() {
        let mut stream = ReadOnlyStream(Cursor::new(b"abc".as_slice()));
        assert_eq!(stream.read_exact(3).unwrap(), b"abc");
        assert!(stream.write_bytes(b"x").is_err());
    }
}
