use std::io::{self, Read, Seek, SeekFrom};
use std::ops::RangeInclusive;

/// Bounds a `Read + Seek` source to `[start, start+n)`. Reads past the span's end are truncated
/// the way `Take` truncates them; seeks outside the span are rejected instead of silently
/// clamped, so a caller can't accidentally wander into a neighbor's bytes.
#[derive(Debug)]
pub struct SeekableSpan<T: Read + Seek> {
    inner: T,
    range: RangeInclusive<u64>,
}

impl<T: Read + Seek> SeekableSpan<T> {
    pub fn new(mut inner: T, n: u64) -> io::Result<Self> {
        let start = inner.stream_position()?;
        Ok(Self {
            inner,
            range: start..=start + n,
        })
    }

    fn remaining(&mut self) -> io::Result<u64> {
        let pos = self.inner.stream_position()?;
        Ok(self.range.end().saturating_sub(pos))
    }
}

impl<T: Read + Seek> Read for SeekableSpan<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining()? as usize;
        let limit = remaining.min(buf.len());
        self.inner.read(&mut buf[..limit])
    }
}

impl<T: Read + Seek> Seek for SeekableSpan<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => *self.range.start() as i64 + n as i64,
            SeekFrom::Current(n) => self.inner.stream_position()? as i64 + n,
            SeekFrom::End(n) => *self.range.end() as i64 + n,
        };

        if target < 0 || !self.range.contains(&(target as u64)) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek target outside of SeekableSpan range",
            ));
        }

        self.inner.seek(SeekFrom::Start(target as u64))
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }
}

pub trait SeekableSpanExt: Read + Seek + Sized {
    fn seekable_span(self, n: u64) -> io::Result<SeekableSpan<Self>>;
}

impl<T: Read + Seek> SeekableSpanExt for T {
    fn seekable_span(self, n: u64) -> io::Result<SeekableSpan<Self>> {
        SeekableSpan::new(self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_is_truncated_to_the_span() {
        let cursor = Cursor::new(b"hello world".to_vec());
        let mut span = cursor.seekable_span(5).unwrap();
        let mut buf = Vec::new();
        span.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello");
    }

    #[test]
    fn seek_outside_the_span_is_rejected() {
        let mut cursor = Cursor::new(b"01234567".to_vec());
        cursor.seek(SeekFrom::Start(2)).unwrap();
        let mut span = cursor.seekable_span(3).unwrap();
        assert!(span.seek(SeekFrom::Start(10)).is_err());
        assert!(span.seek(SeekFrom::Start(2)).is_ok());
    }

    #[test]
    fn seek_within_the_span_then_read() {
        let cursor = Cursor::new(b"abcdefgh".to_vec());
        let mut span = cursor.seekable_span(4).unwrap();
        span.seek(SeekFrom::Current(2)).unwrap();
        let mut buf = [0u8; 2];
        span.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"cd");
    }
}
