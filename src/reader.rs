use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::{Receiver, Sender};
use memchr::memrchr;
use tracing::{debug, trace};

use crate::buffer::RawBuffer;
use crate::chunk::ByteRange;
use crate::error::PipelineError;

/// One member of the reader pool, owning its file handle so seeks never race
/// with the other readers.
pub(crate) struct ChunkReader {
    file: File,
    read_cap: usize,
    split_factor: usize,
}

impl ChunkReader {
    pub(crate) fn open(
        path: &Path,
        read_cap: usize,
        split_factor: usize,
    ) -> Result<Self, PipelineError> {
        Ok(ChunkReader {
            file: File::open(path)?,
            read_cap,
            split_factor,
        })
    }

    /// Streams every range off the queue until it closes or shutdown is set.
    pub(crate) fn run(
        mut self,
        ranges: &Receiver<ByteRange>,
        buffers: &Sender<RawBuffer>,
        shutdown: &AtomicBool,
    ) -> Result<(), PipelineError> {
        for range in ranges {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.read_range(range, buffers, shutdown)?;
        }
        Ok(())
    }

    /// Reads one range in capped passes, sending whole-lines buffers
    /// downstream.
    ///
    /// Bytes after the last terminator of a pass are carried into the next
    /// pass, so every buffer sent ends on a terminator even when a pass
    /// truncates a record. A closed downstream queue stops the read quietly:
    /// whichever stage closed it owns the error.
    fn read_range(
        &mut self,
        range: ByteRange,
        buffers: &Sender<RawBuffer>,
        shutdown: &AtomicBool,
    ) -> Result<(), PipelineError> {
        debug!(offset = range.offset, length = range.length, "reading range");
        self.file.seek(SeekFrom::Start(range.offset))?;

        let mut carry: Vec<u8> = Vec::new();
        let mut remaining = range.length;
        while remaining > 0 {
            if shutdown.load(Ordering::Relaxed) {
                return Ok(());
            }
            let want = remaining.min(self.read_cap as u64) as usize;
            let mut buf = Vec::with_capacity(carry.len() + want);
            buf.append(&mut carry);
            let base = buf.len();
            buf.resize(base + want, 0);
            let got = read_some(&mut self.file, &mut buf[base..])?;
            if got == 0 {
                return Err(PipelineError::PrematureEof {
                    offset: range.end() - remaining,
                    remaining,
                });
            }
            buf.truncate(base + got);
            remaining -= got as u64;
            trace!(got, remaining, "read pass");

            match memrchr(b'\n', &buf) {
                Some(last) => {
                    carry.extend_from_slice(&buf[last + 1..]);
                    buf.truncate(last + 1);
                }
                // No terminator yet, keep accumulating.
                None => {
                    carry = buf;
                    continue;
                }
            }

            for piece in RawBuffer::new(buf).split_lines(self.split_factor) {
                if buffers.send(piece).is_err() {
                    return Ok(());
                }
            }
        }
        if !carry.is_empty() {
            debug!(dropped = carry.len(), "range tail not line-terminated");
        }
        Ok(())
    }
}

/// Reads once, retrying on interruption.
fn read_some(file: &mut File, dst: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(dst) {
            Ok(n) => return Ok(n),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crossbeam_channel::bounded;
    use tempfile::NamedTempFile;

    use super::*;

    const CONTENT: &[u8] = b"aaaa;1.0\nbbbb;2.0\ncccc;3.0\ndddd;4.0\n";

    fn read_with(content: &[u8], range: ByteRange, read_cap: usize) -> Vec<RawBuffer> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();

        let mut reader = ChunkReader::open(file.path(), read_cap, 1).unwrap();
        let (tx, rx) = bounded(64);
        let shutdown = AtomicBool::new(false);
        reader.read_range(range, &tx, &shutdown).unwrap();
        drop(tx);
        rx.iter().collect()
    }

    #[test]
    fn every_buffer_ends_on_a_terminator() {
        let range = ByteRange { offset: 0, length: CONTENT.len() as u64 };
        let buffers = read_with(CONTENT, range, 10);
        assert!(buffers.len() > 1);

        let mut streamed = Vec::new();
        for buffer in &buffers {
            assert_eq!(*buffer.last().unwrap(), b'\n');
            streamed.extend_from_slice(buffer);
        }
        assert_eq!(streamed, CONTENT);
    }

    #[test]
    fn a_line_longer_than_the_read_cap_accumulates_across_passes() {
        let range = ByteRange { offset: 0, length: CONTENT.len() as u64 };
        let buffers = read_with(CONTENT, range, 3);

        let mut streamed = Vec::new();
        for buffer in &buffers {
            assert_eq!(*buffer.last().unwrap(), b'\n');
            streamed.extend_from_slice(buffer);
        }
        assert_eq!(streamed, CONTENT);
    }

    #[test]
    fn reads_only_the_assigned_range() {
        let range = ByteRange { offset: 9, length: 18 };
        let buffers = read_with(CONTENT, range, 64);

        let mut streamed = Vec::new();
        for buffer in &buffers {
            streamed.extend_from_slice(buffer);
        }
        assert_eq!(streamed, &CONTENT[9..27]);
    }

    #[test]
    fn unterminated_tail_is_dropped() {
        let content = b"aaa;1.0\nbb";
        let range = ByteRange { offset: 0, length: content.len() as u64 };
        let buffers = read_with(content, range, 64);
        assert_eq!(buffers.len(), 1);
        assert_eq!(&*buffers[0], b"aaa;1.0\n");
    }

    #[test]
    fn eof_before_the_budget_is_exhausted_is_fatal() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONTENT).unwrap();
        file.flush().unwrap();

        let mut reader = ChunkReader::open(file.path(), 64, 1).unwrap();
        let (tx, _rx) = bounded(64);
        let shutdown = AtomicBool::new(false);
        let range = ByteRange { offset: 0, length: CONTENT.len() as u64 + 10 };
        let err = reader.read_range(range, &tx, &shutdown).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::PrematureEof {
                offset: 36,
                remaining: 10
            }
        ));
    }

    #[test]
    fn shutdown_stops_the_read_before_completion() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CONTENT).unwrap();
        file.flush().unwrap();

        let mut reader = ChunkReader::open(file.path(), 64, 1).unwrap();
        let (tx, rx) = bounded(64);
        let shutdown = AtomicBool::new(true);
        let range = ByteRange { offset: 0, length: CONTENT.len() as u64 };
        reader.read_range(range, &tx, &shutdown).unwrap();
        drop(tx);
        assert_eq!(rx.iter().count(), 0);
    }
}
