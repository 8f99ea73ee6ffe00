use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use memchr::memchr;

use crate::error::PipelineError;

/// A contiguous, line-aligned slice of the input file.
///
/// Ranges produced by [`plan_chunks`] partition the file: every range starts
/// at offset zero or right after a terminator, and ends on one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Plans up to `count` line-aligned ranges covering the whole file.
///
/// Naive cuts at `i * size / count` snap forward to the byte after the next
/// terminator, found by probing at most `lookahead` bytes at the cut. A probe
/// window with no terminator is fatal. Cuts that snap past a later cut
/// collapse it, so fewer ranges than requested can come back; coverage never
/// shrinks and the last range absorbs the remainder. The same file and count
/// always produce the same plan.
pub fn plan_chunks(
    path: &Path,
    count: usize,
    lookahead: usize,
) -> Result<Vec<ByteRange>, PipelineError> {
    let mut file = File::open(path)?;
    let size = file.metadata()?.len();
    if size == 0 {
        return Ok(Vec::new());
    }

    let count = count.max(1) as u64;
    let mut probe = vec![0u8; lookahead.max(1)];
    let mut ranges = Vec::with_capacity(count as usize);
    let mut start = 0u64;

    for i in 1..count {
        let cut = i * size / count;
        if cut <= start {
            continue;
        }
        let window = probe.len().min((size - cut) as usize);
        file.seek(SeekFrom::Start(cut))?;
        let filled = read_window(&mut file, &mut probe[..window])?;
        let Some(pos) = memchr(b'\n', &probe[..filled]) else {
            return Err(PipelineError::NoLineBoundary {
                offset: cut,
                lookahead: probe.len(),
            });
        };
        let end = cut + pos as u64 + 1;
        ranges.push(ByteRange {
            offset: start,
            length: end - start,
        });
        start = end;
        if start >= size {
            break;
        }
    }
    if start < size {
        ranges.push(ByteRange {
            offset: start,
            length: size - start,
        });
    }
    Ok(ranges)
}

/// Reads until `dst` is full or EOF, retrying on interruption.
fn read_window(file: &mut File, dst: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < dst.len() {
        match file.read(&mut dst[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn file_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    fn assert_tiles(ranges: &[ByteRange], size: u64) {
        let mut expected_offset = 0;
        for range in ranges {
            assert_eq!(range.offset, expected_offset);
            assert!(range.length > 0);
            expected_offset = range.end();
        }
        assert_eq!(expected_offset, size);
    }

    // Four 9-byte records, so naive cuts land mid-line and must snap.
    const CONTENT: &[u8] = b"aaaa;1.0\nbbbb;2.0\ncccc;3.0\ndddd;4.0\n";

    #[test]
    fn snaps_naive_cuts_to_the_next_terminator() {
        let file = file_with(CONTENT);
        let ranges = plan_chunks(file.path(), 3, 128).unwrap();
        assert_eq!(
            ranges,
            vec![
                ByteRange { offset: 0, length: 18 },
                ByteRange { offset: 18, length: 9 },
                ByteRange { offset: 27, length: 9 },
            ]
        );
        assert_tiles(&ranges, CONTENT.len() as u64);
    }

    #[test]
    fn single_chunk_covers_the_whole_file() {
        let file = file_with(CONTENT);
        let ranges = plan_chunks(file.path(), 1, 128).unwrap();
        assert_eq!(
            ranges,
            vec![ByteRange { offset: 0, length: CONTENT.len() as u64 }]
        );
    }

    #[test]
    fn oversized_chunk_count_collapses_to_one_range_per_line() {
        let file = file_with(CONTENT);
        let ranges = plan_chunks(file.path(), CONTENT.len(), 128).unwrap();
        assert_eq!(ranges.len(), 4);
        for range in &ranges {
            assert_eq!(range.length, 9);
        }
        assert_tiles(&ranges, CONTENT.len() as u64);
    }

    #[test]
    fn every_range_ends_on_a_terminator_and_reconstructs_the_file() {
        let file = file_with(CONTENT);
        let ranges = plan_chunks(file.path(), 5, 128).unwrap();
        assert_tiles(&ranges, CONTENT.len() as u64);

        let mut reconstructed = Vec::new();
        let mut handle = File::open(file.path()).unwrap();
        for range in &ranges {
            let mut piece = vec![0u8; range.length as usize];
            handle.seek(SeekFrom::Start(range.offset)).unwrap();
            handle.read_exact(&mut piece).unwrap();
            assert_eq!(*piece.last().unwrap(), b'\n');
            reconstructed.extend_from_slice(&piece);
        }
        assert_eq!(reconstructed, CONTENT);
    }

    #[test]
    fn plan_is_deterministic() {
        let file = file_with(CONTENT);
        let first = plan_chunks(file.path(), 3, 128).unwrap();
        let second = plan_chunks(file.path(), 3, 128).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_file_plans_no_ranges() {
        let file = file_with(b"");
        assert_eq!(plan_chunks(file.path(), 4, 128).unwrap(), Vec::new());
    }

    #[test]
    fn line_longer_than_the_lookahead_window_is_fatal() {
        let mut content = vec![b'x'; 295];
        content.extend_from_slice(b";1.0\n");
        let file = file_with(&content);
        let err = plan_chunks(file.path(), 2, 16).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::NoLineBoundary { lookahead: 16, .. }
        ));
    }
}
