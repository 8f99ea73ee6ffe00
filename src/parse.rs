use memchr::{memchr_iter, memrchr, Memchr};

use crate::error::PipelineError;

/// Decodes a fixed-format measurement span: optional `-`, one or two integer
/// digits, `.`, exactly one fractional digit. Anything else is
/// [`PipelineError::MalformedNumber`].
///
/// Both sign cases run the same digit arithmetic, so single- and double-digit
/// integer parts decode identically and no general float parser is involved.
pub fn decode(span: &[u8]) -> Result<f32, PipelineError> {
    let (negative, rest) = match span.split_first() {
        Some((b'-', rest)) => (true, rest),
        Some(_) => (false, span),
        None => return Err(PipelineError::malformed(span)),
    };
    let magnitude = match *rest {
        [d, b'.', f] => f32::from(digit(d, span)?) + 0.1 * f32::from(digit(f, span)?),
        [t, d, b'.', f] => {
            f32::from(digit(t, span)? * 10 + digit(d, span)?)
                + 0.1 * f32::from(digit(f, span)?)
        }
        _ => return Err(PipelineError::malformed(span)),
    };
    Ok(if negative { -magnitude } else { magnitude })
}

#[inline]
fn digit(byte: u8, span: &[u8]) -> Result<u8, PipelineError> {
    if byte.is_ascii_digit() {
        Ok(byte - b'0')
    } else {
        Err(PipelineError::malformed(span))
    }
}

/// Iterator over the `key;value` records of a whole-lines buffer.
///
/// Yields the key span and the raw value span of every terminated line. Lines
/// without a separator (stray terminators included) are skipped; bytes after
/// the final terminator are never yielded.
pub struct Records<'a> {
    buf: &'a [u8],
    terminators: Memchr<'a>,
    line_start: usize,
}

/// Scans `buf` for `key;value` records.
pub fn records(buf: &[u8]) -> Records<'_> {
    Records {
        buf,
        terminators: memchr_iter(b'\n', buf),
        line_start: 0,
    }
}

impl<'a> Iterator for Records<'a> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let terminator = self.terminators.next()?;
            let line = &self.buf[self.line_start..terminator];
            self.line_start = terminator + 1;
            // The value starts after the last separator on the line.
            if let Some(sep) = memrchr(b';', line) {
                return Some((&line[..sep], &line[sep + 1..]));
            }
        }
    }
}
