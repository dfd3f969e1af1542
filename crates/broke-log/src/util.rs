//! Read helpers shared by the block and message decoders

use std::io::{self, Read};

use crate::error::{LogError, Result};

/// Fill `buf` as far as the reader allows, returning the number of bytes read.
///
/// Unlike `read_exact`, hitting end of input early is not an error; the caller
/// decides whether a partial read is acceptable.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Up-front allocation bound for [`read_fully`]; larger reads grow as data arrives.
const PREALLOC_LIMIT: usize = 1024 * 1024;

/// Read exactly `length` bytes or fail with `ShortRead`.
///
/// `length` comes from an unchecksummed header, so memory is only committed
/// for bytes that are actually there.
pub(crate) fn read_fully<R: Read + ?Sized>(reader: &mut R, length: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(length.min(PREALLOC_LIMIT));
    Read::take(&mut *reader, length as u64).read_to_end(&mut buf)?;
    let actual = buf.len();
    if actual != length {
        return Err(LogError::ShortRead {
            expected: length,
            actual,
        });
    }
    Ok(buf)
}
