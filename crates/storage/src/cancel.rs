//! Cancellable byte streams.

use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read};
use tokio_util::sync::CancellationToken;

/// Wraps a blocking reader so that an upload can be aborted mid-stream.
///
/// Cancellation is observed on the read-from-source side: once the token is
/// cancelled, the next `read` fails with [`IoErrorKind::Interrupted`], which
/// in turn fails the write consuming this reader. The partially-written
/// destination object is left in backend-dependent state.
pub struct CancelRead<R> {
    token: CancellationToken,
    inner: R,
}

impl<R: Read> CancelRead<R> {
    pub fn new(token: CancellationToken, inner: R) -> Self {
        Self { token, inner }
    }
}

impl<R: Read> Read for CancelRead<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(IoError::new(IoErrorKind::Interrupted, "upload cancelled"));
        }
        self.inner.read(buf)
    }
}
