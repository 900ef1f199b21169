use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;

/// Bytes kept from one stream. Shared with the reader task so whatever was
/// read survives if the task has to be abandoned.
#[derive(Debug, Default)]
pub(super) struct Capture {
    pub(super) bytes: Vec<u8>,
    pub(super) truncated: bool,
}

pub(super) type SharedCapture = Arc<Mutex<Capture>>;

/// Reads `reader` to the end, keeping at most `max_bytes`. The rest is
/// drained and dropped so the child never blocks on a full pipe.
pub(super) async fn read_stream_capture<R: AsyncRead + Unpin>(
    mut reader: R,
    max_bytes: usize,
    capture: SharedCapture,
) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let mut capture = capture.lock().await;
        if capture.bytes.len() < max_bytes {
            let remaining = max_bytes - capture.bytes.len();
            let to_copy = remaining.min(n);
            capture.bytes.extend_from_slice(&chunk[..to_copy]);
            if to_copy < n {
                capture.truncated = true;
            }
        } else {
            capture.truncated = true;
        }
    }
    Ok(())
}
