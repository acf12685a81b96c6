use crate::error::{SessionError, StreamError};
use crate::manager::WebcamSession;
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};

/// Backpressure depth: the producer blocks once this many chunks are
/// queued, so a slow consumer throttles capture instead of buffering
/// unboundedly.
const CHANNEL_DEPTH: usize = 4;

const CHUNK_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
const CHUNK_TRAILER: &[u8] = b"\r\n";

/// Produce the lazy multipart chunk sequence for one streaming client.
///
/// A producer thread pulls frames while the session stays active and sends
/// self-delimited chunks into a bounded channel. An external `stop` is
/// observed on the next iteration and closes the channel cleanly; a frame
/// production failure terminates with a `StreamError` item instead of a
/// silent end. Dropping the consumer stops the producer.
pub fn frame_stream(
    session: Arc<WebcamSession>,
) -> impl Stream<Item = Result<Bytes, StreamError>> {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    std::thread::spawn(move || {
        while session.is_active() {
            match session.capture_frame() {
                Ok(jpeg) => {
                    if tx.blocking_send(Ok(chunk(&jpeg))).is_err() {
                        tracing::debug!("stream consumer dropped, stopping producer");
                        break;
                    }
                }
                // Stop raced the active check; end cleanly, not an error.
                Err(SessionError::NotActive) => break,
                Err(e) => {
                    tracing::error!(error = %e, "frame production failed, ending stream");
                    let _ = tx.blocking_send(Err(StreamError::from(e)));
                    break;
                }
            }
        }
    });

    ReceiverStream::new(rx)
}

/// One self-delimited multipart chunk: boundary, content-type header, JPEG
/// payload, trailing delimiter.
fn chunk(jpeg: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(CHUNK_HEADER.len() + jpeg.len() + CHUNK_TRAILER.len());
    buf.extend_from_slice(CHUNK_HEADER);
    buf.extend_from_slice(jpeg);
    buf.extend_from_slice(CHUNK_TRAILER);
    buf.freeze()
}
