//! Chunked byte streams for HTTP response bodies

use async_stream::stream;
use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use tracing::debug;

/// Configuration for streaming encoded audio to a client
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Bytes per emitted chunk
    pub chunk_bytes: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: 16 * 1024,
        }
    }
}

/// Split an encoded WAV into contiguous chunks, in order.
pub fn wav_stream(
    bytes: Vec<u8>,
    config: StreamingConfig,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let chunk_bytes = config.chunk_bytes.max(1);
    let mut remaining = Bytes::from(bytes);

    stream! {
        let mut chunks = 0usize;
        while !remaining.is_empty() {
            let take = chunk_bytes.min(remaining.len());
            chunks += 1;
            yield Ok(remaining.split_to(take));
        }
        debug!("Streamed WAV body in {} chunks", chunks);
    }
}
