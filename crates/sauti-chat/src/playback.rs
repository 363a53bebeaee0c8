//! Local playback of WAV replies

use anyhow::{Context, Result};
use rodio::{Decoder, OutputStreamBuilder, Sink};
use std::io::Cursor;

/// Play a WAV byte buffer on the default output device, blocking until it ends.
pub fn play(wav: &[u8]) -> Result<()> {
    let mut stream =
        OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
    stream.log_on_drop(false);

    let sink = Sink::connect_new(stream.mixer());
    let source = Decoder::new(Cursor::new(wav.to_vec())).context("Failed to decode WAV reply")?;
    sink.append(source);
    sink.sleep_until_end();
    Ok(())
}
