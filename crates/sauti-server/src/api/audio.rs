//! Audio generation endpoint

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, Response},
};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;
use sauti_core::audio::{wav_stream, AudioEncoder, WAV_CONTENT_TYPE};
use sauti_core::VoicePreset;

pub const SAMPLE_RATE_HEADER: &str = "x-sample-rate";
pub const DURATION_HEADER: &str = "x-audio-duration-secs";

#[derive(Debug, Deserialize)]
pub struct GenerateAudioParams {
    /// Text to synthesize
    pub prompt: String,

    /// Voice preset, `v2/en_speaker_1` when absent
    #[serde(default)]
    pub preset: Option<String>,
}

/// `GET /generate/audio?prompt=..&preset=..`
///
/// Only a missing `prompt` is rejected here. Its content, empty included, goes to the
/// model unchanged.
pub async fn generate_audio(
    State(state): State<AppState>,
    params: Result<Query<GenerateAudioParams>, QueryRejection>,
) -> Result<Response<Body>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let request_id = uuid::Uuid::new_v4();
    let preset = params
        .preset
        .filter(|p| !p.is_empty())
        .map(VoicePreset::new)
        .unwrap_or_default();
    info!(%request_id, "Audio request: {} chars, preset {}", params.prompt.len(), preset);

    let waveform = state.engine.synthesize(params.prompt, preset).await?;
    let sample_rate = waveform.sample_rate;
    let duration_secs = waveform.duration_secs();

    let encoder = AudioEncoder::mono(sample_rate);
    let wav = tokio::task::spawn_blocking(move || encoder.encode_wav(&waveform.samples))
        .await
        .map_err(|e| ApiError::internal(format!("Audio encoding failed: {}", e)))??;
    info!(%request_id, "Streaming {} bytes ({:.2}s of audio)", wav.len(), duration_secs);

    Response::builder()
        .header(header::CONTENT_TYPE, WAV_CONTENT_TYPE)
        .header(SAMPLE_RATE_HEADER, sample_rate.to_string())
        .header(DURATION_HEADER, format!("{:.2}", duration_secs))
        .header("x-request-id", request_id.to_string())
        .body(Body::from_stream(wav_stream(wav, state.streaming.clone())))
        .map_err(|e| ApiError::internal(e.to_string()))
}
