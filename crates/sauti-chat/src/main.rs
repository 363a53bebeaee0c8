//! Sauti Chat - terminal text-to-speech chatbot

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
#[cfg(feature = "playback")]
mod playback;
mod transcript;

use client::ApiClient;
use sauti_core::audio::inspect_wav;
use transcript::{render_message, AudioReply, Content, Role, Transcript, AUDIO_REPLY_TEXT};

/// Chat with the Sauti server: every prompt comes back as speech
#[derive(Parser, Debug)]
#[command(name = "sauti-chat")]
#[command(about = "Text-to-Speech ChatBot")]
struct Args {
    /// Base URL of the Sauti server
    #[arg(long, default_value = "http://localhost:8000")]
    server: String,

    /// Voice preset to request (server default when omitted)
    #[arg(long)]
    preset: Option<String>,

    /// Directory replies are saved to
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Play each reply on the default output device
    #[cfg(feature = "playback")]
    #[arg(long)]
    play: bool,
}

fn default_out_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("sauti").join("replies"))
        .unwrap_or_else(|| PathBuf::from("sauti-replies"))
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = Args::parse();
    let out_dir = args.out_dir.clone().unwrap_or_else(default_out_dir);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let client = ApiClient::new(&args.server)?;
    let mut transcript = Transcript::new();

    println!("Text-to-Speech ChatBot");
    println!("Write your prompt below. /history shows the conversation, /quit exits.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let prompt = line.trim();

        match prompt {
            "" => continue,
            "/quit" => break,
            "/history" => {
                if transcript.is_empty() {
                    println!("(no messages yet)");
                }
                transcript.render(&mut io::stdout())?;
                continue;
            }
            _ => {}
        }

        if let Err(e) = respond(&args, &client, &out_dir, &mut transcript, prompt) {
            eprintln!("error: {:#}", e);
        }
    }

    Ok(())
}

/// Send one prompt and append the exchange to the transcript.
fn respond(
    args: &Args,
    client: &ApiClient,
    out_dir: &Path,
    transcript: &mut Transcript,
    prompt: &str,
) -> Result<()> {
    transcript.push_text(Role::User, prompt);

    let wav = client.generate(prompt, args.preset.as_deref())?;
    let summary = inspect_wav(&wav).context("Server reply is not a WAV stream")?;

    let path = next_reply_path(out_dir, transcript.audio_count() + 1);
    std::fs::write(&path, &wav).with_context(|| format!("Failed to write {}", path.display()))?;

    let mut stdout = io::stdout();
    let message = transcript.push_text(Role::Assistant, AUDIO_REPLY_TEXT);
    render_message(message, &mut stdout)?;
    let message = transcript.push(
        Role::Assistant,
        Content::Audio(AudioReply {
            wav,
            summary,
            saved_to: Some(path),
        }),
    );
    render_message(message, &mut stdout)?;

    #[cfg(feature = "playback")]
    if args.play {
        if let Content::Audio(reply) = &message.content {
            playback::play(&reply.wav)?;
        }
    }

    Ok(())
}

/// First `reply-NNN.wav` in `out_dir` numbered `number` or above that is not taken,
/// so replies from earlier sessions survive.
fn next_reply_path(out_dir: &Path, mut number: usize) -> PathBuf {
    loop {
        let path = out_dir.join(format!("reply-{:03}.wav", number));
        if !path.exists() {
            return path;
        }
        number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_names_skip_earlier_sessions() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_reply_path(dir.path(), 1), dir.path().join("reply-001.wav"));

        std::fs::write(dir.path().join("reply-001.wav"), b"RIFF").unwrap();
        std::fs::write(dir.path().join("reply-002.wav"), b"RIFF").unwrap();
        assert_eq!(next_reply_path(dir.path(), 1), dir.path().join("reply-003.wav"));
        assert_eq!(next_reply_path(dir.path(), 5), dir.path().join("reply-005.wav"));
    }
}
