//! Client-side conversation history

use bytes::Bytes;
use sauti_core::audio::WavSummary;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

pub const AUDIO_REPLY_TEXT: &str = "Here is your generated audio";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "you"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// A WAV reply as received from the server
#[derive(Debug, Clone)]
pub struct AudioReply {
    pub wav: Bytes,
    pub summary: WavSummary,
    pub saved_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Audio(AudioReply),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: Content,
}

/// Append-only list of messages, in the order they happened
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: Content) -> &Message {
        self.messages.push(Message { role, content });
        &self.messages[self.messages.len() - 1]
    }

    pub fn push_text(&mut self, role: Role, text: impl Into<String>) -> &Message {
        self.push(role, Content::Text(text.into()))
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn audio_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m.content, Content::Audio(_)))
            .count()
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for message in &self.messages {
            render_message(message, out)?;
        }
        Ok(())
    }
}

pub fn render_message<W: Write>(message: &Message, out: &mut W) -> io::Result<()> {
    match &message.content {
        Content::Text(text) => writeln!(out, "{}: {}", message.role, text),
        Content::Audio(reply) => {
            write!(
                out,
                "{}: [audio {:.2}s @ {} Hz, {} bytes]",
                message.role,
                reply.summary.duration_secs,
                reply.summary.sample_rate,
                reply.wav.len()
            )?;
            match &reply.saved_to {
                Some(path) => writeln!(out, " saved to {}", path.display()),
                None => writeln!(out),
            }
        }
    }
}
