//! Release upload: destination choice and the uploader seam.
//!
//! The operator picks a destination at the end of a successful build. Only
//! the exact answer `1` selects the messaging channel; every other answer,
//! including an empty line or a typo, goes to the anonymous file host.

mod http;

pub use http::HttpUploader;

use crate::error::{CliError, Result, UploadError};
use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

/// Where the archive goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Bot upload to the release channel
    Messaging,
    /// Anonymous file host
    FileHost,
}

impl Destination {
    /// Map the operator's answer to a destination.
    pub fn from_choice(answer: &str) -> Self {
        if answer.trim() == "1" {
            Destination::Messaging
        } else {
            Destination::FileHost
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Messaging => write!(f, "Telegram"),
            Destination::FileHost => write!(f, "file host"),
        }
    }
}

/// What the service answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Destination used
    pub destination: Destination,
    /// Retrieval URL or message reference reported by the service
    pub response: String,
}

/// Reads answers from the operator
pub trait Prompt {
    /// Show `question` and return the answer without the line terminator
    fn ask(&self, question: &str) -> std::io::Result<String>;
}

/// Prompt on the controlling terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinPrompt;

impl Prompt for StdinPrompt {
    fn ask(&self, question: &str) -> std::io::Result<String> {
        print!("{question} ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().lock().read_line(&mut input)?;
        Ok(input.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Sends the archive to a destination
#[allow(async_fn_in_trait)]
pub trait ArtifactUploader {
    /// Post the archive to the release channel as the bot owning `token`
    async fn send_to_chat(&self, token: &str, archive: &Path) -> Result<UploadReceipt>;

    /// Upload the archive to the anonymous file host
    async fn send_to_file_host(&self, archive: &Path) -> Result<UploadReceipt>;
}

/// Ask for a destination (and a token if needed) and upload.
pub async fn choose_and_upload<U, P>(uploader: &U, prompt: &P, archive: &Path) -> Result<UploadReceipt>
where
    U: ArtifactUploader,
    P: Prompt,
{
    let answer = ask(prompt, "Upload to (1) Telegram or (2) file host? [2]:")?;
    let destination = Destination::from_choice(&answer);
    log::info!("Upload destination: {destination}");

    match destination {
        Destination::Messaging => {
            let token = ask(prompt, "Bot token:")?;
            let token = token.trim();
            if token.is_empty() {
                return Err(UploadError::EmptyToken.into());
            }
            uploader.send_to_chat(token, archive).await
        }
        Destination::FileHost => uploader.send_to_file_host(archive).await,
    }
}

fn ask<P: Prompt>(prompt: &P, question: &str) -> Result<String> {
    prompt.ask(question).map_err(|e| {
        CliError::PromptFailed {
            reason: e.to_string(),
        }
        .into()
    })
}
