//! HTTP uploader for the bot API and the anonymous file host.

use crate::config::UploadSettings;
use crate::error::{Result, UploadError};
use reqwest::header::CONTENT_LENGTH;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tokio_util::io::ReaderStream;
use url::Url;

use super::{ArtifactUploader, Destination, UploadReceipt};

/// Uploader backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    settings: UploadSettings,
}

/// Subset of the bot API's reply envelope
#[derive(Debug, Deserialize)]
struct BotReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<BotMessage>,
}

#[derive(Debug, Deserialize)]
struct BotMessage {
    message_id: i64,
}

impl HttpUploader {
    /// Create an uploader for the configured endpoints
    pub fn new(settings: UploadSettings) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, settings }
    }
}

fn file_name(archive: &Path) -> String {
    archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "release.zip".to_string())
}

/// `<base>/<name>`, keeping any path already on `base`.
fn file_host_url(base: &str, name: &str) -> std::result::Result<Url, UploadError> {
    let invalid = |reason: String| UploadError::InvalidEndpoint {
        endpoint: base.to_string(),
        reason,
    };
    let mut base_url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url.join(name).map_err(|e| invalid(e.to_string()))
}

/// Turn the bot API's answer into a message reference.
fn interpret_bot_reply(status: u16, body: &str, chat_id: &str) -> std::result::Result<String, UploadError> {
    let rejected = |detail: String| UploadError::Rejected {
        service: "Telegram".to_string(),
        status,
        body: detail,
    };

    let reply: BotReply =
        serde_json::from_str(body).map_err(|_| rejected(body.trim().to_string()))?;
    if !(200..300).contains(&status) || !reply.ok {
        return Err(rejected(
            reply
                .description
                .unwrap_or_else(|| "no description".to_string()),
        ));
    }
    Ok(match reply.result {
        Some(message) => format!("message {} in chat {}", message.message_id, chat_id),
        None => format!("posted to chat {chat_id}"),
    })
}

impl ArtifactUploader for HttpUploader {
    async fn send_to_chat(&self, token: &str, archive: &Path) -> Result<UploadReceipt> {
        let api = self.settings.telegram_api.trim_end_matches('/');
        let url = format!("{api}/bot{token}/sendDocument");
        let endpoint = format!("{api}/bot<token>/sendDocument");
        let transport = |e: reqwest::Error| UploadError::Transport {
            endpoint: endpoint.clone(),
            reason: e.without_url().to_string(),
        };

        let name = file_name(archive);
        let file = tokio::fs::File::open(archive).await?;
        let len = file.metadata().await?.len();
        log::info!("Sending {} ({} bytes) to chat {}", name, len, self.settings.chat_id);

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let document = Part::stream_with_length(body, len)
            .file_name(name.clone())
            .mime_str("application/zip")
            .map_err(transport)?;
        let form = Form::new()
            .text("chat_id", self.settings.chat_id.clone())
            .text("caption", name)
            .part("document", document);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;

        let reference = interpret_bot_reply(status, &body, &self.settings.chat_id)?;
        Ok(UploadReceipt {
            destination: Destination::Messaging,
            response: reference,
        })
    }

    async fn send_to_file_host(&self, archive: &Path) -> Result<UploadReceipt> {
        let name = file_name(archive);
        let url = file_host_url(&self.settings.file_host, &name)?;
        let transport = |e: reqwest::Error| UploadError::Transport {
            endpoint: url.to_string(),
            reason: e.without_url().to_string(),
        };

        let file = tokio::fs::File::open(archive).await?;
        let len = file.metadata().await?.len();
        log::info!("Uploading {} ({} bytes) to {}", name, len, url);

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .client
            .put(url.clone())
            .header(CONTENT_LENGTH, len)
            .body(body)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                service: url.host_str().unwrap_or("file host").to_string(),
                status: status.as_u16(),
                body: text.trim().to_string(),
            }
            .into());
        }

        Ok(UploadReceipt {
            destination: Destination::FileHost,
            response: text.trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_host_url_appends_name() {
        let url = file_host_url("https://transfer.sh", "Kernel-lavender-20240307-0905.zip").unwrap();
        assert_eq!(url.as_str(), "https://transfer.sh/Kernel-lavender-20240307-0905.zip");
    }

    #[test]
    fn test_file_host_url_keeps_base_path() {
        let url = file_host_url("https://files.example.com/upload", "k.zip").unwrap();
        assert_eq!(url.as_str(), "https://files.example.com/upload/k.zip");
    }

    #[test]
    fn test_file_host_url_rejects_garbage() {
        assert!(matches!(
            file_host_url("not a url", "k.zip"),
            Err(UploadError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn test_bot_reply_ok_returns_message_reference() {
        let body = r#"{"ok":true,"result":{"message_id":812,"chat":{"id":-100}}}"#;
        assert_eq!(
            interpret_bot_reply(200, body, "-100").unwrap(),
            "message 812 in chat -100"
        );
    }

    #[test]
    fn test_bot_reply_error_carries_description() {
        let body = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#;
        match interpret_bot_reply(401, body, "-100") {
            Err(UploadError::Rejected { status, body, .. }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_bot_reply_non_json_is_rejected() {
        assert!(matches!(
            interpret_bot_reply(502, "<html>Bad Gateway</html>", "-100"),
            Err(UploadError::Rejected { status: 502, .. })
        ));
    }
}
