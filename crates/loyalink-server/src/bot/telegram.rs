use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{AdminBot, BotReply};

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("Telegram network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    from: Option<User>,
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

/// Long-polls the Telegram Bot API and hands messages to an [`AdminBot`].
pub struct TelegramPoller {
    client: Client,
    /// `<api_url>/bot<token>`; never logged.
    endpoint: String,
    poll_timeout_secs: u64,
    bot: Arc<AdminBot>,
}

impl TelegramPoller {
    pub fn new(
        api_url: &str,
        token: &str,
        poll_timeout_secs: u64,
        bot: Arc<AdminBot>,
    ) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(poll_timeout_secs + 10))
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
            poll_timeout_secs,
            bot,
        })
    }

    /// Polls until the task is aborted. Transport errors back off and retry.
    pub async fn run(self: Arc<Self>) {
        tracing::info!(poll_timeout_secs = self.poll_timeout_secs, "Telegram bot started");
        let mut offset = 0i64;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            let poller = self.clone();
                            tokio::spawn(async move { poller.dispatch(message).await });
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, retry_in_secs = backoff.as_secs(), "Telegram polling failed");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn dispatch(&self, message: Message) {
        let (Some(sender), Some(text)) = (message.from, message.text) else {
            return;
        };
        let Some(reply) = self.bot.handle(sender.id, &text).await else {
            return;
        };
        if let Err(e) = self.send_message(message.chat.id, &reply).await {
            tracing::error!(chat_id = message.chat.id, error = %e, "Failed to send bot reply");
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let resp = self
            .client
            .get(format!("{}/getUpdates", self.endpoint))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", self.poll_timeout_secs.to_string()),
                ("allowed_updates", r#"["message"]"#.to_string()),
            ])
            .send()
            .await
            .map_err(reqwest::Error::without_url)?;
        let body: ApiResponse<Vec<Update>> =
            resp.json().await.map_err(reqwest::Error::without_url)?;
        into_result(body)
    }

    pub async fn send_message(&self, chat_id: i64, reply: &BotReply) -> Result<(), TelegramError> {
        let parse_mode = reply.markdown.then_some("Markdown");
        for chunk in split_message(&reply.text, MAX_MESSAGE_CHARS) {
            let resp = self
                .client
                .post(format!("{}/sendMessage", self.endpoint))
                .json(&SendMessage {
                    chat_id,
                    text: &chunk,
                    parse_mode,
                })
                .send()
                .await
                .map_err(reqwest::Error::without_url)?;
            let body: ApiResponse<serde_json::Value> =
                resp.json().await.map_err(reqwest::Error::without_url)?;
            into_result(body)?;
        }
        Ok(())
    }
}

fn into_result<T>(body: ApiResponse<T>) -> Result<T, TelegramError> {
    match body {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { description, .. } => Err(TelegramError::Api(
            description.unwrap_or_else(|| "request was not ok".to_string()),
        )),
    }
}

/// Splits on line boundaries so no chunk exceeds `limit` characters.
/// A single line longer than `limit` is cut mid-line.
fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
