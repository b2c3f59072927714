//! Admin chat bot: issues links and answers token queries.
//!
//! [`AdminBot`] holds the command logic and knows nothing about the chat
//! transport. [`telegram::TelegramPoller`] feeds it messages from Telegram.

pub mod telegram;

use loyalink_common::i18n::{normalize_locale, tr, TRANSLATIONS};
use loyalink_common::types::Registration;
use std::collections::HashSet;
use std::sync::Arc;

use crate::registration::{RegistrationError, RegistrationService};

/// A message to send back to the chat the command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotReply {
    pub text: String,
    /// Send with Telegram's legacy `Markdown` parse mode.
    pub markdown: bool,
}

impl BotReply {
    fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: false,
        }
    }

    fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            markdown: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command<'a> {
    Register,
    CheckToken(Option<&'a str>),
    UsedTokens,
    UnusedTokens,
    Help,
    Unknown(&'a str),
}

/// Splits `/cmd[@botname] [arg]` into a command. Plain text yields `None`.
fn parse_command(text: &str) -> Option<Command<'_>> {
    let rest = text.strip_prefix('/')?;
    let (head, arg) = match rest.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    let name = head.split('@').next().unwrap_or(head);

    Some(match name {
        "register" => Command::Register,
        "check_token" => Command::CheckToken(arg),
        "used_tokens" => Command::UsedTokens,
        "unused_tokens" => Command::UnusedTokens,
        "start" | "help" => Command::Help,
        other => Command::Unknown(other),
    })
}

fn escape_code(token: &str) -> String {
    token.replace('`', "\\`")
}

fn fill(locale: &str, key: &str, placeholder: &str, value: &str) -> String {
    TRANSLATIONS
        .get_template(locale, key)
        .unwrap_or(key)
        .replace(placeholder, value)
}

pub struct AdminBot {
    registration: Arc<RegistrationService>,
    base_url: String,
    admins: HashSet<i64>,
    locale: String,
}

impl AdminBot {
    pub fn new(
        registration: Arc<RegistrationService>,
        base_url: impl Into<String>,
        admins: impl IntoIterator<Item = i64>,
        locale: &str,
    ) -> Self {
        Self {
            registration,
            base_url: base_url.into(),
            admins: admins.into_iter().collect(),
            locale: normalize_locale(locale).to_string(),
        }
    }

    pub fn is_admin(&self, sender_id: i64) -> bool {
        self.admins.contains(&sender_id)
    }

    /// Handles one incoming message. `None` means the message is ignored.
    pub async fn handle(&self, sender_id: i64, text: &str) -> Option<BotReply> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let Some(command) = parse_command(text) else {
            // Plain text from an admin is a token to look up.
            if !self.is_admin(sender_id) {
                return None;
            }
            return Some(self.check_token(text).await);
        };

        if !self.is_admin(sender_id) {
            tracing::warn!(sender_id, command = ?command, "Unauthorized bot command");
            return Some(BotReply::plain(tr(&self.locale, "bot.no_permission")));
        }

        let reply = match command {
            Command::Register => self.issue_link().await,
            Command::CheckToken(Some(token)) => self.check_token(token).await,
            Command::CheckToken(None) => BotReply::plain(tr(&self.locale, "bot.enter_token")),
            Command::UsedTokens => self.list(true).await,
            Command::UnusedTokens => self.list(false).await,
            Command::Help | Command::Unknown(_) => BotReply::plain(tr(&self.locale, "bot.help")),
        };
        Some(reply)
    }

    async fn issue_link(&self) -> BotReply {
        match self.registration.issue_link(&self.base_url).await {
            Ok(link) => BotReply::plain(fill(&self.locale, "bot.link_issued", "{link}", &link)),
            Err(e) if e.is_retryable() => {
                tracing::warn!(error = %e, "Link issuance collided");
                BotReply::plain(tr(&self.locale, e.public_message_key()))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to issue registration link");
                BotReply::plain(tr(&self.locale, "bot.link_failed"))
            }
        }
    }

    async fn check_token(&self, token: &str) -> BotReply {
        match self.registration.token_usage(token).await {
            Ok(usage) => {
                let text = [
                    tr(&self.locale, "bot.usage_header").to_string(),
                    fill(&self.locale, "bot.usage_name", "{name}", &usage.username),
                    fill(&self.locale, "bot.usage_phone", "{phone}", &usage.phone),
                ]
                .join("\n");
                BotReply::plain(text)
            }
            Err(RegistrationError::NotFound) => {
                BotReply::plain(tr(&self.locale, "bot.usage_not_found"))
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to look up token usage");
                BotReply::plain(tr(&self.locale, "bot.usage_failed"))
            }
        }
    }

    async fn list(&self, used: bool) -> BotReply {
        let tokens = match self.registration.token_snapshot().await {
            Ok(snapshot) if used => snapshot.used,
            Ok(snapshot) => snapshot.unused,
            Err(e) => {
                tracing::error!(error = %e, used, "Failed to list tokens");
                return BotReply::plain(tr(&self.locale, "bot.list_failed"));
            }
        };

        let (header, empty, marker) = if used {
            ("bot.used_header", "bot.used_empty", "🔹")
        } else {
            ("bot.unused_header", "bot.unused_empty", "🟢")
        };
        if tokens.is_empty() {
            return BotReply::plain(tr(&self.locale, empty));
        }
        BotReply::markdown(render_list(tr(&self.locale, header), marker, &tokens))
    }
}

fn render_list(header: &str, marker: &str, tokens: &[Registration]) -> String {
    let mut text = String::from(header);
    text.push('\n');
    for registration in tokens {
        text.push_str(&format!("{marker} `{}`\n", escape_code(&registration.token)));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("/register"), Some(Command::Register));
        assert_eq!(parse_command("/register@loyal_bot"), Some(Command::Register));
        assert_eq!(
            parse_command("/check_token  abc "),
            Some(Command::CheckToken(Some("abc")))
        );
        assert_eq!(parse_command("/check_token"), Some(Command::CheckToken(None)));
        assert_eq!(parse_command("/start"), Some(Command::Help));
        assert_eq!(parse_command("/nope"), Some(Command::Unknown("nope")));
        assert_eq!(parse_command("abc123"), None);
    }

    #[test]
    fn list_escapes_backticks() {
        let reg = Registration {
            id: 1,
            token: "a`b".into(),
            used: true,
            created_at: chrono::Utc::now(),
        };
        let text = render_list("*Used:*", "🔹", &[reg]);
        assert_eq!(text, "*Used:*\n🔹 `a\\`b`\n");
    }

    #[test]
    fn fill_substitutes_placeholder() {
        assert_eq!(
            fill("en", "bot.link_issued", "{link}", "https://x.test/r?token=abc"),
            "Your link: https://x.test/r?token=abc"
        );
    }
}
