use loyalink_common::i18n::tr;
use loyalink_crm::CrmError;
use loyalink_storage::{CodecError, StorageError};

/// Failures of the registration use cases.
///
/// The `Display` text is meant for logs. External callers get
/// [`RegistrationError::public_message`], which never distinguishes a forged
/// link from an unknown or spent one.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Registration: token failed to decrypt")]
    InvalidToken,

    #[error("Registration: token is unknown or already used")]
    InvalidOrUsedToken,

    #[error("Registration: generated token collided with an issued one")]
    DuplicateToken,

    #[error("Registration: no usage recorded for token")]
    NotFound,

    #[error("Registration: token was consumed by a concurrent request")]
    AlreadyConsumed,

    #[error("Registration: another registration with this token is in progress")]
    InProgress,

    #[error("Registration: CRM failure: {0}")]
    Crm(#[from] CrmError),

    #[error("Registration: storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("Registration: codec failure: {0}")]
    Codec(#[from] CodecError),
}

impl RegistrationError {
    /// Translation key of the coarse, non-leaking message for this failure.
    pub fn public_message_key(&self) -> &'static str {
        match self {
            Self::InvalidToken | Self::InvalidOrUsedToken => "page.invalid_link",
            Self::DuplicateToken => "bot.link_collision",
            Self::NotFound => "bot.usage_not_found",
            Self::AlreadyConsumed
            | Self::InProgress
            | Self::Crm(_)
            | Self::Storage(_)
            | Self::Codec(_) => "page.registration_failed",
        }
    }

    pub fn public_message(&self, locale: &str) -> &'static str {
        tr(locale, self.public_message_key())
    }

    /// Whether the caller may simply try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DuplicateToken | Self::InProgress)
    }
}
