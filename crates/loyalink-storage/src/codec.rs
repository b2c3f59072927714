use base64::alphabet;
use base64::engine::general_purpose::{self, GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use rand::Rng;
use ring::aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::error::CodecError;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;

/// URL-safe alphabet; emits no padding and accepts input with or without it.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Generates a plaintext registration token: 128 random bits as 32 hex chars.
pub fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 16] = rng.gen();
    hex::encode(token_bytes)
}

/// Encrypts plaintext tokens into URL-embeddable strings with AES-256-GCM.
///
/// Output layout before encoding: `nonce (12 bytes) ‖ ciphertext ‖ tag (16 bytes)`.
pub struct TokenCodec {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Builds a codec from raw key bytes, which must be exactly [`KEY_LEN`] long.
    pub fn new(key_bytes: &[u8]) -> Result<Self, CodecError> {
        if key_bytes.len() != KEY_LEN {
            return Err(CodecError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key_bytes.len(),
            });
        }
        let unbound = UnboundKey::new(&AES_256_GCM, key_bytes).map_err(|_| {
            CodecError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key_bytes.len(),
            }
        })?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Builds a codec from a configured secret.
    ///
    /// Accepted forms, tried in order: 64 hex characters, base64 (standard or
    /// URL-safe) that decodes to 32 bytes, or a raw 32-byte string.
    pub fn from_secret(secret: &str) -> Result<Self, CodecError> {
        let secret = secret.trim();

        if secret.len() == KEY_LEN * 2 {
            if let Ok(bytes) = hex::decode(secret) {
                return Self::new(&bytes);
            }
        }

        let decoded = general_purpose::STANDARD
            .decode(secret)
            .ok()
            .or_else(|| URL_SAFE_LENIENT.decode(secret).ok());
        if let Some(bytes) = decoded.filter(|b| b.len() == KEY_LEN) {
            return Self::new(&bytes);
        }

        Self::new(secret.as_bytes())
    }

    /// Loads `token.key` from `data_dir`, generating it on first start.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, CodecError> {
        let key_path = data_dir.join("token.key");
        let key_bytes = if key_path.exists() {
            std::fs::read(&key_path)?
        } else {
            std::fs::create_dir_all(data_dir)?;
            let rng = SystemRandom::new();
            let mut key = vec![0u8; KEY_LEN];
            rng.fill(&mut key).map_err(|_| CodecError::Rng)?;
            std::fs::write(&key_path, &key)?;
            #[cfg(unix)]
            {
                let perms = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&key_path, perms)?;
            }
            tracing::info!(path = %key_path.display(), "Generated new token encryption key");
            key
        };

        Self::new(&key_bytes)
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    ///
    /// Two calls with the same plaintext return different strings.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| CodecError::Rng)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut in_out = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CodecError::Seal)?;

        let mut result = Vec::with_capacity(NONCE_LEN + in_out.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&in_out);
        Ok(URL_SAFE_LENIENT.encode(&result))
    }

    /// Decodes and authenticates a token produced by [`TokenCodec::encrypt`].
    pub fn decrypt(&self, encrypted: &str) -> Result<String, CodecError> {
        let data = URL_SAFE_LENIENT
            .decode(encrypted.trim())
            .map_err(|_| CodecError::InvalidToken)?;
        if data.len() < NONCE_LEN + aead::AES_256_GCM.tag_len() {
            return Err(CodecError::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce =
            Nonce::try_assume_unique_for_key(nonce_bytes).map_err(|_| CodecError::InvalidToken)?;

        let mut in_out = ciphertext.to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CodecError::InvalidToken)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| CodecError::InvalidToken)
    }
}
