//! CRM collaborator used to enroll loyalty members.
//!
//! [`CrmClient`] is the seam the registration workflow depends on;
//! [`poster::PosterClient`] implements it against the Poster POS API.

pub mod error;
pub mod poster;

use async_trait::async_trait;
use loyalink_common::types::NewClient;

pub use error::{CrmError, Result};
pub use poster::{PosterClient, PosterConfig};

/// Customer-management operations needed for enrollment.
///
/// Implementations are shared across concurrent request handlers.
#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Provider name used in logs (e.g. `"poster"`).
    fn name(&self) -> &str;

    /// Returns the id of the client with `client.phone`, creating it first if
    /// no such client exists. Calling it twice for one phone yields one client.
    async fn find_or_create_client(&self, client: &NewClient) -> Result<i64>;

    /// Adds `amount` bonus points to the client's balance.
    async fn grant_bonus(&self, client_id: i64, amount: i64) -> Result<()>;
}

/// Keeps only the digits of a phone number so `+7 (900) 000-00-00` and
/// `79000000000` compare equal.
///
/// # Examples
///
/// ```
/// use loyalink_crm::normalize_phone;
///
/// assert_eq!(normalize_phone("+1 000"), "1000");
/// assert_eq!(normalize_phone("+7 (900) 123-45-67"), "79001234567");
/// ```
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
