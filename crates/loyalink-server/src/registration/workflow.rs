use loyalink_common::types::NewClient;
use loyalink_crm::CrmClient;
use loyalink_storage::{RegistrationStore, StorageError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::error::RegistrationError;

/// End-to-end member enrollment: CRM client, bonus, then token consumption.
///
/// The steps run in order and are not compensated. A client created in the
/// CRM stays created when a later step fails, and the token stays unused so
/// the link can be retried.
pub struct EnrollmentWorkflow {
    store: Arc<RegistrationStore>,
    crm: Arc<dyn CrmClient>,
    bonus_amount: i64,
    default_sex: i32,
    /// Plaintext tokens with a registration currently running in this process.
    in_flight: Mutex<HashSet<String>>,
}

/// Releases an in-flight claim when the registration attempt ends.
struct Claim<'a> {
    set: &'a Mutex<HashSet<String>>,
    token: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.token);
    }
}

impl EnrollmentWorkflow {
    pub fn new(
        store: Arc<RegistrationStore>,
        crm: Arc<dyn CrmClient>,
        bonus_amount: i64,
        default_sex: i32,
    ) -> Self {
        Self {
            store,
            crm,
            bonus_amount,
            default_sex,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn claim(&self, token: &str) -> Result<Claim<'_>, RegistrationError> {
        let inserted = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.to_string());
        if !inserted {
            return Err(RegistrationError::InProgress);
        }
        Ok(Claim {
            set: &self.in_flight,
            token: token.to_string(),
        })
    }

    /// Enrolls the member behind `token` and consumes the token.
    ///
    /// `token` is the plaintext token returned by
    /// [`super::RegistrationService::validate_and_decode`].
    pub async fn register_user(
        &self,
        token: &str,
        name: &str,
        phone: &str,
        birthday: &str,
    ) -> Result<(), RegistrationError> {
        let _claim = self.claim(token).inspect_err(|_| {
            tracing::warn!("Concurrent registration attempt for the same link rejected");
        })?;

        // Re-check under the claim so a token consumed since validation never reaches the CRM.
        match self.store.get_by_token(token).await {
            Ok(registration) if registration.is_usable() => {}
            Ok(_) | Err(StorageError::NotFound { .. }) => {
                return Err(RegistrationError::InvalidOrUsedToken)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to re-check token before enrollment");
                return Err(e.into());
            }
        }

        let client = NewClient {
            name: name.to_string(),
            phone: phone.to_string(),
            birthday: birthday.to_string(),
            sex: self.default_sex,
        };

        let client_id = self
            .crm
            .find_or_create_client(&client)
            .await
            .inspect_err(|e| {
                tracing::error!(crm = self.crm.name(), error = %e, "Failed to find or create CRM client");
            })?;

        self.crm
            .grant_bonus(client_id, self.bonus_amount)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    crm = self.crm.name(),
                    client_id,
                    amount = self.bonus_amount,
                    error = %e,
                    "Failed to grant bonus; client stays created"
                );
            })?;

        self.store
            .mark_used(token, name, phone)
            .await
            .map_err(|e| {
                tracing::error!(client_id, error = %e, "Failed to consume token after CRM enrollment");
                match e {
                    StorageError::AlreadyUsed => RegistrationError::AlreadyConsumed,
                    StorageError::NotFound { .. } => RegistrationError::InvalidOrUsedToken,
                    other => RegistrationError::Storage(other),
                }
            })?;

        tracing::info!(client_id, amount = self.bonus_amount, "Member enrolled");
        Ok(())
    }
}
