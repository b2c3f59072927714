use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An issued registration token and its one-way `used` flag.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use loyalink_common::types::Registration;
///
/// let reg = Registration {
///     id: 1,
///     token: "3f9c0e1a".into(),
///     used: false,
///     created_at: Utc::now(),
/// };
/// assert!(reg.is_usable());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: i64,
    pub token: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Registration {
    /// A registration can be consumed only while `used` is still false.
    pub fn is_usable(&self) -> bool {
        !self.used
    }
}

/// Who consumed a token, captured from the submitted registration form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub id: i64,
    pub token: String,
    pub username: String,
    pub phone: String,
    pub used_at: DateTime<Utc>,
}

/// Used and unused registrations read from one query, so together they
/// cover every issued token exactly once.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenSnapshot {
    pub used: Vec<Registration>,
    pub unused: Vec<Registration>,
}

impl TokenSnapshot {
    pub fn total(&self) -> usize {
        self.used.len() + self.unused.len()
    }
}

/// Member data sent to the CRM when enrolling a new loyalty client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub phone: String,
    /// `YYYY-MM-DD`
    pub birthday: String,
    /// CRM sex code (0 = unspecified).
    pub sex: i32,
}

/// Raw registration form submitted from the public page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationForm {
    pub token: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<String>,
}

/// A registration form with every required field present and non-blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteForm {
    pub token: String,
    pub name: String,
    pub phone: String,
    pub birthday: String,
}

impl RegistrationForm {
    /// Returns the trimmed fields, or `None` if any of them is absent or blank.
    ///
    /// # Examples
    ///
    /// ```
    /// use loyalink_common::types::RegistrationForm;
    ///
    /// let form = RegistrationForm {
    ///     token: Some("abc".into()),
    ///     name: Some(" Anna ".into()),
    ///     phone: Some("+1000".into()),
    ///     birthday: None,
    /// };
    /// assert!(form.complete().is_none());
    /// ```
    pub fn complete(&self) -> Option<CompleteForm> {
        fn field(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        Some(CompleteForm {
            token: field(&self.token)?,
            name: field(&self.name)?,
            phone: field(&self.phone)?,
            birthday: field(&self.birthday)?,
        })
    }
}
