//! Issuing, validating and consuming registration links.
//!
//! [`RegistrationService`] owns the token lifecycle against the store and the
//! codec. [`EnrollmentWorkflow`] composes it with the CRM to enroll a member.

pub mod error;
pub mod service;
pub mod workflow;

pub use error::RegistrationError;
pub use service::RegistrationService;
pub use workflow::EnrollmentWorkflow;
