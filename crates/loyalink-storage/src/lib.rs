//! Persistence and confidentiality layer for registration tokens.
//!
//! [`codec::TokenCodec`] turns plaintext tokens into tamper-evident,
//! URL-safe strings. [`RegistrationStore`] keeps the issued tokens and their
//! usage records in a SeaORM database whose schema is managed by the
//! `migration` crate.

pub mod codec;
pub mod entities;
pub mod error;
pub mod store;


pub use codec::TokenCodec;
pub use error::{CodecError, StorageError};
pub use store::RegistrationStore;
