pub mod registration;
pub mod token_usage;
