//! Persistence layer (token storage).

pub mod token_store;

pub use token_store::{store_key, TokenStore};
