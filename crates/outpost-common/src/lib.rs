//! Common utilities and shared types for outpost.

pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod local_id;

pub use config::Config;
pub use crypto::{generate_rsa_keypair, RsaKeypair};
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
pub use local_id::hash_local_id;
