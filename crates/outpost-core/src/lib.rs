//! Core business logic for outpost.

pub mod services;

pub use services::*;
