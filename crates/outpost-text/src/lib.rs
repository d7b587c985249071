//! The Gemini-style text interface for outpost (spec.md §6).
//!
//! Transport-agnostic by design: [`router::route`] takes one request line
//! plus an already-resolved caller and returns a [`Response`] to render
//! over whatever socket `outpost-server` is listening on.

pub mod checkers;
pub mod commands;
pub mod context;
pub mod render;
pub mod resolver;
pub mod response;
pub mod router;

pub use context::TextContext;
pub use response::{Response, StatusCode};
pub use router::route;
