//! Command handlers, one module per spec.md §6 verb group.

pub mod meta;
pub mod notes;
pub mod social;
