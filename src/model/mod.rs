//! Normalized result and provider-match types.

pub mod types;
