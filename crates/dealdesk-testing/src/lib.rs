//! Test utilities for Dealdesk services.
//!
//! Provides a fixed identity-provider signing key and an ID-token builder.
//! Import in `#[cfg(test)]` blocks and integration tests only.

pub mod idp;
