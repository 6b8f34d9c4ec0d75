//! Domain types shared between the auth core and the rest of the CRM.
//!
//! This crate contains only pure types with no framework dependencies.
//! Import in `usecase/` and `domain/` layers; never in `infra/` or `handlers/`.

pub mod account;
pub mod audit;
pub mod id;
pub mod pagination;
pub mod role;
