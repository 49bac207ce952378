//! Multi-chain wallet identity and session security.
//!
//! This crate re-exports [`vaultkit_core`]. See its documentation for the
//! credential vault, chain derivation, account store, hardware pairing and
//! session lock.

pub use vaultkit_core::*;
