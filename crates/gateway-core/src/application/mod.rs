//! Application layer - Port definitions for the external gateway session.

/// Gateway session and factory ports.
pub mod ports;
