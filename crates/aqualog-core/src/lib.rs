//! Core aqualog library (session, water tracking, config).

pub mod api;
pub mod config;
pub mod session;
pub mod water;
