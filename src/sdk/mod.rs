//! High-level client over the protocol engine.
//!
//! `VigiClient` owns the session and transport and hands out borrowed
//! controllers for alarms, custom audio, and slot synchronization.
pub mod client;

pub use client::{ClientError, VigiClient};
