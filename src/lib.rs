//! Vist Deploy - SSH deployment runner for the vist stack
//!
//! Library entry for the two operator flows: the deploy sequencer and the
//! finalization checker.

pub mod error;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;
