//! Service layer
//!
//! The two operator flows and the pieces they share.

pub mod deploy;
pub mod finalize;
pub mod poll;
pub mod steps;
