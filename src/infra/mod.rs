//! Infrastructure layer

pub mod ssh;
