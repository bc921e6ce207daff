//! Types shared by the glimpse daemon and its control surface.

pub mod config;
pub mod error;
pub mod policy;
pub mod protocol;
pub mod snapshot;
pub mod status;
