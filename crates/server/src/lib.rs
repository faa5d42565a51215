//! HTTP front end for the verification mailbox.

pub mod api;
pub mod metrics;
pub mod state;
