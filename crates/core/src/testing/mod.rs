//! Test helpers.
//!
//! Provides a stand-in for the external validator so handshakes can be
//! exercised end to end without real network equipment.

mod validator;

pub use validator::{answer_ticket, pending_tickets, SimulatedValidator, ValidatorHandle};
