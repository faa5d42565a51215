//! Out-of-band verification handshake.
//!
//! A request publishes a ticket and then waits until the external validator
//! has both removed the ticket and written a verdict, or until the deadline
//! passes. See [`Handshake::await_verdict`].

mod poller;
mod service;

pub use poller::Handshake;
pub use service::VerificationService;
