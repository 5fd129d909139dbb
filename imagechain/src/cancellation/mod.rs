//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is created per chain run and handed to every stage
//! through its context. Long-running stages check it at their suspension
//! points and stop early.

mod token;

pub use token::CancellationToken;
