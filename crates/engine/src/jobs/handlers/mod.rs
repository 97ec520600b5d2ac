//! One routine per job type.
//!
//! Each routine receives the owner and its typed payload, talks to
//! collaborators, and reports a [`HandlerError`](crate::error::HandlerError)
//! on failure. None of them retry internally; the processing loop owns retries.

pub mod campaign;
pub mod catalog;
pub mod content;
pub mod media;
pub mod messaging;
pub mod page;
