//! Wire types shared by the Tasky client and the development backend.
//!
//! Everything here is plain serde data; no I/O.

pub mod api;
pub mod models;

pub use models::{Deal, Message, Offer, Review, Role, Task, TaskStatus, User};
