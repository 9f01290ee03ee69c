//! Client side of a Tasky task page.
//!
//! - [`TaskSession`]: derives what the viewer may do on a task and resolves
//!   its deal, ignoring lookups that finish after the task changed.
//! - [`ChatSync`]: polls a task's messages on a fixed interval and sends new
//!   ones.
//! - [`offers`] and [`reviews`]: client-side validation and submission for
//!   the offer and review forms.
//!
//! All I/O goes through the [`Backend`] trait; [`HttpBackend`] talks to a
//! real server and [`DemoBackend`] keeps everything in memory.

pub mod backend;
pub mod chat;
pub mod config;
pub mod demo;
pub mod error;
pub mod http;
pub mod offers;
pub mod permissions;
pub mod reviews;
pub mod session;

#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use chat::{ChatPhase, ChatState, ChatSync, RefreshMode, SendOutcome};
pub use config::ClientConfig;
pub use demo::DemoBackend;
pub use error::ClientError;
pub use http::HttpBackend;
pub use permissions::{DerivedSession, derive};
pub use session::{DealLookup, SessionState, TaskSession};
