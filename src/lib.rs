#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod session;
pub mod telemetry;

pub use client::{ApiClient, ApiClientBuilder, ApiResponse, REQUEST_ID_HEADER};
pub use domain::navigation::{Location, Redirect, SharedLocation};
pub use domain::request::{Attempt, OutboundRequest};
pub use domain::session::Session;
pub use error::ApiError;
pub use session::SessionManager;
pub use session::provider::{AuthProvider, HttpAuthProvider, ProviderError};
pub use session::store::{MemorySessionStore, SessionStore};
