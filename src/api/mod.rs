//! API layer - typed access to the medical record REST API
//!
//! The API actor receives commands from the App layer and sends back
//! responses; the client wrapper centralizes the base URL and attaches the
//! session token to every request.

pub mod actor;
pub mod client;
pub mod error;

pub use actor::ApiActor;
pub use client::ApiClient;
