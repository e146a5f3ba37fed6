//! # Prontui
//!
//! A terminal client for an electronic medical record REST API.
//!
//! ## Features
//! - Token-based login with doctor/patient roles
//! - Patient roster with filter, create, edit and delete
//! - Medical record entries with prescriptions and procedures
//! - External digital-signature workflow (download, sign, upload)
//! - Controlled-prescription-number (SNCR) registry management
//! - Patient-facing signed document listing
//! - Address autofill from CEP lookup
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (State machine)
//! - API Layer (Tokio runtime)

pub mod api;
pub mod app;
pub mod constants;
pub mod messages;
pub mod models;
pub mod session;
pub mod signing;
pub mod ui;

// Re-export commonly used types
pub use api::{ApiActor, ApiClient};
pub use app::{AppActor, AppState};
pub use messages::{ApiCommand, ApiResponse, RenderState, UiEvent};
pub use models::{Patient, PrescriptionType, Role, SncrNumber};
pub use session::{Session, SessionStore};
pub use signing::{DocumentKind, SigningExchange, SigningState};
