//! Salario API Module
//!
//! The API module provides the HTTP surface of Salario: the prediction page
//! with its JSON endpoints, and the read-only tracking UI over runs and
//! registered models.

pub mod handlers;
pub mod models;
pub mod page;
pub mod server;

pub use handlers::{ApiError, ApiState};
pub use models::*;
pub use server::*;
