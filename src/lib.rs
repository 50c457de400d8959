//! Salario: salary-band prediction for data professionals
//!
//! The binary wires the core training and prediction library and the HTTP
//! servers behind a single CLI.

pub mod cli;
pub mod logging;
