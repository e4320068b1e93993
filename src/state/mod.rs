//! State module for tracking domain progress
//!
//! # Components
//!
//! - `Domain`: an immutable target domain and its boundary rules
//! - `DomainStatus`: the pipeline states, terminal and active
//! - `DomainProgress`: per-domain run state owned by the driving worker

mod domain;
mod progress;
mod status;

pub use domain::Domain;
pub use progress::DomainProgress;
pub use status::DomainStatus;
