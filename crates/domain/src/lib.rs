//! reecho domain crate
//!
//! Core logic of the auto-reshare service, following hexagonal
//! architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `matcher`: Criterion term matching
//! - `usecases`: Collection cycle, dispatch, and criterion management

pub mod matcher;
pub mod model;
pub mod ports;
pub mod usecases;

pub use matcher::Matcher;
pub use model::*;
pub use ports::*;
