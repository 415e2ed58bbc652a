// lib.rs - Library root for siftview

mod cache;
pub mod config;
pub mod controller;
pub mod fuzzy;
pub mod pipeline;
mod scheduler;
mod selection;
pub mod source;

pub use config::{ConfigError, SiftConfig};
pub use controller::SiftController;
pub use fuzzy::{FieldMatch, FuzzyMatch};
pub use pipeline::{Comparator, Predicate, Projection};
pub use source::{ItemSource, source_fn};
