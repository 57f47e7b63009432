//! Placement lifecycle engine for a foster-care programme: scores
//! child/family compatibility, walks matchings through review, and runs
//! placements through approximation, cost allocation, and closure.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

pub use config::AppConfig;
pub use error::AppError;
