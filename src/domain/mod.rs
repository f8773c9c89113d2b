pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::Scenario;
pub use errors::{PlaybackError, ScenarioError, SolverError, Violation, ViolationRule};
