pub mod block;
pub mod calendar;
pub mod definition;
pub mod harvest_system;
pub mod landing;
pub mod locks;
pub mod machine;
pub mod mobilisation;
pub mod scenario;

pub use block::Block;
pub use calendar::{BlackoutWindow, CalendarEntry, ShiftCalendarEntry, ShiftDef, TimelineConfig};
pub use harvest_system::{default_harvest_systems, HarvestJob, HarvestSystem};
pub use landing::{Landing, DEFAULT_LANDING_CAPACITY};
pub use locks::ScheduleLock;
pub use machine::{Machine, DEFAULT_REPAIR_USAGE};
pub use mobilisation::{DistanceMatrix, MobilisationConfig, MobilisationParams};
pub use scenario::{ObjectiveWeights, ProductionRate, RoadConstructionJob, Scenario};
