pub mod distance_tier;
pub mod machine_role;

pub use distance_tier::DistanceTier;
pub use machine_role::{CostingProvider, DefaultCosting, MachineRole, REGISTERED_ROLES};
