pub mod rolling_horizon;
pub mod solve_scenario;

pub use rolling_horizon::{PlanResult, PlanningController, RollingHorizonConfig, WindowReport};
pub use solve_scenario::{SolveScenario, SolverChoice};
