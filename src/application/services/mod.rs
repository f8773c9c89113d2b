pub mod kpi;
pub mod playback;
pub mod problem_view;
pub mod scenario_validator;
pub mod stochastic;

pub use kpi::{DayRecord, KpiBundle, ShiftRecord};
pub use playback::{play_deterministic, schedule_to_rows, AssignmentRow};
pub use problem_view::{ProblemView, ResolvedLock};
pub use scenario_validator::ScenarioValidator;
pub use stochastic::{play_stochastic, SamplingConfig, StochasticResult};
