pub mod distance_matrix;
pub mod scenario_reader;

pub use distance_matrix::DistanceMatrixParser;
pub use scenario_reader::ScenarioReader;
