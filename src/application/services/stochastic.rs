//! Stochastic playback
//!
//! Replays an assignment table under sampled perturbations: machine
//! downtime, weather windows scaling production, and landing shocks with
//! multiplicative stacking. Each sample draws an independent RNG from the
//! seeded sequence; with every probability at zero the result equals the
//! deterministic playback for any sample count.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::services::kpi::KpiBundle;
use crate::application::services::playback::{
    play_with_modifiers, AssignmentRow, PlaybackModifiers,
};
use crate::application::services::ProblemView;
use crate::application::solvers::rng::{derive_seed, rng_from_seed};
use crate::domain::errors::PlaybackError;

/// Sampling configuration for stochastic playback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub samples: u32,
    /// Probability a (machine, day) suffers downtime
    pub downtime_prob: f64,
    /// Assignments dropped on a downtime day, at most
    pub downtime_max_per_day: u32,
    /// Probability a day starts a weather window
    pub weather_prob: f64,
    /// Production scaling inside a weather window is `1 - severity`
    pub weather_severity: f64,
    /// Weather window length in days
    pub weather_window: u32,
    /// Probability a (landing, day) draws a shock
    pub landing_shock_prob: f64,
    /// Uniform range the shock multiplier is drawn from
    pub landing_shock_mult_range: (f64, f64),
    /// Days a shock persists; overlapping shocks stack multiplicatively
    pub landing_shock_duration: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            samples: 8,
            downtime_prob: 0.0,
            downtime_max_per_day: 1,
            weather_prob: 0.0,
            weather_severity: 0.3,
            weather_window: 2,
            landing_shock_prob: 0.0,
            landing_shock_mult_range: (0.5, 1.0),
            landing_shock_duration: 1,
        }
    }
}

/// Result of a stochastic playback: per-sample bundles plus ensemble means
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StochasticResult {
    pub samples: Vec<KpiBundle>,
    /// Ensemble means over headline KPIs
    pub ensemble_mean: BTreeMap<String, f64>,
}

/// Replays the assignment table across sampled perturbations
///
/// # Arguments
///
/// * `view` - Problem view of the validated scenario
/// * `rows` - Canonical assignment rows
/// * `config` - Sampling configuration
/// * `seed` - Parent seed; sample `k` draws from `derive_seed(seed, k)`
pub fn play_stochastic(
    view: &ProblemView,
    rows: &[AssignmentRow],
    config: &SamplingConfig,
    seed: u64,
) -> Result<StochasticResult, PlaybackError> {
    let mut samples = Vec::with_capacity(config.samples as usize);
    for k in 0..config.samples.max(1) {
        let modifiers = draw_modifiers(view, rows, config, derive_seed(seed, k as u64));
        let bundle = play_with_modifiers(view, rows, false, k, &modifiers)?;
        samples.push(bundle);
    }

    let n = samples.len() as f64;
    let mean = |f: fn(&KpiBundle) -> f64| samples.iter().map(f).sum::<f64>() / n;
    let mut ensemble_mean = BTreeMap::new();
    ensemble_mean.insert("total_production".to_string(), mean(|b| b.total_production));
    ensemble_mean.insert(
        "completed_blocks".to_string(),
        mean(|b| b.completed_blocks as f64),
    );
    ensemble_mean.insert(
        "mobilisation_cost".to_string(),
        mean(|b| b.mobilisation_cost),
    );
    ensemble_mean.insert("makespan".to_string(), mean(|b| b.makespan as f64));
    ensemble_mean.insert(
        "utilisation_ratio".to_string(),
        mean(|b| b.utilisation_ratio),
    );
    ensemble_mean.insert("landing_surplus".to_string(), mean(|b| b.landing_surplus));

    info!(
        samples = samples.len(),
        mean_production = ensemble_mean["total_production"],
        "stochastic playback finished"
    );
    Ok(StochasticResult {
        samples,
        ensemble_mean,
    })
}

/// Draws one sample's perturbations in a fixed order so the stream is
/// reproducible: downtime by (machine, day), weather by day, shocks by
/// (landing, day)
fn draw_modifiers(
    view: &ProblemView,
    rows: &[AssignmentRow],
    config: &SamplingConfig,
    sample_seed: u64,
) -> PlaybackModifiers {
    let mut rng = rng_from_seed(sample_seed);
    let mut modifiers = PlaybackModifiers::identity(view);
    let days = view.num_days();

    // Downtime: drop up to the cap of this machine-day's assignments
    for m in 0..view.num_machines() {
        for d in 0..days {
            if config.downtime_prob > 0.0 && rng.gen::<f64>() < config.downtime_prob {
                let mut assigned: Vec<usize> = rows
                    .iter()
                    .filter(|row| {
                        row.assigned
                            && view.machine_index(&row.machine_id) == Some(m)
                            && row.day as usize == d + 1
                    })
                    .filter_map(|row| (0..view.shifts_per_day()).find(|&s| view.shift_id(s) == row.shift_id))
                    .collect();
                for _ in 0..config.downtime_max_per_day.min(assigned.len() as u32) {
                    let pick = rng.gen_range(0..assigned.len());
                    let s = assigned.swap_remove(pick);
                    modifiers.dropped.insert((m, d, s));
                }
            }
        }
    }

    // Weather windows scale production by (1 - severity)
    for d in 0..days {
        if config.weather_prob > 0.0 && rng.gen::<f64>() < config.weather_prob {
            let end = (d + config.weather_window.max(1) as usize).min(days);
            for factor in &mut modifiers.day_factor[d..end] {
                *factor *= (1.0 - config.weather_severity).max(0.0);
            }
        }
    }

    // Landing shocks stack multiplicatively within a (landing, day)
    for l in 0..view.num_landings() {
        for d in 0..days {
            if config.landing_shock_prob > 0.0 && rng.gen::<f64>() < config.landing_shock_prob {
                let (lo, hi) = config.landing_shock_mult_range;
                let mult = if hi > lo { rng.gen_range(lo..hi) } else { lo };
                let end = (d + config.landing_shock_duration.max(1) as usize).min(days);
                for day in d..end {
                    modifiers.landing_factor[l * days + day] *= mult;
                }
            }
        }
    }

    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::playback::{play_deterministic, schedule_to_rows};
    use crate::application::services::scenario_validator::ScenarioValidator;
    use crate::application::solvers::seed::greedy_seed;
    use crate::domain::entities::definition::*;
    use crate::domain::value_objects::DefaultCosting;
    use std::sync::Arc;

    fn view() -> ProblemView {
        let definition = ScenarioDefinition {
            horizon_days: 5,
            landings: vec![LandingRow {
                id: "L1".to_string(),
                daily_capacity: Some(2),
            }],
            machines: vec![
                MachineRow {
                    id: "M1".to_string(),
                    ..Default::default()
                },
                MachineRow {
                    id: "M2".to_string(),
                    ..Default::default()
                },
            ],
            blocks: vec![
                BlockRow {
                    id: "B1".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(6.0),
                    ..Default::default()
                },
                BlockRow {
                    id: "B2".to_string(),
                    landing_id: "L1".to_string(),
                    work_required: Some(4.0),
                    ..Default::default()
                },
            ],
            production_rates: vec![
                RateRow {
                    machine_id: "M1".to_string(),
                    block_id: "B1".to_string(),
                    rate: Some(2.0),
                },
                RateRow {
                    machine_id: "M2".to_string(),
                    block_id: "B2".to_string(),
                    rate: Some(2.0),
                },
            ],
            ..Default::default()
        };
        let scenario = ScenarioValidator::validate(&definition, &DefaultCosting).unwrap();
        ProblemView::new(Arc::new(scenario))
    }

    #[test]
    fn test_zero_probability_samples_equal_deterministic() {
        let view = view();
        let rows = schedule_to_rows(&view, &greedy_seed(&view));
        let deterministic = play_deterministic(&view, &rows, true).unwrap();

        let config = SamplingConfig {
            samples: 8,
            ..Default::default()
        };
        let result = play_stochastic(&view, &rows, &config, 1234).unwrap();
        assert_eq!(result.samples.len(), 8);
        for sample in &result.samples {
            assert_eq!(sample.total_production, deterministic.total_production);
            assert_eq!(sample.completed_blocks, deterministic.completed_blocks);
            assert_eq!(sample.mobilisation_cost, deterministic.mobilisation_cost);
            assert_eq!(sample.makespan, deterministic.makespan);
        }
        assert_eq!(
            result.ensemble_mean["total_production"],
            deterministic.total_production
        );
    }

    #[test]
    fn test_weather_scales_production() {
        let view = view();
        let rows = schedule_to_rows(&view, &greedy_seed(&view));
        let config = SamplingConfig {
            samples: 1,
            weather_prob: 1.0,
            weather_severity: 0.5,
            weather_window: 5,
            ..Default::default()
        };
        let deterministic = play_deterministic(&view, &rows, true).unwrap();
        let result = play_stochastic(&view, &rows, &config, 7).unwrap();
        assert!(result.samples[0].total_production < deterministic.total_production);
    }

    #[test]
    fn test_downtime_drops_assignments() {
        let view = view();
        let rows = schedule_to_rows(&view, &greedy_seed(&view));
        let config = SamplingConfig {
            samples: 1,
            downtime_prob: 1.0,
            downtime_max_per_day: 1,
            ..Default::default()
        };
        let deterministic = play_deterministic(&view, &rows, true).unwrap();
        let result = play_stochastic(&view, &rows, &config, 11).unwrap();
        // Every machine-day loses its single shift: nothing is produced
        assert!(result.samples[0].total_production < deterministic.total_production);
    }

    #[test]
    fn test_stochastic_is_seed_deterministic() {
        let view = view();
        let rows = schedule_to_rows(&view, &greedy_seed(&view));
        let config = SamplingConfig {
            samples: 3,
            downtime_prob: 0.5,
            weather_prob: 0.3,
            landing_shock_prob: 0.4,
            ..Default::default()
        };
        let a = play_stochastic(&view, &rows, &config, 99).unwrap();
        let b = play_stochastic(&view, &rows, &config, 99).unwrap();
        for (x, y) in a.samples.iter().zip(&b.samples) {
            assert_eq!(x.total_production, y.total_production);
        }
    }
}
