use serde::{Deserialize, Serialize};

/// Runs per month assumed when history is too sparse: 50 runs/week over 4.33 weeks.
pub const DEFAULT_RUNS_PER_MONTH: f64 = 50.0 * WEEKS_PER_MONTH;

/// Fewer observed runs than this in the lookback window falls back to the default.
pub const MIN_OBSERVED_RUNS: usize = 5;

pub const WEEKS_PER_MONTH: f64 = 4.33;

/// Suffix appended to a description whose cost was replaced by the computed value.
pub const COST_ADJUSTED_NOTE: &str = " (Cost calculation adjusted based on usage patterns)";

const MAX_PLAUSIBLE_MONTHLY_SAVINGS: f64 = 1000.0;
const MAX_PLAUSIBLE_MINUTES_PER_RUN: f64 = 60.0;
const MAX_DEVIATION: f64 = 0.25;

/// GitHub Actions pricing per minute by runner type.
#[derive(Debug, Clone)]
pub struct RunnerPricing {
    pub ubuntu_per_min: f64,
    pub ubuntu_4_cores_per_min: f64,
    pub ubuntu_8_cores_per_min: f64,
    pub windows_per_min: f64,
    pub macos_per_min: f64,
}

impl Default for RunnerPricing {
    fn default() -> Self {
        Self {
            ubuntu_per_min: 0.008,
            ubuntu_4_cores_per_min: 0.016,
            ubuntu_8_cores_per_min: 0.032,
            windows_per_min: 0.016,
            macos_per_min: 0.08,
        }
    }
}

impl RunnerPricing {
    /// USD per minute for a runner label.
    ///
    /// Only labels in the table have their own rate; anything else, including other
    /// macOS and Windows images, is billed as `ubuntu-latest`.
    pub fn rate_per_min(&self, runner_type: &str) -> f64 {
        let runner = runner_type.trim().to_lowercase();
        match runner.as_str() {
            "ubuntu-latest" => self.ubuntu_per_min,
            "ubuntu-latest-4-cores" => self.ubuntu_4_cores_per_min,
            "ubuntu-latest-8-cores" => self.ubuntu_8_cores_per_min,
            "windows-latest" => self.windows_per_min,
            "macos-latest" => self.macos_per_min,
            _ => self.ubuntu_per_min,
        }
    }
}

/// Monthly USD saved by shaving `time_saved_minutes` off each run.
///
/// Never negative. No rounding.
pub fn calculate_monthly_savings(time_saved_minutes: f64, runner_type: &str, runs_per_month: f64) -> f64 {
    let minutes = if time_saved_minutes.is_finite() {
        time_saved_minutes.max(0.0)
    } else {
        0.0
    };
    let runs = if runs_per_month.is_finite() {
        runs_per_month.max(0.0)
    } else {
        0.0
    };
    let rate = RunnerPricing::default().rate_per_min(runner_type);
    (minutes * runs * rate).max(0.0)
}

/// Monthly run count from `observed_runs` seen over `window_days`.
///
/// Returns `None` when the sample is too small to extrapolate from.
pub fn observed_runs_per_month(observed_runs: usize, window_days: u32) -> Option<f64> {
    if observed_runs < MIN_OBSERVED_RUNS || window_days == 0 {
        return None;
    }
    let per_week = observed_runs as f64 * 7.0 / window_days as f64;
    Some(per_week * WEEKS_PER_MONTH)
}

/// Result of checking an LLM-supplied monthly saving against the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostCheck {
    /// The supplied value is plausible and kept.
    Accepted,
    /// The supplied value was replaced by the computed one.
    Adjusted { supplied: f64, computed: f64 },
    /// No value was supplied; the computed one fills it.
    Derived { computed: f64 },
}

/// Sanity-check `supplied` monthly savings against the calculator.
///
/// A zero saving with positive time is derived. A supplied value deviating from the
/// computed one by 25% or more, above $1000/month, or paired with more than 60
/// minutes saved per run is replaced.
pub fn check_cost(
    supplied: f64,
    time_saved_minutes: f64,
    runner_type: &str,
    runs_per_month: f64,
) -> CostCheck {
    let computed = calculate_monthly_savings(time_saved_minutes, runner_type, runs_per_month);

    if supplied <= 0.0 {
        return if time_saved_minutes > 0.0 {
            CostCheck::Derived { computed }
        } else {
            CostCheck::Accepted
        };
    }

    let deviation = if computed > 0.0 {
        (supplied - computed).abs() / computed
    } else {
        f64::INFINITY
    };

    if deviation >= MAX_DEVIATION
        || supplied > MAX_PLAUSIBLE_MONTHLY_SAVINGS
        || time_saved_minutes > MAX_PLAUSIBLE_MINUTES_PER_RUN
    {
        CostCheck::Adjusted { supplied, computed }
    } else {
        CostCheck::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_time_saves_nothing() {
        for runner in ["ubuntu-latest", "macos-latest", "unknown-runner", ""] {
            assert_eq!(calculate_monthly_savings(0.0, runner, 216.5), 0.0);
            assert_eq!(calculate_monthly_savings(0.0, runner, 0.0), 0.0);
        }
    }

    #[test]
    fn test_unknown_runner_priced_as_ubuntu() {
        assert_eq!(
            calculate_monthly_savings(3.0, "unknown-runner", 100.0),
            calculate_monthly_savings(3.0, "ubuntu-latest", 100.0)
        );
        assert_eq!(
            calculate_monthly_savings(3.0, "self-hosted", 100.0),
            calculate_monthly_savings(3.0, "ubuntu-latest", 100.0)
        );
    }

    #[test]
    fn test_rate_table() {
        let pricing = RunnerPricing::default();
        assert_eq!(pricing.rate_per_min("ubuntu-latest"), 0.008);
        assert_eq!(pricing.rate_per_min("ubuntu-latest-4-cores"), 0.016);
        assert_eq!(pricing.rate_per_min("ubuntu-latest-8-cores"), 0.032);
        assert_eq!(pricing.rate_per_min("windows-latest"), 0.016);
        assert_eq!(pricing.rate_per_min("macos-latest"), 0.08);
        assert_eq!(pricing.rate_per_min("MacOS-Latest"), 0.08);
    }

    #[test]
    fn test_unlisted_os_images_priced_as_ubuntu() {
        let pricing = RunnerPricing::default();
        for label in ["macos-14", "windows-2022", "macos-latest-large"] {
            assert_eq!(
                pricing.rate_per_min(label),
                pricing.rate_per_min("ubuntu-latest"),
                "{}",
                label
            );
        }
        assert_eq!(
            calculate_monthly_savings(10.0, "macos-14", 10.0),
            calculate_monthly_savings(10.0, "ubuntu-latest", 10.0)
        );
    }

    #[test]
    fn test_formula_and_clamping() {
        let savings = calculate_monthly_savings(3.0, "ubuntu-latest", DEFAULT_RUNS_PER_MONTH);
        assert!((savings - 3.0 * 216.5 * 0.008).abs() < 1e-9);
        assert_eq!(calculate_monthly_savings(-4.0, "macos-latest", 100.0), 0.0);
        assert_eq!(calculate_monthly_savings(4.0, "macos-latest", -100.0), 0.0);
        assert_eq!(calculate_monthly_savings(f64::NAN, "ubuntu-latest", 100.0), 0.0);
    }

    #[test]
    fn test_observed_runs_per_month() {
        assert_eq!(observed_runs_per_month(4, 30), None);
        assert_eq!(observed_runs_per_month(10, 0), None);
        let rate = observed_runs_per_month(30, 30).unwrap();
        assert!((rate - 7.0 * 4.33).abs() < 1e-9);
        assert!((DEFAULT_RUNS_PER_MONTH - 216.5).abs() < 1e-9);
    }

    #[test]
    fn test_check_cost() {
        // 2 min * 100 runs * 0.008 = 1.6
        assert_eq!(check_cost(1.5, 2.0, "ubuntu-latest", 100.0), CostCheck::Accepted);
        assert!(matches!(
            check_cost(50.0, 2.0, "ubuntu-latest", 100.0),
            CostCheck::Adjusted { supplied, .. } if supplied == 50.0
        ));
        assert!(matches!(
            check_cost(0.0, 2.0, "ubuntu-latest", 100.0),
            CostCheck::Derived { computed } if (computed - 1.6).abs() < 1e-9
        ));
        assert_eq!(check_cost(0.0, 0.0, "ubuntu-latest", 100.0), CostCheck::Accepted);
        // implausible time per run
        assert!(matches!(
            check_cost(60.0, 90.0, "ubuntu-latest", 10.0),
            CostCheck::Adjusted { .. }
        ));
    }
}
