//! Year-by-year weights of the old and new (IBS/CBS) systems.
//!
//! | Year | Old system | New system |
//! |------|-----------:|-----------:|
//! | 2026 | 90% | 10% |
//! | 2027 | 80% | 20% |
//! | 2028 | 80% | 20% |
//! | 2029 | 80% | 20% |
//! | 2030 | 60% | 40% |
//! | 2031 | 40% | 60% |
//! | 2032 | 20% | 80% |
//! | 2033 |  0% | 100% |
//!
//! 2028 is an explicit row repeating the 2027 weights rather than a value
//! derived from a step formula.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::CalculationError;

/// Weights applied to one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleStep {
    pub year: i32,
    pub old_system_weight_pct: Decimal,
    pub new_system_weight_pct: Decimal,
}

/// Validated transition schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionSchedule {
    steps: Vec<ScheduleStep>,
}

impl TransitionSchedule {
    /// Builds a schedule from explicit steps.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidSchedule`] unless:
    /// - there is at least one step and years are consecutive,
    /// - every year's weights sum to exactly 100,
    /// - the old-system weight never increases,
    /// - the final year is fully on the new system.
    pub fn new(steps: Vec<ScheduleStep>) -> Result<Self, CalculationError> {
        let Some(last) = steps.last() else {
            return Err(CalculationError::InvalidSchedule(
                "schedule has no years".to_string(),
            ));
        };
        if last.new_system_weight_pct != Decimal::ONE_HUNDRED {
            return Err(CalculationError::InvalidSchedule(format!(
                "final year {} must be 100% new system, got {}%",
                last.year, last.new_system_weight_pct
            )));
        }

        for step in &steps {
            if step.old_system_weight_pct < Decimal::ZERO
                || step.new_system_weight_pct < Decimal::ZERO
            {
                return Err(CalculationError::InvalidSchedule(format!(
                    "year {} has a negative weight",
                    step.year
                )));
            }
            let sum = step.old_system_weight_pct + step.new_system_weight_pct;
            if sum != Decimal::ONE_HUNDRED {
                return Err(CalculationError::InvalidSchedule(format!(
                    "year {} weights sum to {sum}, expected 100",
                    step.year
                )));
            }
        }

        for pair in steps.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.year != prev.year + 1 {
                return Err(CalculationError::InvalidSchedule(format!(
                    "year {} does not follow {}",
                    next.year, prev.year
                )));
            }
            if next.old_system_weight_pct > prev.old_system_weight_pct {
                return Err(CalculationError::InvalidSchedule(format!(
                    "old-system weight rises from {}% in {} to {}% in {}",
                    prev.old_system_weight_pct,
                    prev.year,
                    next.old_system_weight_pct,
                    next.year
                )));
            }
        }

        Ok(Self { steps })
    }

    /// The 2026-2033 schedule.
    pub fn standard() -> Self {
        let new_weights = [
            (2026, dec!(10)),
            (2027, dec!(20)),
            (2028, dec!(20)),
            (2029, dec!(20)),
            (2030, dec!(40)),
            (2031, dec!(60)),
            (2032, dec!(80)),
            (2033, dec!(100)),
        ];
        let steps = new_weights
            .into_iter()
            .map(|(year, new_weight)| ScheduleStep {
                year,
                old_system_weight_pct: Decimal::ONE_HUNDRED - new_weight,
                new_system_weight_pct: new_weight,
            })
            .collect();

        Self { steps }
    }

    pub fn steps(&self) -> &[ScheduleStep] {
        &self.steps
    }

    pub fn first_year(&self) -> i32 {
        self.steps[0].year
    }

    pub fn last_year(&self) -> i32 {
        self.steps[self.steps.len() - 1].year
    }

    /// Weights for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::ScheduleGap`] for years the schedule does
    /// not cover.
    pub fn step(
        &self,
        year: i32,
    ) -> Result<&ScheduleStep, CalculationError> {
        self.steps
            .iter()
            .find(|s| s.year == year)
            .ok_or(CalculationError::ScheduleGap {
                year,
                first: self.first_year(),
                last: self.last_year(),
            })
    }
}

impl Default for TransitionSchedule {
    fn default() -> Self {
        Self::standard()
    }
}
