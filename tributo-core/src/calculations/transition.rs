//! Old-system/new-system blending across the 2026-2033 transition.
//!
//! Each year pays `old × old weight + new × new weight`, with the weights
//! taken from the [`TransitionSchedule`]. [`ReformSimulator`] derives both
//! annual amounts from a revenue figure before blending them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CalculationError;
use crate::calculations::common::{
    ensure_non_negative, ensure_positive, percent_of, ratio_pct, round_half_up,
};
use crate::calculations::dual_vat::{DualVatSettlement, DualVatSplitter};
use crate::models::TransitionYearEntry;
use crate::policy::{ReformPolicy, SelectiveCategory, TransitionSchedule};

/// Year-by-year projection plus the pre-reform baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionProjection {
    /// Annual tax under the old system only (2025).
    pub baseline_total: Decimal,
    pub entries: Vec<TransitionYearEntry>,
    /// Total of the last schedule year.
    pub final_total: Decimal,
    /// `final_total - baseline_total`.
    pub delta: Decimal,
}

#[derive(Debug, Clone)]
pub struct TransitionBlender<'a> {
    schedule: &'a TransitionSchedule,
}

impl<'a> TransitionBlender<'a> {
    pub fn new(schedule: &'a TransitionSchedule) -> Self {
        Self { schedule }
    }

    /// Blended amounts for every schedule year.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if `revenue <= 0` or either
    /// annual tax is negative.
    pub fn blend(
        &self,
        old_system_annual_tax: Decimal,
        new_system_annual_tax: Decimal,
        revenue: Decimal,
    ) -> Result<TransitionProjection, CalculationError> {
        let mut entries = Vec::with_capacity(self.schedule.steps().len());
        for step in self.schedule.steps() {
            entries.push(self.entry(
                step.year,
                old_system_annual_tax,
                new_system_annual_tax,
                revenue,
            )?);
        }

        let baseline_total = round_half_up(old_system_annual_tax);
        let final_total = entries
            .last()
            .map(|entry| entry.total_amount)
            .unwrap_or(baseline_total);

        debug!(
            baseline_total = %baseline_total,
            final_total = %final_total,
            years = entries.len(),
            "blended transition schedule"
        );

        Ok(TransitionProjection {
            baseline_total,
            entries,
            final_total,
            delta: final_total - baseline_total,
        })
    }

    /// Blended amount for a single year.
    ///
    /// # Errors
    ///
    /// - [`CalculationError::ScheduleGap`] if `year` is outside the schedule.
    /// - [`CalculationError::InvalidInput`] as for [`TransitionBlender::blend`].
    pub fn entry(
        &self,
        year: i32,
        old_system_annual_tax: Decimal,
        new_system_annual_tax: Decimal,
        revenue: Decimal,
    ) -> Result<TransitionYearEntry, CalculationError> {
        let revenue = ensure_positive("revenue", revenue)?;
        let old_tax = ensure_non_negative("old_system_annual_tax", old_system_annual_tax)?;
        let new_tax = ensure_non_negative("new_system_annual_tax", new_system_annual_tax)?;
        let step = self.schedule.step(year)?;

        let old_amount = round_half_up(percent_of(old_tax, step.old_system_weight_pct));
        let new_amount = round_half_up(percent_of(new_tax, step.new_system_weight_pct));
        let total_amount = old_amount + new_amount;

        Ok(TransitionYearEntry {
            year,
            old_system_weight_pct: step.old_system_weight_pct,
            new_system_weight_pct: step.new_system_weight_pct,
            old_amount,
            new_amount,
            total_amount,
            effective_rate_pct: ratio_pct(total_amount, revenue),
        })
    }
}

/// Pre-reform consumption taxes, as percentages of revenue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyRates {
    pub pis_pct: Decimal,
    pub cofins_pct: Decimal,
    pub icms_pct: Decimal,
    pub iss_pct: Decimal,
    pub ipi_pct: Decimal,
}

impl LegacyRates {
    pub fn total_pct(&self) -> Decimal {
        self.pis_pct + self.cofins_pct + self.icms_pct + self.iss_pct + self.ipi_pct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReformInput {
    pub revenue: Decimal,
    /// Purchases that generate IBS/CBS credit.
    pub creditable_purchases: Decimal,
    pub legacy: LegacyRates,
    /// Overrides the policy's reference rate.
    pub iva_rate_pct: Option<Decimal>,
    pub selective: Option<SelectiveCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReformScenario {
    pub old_system_annual_tax: Decimal,
    pub new_system: DualVatSettlement,
    pub projection: TransitionProjection,
}

/// Computes old and new system amounts from revenue, then blends them.
#[derive(Debug, Clone)]
pub struct ReformSimulator<'a> {
    reform: &'a ReformPolicy,
    schedule: &'a TransitionSchedule,
}

impl<'a> ReformSimulator<'a> {
    pub fn new(
        reform: &'a ReformPolicy,
        schedule: &'a TransitionSchedule,
    ) -> Self {
        Self { reform, schedule }
    }

    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] for a non-positive revenue
    /// or any negative rate or purchase amount.
    pub fn simulate(
        &self,
        input: &ReformInput,
    ) -> Result<ReformScenario, CalculationError> {
        let revenue = ensure_positive("revenue", input.revenue)?;
        for (field, rate) in [
            ("pis_pct", input.legacy.pis_pct),
            ("cofins_pct", input.legacy.cofins_pct),
            ("icms_pct", input.legacy.icms_pct),
            ("iss_pct", input.legacy.iss_pct),
            ("ipi_pct", input.legacy.ipi_pct),
        ] {
            ensure_non_negative(field, rate)?;
        }

        let old_system_annual_tax = round_half_up(percent_of(revenue, input.legacy.total_pct()));
        let rate = input
            .iva_rate_pct
            .unwrap_or(self.reform.reference_iva_rate_pct);
        let new_system = DualVatSplitter::new(self.reform).split_with_credits(
            revenue,
            input.creditable_purchases,
            rate,
            input.selective,
        )?;

        let projection = TransitionBlender::new(self.schedule).blend(
            old_system_annual_tax,
            new_system.total_due,
            revenue,
        )?;

        Ok(ReformScenario {
            old_system_annual_tax,
            new_system,
            projection,
        })
    }
}
