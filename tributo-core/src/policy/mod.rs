//! Tax policy tables injected into every calculator.
//!
//! Rates and ceilings that change from one tax year to the next live here
//! as plain data. [`TaxPolicy::default`] returns the tables in force for
//! 2025/2026; `tributo-data` can replace them from CSV/TOML files.

mod schedule;
mod simples_tables;

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub use schedule::{ScheduleStep, TransitionSchedule};
pub use simples_tables::standard_table;

use crate::CalculationError;
use crate::calculations::common::ensure_positive;
use crate::models::{Activity, Anexo, BracketTable};

/// Complete set of policy tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TaxPolicy {
    pub simples: SimplesPolicy,
    pub presumido: PresumidoPolicy,
    pub real: RealPolicy,
    pub credits: CreditRates,
    pub mei: MeiPolicy,
    pub reform: ReformPolicy,
    pub transition: TransitionSchedule,
}

/// Simples Nacional tables and eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimplesPolicy {
    /// Annual revenue ceiling (RBT12) for the regime.
    pub ceiling: Decimal,
    /// Payroll/revenue ratio at or above which services use Anexo III.
    pub fator_r_threshold: Decimal,
    tables: BTreeMap<Anexo, BracketTable>,
}

impl SimplesPolicy {
    /// Table for `anexo`.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidBracketTable`] if the policy was
    /// built without that Anexo.
    pub fn table(
        &self,
        anexo: Anexo,
    ) -> Result<&BracketTable, CalculationError> {
        self.tables.get(&anexo).ok_or_else(|| {
            CalculationError::InvalidBracketTable(format!("{anexo} is not loaded"))
        })
    }

    /// Replaces (or adds) the table for the Anexo the table declares.
    pub fn set_table(
        &mut self,
        table: BracketTable,
    ) {
        self.tables.insert(table.anexo(), table);
    }

    pub fn tables(&self) -> impl Iterator<Item = &BracketTable> {
        self.tables.values()
    }
}

impl Default for SimplesPolicy {
    fn default() -> Self {
        Self {
            ceiling: dec!(4800000),
            fator_r_threshold: dec!(0.28),
            tables: Anexo::ALL
                .into_iter()
                .map(|anexo| (anexo, standard_table(anexo)))
                .collect(),
        }
    }
}

/// Presumption percentages applied to revenue for one activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presumption {
    pub irpj_pct: Decimal,
    pub csll_pct: Decimal,
}

/// Lucro Presumido rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresumidoPolicy {
    pub ceiling: Decimal,
    pub irpj_rate_pct: Decimal,
    pub surtax_rate_pct: Decimal,
    pub surtax_monthly_threshold: Decimal,
    pub csll_rate_pct: Decimal,
    pub pis_rate_pct: Decimal,
    pub cofins_rate_pct: Decimal,
    pub presumptions: BTreeMap<Activity, Presumption>,
}

impl PresumidoPolicy {
    pub fn presumption(
        &self,
        activity: Activity,
    ) -> Result<Presumption, CalculationError> {
        self.presumptions.get(&activity).copied().ok_or_else(|| {
            CalculationError::invalid(
                "activity",
                format!("no presumption percentages configured for {activity}"),
            )
        })
    }
}

impl Default for PresumidoPolicy {
    fn default() -> Self {
        let presumptions = [
            (Activity::Comercio, dec!(8), dec!(12)),
            (Activity::Industria, dec!(8), dec!(12)),
            (Activity::Servicos, dec!(32), dec!(32)),
            (Activity::TransportePassageiros, dec!(16), dec!(12)),
            (Activity::TransporteCargas, dec!(8), dec!(12)),
        ]
        .into_iter()
        .map(|(activity, irpj_pct, csll_pct)| (activity, Presumption { irpj_pct, csll_pct }))
        .collect();

        Self {
            ceiling: dec!(78000000),
            irpj_rate_pct: dec!(15),
            surtax_rate_pct: dec!(10),
            surtax_monthly_threshold: dec!(20000),
            csll_rate_pct: dec!(9),
            pis_rate_pct: dec!(0.65),
            cofins_rate_pct: dec!(3),
            presumptions,
        }
    }
}

/// Lucro Real income-tax rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealPolicy {
    pub irpj_rate_pct: Decimal,
    pub surtax_rate_pct: Decimal,
    pub surtax_monthly_threshold: Decimal,
    pub csll_rate_pct: Decimal,
    /// Share of a period's profit that prior losses may offset.
    pub loss_offset_limit_pct: Decimal,
}

impl Default for RealPolicy {
    fn default() -> Self {
        Self {
            irpj_rate_pct: dec!(15),
            surtax_rate_pct: dec!(10),
            surtax_monthly_threshold: dec!(20000),
            csll_rate_pct: dec!(9),
            loss_offset_limit_pct: dec!(30),
        }
    }
}

/// Non-cumulative PIS/COFINS rates, used both for debits and credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreditRates {
    pub pis_pct: Decimal,
    pub cofins_pct: Decimal,
}

impl CreditRates {
    pub fn combined_pct(&self) -> Decimal {
        self.pis_pct + self.cofins_pct
    }
}

impl Default for CreditRates {
    fn default() -> Self {
        Self {
            pis_pct: dec!(1.65),
            cofins_pct: dec!(7.6),
        }
    }
}

/// Most candidates a [`ScanRange`] may hold.
pub const MAX_SCAN_CANDIDATES: usize = 10_000;

/// Candidate revenues examined by the MEI threshold scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRange {
    pub start: Decimal,
    pub end: Decimal,
    pub step: Decimal,
}

impl ScanRange {
    /// Checks that the range is ordered and holds at most
    /// [`MAX_SCAN_CANDIDATES`] candidates.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if a bound or the step is
    /// not positive, `start > end`, or the step is too small for the range.
    pub fn validate(&self) -> Result<(), CalculationError> {
        let start = ensure_positive("scan.start", self.start)?;
        let end = ensure_positive("scan.end", self.end)?;
        let step = ensure_positive("scan.step", self.step)?;
        if start > end {
            return Err(CalculationError::invalid(
                "scan.end",
                format!("must not be below scan.start {start}, got {end}"),
            ));
        }

        let limit = Decimal::from(MAX_SCAN_CANDIDATES);
        let too_many = (end - start)
            .checked_div(step)
            .is_none_or(|intervals| intervals.floor() + Decimal::ONE > limit);
        if too_many {
            return Err(CalculationError::invalid(
                "scan.step",
                format!(
                    "step {step} over {start}-{end} exceeds {MAX_SCAN_CANDIDATES} candidates"
                ),
            ));
        }
        Ok(())
    }
}

/// MEI fees and eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeiPolicy {
    pub ceiling: Decimal,
    /// Revenue above the ceiling, up to this share, keeps the company in
    /// MEI for the year but pays DAS on the excess.
    pub excess_tolerance_pct: Decimal,
    /// Monthly DAS-MEI by activity. Activities without a fee cannot be MEI.
    pub monthly_fees: BTreeMap<Activity, Decimal>,
    pub scan: ScanRange,
}

impl MeiPolicy {
    pub fn monthly_fee(
        &self,
        activity: Activity,
    ) -> Option<Decimal> {
        self.monthly_fees.get(&activity).copied()
    }
}

impl Default for MeiPolicy {
    fn default() -> Self {
        Self {
            ceiling: dec!(81000),
            excess_tolerance_pct: dec!(20),
            monthly_fees: [
                (Activity::Comercio, dec!(75.90)),
                (Activity::Industria, dec!(76.90)),
                (Activity::Servicos, dec!(80.90)),
            ]
            .into_iter()
            .collect(),
            scan: ScanRange {
                start: dec!(60000),
                end: dec!(200000),
                step: dec!(1000),
            },
        }
    }
}

/// Products subject to the Imposto Seletivo surcharge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectiveCategory {
    Alcohol,
    Tobacco,
    PollutingVehicle,
}

impl SelectiveCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "alcohol" | "alcool" | "bebidas" => Some(Self::Alcohol),
            "tobacco" | "tabaco" | "cigarros" => Some(Self::Tobacco),
            "polluting_vehicle" | "veiculos" | "veiculo_poluente" => Some(Self::PollutingVehicle),
            _ => None,
        }
    }
}

/// IBS/CBS reference rate and Imposto Seletivo surcharges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReformPolicy {
    pub reference_iva_rate_pct: Decimal,
    pub selective_rates: BTreeMap<SelectiveCategory, Decimal>,
}

impl ReformPolicy {
    pub fn selective_rate(
        &self,
        category: SelectiveCategory,
    ) -> Decimal {
        self.selective_rates
            .get(&category)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

impl Default for ReformPolicy {
    fn default() -> Self {
        Self {
            reference_iva_rate_pct: dec!(26.5),
            selective_rates: [
                (SelectiveCategory::Alcohol, dec!(5)),
                (SelectiveCategory::Tobacco, dec!(10)),
                (SelectiveCategory::PollutingVehicle, dec!(3)),
            ]
            .into_iter()
            .collect(),
        }
    }
}
