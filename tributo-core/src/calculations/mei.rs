//! MEI versus Simples Nacional (ME).
//!
//! An MEI pays a fixed monthly DAS-MEI regardless of revenue, up to the
//! R$81,000 ceiling. [`ThresholdAdvisor`] scans candidate revenues for the
//! point where the Simples DAS would cost no more than twelve MEI fees, and
//! compares both regimes at a given revenue.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::bracket_resolver::BracketResolver;
use crate::calculations::common::{ensure_positive, percent_of, ratio_pct, round_half_up};
use crate::models::{Activity, BracketTable, Regime, RegimeQuote};
use crate::policy::MeiPolicy;

/// Result of the crossover scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ThresholdOutcome {
    Crossover {
        revenue: Decimal,
        simples_tax: Decimal,
        mei_annual_fee: Decimal,
        candidates_scanned: usize,
    },
    NoCrossover {
        mei_annual_fee: Decimal,
        candidates_scanned: usize,
    },
}

/// MEI and Simples side by side at one revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeiComparison {
    pub revenue: Decimal,
    pub mei_applicable: bool,
    pub mei_annual_fee: Decimal,
    /// DAS charged on revenue above the ceiling, within the tolerance.
    pub mei_excess_tax: Decimal,
    pub mei_total: Decimal,
    pub simples_tax: Decimal,
    pub cheaper: Regime,
    pub savings: Decimal,
}

#[derive(Debug, Clone)]
pub struct ThresholdAdvisor<'a> {
    policy: &'a MeiPolicy,
    table: &'a BracketTable,
}

impl<'a> ThresholdAdvisor<'a> {
    /// `table` is the Simples Anexo the business would fall into as an ME.
    pub fn new(
        policy: &'a MeiPolicy,
        table: &'a BracketTable,
    ) -> Self {
        Self { policy, table }
    }

    /// Smallest scanned revenue whose Simples tax is at most `12 × fee`.
    ///
    /// Candidates run from the scan start in scan steps up to the lesser of
    /// the scan end and the MEI ceiling, both inclusive.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if the fee is not positive
    /// or the scan range fails [`crate::policy::ScanRange::validate`].
    pub fn find_crossover(
        &self,
        monthly_fee: Decimal,
    ) -> Result<ThresholdOutcome, CalculationError> {
        let monthly_fee = ensure_positive("monthly_fee", monthly_fee)?;
        self.policy.scan.validate()?;
        let start = self.policy.scan.start;
        let step = self.policy.scan.step;
        let limit = if self.policy.scan.end < self.policy.ceiling {
            self.policy.scan.end
        } else {
            self.policy.ceiling
        };

        let mei_annual_fee = round_half_up(monthly_fee * Decimal::from(12));
        let resolver = BracketResolver::new(self.table);

        let mut candidates_scanned = 0;
        let mut revenue = start;
        while revenue <= limit {
            candidates_scanned += 1;
            let simples_tax = resolver.tax_for(revenue)?.amount_due;

            if simples_tax <= mei_annual_fee {
                debug!(
                    revenue = %revenue,
                    simples_tax = %simples_tax,
                    mei_annual_fee = %mei_annual_fee,
                    "found MEI/Simples crossover"
                );
                return Ok(ThresholdOutcome::Crossover {
                    revenue,
                    simples_tax,
                    mei_annual_fee,
                    candidates_scanned,
                });
            }
            revenue += step;
        }

        debug!(
            candidates_scanned,
            mei_annual_fee = %mei_annual_fee,
            "no MEI/Simples crossover in scan range"
        );

        Ok(ThresholdOutcome::NoCrossover {
            mei_annual_fee,
            candidates_scanned,
        })
    }

    /// MEI against Simples at `revenue`.
    ///
    /// Up to the tolerance above the ceiling the company stays MEI for the
    /// year and the excess pays DAS at the Simples effective rate; beyond it
    /// MEI is not applicable.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if `revenue` or
    /// `monthly_fee` is not positive.
    pub fn compare_at(
        &self,
        revenue: Decimal,
        monthly_fee: Decimal,
    ) -> Result<MeiComparison, CalculationError> {
        let monthly_fee = ensure_positive("monthly_fee", monthly_fee)?;
        let resolution = BracketResolver::new(self.table).resolve(revenue)?;
        let simples_tax = round_half_up(percent_of(revenue, resolution.effective_rate_pct));

        let mei_annual_fee = round_half_up(monthly_fee * Decimal::from(12));
        let tolerance_limit = self.policy.ceiling
            + percent_of(self.policy.ceiling, self.policy.excess_tolerance_pct);
        let mei_applicable = revenue <= tolerance_limit;

        let mei_excess_tax = if revenue > self.policy.ceiling && mei_applicable {
            round_half_up(percent_of(
                revenue - self.policy.ceiling,
                resolution.effective_rate_pct,
            ))
        } else {
            Decimal::ZERO
        };
        let mei_total = mei_annual_fee + mei_excess_tax;

        let (cheaper, savings) = if mei_applicable && mei_total <= simples_tax {
            (Regime::Mei, simples_tax - mei_total)
        } else if mei_applicable {
            (Regime::Simples, mei_total - simples_tax)
        } else {
            (Regime::Simples, Decimal::ZERO)
        };

        Ok(MeiComparison {
            revenue,
            mei_applicable,
            mei_annual_fee,
            mei_excess_tax,
            mei_total,
            simples_tax,
            cheaper,
            savings,
        })
    }
}

/// Annual MEI quote for the regime comparison.
pub fn mei_quote(
    policy: &MeiPolicy,
    activity: Activity,
    annual_revenue: Decimal,
) -> RegimeQuote {
    let Some(monthly_fee) = policy.monthly_fee(activity) else {
        warn!(activity = %activity, "activity cannot register as MEI");
        return RegimeQuote::inapplicable(
            Regime::Mei,
            format!("a atividade {activity} não pode ser MEI"),
        );
    };

    if annual_revenue > policy.ceiling {
        warn!(
            revenue = %annual_revenue,
            ceiling = %policy.ceiling,
            "revenue above the MEI ceiling"
        );
        return RegimeQuote::inapplicable(
            Regime::Mei,
            format!("faturamento acima do teto do MEI (R$ {})", policy.ceiling),
        );
    }

    let annual_fee = round_half_up(monthly_fee * Decimal::from(12));
    RegimeQuote::applicable(Regime::Mei, annual_fee, ratio_pct(annual_fee, annual_revenue))
}
