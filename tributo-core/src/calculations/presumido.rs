//! Lucro Presumido calculations.
//!
//! IRPJ and CSLL are charged on a presumed profit (a fixed share of revenue
//! per activity); PIS and COFINS follow the cumulative regime and therefore
//! take no credits.
//!
//! | Line | Description |
//! |------|-------------|
//! | 1 | IRPJ base: revenue × IRPJ presumption (8%, 16% or 32%) |
//! | 2 | IRPJ: line 1 × 15% |
//! | 3 | Adicional: (line 1 − R$20,000 × months) × 10%, minimum 0 |
//! | 4 | CSLL base: revenue × CSLL presumption (12% or 32%) |
//! | 5 | CSLL: line 4 × 9% |
//! | 6 | PIS: revenue × 0.65% |
//! | 7 | COFINS: revenue × 3% |
//! | 8 | Total: lines 2 + 3 + 5 + 6 + 7 |
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tributo_core::calculations::{PresumedProfitCalculator, PresumedProfitInput};
//! use tributo_core::policy::PresumidoPolicy;
//! use tributo_core::{Activity, ApurationPeriod};
//!
//! let policy = PresumidoPolicy::default();
//! let calculator = PresumedProfitCalculator::new(&policy);
//! let result = calculator
//!     .calculate(&PresumedProfitInput {
//!         revenue: dec!(1000000),
//!         activity: Activity::Comercio,
//!         period: ApurationPeriod::Trimestral,
//!     })
//!     .unwrap();
//!
//! assert_eq!(result.irpj, dec!(12000.00));
//! assert_eq!(result.irpj_surtax, dec!(2000.00));
//! assert_eq!(result.total, dec!(61300.00));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CalculationError;
use crate::calculations::common::{ensure_positive, max, percent_of, ratio_pct, round_half_up};
use crate::models::{Activity, ApurationPeriod, TaxComponent, TaxResult};
use crate::policy::PresumidoPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresumedProfitInput {
    /// Gross revenue for the period.
    pub revenue: Decimal,
    pub activity: Activity,
    pub period: ApurationPeriod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresumedProfitResult {
    pub irpj_base: Decimal,
    pub csll_base: Decimal,
    pub irpj: Decimal,
    pub irpj_surtax: Decimal,
    pub csll: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub total: Decimal,
    pub effective_rate_pct: Decimal,
}

impl PresumedProfitResult {
    pub fn tax_result(&self) -> TaxResult {
        TaxResult::new(
            self.effective_rate_pct,
            self.effective_rate_pct,
            [
                (TaxComponent::Irpj, self.irpj),
                (TaxComponent::IrpjAdicional, self.irpj_surtax),
                (TaxComponent::Csll, self.csll),
                (TaxComponent::Pis, self.pis),
                (TaxComponent::Cofins, self.cofins),
            ],
        )
    }
}

#[derive(Debug, Clone)]
pub struct PresumedProfitCalculator<'a> {
    policy: &'a PresumidoPolicy,
}

impl<'a> PresumedProfitCalculator<'a> {
    pub fn new(policy: &'a PresumidoPolicy) -> Self {
        Self { policy }
    }

    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if revenue is not positive
    /// or the policy has no presumption for the activity.
    pub fn calculate(
        &self,
        input: &PresumedProfitInput,
    ) -> Result<PresumedProfitResult, CalculationError> {
        let revenue = ensure_positive("revenue", input.revenue)?;
        let presumption = self.policy.presumption(input.activity)?;

        let irpj_base = round_half_up(percent_of(revenue, presumption.irpj_pct));
        let csll_base = round_half_up(percent_of(revenue, presumption.csll_pct));

        let irpj = round_half_up(percent_of(irpj_base, self.policy.irpj_rate_pct));
        let irpj_surtax = self.surtax(irpj_base, input.period);
        let csll = round_half_up(percent_of(csll_base, self.policy.csll_rate_pct));
        let pis = round_half_up(percent_of(revenue, self.policy.pis_rate_pct));
        let cofins = round_half_up(percent_of(revenue, self.policy.cofins_rate_pct));

        let total = irpj + irpj_surtax + csll + pis + cofins;

        Ok(PresumedProfitResult {
            irpj_base,
            csll_base,
            irpj,
            irpj_surtax,
            csll,
            pis,
            cofins,
            total,
            effective_rate_pct: ratio_pct(total, revenue),
        })
    }

    /// Adicional de IRPJ over the period threshold.
    fn surtax(
        &self,
        irpj_base: Decimal,
        period: ApurationPeriod,
    ) -> Decimal {
        let threshold = self.policy.surtax_monthly_threshold * Decimal::from(period.months());
        let excess = max(irpj_base - threshold, Decimal::ZERO);
        round_half_up(percent_of(excess, self.policy.surtax_rate_pct))
    }
}
