//! Lucro Real calculations.
//!
//! IRPJ and CSLL are charged on the actual accounting profit; PIS and COFINS
//! follow the non-cumulative regime, where credits on purchases offset the
//! debits on revenue.
//!
//! | Line | Description |
//! |------|-------------|
//! | 1 | Accounting profit: revenue − operating expenses − payroll |
//! | 2 | Loss offset: min(prior losses, line 1 × 30%), only when line 1 > 0 |
//! | 3 | Taxable profit: line 1 − line 2 |
//! | 4 | IRPJ: line 3 × 15% |
//! | 5 | Adicional: (line 3 − R$20,000 × months) × 10%, minimum 0 |
//! | 6 | CSLL: line 3 × 9% |
//! | 7 | PIS: revenue × 1.65% − PIS credits, minimum 0 |
//! | 8 | COFINS: revenue × 7.6% − COFINS credits, minimum 0 |
//! | 9 | Total: lines 4 + 5 + 6 + 7 + 8 |
//!
//! A loss (line 1 ≤ 0) produces no IRPJ/CSLL and is reported as prejuízo
//! fiscal. Credits above the debits are reported as crédito acumulado and
//! carried forward, never refunded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::common::{
    ensure_non_negative, ensure_positive, max, percent_of, ratio_pct, round_half_up,
};
use crate::models::{ApurationPeriod, TaxComponent, TaxResult};
use crate::policy::{CreditRates, RealPolicy};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualProfitInput {
    pub revenue: Decimal,
    pub operating_expenses: Decimal,
    pub payroll: Decimal,
    pub pis_credits: Decimal,
    pub cofins_credits: Decimal,
    pub period: ApurationPeriod,
    /// Prior-period tax loss available for compensation.
    pub compensable_loss: Decimal,
}

impl ActualProfitInput {
    /// Input without credits or prior losses.
    pub fn new(
        revenue: Decimal,
        operating_expenses: Decimal,
        payroll: Decimal,
        period: ApurationPeriod,
    ) -> Self {
        Self {
            revenue,
            operating_expenses,
            payroll,
            pis_credits: Decimal::ZERO,
            cofins_credits: Decimal::ZERO,
            period,
            compensable_loss: Decimal::ZERO,
        }
    }
}

/// Debit, credit and balance of one non-cumulative contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonCumulativeLine {
    pub debit: Decimal,
    pub credit: Decimal,
    pub due: Decimal,
    pub accumulated_credit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualProfitResult {
    pub accounting_profit: Decimal,
    pub is_loss: bool,
    /// Loss of this period, reported for carryforward.
    pub tax_loss: Decimal,
    pub loss_offset_used: Decimal,
    /// Prior losses not used this period plus this period's loss.
    pub remaining_loss: Decimal,
    pub taxable_profit: Decimal,
    pub irpj: Decimal,
    pub irpj_surtax: Decimal,
    pub csll: Decimal,
    pub pis: NonCumulativeLine,
    pub cofins: NonCumulativeLine,
    pub accumulated_credit: Decimal,
    pub total: Decimal,
    pub effective_rate_pct: Decimal,
}

impl ActualProfitResult {
    pub fn income_taxes(&self) -> Decimal {
        self.irpj + self.irpj_surtax + self.csll
    }

    pub fn tax_result(&self) -> TaxResult {
        TaxResult::new(
            self.effective_rate_pct,
            self.effective_rate_pct,
            [
                (TaxComponent::Irpj, self.irpj),
                (TaxComponent::IrpjAdicional, self.irpj_surtax),
                (TaxComponent::Csll, self.csll),
                (TaxComponent::Pis, self.pis.due),
                (TaxComponent::Cofins, self.cofins.due),
            ],
        )
    }
}

#[derive(Debug, Clone)]
pub struct ActualProfitCalculator<'a> {
    policy: &'a RealPolicy,
    rates: &'a CreditRates,
}

impl<'a> ActualProfitCalculator<'a> {
    pub fn new(
        policy: &'a RealPolicy,
        rates: &'a CreditRates,
    ) -> Self {
        Self { policy, rates }
    }

    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if revenue is not positive
    /// or any other amount is negative.
    pub fn calculate(
        &self,
        input: &ActualProfitInput,
    ) -> Result<ActualProfitResult, CalculationError> {
        let revenue = ensure_positive("revenue", input.revenue)?;
        let expenses = ensure_non_negative("operating_expenses", input.operating_expenses)?;
        let payroll = ensure_non_negative("payroll", input.payroll)?;
        let pis_credits = ensure_non_negative("pis_credits", input.pis_credits)?;
        let cofins_credits = ensure_non_negative("cofins_credits", input.cofins_credits)?;
        let compensable_loss = ensure_non_negative("compensable_loss", input.compensable_loss)?;

        let accounting_profit = round_half_up(revenue - expenses - payroll);
        let is_loss = accounting_profit <= Decimal::ZERO;

        let (tax_loss, loss_offset_used, taxable_profit) = if is_loss {
            (-accounting_profit, Decimal::ZERO, Decimal::ZERO)
        } else {
            let used = self.loss_offset(accounting_profit, compensable_loss);
            (Decimal::ZERO, used, accounting_profit - used)
        };
        let remaining_loss = compensable_loss - loss_offset_used + tax_loss;

        let irpj = round_half_up(percent_of(taxable_profit, self.policy.irpj_rate_pct));
        let irpj_surtax = self.surtax(taxable_profit, input.period);
        let csll = round_half_up(percent_of(taxable_profit, self.policy.csll_rate_pct));

        let pis = self.non_cumulative(revenue, self.rates.pis_pct, pis_credits);
        let cofins = self.non_cumulative(revenue, self.rates.cofins_pct, cofins_credits);
        let accumulated_credit = pis.accumulated_credit + cofins.accumulated_credit;

        let total = irpj + irpj_surtax + csll + pis.due + cofins.due;

        debug!(
            revenue = %revenue,
            accounting_profit = %accounting_profit,
            taxable_profit = %taxable_profit,
            total = %total,
            "computed Lucro Real"
        );

        Ok(ActualProfitResult {
            accounting_profit,
            is_loss,
            tax_loss,
            loss_offset_used,
            remaining_loss,
            taxable_profit,
            irpj,
            irpj_surtax,
            csll,
            pis,
            cofins,
            accumulated_credit,
            total,
            effective_rate_pct: ratio_pct(total, revenue),
        })
    }

    /// Prior losses usable against `profit` (the 30% cap).
    fn loss_offset(
        &self,
        profit: Decimal,
        available: Decimal,
    ) -> Decimal {
        let cap = round_half_up(percent_of(profit, self.policy.loss_offset_limit_pct));
        if available > cap { cap } else { available }
    }

    fn surtax(
        &self,
        taxable_profit: Decimal,
        period: ApurationPeriod,
    ) -> Decimal {
        let threshold = self.policy.surtax_monthly_threshold * Decimal::from(period.months());
        let excess = max(taxable_profit - threshold, Decimal::ZERO);
        round_half_up(percent_of(excess, self.policy.surtax_rate_pct))
    }

    fn non_cumulative(
        &self,
        revenue: Decimal,
        rate_pct: Decimal,
        credit: Decimal,
    ) -> NonCumulativeLine {
        let debit = round_half_up(percent_of(revenue, rate_pct));
        let credit = round_half_up(credit);
        let balance = debit - credit;

        if balance < Decimal::ZERO {
            warn!(
                debit = %debit,
                credit = %credit,
                "credits exceed debit; amount due floored at zero"
            );
        }

        NonCumulativeLine {
            debit,
            credit,
            due: max(balance, Decimal::ZERO),
            accumulated_credit: max(-balance, Decimal::ZERO),
        }
    }
}
