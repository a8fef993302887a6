//! Non-cumulative PIS/COFINS credits.
//!
//! Each creditable expense generates PIS (1.65%) and COFINS (7.6%) credits.
//! Line amounts are kept exact so the statement total is exactly the sum of
//! `value × 9.25%`; rounding to centavos happens when the credits are
//! netted against a debit.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::common::{
    ensure_non_negative, ensure_positive, max, percent_of, ratio_pct, round_half_up,
};
use crate::models::ExpenseCategory;
use crate::policy::CreditRates;

/// Credits generated by one expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditLine {
    pub category: ExpenseCategory,
    pub amount: Decimal,
    pub pis_credit: Decimal,
    pub cofins_credit: Decimal,
    pub total_credit: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTotals {
    pub base: Decimal,
    pub pis: Decimal,
    pub cofins: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditStatement {
    pub lines: Vec<CreditLine>,
    pub totals: CreditTotals,
}

/// Credits netted against a gross PIS/COFINS debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditOffset {
    pub gross_due: Decimal,
    pub credits_used: Decimal,
    pub net_due: Decimal,
    pub accumulated_credit: Decimal,
}

/// Full non-cumulative picture for one revenue figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditSimulation {
    pub revenue: Decimal,
    pub pis_debit: Decimal,
    pub cofins_debit: Decimal,
    pub pis_credit: Decimal,
    pub cofins_credit: Decimal,
    pub pis_due: Decimal,
    pub cofins_due: Decimal,
    pub gross_due: Decimal,
    pub net_due: Decimal,
    /// Credits actually used against the debits.
    pub savings: Decimal,
    pub savings_pct_of_revenue: Decimal,
    pub accumulated_credit: Decimal,
}

impl CreditStatement {
    /// Nets the total credit against `gross_due`, flooring at zero.
    pub fn offset(
        &self,
        gross_due: Decimal,
    ) -> CreditOffset {
        let credits = round_half_up(self.totals.total);
        net(gross_due, credits)
    }
}

fn net(
    gross_due: Decimal,
    credits: Decimal,
) -> CreditOffset {
    let balance = gross_due - credits;
    if balance < Decimal::ZERO {
        warn!(
            gross_due = %gross_due,
            credits = %credits,
            "credits exceed the debit; excess carried as accumulated credit"
        );
    }

    let net_due = max(balance, Decimal::ZERO);
    CreditOffset {
        gross_due,
        credits_used: gross_due - net_due,
        net_due,
        accumulated_credit: max(-balance, Decimal::ZERO),
    }
}

#[derive(Debug, Clone)]
pub struct CreditLedger<'a> {
    rates: &'a CreditRates,
}

impl<'a> CreditLedger<'a> {
    pub fn new(rates: &'a CreditRates) -> Self {
        Self { rates }
    }

    /// Credits per category, skipping zero amounts.
    ///
    /// # Errors
    ///
    /// - [`CalculationError::InvalidInput`] if an amount is negative.
    /// - [`CalculationError::NoExpensesProvided`] if no amount is positive.
    pub fn calculate(
        &self,
        expenses: &BTreeMap<ExpenseCategory, Decimal>,
    ) -> Result<CreditStatement, CalculationError> {
        for amount in expenses.values() {
            ensure_non_negative("expense", *amount)?;
        }

        let lines: Vec<CreditLine> = expenses
            .iter()
            .filter(|(category, amount)| !amount.is_zero() && category.generates_credit())
            .map(|(category, amount)| self.line(*category, *amount))
            .collect();

        if lines.is_empty() {
            return Err(CalculationError::NoExpensesProvided);
        }

        let totals = lines.iter().fold(CreditTotals::default(), |acc, line| CreditTotals {
            base: acc.base + line.amount,
            pis: acc.pis + line.pis_credit,
            cofins: acc.cofins + line.cofins_credit,
            total: acc.total + line.total_credit,
        });

        debug!(
            categories = lines.len(),
            base = %totals.base,
            total = %totals.total,
            "computed PIS/COFINS credits"
        );

        Ok(CreditStatement { lines, totals })
    }

    /// Debits on `revenue` netted against the credits of `expenses`.
    ///
    /// # Errors
    ///
    /// Same as [`CreditLedger::calculate`], plus
    /// [`CalculationError::InvalidInput`] if `revenue <= 0`.
    pub fn simulate(
        &self,
        expenses: &BTreeMap<ExpenseCategory, Decimal>,
        revenue: Decimal,
    ) -> Result<CreditSimulation, CalculationError> {
        let revenue = ensure_positive("revenue", revenue)?;
        let statement = self.calculate(expenses)?;

        let pis_debit = round_half_up(percent_of(revenue, self.rates.pis_pct));
        let cofins_debit = round_half_up(percent_of(revenue, self.rates.cofins_pct));
        let pis = net(pis_debit, round_half_up(statement.totals.pis));
        let cofins = net(cofins_debit, round_half_up(statement.totals.cofins));

        let savings = pis.credits_used + cofins.credits_used;

        Ok(CreditSimulation {
            revenue,
            pis_debit,
            cofins_debit,
            pis_credit: round_half_up(statement.totals.pis),
            cofins_credit: round_half_up(statement.totals.cofins),
            pis_due: pis.net_due,
            cofins_due: cofins.net_due,
            gross_due: pis_debit + cofins_debit,
            net_due: pis.net_due + cofins.net_due,
            savings,
            savings_pct_of_revenue: ratio_pct(savings, revenue),
            accumulated_credit: pis.accumulated_credit + cofins.accumulated_credit,
        })
    }

    fn line(
        &self,
        category: ExpenseCategory,
        amount: Decimal,
    ) -> CreditLine {
        let pis_credit = percent_of(amount, self.rates.pis_pct);
        let cofins_credit = percent_of(amount, self.rates.cofins_pct);

        CreditLine {
            category,
            amount,
            pis_credit,
            cofins_credit,
            total_credit: pis_credit + cofins_credit,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    fn expenses(entries: &[(ExpenseCategory, Decimal)]) -> BTreeMap<ExpenseCategory, Decimal> {
        entries.iter().copied().collect()
    }

    fn industrial_expenses() -> BTreeMap<ExpenseCategory, Decimal> {
        expenses(&[
            (ExpenseCategory::Insumos, dec!(400000)),
            (ExpenseCategory::Energia, dec!(50000)),
            (ExpenseCategory::Frete, dec!(30000)),
        ])
    }

    // =========================================================================
    // calculate tests
    // =========================================================================

    #[test]
    fn calculate_sums_credits_per_category() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let statement = ledger.calculate(&industrial_expenses()).unwrap();

        assert_eq!(statement.lines.len(), 3);
        assert_eq!(statement.totals.base, dec!(480000));
        assert_eq!(statement.totals.pis, dec!(7920));
        assert_eq!(statement.totals.cofins, dec!(36480));
        assert_eq!(statement.totals.total, dec!(44400));
    }

    #[test]
    fn calculate_line_uses_both_rates() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let statement = ledger
            .calculate(&expenses(&[(ExpenseCategory::Aluguel, dec!(1000))]))
            .unwrap();

        assert_eq!(
            statement.lines[0],
            CreditLine {
                category: ExpenseCategory::Aluguel,
                amount: dec!(1000),
                pis_credit: dec!(16.5),
                cofins_credit: dec!(76),
                total_credit: dec!(92.5),
            }
        );
    }

    #[test]
    fn calculate_skips_zero_entries() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let statement = ledger
            .calculate(&expenses(&[
                (ExpenseCategory::Insumos, dec!(100)),
                (ExpenseCategory::Aluguel, Decimal::ZERO),
            ]))
            .unwrap();

        assert_eq!(statement.lines.len(), 1);
        assert_eq!(statement.lines[0].category, ExpenseCategory::Insumos);
    }

    #[test]
    fn calculate_rejects_empty_map() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let result = ledger.calculate(&BTreeMap::new());

        assert_eq!(result, Err(CalculationError::NoExpensesProvided));
    }

    #[test]
    fn calculate_rejects_all_zero_entries() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let result = ledger.calculate(&expenses(&[(ExpenseCategory::Frete, Decimal::ZERO)]));

        assert_eq!(result, Err(CalculationError::NoExpensesProvided));
    }

    #[test]
    fn calculate_rejects_negative_entry() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let result = ledger.calculate(&expenses(&[
            (ExpenseCategory::Insumos, dec!(100)),
            (ExpenseCategory::Devolucoes, dec!(-5)),
        ]));

        assert!(matches!(
            result,
            Err(CalculationError::InvalidInput { field: "expense", .. })
        ));
    }

    // =========================================================================
    // offset tests
    // =========================================================================

    #[test]
    fn offset_reduces_gross_due() {
        let rates = CreditRates::default();
        let statement = CreditLedger::new(&rates)
            .calculate(&industrial_expenses())
            .unwrap();

        let offset = statement.offset(dec!(265000));

        assert_eq!(
            offset,
            CreditOffset {
                gross_due: dec!(265000),
                credits_used: dec!(44400),
                net_due: dec!(220600),
                accumulated_credit: dec!(0),
            }
        );
    }

    #[test]
    fn offset_floors_at_zero_and_accumulates_excess() {
        let rates = CreditRates::default();
        let statement = CreditLedger::new(&rates)
            .calculate(&industrial_expenses())
            .unwrap();

        let offset = statement.offset(dec!(40000));

        assert_eq!(offset.net_due, dec!(0));
        assert_eq!(offset.credits_used, dec!(40000));
        assert_eq!(offset.accumulated_credit, dec!(4400));
    }

    // =========================================================================
    // simulate tests
    // =========================================================================

    #[test]
    fn simulate_nets_debits_on_revenue() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let simulation = ledger
            .simulate(&industrial_expenses(), dec!(1000000))
            .unwrap();

        assert_eq!(simulation.pis_debit, dec!(16500.00));
        assert_eq!(simulation.cofins_debit, dec!(76000.00));
        assert_eq!(simulation.gross_due, dec!(92500.00));
        assert_eq!(simulation.net_due, dec!(48100.00));
        assert_eq!(simulation.savings, dec!(44400.00));
        assert_eq!(simulation.savings_pct_of_revenue, dec!(4.44));
        assert_eq!(simulation.accumulated_credit, dec!(0));
    }

    #[test]
    fn simulate_rejects_zero_revenue() {
        let rates = CreditRates::default();
        let ledger = CreditLedger::new(&rates);

        let result = ledger.simulate(&industrial_expenses(), Decimal::ZERO);

        assert!(result.is_err());
    }
}
