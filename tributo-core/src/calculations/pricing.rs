//! Sale price from costs, taxes and a target margin.
//!
//! ```text
//! price = (unit cost + fixed expenses / quantity)
//!         / (1 − (variable % + tax % + margin %) / 100)
//! ```
//!
//! The tax percentage depends on the regime: the Simples effective rate, the
//! revenue-equivalent Presumido rate, or the non-cumulative PIS/COFINS rate
//! under Lucro Real, where the margin is grossed up so it survives IRPJ and
//! CSLL on profit.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::CalculationError;
use crate::calculations::bracket_resolver::BracketResolver;
use crate::calculations::common::{
    checked_product, ensure_non_negative, ensure_percentage, ensure_positive, max, percent_of,
    ratio_pct, round_half_up,
};
use crate::models::{Activity, Anexo, Regime};
use crate::policy::TaxPolicy;

/// Margin offsets examined by the sensitivity scenarios.
const MARGIN_STEPS: [Decimal; 5] = [dec!(-10), dec!(-5), dec!(0), dec!(5), dec!(10)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum PricingRegime {
    Simples { anexo: Anexo, rbt12: Decimal },
    Presumido { activity: Activity },
    Real,
}

impl PricingRegime {
    pub fn regime(&self) -> Regime {
        match self {
            Self::Simples { .. } => Regime::Simples,
            Self::Presumido { .. } => Regime::Presumido,
            Self::Real => Regime::Real,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    pub unit_cost: Decimal,
    pub monthly_fixed_expenses: Decimal,
    pub variable_expenses_pct: Decimal,
    pub monthly_quantity: Decimal,
    pub desired_margin_pct: Decimal,
    pub regime: PricingRegime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSummary {
    pub sale_price: Decimal,
    /// Price covering costs and taxes with zero margin.
    pub minimum_price: Decimal,
    /// `sale_price / total unit cost`.
    pub markup: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSummary {
    pub unit_cost: Decimal,
    pub fixed_per_unit: Decimal,
    pub total_unit_cost: Decimal,
    pub variable_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSummary {
    pub regime: Regime,
    pub rate_pct: Decimal,
    pub per_unit: Decimal,
    pub monthly: Decimal,
    /// IRPJ/CSLL on the monthly profit; only charged separately under Lucro Real.
    pub monthly_income_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingOutcome {
    pub monthly_revenue: Decimal,
    pub monthly_profit: Decimal,
    pub net_margin_pct: Decimal,
    /// Units per month covering the fixed expenses; `None` when each sale
    /// loses money.
    pub break_even_units: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingScenario {
    pub label: String,
    pub regime: Regime,
    pub margin_pct: Decimal,
    pub tax_rate_pct: Decimal,
    pub price: Decimal,
    pub monthly_profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub prices: PriceSummary,
    pub costs: CostSummary,
    pub taxes: TaxSummary,
    pub outcome: PricingOutcome,
    pub scenarios: Vec<PricingScenario>,
}

#[derive(Debug, Clone)]
pub struct PricingCalculator<'a> {
    policy: &'a TaxPolicy,
}

impl<'a> PricingCalculator<'a> {
    pub fn new(policy: &'a TaxPolicy) -> Self {
        Self { policy }
    }

    /// Price for the input regime, with margin sensitivity scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] for a non-positive
    /// quantity, negative costs, percentages outside 0-100, or when
    /// variable expenses, taxes and margin take the whole price.
    pub fn calculate(
        &self,
        input: &PricingInput,
    ) -> Result<PricingResult, CalculationError> {
        let mut result = self.price(input, &input.regime)?;

        for step in MARGIN_STEPS {
            let margin_pct = input.desired_margin_pct + step;
            if margin_pct < Decimal::ZERO {
                continue;
            }
            let variant = PricingInput {
                desired_margin_pct: margin_pct,
                ..input.clone()
            };
            // Margins whose denominator reaches zero have no price.
            if let Ok(priced) = self.price(&variant, &input.regime) {
                result.scenarios.push(PricingScenario {
                    label: format!("Margem {margin_pct}%"),
                    regime: input.regime.regime(),
                    margin_pct,
                    tax_rate_pct: priced.taxes.rate_pct,
                    price: priced.prices.sale_price,
                    monthly_profit: priced.outcome.monthly_profit,
                });
            }
        }

        Ok(result)
    }

    /// Price for the input regime, with one scenario per regime in
    /// `regimes`.
    ///
    /// # Errors
    ///
    /// Same as [`PricingCalculator::calculate`]; a regime whose price cannot
    /// be computed fails the whole comparison.
    pub fn compare(
        &self,
        input: &PricingInput,
        regimes: &[PricingRegime],
    ) -> Result<PricingResult, CalculationError> {
        let mut result = self.price(input, &input.regime)?;

        for regime in regimes {
            let priced = self.price(input, regime)?;
            result.scenarios.push(PricingScenario {
                label: regime.regime().label().to_string(),
                regime: regime.regime(),
                margin_pct: input.desired_margin_pct,
                tax_rate_pct: priced.taxes.rate_pct,
                price: priced.prices.sale_price,
                monthly_profit: priced.outcome.monthly_profit,
            });
        }

        Ok(result)
    }

    fn price(
        &self,
        input: &PricingInput,
        regime: &PricingRegime,
    ) -> Result<PricingResult, CalculationError> {
        let unit_cost = ensure_non_negative("unit_cost", input.unit_cost)?;
        let fixed = ensure_non_negative("monthly_fixed_expenses", input.monthly_fixed_expenses)?;
        let quantity = ensure_positive("monthly_quantity", input.monthly_quantity)?;
        let variable_pct = ensure_percentage("variable_expenses_pct", input.variable_expenses_pct)?;
        let margin_pct = ensure_percentage("desired_margin_pct", input.desired_margin_pct)?;

        let tax_rate_pct = self.tax_rate(regime)?;
        let income_tax_pct = self.income_tax_pct(regime);
        if income_tax_pct >= Decimal::ONE_HUNDRED {
            return Err(CalculationError::invalid(
                "income_tax_pct",
                format!("IRPJ, adicional and CSLL add up to {income_tax_pct}% of profit"),
            ));
        }
        let effective_margin_pct = if income_tax_pct.is_zero() {
            margin_pct
        } else {
            margin_pct / (Decimal::ONE - income_tax_pct / Decimal::ONE_HUNDRED)
        };

        let fixed_per_unit = fixed / quantity;
        let total_unit_cost = unit_cost + fixed_per_unit;

        let sale_price = round_half_up(self.gross_up(
            total_unit_cost,
            variable_pct + tax_rate_pct + effective_margin_pct,
        )?);
        let minimum_price =
            round_half_up(self.gross_up(total_unit_cost, variable_pct + tax_rate_pct)?);

        let variable_per_unit = percent_of(sale_price, variable_pct);
        let tax_per_unit = percent_of(sale_price, tax_rate_pct);
        let contribution = sale_price - unit_cost - variable_per_unit - tax_per_unit;

        let per_month = |per_unit| checked_product("monthly_quantity", per_unit, quantity);
        let monthly_revenue = round_half_up(per_month(sale_price)?);
        let monthly_tax = round_half_up(per_month(tax_per_unit)?);
        let profit_before_income_tax = round_half_up(per_month(contribution)? - fixed);
        let monthly_income_tax = round_half_up(percent_of(
            max(profit_before_income_tax, Decimal::ZERO),
            income_tax_pct,
        ));
        let monthly_profit = profit_before_income_tax - monthly_income_tax;

        let break_even_units = if contribution > Decimal::ZERO {
            Some((fixed / contribution).ceil())
        } else {
            None
        };

        debug!(
            regime = %regime.regime(),
            tax_rate_pct = %tax_rate_pct,
            sale_price = %sale_price,
            "priced product"
        );

        Ok(PricingResult {
            prices: PriceSummary {
                sale_price,
                minimum_price,
                markup: if total_unit_cost.is_zero() {
                    Decimal::ZERO
                } else {
                    round_half_up(sale_price / total_unit_cost)
                },
            },
            costs: CostSummary {
                unit_cost,
                fixed_per_unit: round_half_up(fixed_per_unit),
                total_unit_cost: round_half_up(total_unit_cost),
                variable_per_unit: round_half_up(variable_per_unit),
            },
            taxes: TaxSummary {
                regime: regime.regime(),
                rate_pct: tax_rate_pct,
                per_unit: round_half_up(tax_per_unit),
                monthly: monthly_tax,
                monthly_income_tax,
            },
            outcome: PricingOutcome {
                monthly_revenue,
                monthly_profit,
                net_margin_pct: ratio_pct(monthly_profit, monthly_revenue),
                break_even_units,
            },
            scenarios: Vec::new(),
        })
    }

    /// `cost / (1 - deductions / 100)`.
    fn gross_up(
        &self,
        cost: Decimal,
        deductions_pct: Decimal,
    ) -> Result<Decimal, CalculationError> {
        let denominator = Decimal::ONE - deductions_pct / Decimal::ONE_HUNDRED;
        if denominator <= Decimal::ZERO {
            return Err(CalculationError::invalid(
                "desired_margin_pct",
                format!(
                    "variable expenses, taxes and margin add up to {deductions_pct}% of the price"
                ),
            ));
        }
        cost.checked_div(denominator).ok_or_else(|| {
            CalculationError::invalid(
                "desired_margin_pct",
                format!("price for a {deductions_pct}% deduction is out of range"),
            )
        })
    }

    /// Tax on revenue as a percentage of the sale price.
    fn tax_rate(
        &self,
        regime: &PricingRegime,
    ) -> Result<Decimal, CalculationError> {
        match regime {
            PricingRegime::Simples { anexo, rbt12 } => {
                let table = self.policy.simples.table(*anexo)?;
                Ok(BracketResolver::new(table).resolve(*rbt12)?.effective_rate_pct)
            }
            PricingRegime::Presumido { activity } => {
                let presumido = &self.policy.presumido;
                let presumption = presumido.presumption(*activity)?;
                Ok(
                    percent_of(presumption.irpj_pct, presumido.irpj_rate_pct)
                        + percent_of(presumption.csll_pct, presumido.csll_rate_pct)
                        + presumido.pis_rate_pct
                        + presumido.cofins_rate_pct,
                )
            }
            PricingRegime::Real => Ok(self.policy.credits.combined_pct()),
        }
    }

    /// IRPJ (with adicional) and CSLL charged on profit, Lucro Real only.
    fn income_tax_pct(
        &self,
        regime: &PricingRegime,
    ) -> Decimal {
        match regime {
            PricingRegime::Real => {
                let real = &self.policy.real;
                real.irpj_rate_pct + real.surtax_rate_pct + real.csll_rate_pct
            }
            _ => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::calculations::common::MAX_AMOUNT;

    fn simples_input() -> PricingInput {
        PricingInput {
            unit_cost: dec!(60),
            monthly_fixed_expenses: dec!(10000),
            variable_expenses_pct: dec!(6),
            monthly_quantity: dec!(1000),
            desired_margin_pct: dec!(20),
            regime: PricingRegime::Simples {
                anexo: Anexo::I,
                rbt12: dec!(180000),
            },
        }
    }

    // =========================================================================
    // calculate tests
    // =========================================================================

    #[test]
    fn calculate_simples_price() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);

        let result = calculator.calculate(&simples_input()).unwrap();

        // 70 / (1 - (6 + 4 + 20) / 100)
        assert_eq!(
            result.prices,
            PriceSummary {
                sale_price: dec!(100.00),
                minimum_price: dec!(77.78),
                markup: dec!(1.43),
            }
        );
        assert_eq!(result.taxes.rate_pct, dec!(4));
        assert_eq!(result.taxes.monthly, dec!(4000.00));
        assert_eq!(result.outcome.monthly_revenue, dec!(100000.00));
        assert_eq!(result.outcome.monthly_profit, dec!(20000.00));
        assert_eq!(result.outcome.net_margin_pct, dec!(20));
        // 10000 / 30 per unit
        assert_eq!(result.outcome.break_even_units, Some(dec!(334)));
    }

    #[test]
    fn calculate_adds_margin_scenarios() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);

        let result = calculator.calculate(&simples_input()).unwrap();

        let margins: Vec<Decimal> = result.scenarios.iter().map(|s| s.margin_pct).collect();
        assert_eq!(margins, vec![dec!(10), dec!(15), dec!(20), dec!(25), dec!(30)]);
        assert_eq!(result.scenarios[2].price, result.prices.sale_price);
    }

    #[test]
    fn calculate_skips_negative_margin_scenarios() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.desired_margin_pct = dec!(5);

        let result = calculator.calculate(&input).unwrap();

        assert_eq!(result.scenarios.len(), 4);
        assert_eq!(result.scenarios[0].margin_pct, dec!(0));
    }

    #[test]
    fn calculate_rejects_full_price_deductions() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.variable_expenses_pct = dec!(50);
        input.desired_margin_pct = dec!(46);

        let result = calculator.calculate(&input);

        assert!(matches!(
            result,
            Err(CalculationError::InvalidInput { field: "desired_margin_pct", .. })
        ));
    }

    #[test]
    fn calculate_rejects_zero_quantity() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.monthly_quantity = Decimal::ZERO;

        assert!(calculator.calculate(&input).is_err());
    }

    #[test]
    fn calculate_rejects_monthly_totals_out_of_range() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.unit_cost = MAX_AMOUNT;
        input.monthly_quantity = MAX_AMOUNT;

        let result = calculator.calculate(&input);

        assert!(matches!(
            result,
            Err(CalculationError::InvalidInput { field: "monthly_quantity", .. })
        ));
    }

    #[test]
    fn real_rejects_income_tax_of_whole_profit() {
        let mut policy = TaxPolicy::default();
        policy.real.irpj_rate_pct = dec!(50);
        policy.real.surtax_rate_pct = dec!(10);
        policy.real.csll_rate_pct = dec!(40);
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.regime = PricingRegime::Real;

        let result = calculator.calculate(&input);

        assert!(matches!(
            result,
            Err(CalculationError::InvalidInput { field: "income_tax_pct", .. })
        ));
    }

    // =========================================================================
    // tax_rate tests
    // =========================================================================

    #[test]
    fn tax_rate_presumido_comercio() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);

        let rate = calculator
            .tax_rate(&PricingRegime::Presumido {
                activity: Activity::Comercio,
            })
            .unwrap();

        // 8% × 15% + 12% × 9% + 0.65% + 3%
        assert_eq!(rate, dec!(5.93));
    }

    #[test]
    fn real_regime_charges_income_tax_on_profit() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let mut input = simples_input();
        input.regime = PricingRegime::Real;

        let result = calculator.calculate(&input).unwrap();

        assert_eq!(result.taxes.rate_pct, dec!(9.25));
        assert!(result.taxes.monthly_income_tax > Decimal::ZERO);
        assert!(result.prices.sale_price > dec!(100));
    }

    // =========================================================================
    // compare tests
    // =========================================================================

    #[test]
    fn compare_prices_every_regime() {
        let policy = TaxPolicy::default();
        let calculator = PricingCalculator::new(&policy);
        let regimes = [
            PricingRegime::Simples {
                anexo: Anexo::I,
                rbt12: dec!(180000),
            },
            PricingRegime::Presumido {
                activity: Activity::Comercio,
            },
            PricingRegime::Real,
        ];

        let result = calculator.compare(&simples_input(), &regimes).unwrap();

        let labels: Vec<&str> = result.scenarios.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["Simples Nacional", "Lucro Presumido", "Lucro Real"]);
        assert_eq!(result.scenarios[0].price, dec!(100.00));
    }
}
