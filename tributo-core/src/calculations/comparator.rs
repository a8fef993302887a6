//! Side-by-side regime comparison for one company snapshot.
//!
//! Quotes Simples Nacional, Lucro Presumido and Lucro Real for the same
//! annual figures, plus MEI when revenue is within the MEI ceiling, and
//! ranks the applicable ones by annual tax.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::bracket_resolver::{BracketResolution, BracketResolver};
use crate::calculations::common::{ensure_non_negative, ensure_positive, round_half_up};
use crate::calculations::credits::CreditLedger;
use crate::calculations::fator_r::{AnexoSelection, FatorRClassifier};
use crate::calculations::mei::mei_quote;
use crate::calculations::presumido::{
    PresumedProfitCalculator, PresumedProfitInput, PresumedProfitResult,
};
use crate::calculations::real::{ActualProfitCalculator, ActualProfitInput, ActualProfitResult};
use crate::models::{Activity, ApurationPeriod, ExpenseCategory, Regime, RegimeQuote};
use crate::policy::TaxPolicy;

/// Distance from the Fator R threshold that triggers a hint.
const FATOR_R_HINT_BAND: Decimal = dec!(0.05);
/// Share of the MEI ceiling above which the ceiling is flagged.
const MEI_CEILING_WARNING_PCT: Decimal = dec!(80);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonInput {
    pub annual_revenue: Decimal,
    pub annual_payroll: Decimal,
    pub annual_operating_expenses: Decimal,
    pub activity: Activity,
    /// Purchases generating PIS/COFINS credit under Lucro Real.
    pub creditable_expenses: Option<BTreeMap<ExpenseCategory, Decimal>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplesDetail {
    pub selection: AnexoSelection,
    pub resolution: BracketResolution,
    pub annual_tax: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeComparison {
    /// Every quote produced, applicable or not, in regime order.
    pub quotes: Vec<RegimeQuote>,
    /// Applicable quotes, cheapest first.
    pub ranking: Vec<RegimeQuote>,
    pub best_regime: Option<Regime>,
    /// Difference between the two cheapest applicable regimes.
    pub annual_savings: Decimal,
    pub simples: Option<SimplesDetail>,
    pub presumido: Option<PresumedProfitResult>,
    pub real: ActualProfitResult,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RegimeComparator<'a> {
    policy: &'a TaxPolicy,
}

impl<'a> RegimeComparator<'a> {
    pub fn new(policy: &'a TaxPolicy) -> Self {
        Self { policy }
    }

    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if revenue is not positive
    /// or payroll, expenses or a creditable expense is negative.
    pub fn compare(
        &self,
        input: &ComparisonInput,
    ) -> Result<RegimeComparison, CalculationError> {
        let revenue = ensure_positive("annual_revenue", input.annual_revenue)?;
        ensure_non_negative("annual_payroll", input.annual_payroll)?;
        ensure_non_negative("annual_operating_expenses", input.annual_operating_expenses)?;

        let mut quotes = Vec::with_capacity(4);

        let simples = self.simples(input)?;
        quotes.push(match &simples {
            Some(detail) => RegimeQuote::applicable(
                Regime::Simples,
                detail.annual_tax,
                detail.resolution.effective_rate_pct,
            ),
            None => self.inapplicable(
                Regime::Simples,
                format!(
                    "faturamento acima do limite do Simples Nacional (R$ {})",
                    self.policy.simples.ceiling
                ),
            ),
        });

        let presumido = self.presumido(input)?;
        quotes.push(match &presumido {
            Some(result) => {
                RegimeQuote::applicable(Regime::Presumido, result.total, result.effective_rate_pct)
            }
            None => self.inapplicable(
                Regime::Presumido,
                format!(
                    "faturamento acima do limite do Lucro Presumido (R$ {})",
                    self.policy.presumido.ceiling
                ),
            ),
        });

        let real = self.real(input)?;
        quotes.push(RegimeQuote::applicable(
            Regime::Real,
            real.total,
            real.effective_rate_pct,
        ));

        if revenue <= self.policy.mei.ceiling {
            quotes.push(mei_quote(&self.policy.mei, input.activity, revenue));
        }

        let ranking = rank(&quotes);
        let best_regime = ranking.first().map(|quote| quote.regime);
        let annual_savings = match ranking.as_slice() {
            [first, second, ..] => second.annual_tax - first.annual_tax,
            _ => Decimal::ZERO,
        };

        debug!(
            revenue = %revenue,
            best_regime = ?best_regime,
            annual_savings = %annual_savings,
            "compared regimes"
        );

        let mut comparison = RegimeComparison {
            quotes,
            ranking,
            best_regime,
            annual_savings,
            simples,
            presumido,
            real,
            recommendations: Vec::new(),
        };
        comparison.recommendations = self.recommendations(input, &comparison);

        Ok(comparison)
    }

    fn inapplicable(
        &self,
        regime: Regime,
        reason: String,
    ) -> RegimeQuote {
        warn!(regime = %regime, reason = %reason, "regime not applicable");
        RegimeQuote::inapplicable(regime, reason)
    }

    fn simples(
        &self,
        input: &ComparisonInput,
    ) -> Result<Option<SimplesDetail>, CalculationError> {
        if input.annual_revenue > self.policy.simples.ceiling {
            return Ok(None);
        }

        let classifier = FatorRClassifier::new(self.policy.simples.fator_r_threshold);
        let monthly_payroll = input.annual_payroll / Decimal::from(12);
        let selection =
            classifier.anexo_for(input.activity, monthly_payroll, input.annual_revenue)?;

        let table = self.policy.simples.table(selection.anexo)?;
        let resolver = BracketResolver::new(table);
        let resolution = resolver.resolve(input.annual_revenue)?;
        let annual_tax = resolver.tax_for(input.annual_revenue)?.amount_due;

        Ok(Some(SimplesDetail {
            selection,
            resolution,
            annual_tax,
        }))
    }

    fn presumido(
        &self,
        input: &ComparisonInput,
    ) -> Result<Option<PresumedProfitResult>, CalculationError> {
        if input.annual_revenue > self.policy.presumido.ceiling {
            return Ok(None);
        }

        PresumedProfitCalculator::new(&self.policy.presumido)
            .calculate(&PresumedProfitInput {
                revenue: input.annual_revenue,
                activity: input.activity,
                period: ApurationPeriod::Anual,
            })
            .map(Some)
    }

    fn real(
        &self,
        input: &ComparisonInput,
    ) -> Result<ActualProfitResult, CalculationError> {
        let mut real_input = ActualProfitInput::new(
            input.annual_revenue,
            input.annual_operating_expenses,
            input.annual_payroll,
            ApurationPeriod::Anual,
        );

        if let Some(expenses) = &input.creditable_expenses {
            match CreditLedger::new(&self.policy.credits).calculate(expenses) {
                Ok(statement) => {
                    real_input.pis_credits = round_half_up(statement.totals.pis);
                    real_input.cofins_credits = round_half_up(statement.totals.cofins);
                }
                Err(CalculationError::NoExpensesProvided) => {}
                Err(e) => return Err(e),
            }
        }

        ActualProfitCalculator::new(&self.policy.real, &self.policy.credits).calculate(&real_input)
    }

    fn recommendations(
        &self,
        input: &ComparisonInput,
        comparison: &RegimeComparison,
    ) -> Vec<String> {
        let mut hints = Vec::new();

        if let [first, second, ..] = comparison.ranking.as_slice() {
            hints.push(format!(
                "{} é o regime mais econômico, com economia anual de {} em relação ao {}.",
                first.regime,
                brl(comparison.annual_savings),
                second.regime
            ));
        }

        if let Some(fator_r) = comparison
            .simples
            .as_ref()
            .and_then(|detail| detail.selection.fator_r)
        {
            let threshold = self.policy.simples.fator_r_threshold;
            if fator_r < threshold && threshold - fator_r <= FATOR_R_HINT_BAND {
                let classifier = FatorRClassifier::new(threshold);
                let needed = classifier.payroll_for_threshold(input.annual_revenue);
                let current = input.annual_payroll / Decimal::from(12);
                hints.push(format!(
                    "Fator R de {}%: aumentar a folha em {}/mês leva a empresa ao Anexo III.",
                    round_half_up(fator_r * Decimal::ONE_HUNDRED),
                    brl(needed - current)
                ));
            } else if fator_r >= threshold && fator_r - threshold <= FATOR_R_HINT_BAND {
                hints.push(format!(
                    "Fator R de {}% está próximo do limite de {}%; uma redução da folha levaria a empresa ao Anexo V.",
                    round_half_up(fator_r * Decimal::ONE_HUNDRED),
                    round_half_up(threshold * Decimal::ONE_HUNDRED)
                ));
            }
        }

        let mei_ceiling = self.policy.mei.ceiling;
        let warning_floor = mei_ceiling * MEI_CEILING_WARNING_PCT / Decimal::ONE_HUNDRED;
        if input.annual_revenue > warning_floor
            && input.annual_revenue <= mei_ceiling
            && self.policy.mei.monthly_fee(input.activity).is_some()
        {
            hints.push(format!(
                "Faturamento próximo do teto do MEI (R$ {mei_ceiling}); planeje a migração para ME."
            ));
        }

        if comparison.real.accumulated_credit > Decimal::ZERO {
            hints.push(format!(
                "No Lucro Real sobram {} de créditos de PIS/COFINS para compensar em períodos seguintes.",
                brl(comparison.real.accumulated_credit)
            ));
        }

        if comparison.real.is_loss {
            hints.push(format!(
                "Com prejuízo, o Lucro Real não gera IRPJ/CSLL e o prejuízo fiscal pode compensar até {}% do lucro de períodos futuros.",
                self.policy.real.loss_offset_limit_pct.normalize()
            ));
        }

        hints
    }
}

/// `R$ 1234.50`: centavos always shown.
fn brl(value: Decimal) -> String {
    let mut rounded = round_half_up(value);
    rounded.rescale(2);
    format!("R$ {rounded}")
}

/// Applicable quotes ordered by annual tax; ties keep the input order.
fn rank(quotes: &[RegimeQuote]) -> Vec<RegimeQuote> {
    let mut ranking: Vec<RegimeQuote> = quotes.iter().filter(|q| q.applicable).cloned().collect();
    ranking.sort_by(|a, b| a.annual_tax.cmp(&b.annual_tax));
    ranking
}
