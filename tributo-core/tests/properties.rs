//! Property-based tests for the calculators.
//!
//! Run with: `cargo test -p tributo-core --test properties`

use std::collections::BTreeMap;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tributo_core::calculations::{
    ActualProfitCalculator, ActualProfitInput, BracketResolver, ComparisonInput, CreditLedger,
    PresumedProfitCalculator, PresumedProfitInput, RegimeComparator, ThresholdAdvisor,
    ThresholdOutcome, TransitionBlender, split_rate,
};
use tributo_core::policy::{TaxPolicy, TransitionSchedule, standard_table};
use tributo_core::{Activity, Anexo, ApurationPeriod, ExpenseCategory};

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// Revenue from R$0.01 to R$10,000,000.00.
fn arb_revenue() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Amount from R$0.00 to R$2,000,000.00.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..=200_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_anexo() -> impl Strategy<Value = Anexo> {
    prop::sample::select(Anexo::ALL.to_vec())
}

fn arb_activity() -> impl Strategy<Value = Activity> {
    prop::sample::select(Activity::ALL.to_vec())
}

fn arb_period() -> impl Strategy<Value = ApurationPeriod> {
    prop_oneof![
        Just(ApurationPeriod::Trimestral),
        Just(ApurationPeriod::Anual)
    ]
}

/// Rate from 0.00% to 100.00%.
fn arb_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn arb_expenses() -> impl Strategy<Value = BTreeMap<ExpenseCategory, Decimal>> {
    prop::collection::btree_map(
        prop::sample::select(ExpenseCategory::ALL.to_vec()),
        arb_amount(),
        1..=ExpenseCategory::ALL.len(),
    )
}

// ── Property Tests ──────────────────────────────────────────────────────────

proptest! {
    /// The effective rate never drops below zero nor exceeds the nominal rate.
    #[test]
    fn effective_rate_within_nominal(anexo in arb_anexo(), revenue in arb_revenue()) {
        let table = standard_table(anexo);
        let resolution = BracketResolver::new(&table).resolve(revenue).unwrap();

        prop_assert!(resolution.effective_rate_pct >= Decimal::ZERO);
        prop_assert!(resolution.effective_rate_pct <= resolution.nominal_rate_pct);
        prop_assert!(resolution.faixa >= 1 && resolution.faixa <= table.brackets().len());
    }

    /// Total credit is exactly 9.25% of the positive expenses; zero
    /// categories produce no line.
    #[test]
    fn credit_total_is_combined_rate(expenses in arb_expenses()) {
        prop_assume!(expenses.values().any(|v| *v > Decimal::ZERO));
        let policy = TaxPolicy::default();

        let statement = CreditLedger::new(&policy.credits).calculate(&expenses).unwrap();

        let base: Decimal = expenses.values().copied().sum();
        prop_assert_eq!(statement.totals.total, base * dec!(0.0925));
        let positive = expenses.values().filter(|v| !v.is_zero()).count();
        prop_assert_eq!(statement.lines.len(), positive);
        prop_assert!(statement.lines.iter().all(|line| !line.amount.is_zero()));
    }

    /// Netting never leaves a negative amount due.
    #[test]
    fn credit_offset_is_floored(expenses in arb_expenses(), gross in arb_amount()) {
        prop_assume!(expenses.values().any(|v| *v > Decimal::ZERO));
        let policy = TaxPolicy::default();
        let statement = CreditLedger::new(&policy.credits).calculate(&expenses).unwrap();

        let offset = statement.offset(gross);

        prop_assert!(offset.net_due >= Decimal::ZERO);
        prop_assert!(offset.accumulated_credit >= Decimal::ZERO);
        prop_assert_eq!(offset.net_due + offset.credits_used, gross);
    }

    /// IBS and CBS add back to the IVA rate exactly.
    #[test]
    fn dual_vat_parts_sum_to_rate(rate in arb_rate()) {
        let (ibs, cbs) = split_rate(rate);

        prop_assert_eq!(ibs + cbs, rate);
        prop_assert!(ibs >= cbs);
    }

    /// Presumido total is the sum of its lines.
    #[test]
    fn presumido_total_is_sum_of_lines(
        revenue in arb_revenue(),
        activity in arb_activity(),
        period in arb_period(),
    ) {
        let policy = TaxPolicy::default();
        let result = PresumedProfitCalculator::new(&policy.presumido)
            .calculate(&PresumedProfitInput { revenue, activity, period })
            .unwrap();

        prop_assert_eq!(
            result.total,
            result.irpj + result.irpj_surtax + result.csll + result.pis + result.cofins
        );
        prop_assert!(result.irpj_surtax >= Decimal::ZERO);
    }

    /// Lucro Real never charges a negative amount.
    #[test]
    fn real_amounts_are_non_negative(
        revenue in arb_revenue(),
        expenses in arb_amount(),
        payroll in arb_amount(),
        pis_credits in arb_amount(),
        period in arb_period(),
    ) {
        let policy = TaxPolicy::default();
        let mut input = ActualProfitInput::new(revenue, expenses, payroll, period);
        input.pis_credits = pis_credits;

        let result = ActualProfitCalculator::new(&policy.real, &policy.credits)
            .calculate(&input)
            .unwrap();

        prop_assert!(result.irpj >= Decimal::ZERO);
        prop_assert!(result.csll >= Decimal::ZERO);
        prop_assert!(result.pis.due >= Decimal::ZERO);
        prop_assert!(result.cofins.due >= Decimal::ZERO);
        prop_assert_eq!(result.is_loss, result.taxable_profit.is_zero() && result.accounting_profit <= Decimal::ZERO);
    }

    /// Every blended year splits exactly between the two systems.
    #[test]
    fn transition_weights_sum_to_100(
        old_tax in arb_amount(),
        new_tax in arb_amount(),
        revenue in arb_revenue(),
    ) {
        let schedule = TransitionSchedule::standard();
        let projection = TransitionBlender::new(&schedule)
            .blend(old_tax, new_tax, revenue)
            .unwrap();

        prop_assert_eq!(projection.entries.len(), 8);
        for entry in &projection.entries {
            prop_assert_eq!(
                entry.old_system_weight_pct + entry.new_system_weight_pct,
                Decimal::ONE_HUNDRED
            );
            prop_assert_eq!(entry.total_amount, entry.old_amount + entry.new_amount);
        }
        let last = projection.entries.last().unwrap();
        prop_assert_eq!(last.year, 2033);
        prop_assert_eq!(last.new_system_weight_pct, Decimal::ONE_HUNDRED);
    }

    /// The MEI scan never examines more candidates than the range holds.
    #[test]
    fn threshold_scan_is_bounded(anexo in arb_anexo(), fee_cents in 1i64..=100_000i64) {
        let policy = TaxPolicy::default();
        let table = standard_table(anexo);
        let advisor = ThresholdAdvisor::new(&policy.mei, &table);

        let outcome = advisor.find_crossover(Decimal::new(fee_cents, 2)).unwrap();

        let scanned = match outcome {
            ThresholdOutcome::Crossover { candidates_scanned, revenue, .. } => {
                prop_assert!(revenue <= policy.mei.ceiling);
                candidates_scanned
            }
            ThresholdOutcome::NoCrossover { candidates_scanned, .. } => candidates_scanned,
        };
        prop_assert!(scanned <= 22);
    }

    /// Identical snapshots give identical comparisons.
    #[test]
    fn comparison_is_idempotent(
        revenue in arb_revenue(),
        payroll in arb_amount(),
        expenses in arb_amount(),
        activity in arb_activity(),
    ) {
        let policy = TaxPolicy::default();
        let comparator = RegimeComparator::new(&policy);
        let input = ComparisonInput {
            annual_revenue: revenue,
            annual_payroll: payroll,
            annual_operating_expenses: expenses,
            activity,
            creditable_expenses: None,
        };

        let first = comparator.compare(&input).unwrap();
        let second = comparator.compare(&input).unwrap();

        prop_assert_eq!(&first, &second);
        for pair in first.ranking.windows(2) {
            prop_assert!(pair[0].annual_tax <= pair[1].annual_tax);
        }
        prop_assert!(first.ranking.iter().all(|quote| quote.applicable));
    }
}

// ── Schedule Tests ──────────────────────────────────────────────────────────

#[test]
fn standard_schedule_is_valid() {
    let schedule = TransitionSchedule::standard();

    let rebuilt = TransitionSchedule::new(schedule.steps().to_vec()).unwrap();

    assert_eq!(rebuilt, schedule);
    assert_eq!(schedule.first_year(), 2026);
    assert_eq!(schedule.last_year(), 2033);
}
