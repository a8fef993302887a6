//! Tax calculators.
//!
//! Each calculator borrows the slice of [`TaxPolicy`](crate::TaxPolicy) it
//! needs and exposes a `calculate`-style method over a plain input struct.
//! Calculators hold no state between calls.

pub mod bracket_resolver;
pub mod common;
pub mod comparator;
pub mod credits;
pub mod dual_vat;
pub mod fator_r;
pub mod mei;
pub mod presumido;
pub mod pricing;
pub mod real;
pub mod transition;

pub use bracket_resolver::{BracketResolution, BracketResolver};
pub use comparator::{ComparisonInput, RegimeComparator, RegimeComparison, SimplesDetail};
pub use credits::{
    CreditLedger, CreditLine, CreditOffset, CreditSimulation, CreditStatement, CreditTotals,
};
pub use dual_vat::{CBS_SHARE, DualVatSettlement, DualVatSplit, DualVatSplitter, IBS_SHARE, split_rate};
pub use fator_r::{AnexoSelection, FatorRClassifier};
pub use mei::{MeiComparison, ThresholdAdvisor, ThresholdOutcome, mei_quote};
pub use presumido::{PresumedProfitCalculator, PresumedProfitInput, PresumedProfitResult};
pub use pricing::{
    CostSummary, PriceSummary, PricingCalculator, PricingInput, PricingOutcome, PricingRegime,
    PricingResult, PricingScenario, TaxSummary,
};
pub use real::{ActualProfitCalculator, ActualProfitInput, ActualProfitResult, NonCumulativeLine};
pub use transition::{
    LegacyRates, ReformInput, ReformScenario, ReformSimulator, TransitionBlender,
    TransitionProjection,
};
