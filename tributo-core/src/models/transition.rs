use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One year of the IBS/CBS transition projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionYearEntry {
    pub year: i32,
    pub old_system_weight_pct: Decimal,
    pub new_system_weight_pct: Decimal,
    pub old_amount: Decimal,
    pub new_amount: Decimal,
    pub total_amount: Decimal,
    pub effective_rate_pct: Decimal,
}
