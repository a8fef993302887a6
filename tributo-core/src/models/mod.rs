pub(crate) mod activity;
mod bracket;
mod expense;
mod regime;
mod tax_result;
mod transition;

pub use activity::{Activity, Anexo, ApurationPeriod};
pub use bracket::{Bracket, BracketTable};
pub use expense::ExpenseCategory;
pub use regime::{Regime, RegimeQuote};
pub use tax_result::{TaxComponent, TaxResult};
pub use transition::TransitionYearEntry;
