//! Simples Nacional bracket resolution.
//!
//! For a trailing-twelve-month revenue (RBT12) the resolver picks the faixa
//! of an Anexo table and derives the effective rate:
//!
//! ```text
//! effective % = max(0, (RBT12 × nominal% / 100 − deduction) / RBT12 × 100)
//! ```
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tributo_core::calculations::BracketResolver;
//! use tributo_core::policy::standard_table;
//! use tributo_core::Anexo;
//!
//! let table = standard_table(Anexo::I);
//! let resolution = BracketResolver::new(&table).resolve(dec!(300000)).unwrap();
//!
//! // (300000 × 7.3% − 5940) / 300000 = 5.32%
//! assert_eq!(resolution.nominal_rate_pct, dec!(7.3));
//! assert_eq!(resolution.deduction, dec!(5940));
//! assert_eq!(resolution.effective_rate_pct, dec!(5.32));
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::CalculationError;
use crate::calculations::common::{ensure_positive, max, percent_of, round_half_up};
use crate::models::{Anexo, Bracket, BracketTable, TaxComponent, TaxResult};

/// Faixa selected for a revenue and the rates derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketResolution {
    pub anexo: Anexo,
    /// 1-based faixa number, as printed on the official tables.
    pub faixa: usize,
    pub nominal_rate_pct: Decimal,
    pub deduction: Decimal,
    pub effective_rate_pct: Decimal,
}

/// Resolves revenue against one bracket table.
#[derive(Debug, Clone)]
pub struct BracketResolver<'a> {
    table: &'a BracketTable,
}

impl<'a> BracketResolver<'a> {
    pub fn new(table: &'a BracketTable) -> Self {
        Self { table }
    }

    /// Finds the faixa for `revenue` and computes the effective rate.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidInput`] if `revenue <= 0`.
    pub fn resolve(
        &self,
        revenue: Decimal,
    ) -> Result<BracketResolution, CalculationError> {
        ensure_positive("revenue", revenue)?;

        let (idx, bracket) = self.table.lookup(revenue);
        let effective_rate_pct = self.effective_rate(revenue, bracket);

        debug!(
            anexo = %self.table.anexo(),
            faixa = idx + 1,
            revenue = %revenue,
            effective_rate_pct = %effective_rate_pct,
            "resolved Simples bracket"
        );

        Ok(BracketResolution {
            anexo: self.table.anexo(),
            faixa: idx + 1,
            nominal_rate_pct: bracket.nominal_rate_pct,
            deduction: bracket.deduction,
            effective_rate_pct,
        })
    }

    /// Annual Simples tax (DAS) for `revenue`.
    ///
    /// # Errors
    ///
    /// Same as [`BracketResolver::resolve`].
    pub fn tax_for(
        &self,
        revenue: Decimal,
    ) -> Result<TaxResult, CalculationError> {
        let resolution = self.resolve(revenue)?;
        let das = round_half_up(percent_of(revenue, resolution.effective_rate_pct));

        Ok(TaxResult::new(
            resolution.nominal_rate_pct,
            resolution.effective_rate_pct,
            [(TaxComponent::Das, das)],
        ))
    }

    /// Effective rate with the floor at zero.
    ///
    /// The deduction can exceed the gross tax near faixa boundaries of
    /// custom tables; the rate never goes negative.
    fn effective_rate(
        &self,
        revenue: Decimal,
        bracket: &Bracket,
    ) -> Decimal {
        let gross = percent_of(revenue, bracket.nominal_rate_pct);
        let raw = (gross - bracket.deduction) / revenue * Decimal::ONE_HUNDRED;

        if raw < Decimal::ZERO {
            warn!(
                revenue = %revenue,
                deduction = %bracket.deduction,
                raw_rate_pct = %raw,
                "deduction exceeds gross Simples tax; effective rate floored at zero"
            );
        }

        max(raw, Decimal::ZERO)
    }
}
