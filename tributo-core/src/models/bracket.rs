use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::CalculationError;
use crate::models::Anexo;

/// One row of a progressive Simples Nacional table ("faixa").
///
/// `nominal_rate_pct` is a percentage (`7.3` means 7.3%). `deduction` is the
/// "parcela a deduzir" in reais.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bracket {
    pub ceiling: Decimal,
    pub nominal_rate_pct: Decimal,
    pub deduction: Decimal,
}

impl Bracket {
    pub fn new(
        ceiling: Decimal,
        nominal_rate_pct: Decimal,
        deduction: Decimal,
    ) -> Self {
        Self {
            ceiling,
            nominal_rate_pct,
            deduction,
        }
    }
}

/// An ordered, validated bracket table for one Anexo.
///
/// Ceilings are strictly increasing. Revenue above the last ceiling still
/// resolves to the last bracket. The table cannot be changed after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BracketTable {
    anexo: Anexo,
    brackets: Vec<Bracket>,
}

impl BracketTable {
    /// Builds a table, rejecting empty tables, non-increasing ceilings,
    /// rates outside `[0, 100]` and negative deductions.
    ///
    /// # Errors
    ///
    /// Returns [`CalculationError::InvalidBracketTable`] describing the first
    /// offending row (1-based, as the faixa is numbered on the official
    /// tables).
    pub fn new(
        anexo: Anexo,
        brackets: Vec<Bracket>,
    ) -> Result<Self, CalculationError> {
        if brackets.is_empty() {
            return Err(CalculationError::InvalidBracketTable(format!(
                "{anexo} has no brackets"
            )));
        }

        let mut previous_ceiling: Option<Decimal> = None;
        for (idx, bracket) in brackets.iter().enumerate() {
            let faixa = idx + 1;
            if bracket.ceiling <= Decimal::ZERO {
                return Err(CalculationError::InvalidBracketTable(format!(
                    "{anexo} faixa {faixa}: ceiling must be positive, got {}",
                    bracket.ceiling
                )));
            }
            if let Some(prev) = previous_ceiling {
                if bracket.ceiling <= prev {
                    return Err(CalculationError::InvalidBracketTable(format!(
                        "{anexo} faixa {faixa}: ceiling {} is not above {prev}",
                        bracket.ceiling
                    )));
                }
            }
            if bracket.nominal_rate_pct < Decimal::ZERO
                || bracket.nominal_rate_pct > Decimal::ONE_HUNDRED
            {
                return Err(CalculationError::InvalidBracketTable(format!(
                    "{anexo} faixa {faixa}: nominal rate must be within 0-100, got {}",
                    bracket.nominal_rate_pct
                )));
            }
            if bracket.deduction < Decimal::ZERO {
                return Err(CalculationError::InvalidBracketTable(format!(
                    "{anexo} faixa {faixa}: deduction must be non-negative, got {}",
                    bracket.deduction
                )));
            }
            previous_ceiling = Some(bracket.ceiling);
        }

        Ok(Self { anexo, brackets })
    }

    /// Wraps compile-time tables that are checked by unit tests instead of
    /// at runtime.
    pub(crate) fn from_trusted(
        anexo: Anexo,
        brackets: Vec<Bracket>,
    ) -> Self {
        Self { anexo, brackets }
    }

    pub fn anexo(&self) -> Anexo {
        self.anexo
    }

    pub fn brackets(&self) -> &[Bracket] {
        &self.brackets
    }

    /// First bracket whose ceiling covers `revenue`, falling back to the last
    /// one. Returns the zero-based index alongside the bracket.
    pub fn lookup(
        &self,
        revenue: Decimal,
    ) -> (usize, &Bracket) {
        let last = self.brackets.len() - 1;
        self.brackets
            .iter()
            .enumerate()
            .find(|(_, b)| b.ceiling >= revenue)
            .unwrap_or((last, &self.brackets[last]))
    }
}
