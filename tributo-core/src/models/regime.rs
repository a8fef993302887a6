use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax regimes the comparator can quote.
///
/// Declaration order is the tie-break order when two regimes cost the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Simples,
    Presumido,
    Real,
    Mei,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simples => "simples",
            Self::Presumido => "presumido",
            Self::Real => "real",
            Self::Mei => "mei",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Simples => "Simples Nacional",
            Self::Presumido => "Lucro Presumido",
            Self::Real => "Lucro Real",
            Self::Mei => "MEI",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simples" | "simples_nacional" | "simples nacional" => Some(Self::Simples),
            "presumido" | "lucro_presumido" | "lucro presumido" => Some(Self::Presumido),
            "real" | "lucro_real" | "lucro real" => Some(Self::Real),
            "mei" => Some(Self::Mei),
            _ => None,
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Annual cost of one regime for a given company snapshot.
///
/// When `applicable` is false the numeric fields are zero and `reason`
/// explains why; such quotes are never ranked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegimeQuote {
    pub regime: Regime,
    pub annual_tax: Decimal,
    pub effective_rate_pct: Decimal,
    pub applicable: bool,
    pub reason: Option<String>,
}

impl RegimeQuote {
    pub fn applicable(
        regime: Regime,
        annual_tax: Decimal,
        effective_rate_pct: Decimal,
    ) -> Self {
        Self {
            regime,
            annual_tax,
            effective_rate_pct,
            applicable: true,
            reason: None,
        }
    }

    pub fn inapplicable(
        regime: Regime,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            regime,
            annual_tax: Decimal::ZERO,
            effective_rate_pct: Decimal::ZERO,
            applicable: false,
            reason: Some(reason.into()),
        }
    }
}
