use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::activity::normalize_code;

/// Expense categories that generate non-cumulative PIS/COFINS credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Insumos,
    Energia,
    Aluguel,
    Frete,
    Armazenagem,
    Depreciacao,
    BensRevenda,
    Devolucoes,
}

impl ExpenseCategory {
    pub const ALL: [ExpenseCategory; 8] = [
        Self::Insumos,
        Self::Energia,
        Self::Aluguel,
        Self::Frete,
        Self::Armazenagem,
        Self::Depreciacao,
        Self::BensRevenda,
        Self::Devolucoes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insumos => "insumos",
            Self::Energia => "energia",
            Self::Aluguel => "aluguel",
            Self::Frete => "frete",
            Self::Armazenagem => "armazenagem",
            Self::Depreciacao => "depreciacao",
            Self::BensRevenda => "bens_revenda",
            Self::Devolucoes => "devolucoes",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Insumos => "Insumos",
            Self::Energia => "Energia elétrica",
            Self::Aluguel => "Aluguéis",
            Self::Frete => "Frete",
            Self::Armazenagem => "Armazenagem",
            Self::Depreciacao => "Depreciação",
            Self::BensRevenda => "Bens para revenda",
            Self::Devolucoes => "Devoluções de vendas",
        }
    }

    /// Parses form keys, including the camelCase keys sent by the pages
    /// (`"bensRevenda"`, `"energiaEletrica"`).
    pub fn parse(s: &str) -> Option<Self> {
        let code = normalize_code(s).replace('_', "");
        match code.as_str() {
            "insumos" | "insumo" => Some(Self::Insumos),
            "energia" | "energiaeletrica" => Some(Self::Energia),
            "aluguel" | "alugueis" => Some(Self::Aluguel),
            "frete" | "fretes" => Some(Self::Frete),
            "armazenagem" => Some(Self::Armazenagem),
            "depreciacao" => Some(Self::Depreciacao),
            "bensrevenda" | "benspararevenda" => Some(Self::BensRevenda),
            "devolucoes" | "devolucao" => Some(Self::Devolucoes),
            _ => None,
        }
    }

    /// Every recognised category generates PIS/COFINS credit today.
    pub fn generates_credit(&self) -> bool {
        true
    }
}

impl fmt::Display for ExpenseCategory {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_accepts_camel_case_keys() {
        assert_eq!(
            ExpenseCategory::parse("bensRevenda"),
            Some(ExpenseCategory::BensRevenda)
        );
        assert_eq!(
            ExpenseCategory::parse("energiaEletrica"),
            Some(ExpenseCategory::Energia)
        );
        assert_eq!(
            ExpenseCategory::parse("depreciação"),
            Some(ExpenseCategory::Depreciacao)
        );
    }

    #[test]
    fn parse_round_trips_every_category() {
        for category in ExpenseCategory::ALL {
            assert_eq!(ExpenseCategory::parse(category.as_str()), Some(category));
            assert!(category.generates_credit());
        }
    }

    #[test]
    fn parse_rejects_unknown_category() {
        assert_eq!(ExpenseCategory::parse("salarios"), None);
    }
}
