use std::fmt;

use serde::{Deserialize, Serialize};

/// Business activity declared by the company.
///
/// The activity drives the Simples Anexo, the Lucro Presumido presumption
/// percentages and whether the MEI regime is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Comercio,
    Industria,
    Servicos,
    TransportePassageiros,
    TransporteCargas,
}

impl Activity {
    pub const ALL: [Activity; 5] = [
        Self::Comercio,
        Self::Industria,
        Self::Servicos,
        Self::TransportePassageiros,
        Self::TransporteCargas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comercio => "comercio",
            Self::Industria => "industria",
            Self::Servicos => "servicos",
            Self::TransportePassageiros => "transporte_passageiros",
            Self::TransporteCargas => "transporte_cargas",
        }
    }

    /// Parses the codes used by the simulator forms.
    ///
    /// Accepts accented and unaccented spellings, with `-`, `_` or spaces
    /// between words (`"comércio"`, `"transporte-cargas"`, `"Serviços"`).
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_code(s).as_str() {
            "comercio" => Some(Self::Comercio),
            "industria" => Some(Self::Industria),
            "servicos" | "servico" => Some(Self::Servicos),
            "transporte_passageiros" => Some(Self::TransportePassageiros),
            "transporte_cargas" | "transporte_carga" => Some(Self::TransporteCargas),
            _ => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Self::Servicos)
    }
}

impl fmt::Display for Activity {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Simples Nacional bracket table identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Anexo {
    I,
    II,
    III,
    IV,
    V,
}

impl Anexo {
    pub const ALL: [Anexo; 5] = [Self::I, Self::II, Self::III, Self::IV, Self::V];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::I => "I",
            Self::II => "II",
            Self::III => "III",
            Self::IV => "IV",
            Self::V => "V",
        }
    }

    /// Parses roman (`"III"`), arabic (`"3"`) and prefixed (`"anexo3"`,
    /// `"Anexo III"`) spellings.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = normalize_code(s);
        let code = normalized
            .strip_prefix("anexo")
            .unwrap_or(normalized.as_str())
            .trim_start_matches('_');
        match code {
            "i" | "1" => Some(Self::I),
            "ii" | "2" => Some(Self::II),
            "iii" | "3" => Some(Self::III),
            "iv" | "4" => Some(Self::IV),
            "v" | "5" => Some(Self::V),
            _ => None,
        }
    }
}

impl fmt::Display for Anexo {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Anexo {}", self.as_str())
    }
}

/// Length of the IRPJ/CSLL assessment period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApurationPeriod {
    #[default]
    Trimestral,
    Anual,
}

impl ApurationPeriod {
    pub fn months(&self) -> u32 {
        match self {
            Self::Trimestral => 3,
            Self::Anual => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trimestral => "trimestral",
            Self::Anual => "anual",
        }
    }

    /// Parses `"trimestral"`/`"anual"` or the month counts `3`/`12`.
    pub fn parse(s: &str) -> Option<Self> {
        match normalize_code(s).as_str() {
            "trimestral" | "trimestre" | "3" => Some(Self::Trimestral),
            "anual" | "ano" | "12" => Some(Self::Anual),
            _ => None,
        }
    }
}

/// Lowercases, strips Portuguese diacritics and joins words with `_`.
pub(crate) fn normalize_code(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'Á' | 'À' | 'Â' | 'Ã' => 'a',
            'é' | 'ê' | 'É' | 'Ê' => 'e',
            'í' | 'Í' => 'i',
            'ó' | 'ô' | 'õ' | 'Ó' | 'Ô' | 'Õ' => 'o',
            'ú' | 'Ú' => 'u',
            'ç' | 'Ç' => 'c',
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
