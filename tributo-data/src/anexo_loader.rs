use std::collections::BTreeMap;
use std::io::Read;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tributo_core::{Anexo, Bracket, BracketTable, CalculationError, TaxPolicy};

/// Errors that can occur when loading Simples Nacional bracket tables.
#[derive(Debug, Error)]
pub enum BracketLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Unknown Anexo '{0}' (expected I, II, III, IV or V)")]
    UnknownAnexo(String),

    #[error("{anexo}: faixas must be numbered 1..={count} without gaps, found faixa {faixa}")]
    FaixaOutOfOrder {
        anexo: Anexo,
        faixa: usize,
        count: usize,
    },

    #[error("Invalid table: {0}")]
    InvalidTable(#[from] CalculationError),
}

impl From<csv::Error> for BracketLoaderError {
    fn from(err: csv::Error) -> Self {
        BracketLoaderError::CsvParse(err.to_string())
    }
}

/// A single record from the Anexo tables CSV file.
///
/// - `anexo`: The Anexo (I-V, or 1-5)
/// - `faixa`: The 1-based bracket number
/// - `ceiling`: Upper RBT12 limit of the bracket, inclusive
/// - `nominal_rate_pct`: Nominal rate as a percentage (e.g., 7.3)
/// - `deduction`: Parcela a deduzir in reais
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct BracketRecord {
    pub anexo: String,
    pub faixa: usize,
    pub ceiling: Decimal,
    pub nominal_rate_pct: Decimal,
    pub deduction: Decimal,
}

/// Loader for Simples Nacional Anexo tables from CSV files.
///
/// Records are grouped by Anexo and every table goes through the same
/// validation as the built-in ones before it can replace them.
pub struct AnexoTableLoader;

impl AnexoTableLoader {
    /// Parse bracket records from a CSV reader.
    ///
    /// The reader can be any type that implements `Read`, such as a file or
    /// a string slice.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<BracketRecord>, BracketLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for result in csv_reader.deserialize() {
            let record: BracketRecord = result?;
            records.push(record);
        }

        Ok(records)
    }

    /// Build one validated table per Anexo present in `records`.
    ///
    /// Rows may appear in any order; within an Anexo the faixas must be
    /// numbered from 1 without gaps or repeats.
    pub fn build(records: &[BracketRecord]) -> Result<Vec<BracketTable>, BracketLoaderError> {
        let mut groups: BTreeMap<Anexo, Vec<&BracketRecord>> = BTreeMap::new();

        for record in records {
            let anexo = Anexo::parse(&record.anexo)
                .ok_or_else(|| BracketLoaderError::UnknownAnexo(record.anexo.clone()))?;
            groups.entry(anexo).or_default().push(record);
        }

        let mut tables = Vec::with_capacity(groups.len());
        for (anexo, mut rows) in groups {
            rows.sort_by_key(|row| row.faixa);

            let count = rows.len();
            for (idx, row) in rows.iter().enumerate() {
                if row.faixa != idx + 1 {
                    return Err(BracketLoaderError::FaixaOutOfOrder {
                        anexo,
                        faixa: row.faixa,
                        count,
                    });
                }
            }

            let brackets = rows
                .iter()
                .map(|row| Bracket::new(row.ceiling, row.nominal_rate_pct, row.deduction))
                .collect();
            tables.push(BracketTable::new(anexo, brackets)?);
        }

        Ok(tables)
    }

    /// Parse and build in one step.
    pub fn load<R: Read>(reader: R) -> Result<Vec<BracketTable>, BracketLoaderError> {
        let records = Self::parse(reader)?;
        Self::build(&records)
    }

    /// Replace the policy's tables with `tables`, returning how many were
    /// replaced. Anexos absent from `tables` keep their current table.
    pub fn apply(
        policy: &mut TaxPolicy,
        tables: Vec<BracketTable>,
    ) -> usize {
        let count = tables.len();
        for table in tables {
            tracing::debug!(anexo = %table.anexo(), faixas = table.brackets().len(), "replacing Anexo table");
            policy.simples.set_table(table);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const TEST_CSV: &str = r#"anexo,faixa,ceiling,nominal_rate_pct,deduction
I,1,180000,4,0
I,2,360000,7.3,5940
I,3,720000,9.5,13860
I,4,1800000,10.7,22500
I,5,3600000,14.3,87300
I,6,4800000,19,378000
III,1,180000,6,0
III,2,360000,11.2,9360
III,3,720000,13.5,17640
III,4,1800000,16,35640
III,5,3600000,21,125640
III,6,4800000,33,648000
"#;

    #[test]
    fn test_parse_csv_single_bracket() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\nI,2,360000,7.3,5940";

        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0],
            BracketRecord {
                anexo: "I".to_string(),
                faixa: 2,
                ceiling: dec!(360000),
                nominal_rate_pct: dec!(7.3),
                deduction: dec!(5940),
            }
        );
    }

    #[test]
    fn test_parse_csv_trims_whitespace() {
        let csv = "anexo, faixa, ceiling, nominal_rate_pct, deduction\n V , 1 , 180000 , 15.5 , 0";

        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert_eq!(records[0].anexo, "V");
        assert_eq!(records[0].nominal_rate_pct, dec!(15.5));
    }

    #[test]
    fn test_build_groups_by_anexo() {
        let records = AnexoTableLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

        let tables = AnexoTableLoader::build(&records).expect("Failed to build tables");

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].anexo(), Anexo::I);
        assert_eq!(tables[1].anexo(), Anexo::III);
        assert_eq!(tables[1].brackets()[5].deduction, dec!(648000));
    }

    #[test]
    fn test_build_matches_builtin_table() {
        let records = AnexoTableLoader::parse(TEST_CSV.as_bytes()).expect("Failed to parse CSV");

        let tables = AnexoTableLoader::build(&records).expect("Failed to build tables");

        assert_eq!(tables[0], tributo_core::policy::standard_table(Anexo::I));
    }

    #[test]
    fn test_build_accepts_rows_out_of_order() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\n\
                   II,2,360000,7.8,5940\n\
                   II,1,180000,4.5,0";
        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        let tables = AnexoTableLoader::build(&records).expect("Failed to build tables");

        assert_eq!(tables[0].brackets()[0].ceiling, dec!(180000));
    }

    #[test]
    fn test_build_rejects_faixa_gap() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\n\
                   IV,1,180000,4.5,0\n\
                   IV,3,720000,10.2,12420";
        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        let result = AnexoTableLoader::build(&records);

        match result {
            Err(BracketLoaderError::FaixaOutOfOrder { anexo, faixa, count }) => {
                assert_eq!(anexo, Anexo::IV);
                assert_eq!(faixa, 3);
                assert_eq!(count, 2);
            }
            other => panic!("expected FaixaOutOfOrder, got {other:?}"),
        }
    }

    #[test]
    fn test_build_rejects_decreasing_ceiling() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\n\
                   I,1,360000,4,0\n\
                   I,2,180000,7.3,5940";
        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        let result = AnexoTableLoader::build(&records);

        assert!(matches!(
            result,
            Err(BracketLoaderError::InvalidTable(CalculationError::InvalidBracketTable(_)))
        ));
    }

    #[test]
    fn test_build_rejects_unknown_anexo() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\nVI,1,180000,4,0";
        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        let result = AnexoTableLoader::build(&records);

        match result {
            Err(BracketLoaderError::UnknownAnexo(ref anexo)) => assert_eq!(anexo, "VI"),
            other => panic!("expected UnknownAnexo, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_invalid_csv_missing_column() {
        let csv = "anexo,faixa,ceiling\nI,1,180000";

        let result = AnexoTableLoader::parse(csv.as_bytes());

        let err = result.expect_err("Should fail for missing column");
        let BracketLoaderError::CsvParse(msg) = err else {
            panic!("Expected CsvParse error, got: {:?}", err);
        };
        assert!(
            msg.contains("missing field"),
            "Expected 'missing field' in error, got: {}",
            msg
        );
    }

    #[test]
    fn test_parse_empty_csv() {
        let csv = "anexo,faixa,ceiling,nominal_rate_pct,deduction\n";

        let records = AnexoTableLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

        assert!(records.is_empty());
    }

    #[test]
    fn test_apply_replaces_only_loaded_anexos() {
        let mut policy = TaxPolicy::default();
        let custom = BracketTable::new(
            Anexo::V,
            vec![Bracket::new(dec!(4800000), dec!(10), dec!(0))],
        )
        .unwrap();

        let replaced = AnexoTableLoader::apply(&mut policy, vec![custom.clone()]);

        assert_eq!(replaced, 1);
        assert_eq!(policy.simples.table(Anexo::V).unwrap(), &custom);
        assert_eq!(policy.simples.table(Anexo::I).unwrap().brackets().len(), 6);
    }
}
