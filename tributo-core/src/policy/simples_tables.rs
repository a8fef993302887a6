//! Simples Nacional bracket tables in force since 2018 (LC 155/2016).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{Anexo, Bracket, BracketTable};

/// `(ceiling, nominal rate %, deduction)` per faixa.
type Row = (Decimal, Decimal, Decimal);

const ANEXO_I: [Row; 6] = [
    (dec!(180000), dec!(4.0), dec!(0)),
    (dec!(360000), dec!(7.3), dec!(5940)),
    (dec!(720000), dec!(9.5), dec!(13860)),
    (dec!(1800000), dec!(10.7), dec!(22500)),
    (dec!(3600000), dec!(14.3), dec!(87300)),
    (dec!(4800000), dec!(19.0), dec!(378000)),
];

const ANEXO_II: [Row; 6] = [
    (dec!(180000), dec!(4.5), dec!(0)),
    (dec!(360000), dec!(7.8), dec!(5940)),
    (dec!(720000), dec!(10.0), dec!(13860)),
    (dec!(1800000), dec!(11.2), dec!(22500)),
    (dec!(3600000), dec!(14.7), dec!(85500)),
    (dec!(4800000), dec!(30.0), dec!(720000)),
];

const ANEXO_III: [Row; 6] = [
    (dec!(180000), dec!(6.0), dec!(0)),
    (dec!(360000), dec!(11.2), dec!(9360)),
    (dec!(720000), dec!(13.5), dec!(17640)),
    (dec!(1800000), dec!(16.0), dec!(35640)),
    (dec!(3600000), dec!(21.0), dec!(125640)),
    (dec!(4800000), dec!(33.0), dec!(648000)),
];

const ANEXO_IV: [Row; 6] = [
    (dec!(180000), dec!(4.5), dec!(0)),
    (dec!(360000), dec!(9.0), dec!(8100)),
    (dec!(720000), dec!(10.2), dec!(12420)),
    (dec!(1800000), dec!(14.0), dec!(39780)),
    (dec!(3600000), dec!(22.0), dec!(183780)),
    (dec!(4800000), dec!(33.0), dec!(828000)),
];

const ANEXO_V: [Row; 6] = [
    (dec!(180000), dec!(15.5), dec!(0)),
    (dec!(360000), dec!(18.0), dec!(4500)),
    (dec!(720000), dec!(19.5), dec!(9900)),
    (dec!(1800000), dec!(20.5), dec!(17100)),
    (dec!(3600000), dec!(23.0), dec!(62100)),
    (dec!(4800000), dec!(30.5), dec!(540000)),
];

fn rows(anexo: Anexo) -> &'static [Row] {
    match anexo {
        Anexo::I => &ANEXO_I,
        Anexo::II => &ANEXO_II,
        Anexo::III => &ANEXO_III,
        Anexo::IV => &ANEXO_IV,
        Anexo::V => &ANEXO_V,
    }
}

/// Built-in table for `anexo`.
pub fn standard_table(anexo: Anexo) -> BracketTable {
    let brackets = rows(anexo)
        .iter()
        .map(|&(ceiling, rate, deduction)| Bracket::new(ceiling, rate, deduction))
        .collect();

    BracketTable::from_trusted(anexo, brackets)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn every_standard_table_is_valid() {
        for anexo in Anexo::ALL {
            let table = standard_table(anexo);
            assert_eq!(
                BracketTable::new(anexo, table.brackets().to_vec()),
                Ok(table.clone())
            );
            assert_eq!(table.brackets().len(), 6, "{anexo} should have 6 faixas");
            assert_eq!(table.brackets()[5].ceiling, dec!(4800000));
        }
    }

    #[test]
    fn anexo_i_second_faixa_matches_official_table() {
        let table = standard_table(Anexo::I);

        assert_eq!(
            table.brackets()[1],
            Bracket::new(dec!(360000), dec!(7.3), dec!(5940))
        );
    }
}
