//! TOML overrides for [`TaxPolicy`].
//!
//! Every section and key is optional; anything left out keeps the built-in
//! value. A `[[transition]]` list, when present, replaces the whole schedule.
//!
//! ```toml
//! [simples]
//! ceiling = 4800000
//! fator_r_threshold = 0.28
//!
//! [presumido.presumptions.servicos]
//! irpj_pct = 32
//! csll_pct = 32
//!
//! [mei.monthly_fees]
//! comercio = 75.90
//!
//! [[transition]]
//! year = 2026
//! old_system_weight_pct = 0
//! new_system_weight_pct = 100
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tributo_core::calculations::common::{ensure_non_negative, ensure_percentage, ensure_positive};
use tributo_core::policy::{Presumption, ScheduleStep, SelectiveCategory, TransitionSchedule};
use tributo_core::{Activity, CalculationError, TaxPolicy};

#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unknown key '{key}' in [{section}]")]
    UnknownKey { section: &'static str, key: String },

    #[error("invalid policy: {0}")]
    Invalid(#[from] CalculationError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverrides {
    pub simples: SimplesOverrides,
    pub presumido: PresumidoOverrides,
    pub real: RealOverrides,
    pub credits: CreditOverrides,
    pub mei: MeiOverrides,
    pub reform: ReformOverrides,
    pub transition: Option<Vec<ScheduleStep>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimplesOverrides {
    pub ceiling: Option<Decimal>,
    pub fator_r_threshold: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PresumidoOverrides {
    pub ceiling: Option<Decimal>,
    pub irpj_rate_pct: Option<Decimal>,
    pub surtax_rate_pct: Option<Decimal>,
    pub surtax_monthly_threshold: Option<Decimal>,
    pub csll_rate_pct: Option<Decimal>,
    pub pis_rate_pct: Option<Decimal>,
    pub cofins_rate_pct: Option<Decimal>,
    pub presumptions: BTreeMap<String, Presumption>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealOverrides {
    pub irpj_rate_pct: Option<Decimal>,
    pub surtax_rate_pct: Option<Decimal>,
    pub surtax_monthly_threshold: Option<Decimal>,
    pub csll_rate_pct: Option<Decimal>,
    pub loss_offset_limit_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreditOverrides {
    pub pis_pct: Option<Decimal>,
    pub cofins_pct: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeiOverrides {
    pub ceiling: Option<Decimal>,
    pub excess_tolerance_pct: Option<Decimal>,
    pub monthly_fees: BTreeMap<String, Decimal>,
    pub scan_start: Option<Decimal>,
    pub scan_end: Option<Decimal>,
    pub scan_step: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReformOverrides {
    pub reference_iva_rate_pct: Option<Decimal>,
    pub selective_rates: BTreeMap<String, Decimal>,
}

fn set_pct(
    target: &mut Decimal,
    field: &'static str,
    value: Option<Decimal>,
) -> Result<(), PolicyLoadError> {
    if let Some(v) = value {
        *target = ensure_percentage(field, v)?;
    }
    Ok(())
}

fn set_positive(
    target: &mut Decimal,
    field: &'static str,
    value: Option<Decimal>,
) -> Result<(), PolicyLoadError> {
    if let Some(v) = value {
        *target = ensure_positive(field, v)?;
    }
    Ok(())
}

fn activity_key(
    section: &'static str,
    key: &str,
) -> Result<Activity, PolicyLoadError> {
    Activity::parse(key).ok_or_else(|| PolicyLoadError::UnknownKey {
        section,
        key: key.to_string(),
    })
}

impl PolicyOverrides {
    pub fn from_toml(contents: &str) -> Result<Self, PolicyLoadError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, PolicyLoadError> {
        let contents = fs::read_to_string(path).map_err(|source| PolicyLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents)
    }

    /// Write the overrides into `policy`, validating each value on the way.
    ///
    /// On error the policy may be partially updated; callers that need the
    /// original should apply to a clone.
    pub fn apply(
        self,
        policy: &mut TaxPolicy,
    ) -> Result<(), PolicyLoadError> {
        let simples = &mut policy.simples;
        set_positive(&mut simples.ceiling, "simples.ceiling", self.simples.ceiling)?;
        if let Some(threshold) = self.simples.fator_r_threshold {
            ensure_non_negative("simples.fator_r_threshold", threshold)?;
            if threshold > Decimal::ONE {
                return Err(CalculationError::InvalidInput {
                    field: "simples.fator_r_threshold",
                    reason: format!("must be a ratio within 0-1, got {threshold}"),
                }
                .into());
            }
            simples.fator_r_threshold = threshold;
        }

        let presumido = &mut policy.presumido;
        let p = self.presumido;
        set_positive(&mut presumido.ceiling, "presumido.ceiling", p.ceiling)?;
        set_pct(&mut presumido.irpj_rate_pct, "presumido.irpj_rate_pct", p.irpj_rate_pct)?;
        set_pct(&mut presumido.surtax_rate_pct, "presumido.surtax_rate_pct", p.surtax_rate_pct)?;
        set_positive(
            &mut presumido.surtax_monthly_threshold,
            "presumido.surtax_monthly_threshold",
            p.surtax_monthly_threshold,
        )?;
        set_pct(&mut presumido.csll_rate_pct, "presumido.csll_rate_pct", p.csll_rate_pct)?;
        set_pct(&mut presumido.pis_rate_pct, "presumido.pis_rate_pct", p.pis_rate_pct)?;
        set_pct(&mut presumido.cofins_rate_pct, "presumido.cofins_rate_pct", p.cofins_rate_pct)?;
        for (key, presumption) in p.presumptions {
            let activity = activity_key("presumido.presumptions", &key)?;
            ensure_percentage("presumido.presumptions.irpj_pct", presumption.irpj_pct)?;
            ensure_percentage("presumido.presumptions.csll_pct", presumption.csll_pct)?;
            presumido.presumptions.insert(activity, presumption);
        }

        let real = &mut policy.real;
        let r = self.real;
        set_pct(&mut real.irpj_rate_pct, "real.irpj_rate_pct", r.irpj_rate_pct)?;
        set_pct(&mut real.surtax_rate_pct, "real.surtax_rate_pct", r.surtax_rate_pct)?;
        set_positive(
            &mut real.surtax_monthly_threshold,
            "real.surtax_monthly_threshold",
            r.surtax_monthly_threshold,
        )?;
        set_pct(&mut real.csll_rate_pct, "real.csll_rate_pct", r.csll_rate_pct)?;
        set_pct(
            &mut real.loss_offset_limit_pct,
            "real.loss_offset_limit_pct",
            r.loss_offset_limit_pct,
        )?;
        let income_tax_pct = real.irpj_rate_pct + real.surtax_rate_pct + real.csll_rate_pct;
        if income_tax_pct >= Decimal::ONE_HUNDRED {
            return Err(CalculationError::InvalidInput {
                field: "real.income_tax_pct",
                reason: format!(
                    "IRPJ, adicional and CSLL must stay below 100%, got {income_tax_pct}"
                ),
            }
            .into());
        }

        set_pct(&mut policy.credits.pis_pct, "credits.pis_pct", self.credits.pis_pct)?;
        set_pct(&mut policy.credits.cofins_pct, "credits.cofins_pct", self.credits.cofins_pct)?;

        let mei = &mut policy.mei;
        let m = self.mei;
        set_positive(&mut mei.ceiling, "mei.ceiling", m.ceiling)?;
        set_pct(
            &mut mei.excess_tolerance_pct,
            "mei.excess_tolerance_pct",
            m.excess_tolerance_pct,
        )?;
        for (key, fee) in m.monthly_fees {
            let activity = activity_key("mei.monthly_fees", &key)?;
            mei.monthly_fees
                .insert(activity, ensure_positive("mei.monthly_fees", fee)?);
        }
        set_positive(&mut mei.scan.start, "mei.scan_start", m.scan_start)?;
        set_positive(&mut mei.scan.end, "mei.scan_end", m.scan_end)?;
        set_positive(&mut mei.scan.step, "mei.scan_step", m.scan_step)?;
        mei.scan.validate()?;

        let reform = &mut policy.reform;
        set_pct(
            &mut reform.reference_iva_rate_pct,
            "reform.reference_iva_rate_pct",
            self.reform.reference_iva_rate_pct,
        )?;
        for (key, rate) in self.reform.selective_rates {
            let category =
                SelectiveCategory::parse(&key).ok_or_else(|| PolicyLoadError::UnknownKey {
                    section: "reform.selective_rates",
                    key: key.clone(),
                })?;
            reform
                .selective_rates
                .insert(category, ensure_percentage("reform.selective_rates", rate)?);
        }

        if let Some(steps) = self.transition {
            policy.transition = TransitionSchedule::new(steps)?;
        }

        tracing::debug!("applied policy overrides");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn test_empty_document_keeps_defaults() {
        let mut policy = TaxPolicy::default();

        PolicyOverrides::from_toml("")
            .expect("Failed to parse TOML")
            .apply(&mut policy)
            .expect("Failed to apply overrides");

        assert_eq!(policy, TaxPolicy::default());
    }

    #[test]
    fn test_overrides_scalar_rates() {
        let toml = r#"
            [credits]
            pis_pct = 1.65
            cofins_pct = 8

            [reform]
            reference_iva_rate_pct = 28
        "#;
        let mut policy = TaxPolicy::default();

        PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy)
            .expect("Failed to apply overrides");

        assert_eq!(policy.credits.cofins_pct, dec!(8));
        assert_eq!(policy.credits.combined_pct(), dec!(9.65));
        assert_eq!(policy.reform.reference_iva_rate_pct, dec!(28));
        assert_eq!(policy.presumido, TaxPolicy::default().presumido);
    }

    #[test]
    fn test_overrides_activity_maps() {
        let toml = r#"
            [presumido.presumptions.comercio]
            irpj_pct = 1.6
            csll_pct = 12

            [mei.monthly_fees]
            servicos = 81.90
        "#;
        let mut policy = TaxPolicy::default();

        PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy)
            .expect("Failed to apply overrides");

        assert_eq!(
            policy.presumido.presumption(Activity::Comercio).unwrap(),
            Presumption {
                irpj_pct: dec!(1.6),
                csll_pct: dec!(12),
            }
        );
        assert_eq!(policy.mei.monthly_fee(Activity::Servicos), Some(dec!(81.90)));
        assert_eq!(policy.mei.monthly_fee(Activity::Comercio), Some(dec!(75.90)));
    }

    #[test]
    fn test_replaces_transition_schedule() {
        let toml = r#"
            [[transition]]
            year = 2026
            old_system_weight_pct = 50
            new_system_weight_pct = 50

            [[transition]]
            year = 2027
            old_system_weight_pct = 0
            new_system_weight_pct = 100
        "#;
        let mut policy = TaxPolicy::default();

        PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy)
            .expect("Failed to apply overrides");

        assert_eq!(policy.transition.first_year(), 2026);
        assert_eq!(policy.transition.last_year(), 2027);
    }

    #[test]
    fn test_rejects_invalid_schedule() {
        let toml = r#"
            [[transition]]
            year = 2026
            old_system_weight_pct = 90
            new_system_weight_pct = 10
        "#;
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        assert!(matches!(
            result,
            Err(PolicyLoadError::Invalid(CalculationError::InvalidSchedule(_)))
        ));
    }

    #[test]
    fn test_rejects_unknown_activity() {
        let toml = "[mei.monthly_fees]\nagro = 80";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        match result {
            Err(PolicyLoadError::UnknownKey { section, key }) => {
                assert_eq!(section, "mei.monthly_fees");
                assert_eq!(key, "agro");
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_rate_out_of_range() {
        let toml = "[real]\ncsll_rate_pct = 120";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        let err = result.expect_err("Should fail for rate above 100");
        assert!(
            err.to_string().contains("real.csll_rate_pct"),
            "Expected field name in error, got: {}",
            err
        );
    }

    #[test]
    fn test_rejects_income_tax_of_whole_profit() {
        let toml = "[real]\nirpj_rate_pct = 50\nsurtax_rate_pct = 10\ncsll_rate_pct = 40";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        let err = result.expect_err("Should fail when income taxes take all profit");
        assert!(
            err.to_string().contains("real.income_tax_pct"),
            "Expected field name in error, got: {}",
            err
        );
    }

    #[test]
    fn test_rejects_scan_step_too_small_for_range() {
        let toml = "[mei]\nscan_step = 0.0001";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        let Err(PolicyLoadError::Invalid(CalculationError::InvalidInput { field, .. })) = result
        else {
            panic!("expected InvalidInput, got {result:?}");
        };
        assert_eq!(field, "scan.step");
    }

    #[test]
    fn test_rejects_scan_end_below_start() {
        let toml = "[mei]\nscan_start = 90000\nscan_end = 70000";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        assert!(matches!(
            result,
            Err(PolicyLoadError::Invalid(CalculationError::InvalidInput {
                field: "scan.end",
                ..
            }))
        ));
    }

    #[test]
    fn test_rejects_fator_r_given_as_percentage() {
        let toml = "[simples]\nfator_r_threshold = 28";
        let mut policy = TaxPolicy::default();

        let result = PolicyOverrides::from_toml(toml)
            .expect("Failed to parse TOML")
            .apply(&mut policy);

        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_unknown_section_field() {
        let result = PolicyOverrides::from_toml("[simples]\nteto = 1");

        assert!(matches!(result, Err(PolicyLoadError::Toml(_))));
    }
}
