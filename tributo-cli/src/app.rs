//! Policy assembly and request plumbing shared by the subcommands.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};
use tributo_core::TaxPolicy;
use tributo_data::{AnexoTableLoader, PolicyOverrides};

/// Built-in policy with the optional TOML overrides and Anexo CSV applied,
/// in that order.
pub fn load_policy(
    overrides: Option<&Path>,
    anexos: Option<&Path>,
) -> Result<TaxPolicy> {
    let mut policy = TaxPolicy::default();

    if let Some(path) = overrides {
        PolicyOverrides::from_path(path)
            .and_then(|overrides| overrides.apply(&mut policy))
            .with_context(|| format!("Invalid policy file: {}", path.display()))?;
        info!(path = %path.display(), "applied policy overrides");
    }

    if let Some(path) = anexos {
        let file =
            File::open(path).with_context(|| format!("Failed to open: {}", path.display()))?;
        let tables = AnexoTableLoader::load(file)
            .with_context(|| format!("Failed to load Anexo tables: {}", path.display()))?;
        let replaced = AnexoTableLoader::apply(&mut policy, tables);
        info!(path = %path.display(), replaced, "loaded Anexo tables");
    }

    debug!(
        transition_first = policy.transition.first_year(),
        transition_last = policy.transition.last_year(),
        "policy ready"
    );
    Ok(policy)
}

/// Request body from a file, or from stdin when `source` is `-`.
pub fn read_body(source: &str) -> Result<String> {
    if source == "-" {
        let mut body = String::new();
        io::stdin()
            .read_to_string(&mut body)
            .context("Failed to read request body from stdin")?;
        return Ok(body);
    }
    fs::read_to_string(source).with_context(|| format!("Failed to read request body: {source}"))
}

/// Pretty JSON for stdout.
pub fn render<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to serialize result")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn load_policy_without_files_is_default() {
        let policy = load_policy(None, None).unwrap();

        assert_eq!(policy, TaxPolicy::default());
    }

    #[test]
    fn load_policy_reports_missing_file() {
        let err = load_policy(Some(Path::new("missing-policy.toml")), None).unwrap_err();

        assert!(format!("{err:#}").contains("missing-policy.toml"));
    }

    #[test]
    fn render_emits_decimals_as_numbers() {
        #[derive(Serialize)]
        struct Sample {
            #[serde(with = "rust_decimal::serde::float")]
            total: rust_decimal::Decimal,
        }

        let text = render(&Sample { total: dec!(61300) }).unwrap();

        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&text).unwrap(),
            json!({ "total": 61300.0 })
        );
    }
}
