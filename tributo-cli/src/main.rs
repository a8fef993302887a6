use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use tributo_cli::{app, logging, utils::parse_brl, utils::parse_expense};
use tributo_core::calculations::{
    ActualProfitCalculator, ActualProfitInput, BracketResolver, ComparisonInput, CreditLedger,
    DualVatSplitter, FatorRClassifier, LegacyRates, PresumedProfitCalculator,
    PresumedProfitInput, PricingCalculator, PricingInput, PricingRegime, ReformInput,
    ReformSimulator, RegimeComparator, ThresholdAdvisor, TransitionBlender, mei_quote,
};
use tributo_core::policy::SelectiveCategory;
use tributo_core::{Activity, Anexo, ApurationPeriod, ExpenseCategory, TaxPolicy, api};

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Brazilian tax-regime simulator.
///
/// Runs one calculator (or one JSON endpoint) against the built-in policy
/// tables, optionally overridden from files, and prints the result as JSON.
#[derive(Debug, Parser)]
#[command(name = "tributo", version)]
struct Cli {
    /// TOML file with policy overrides.
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// CSV file replacing Simples Anexo tables.
    #[arg(long, global = true)]
    anexos: Option<PathBuf>,

    /// Log filter ("warn", "debug", or any EnvFilter directive).
    /// Defaults to RUST_LOG, then "info".
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also append logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simples Nacional DAS for a revenue (RBT12).
    Simples {
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
        /// Activity; services pick Anexo III or V by Fator R.
        #[arg(long, value_parser = parse_activity, conflicts_with = "anexo")]
        activity: Option<Activity>,
        /// Monthly payroll used for Fator R.
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        payroll: Decimal,
        /// Explicit Anexo (I-V).
        #[arg(long, value_parser = parse_anexo)]
        anexo: Option<Anexo>,
    },

    /// Lucro Presumido for one period.
    Presumido {
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
        #[arg(long, value_parser = parse_activity)]
        activity: Activity,
        #[arg(long, value_parser = parse_period, default_value = "trimestral")]
        period: ApurationPeriod,
    },

    /// Lucro Real for one period.
    Real {
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        expenses: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        payroll: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        pis_credits: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        cofins_credits: Decimal,
        /// Prior tax loss available for compensation.
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        loss: Decimal,
        #[arg(long, value_parser = parse_period, default_value = "trimestral")]
        period: ApurationPeriod,
    },

    /// PIS/COFINS credits on purchases (categoria=valor, repeatable).
    Credits {
        #[arg(long = "expense", value_parser = parse_expense, required = true)]
        expenses: Vec<(ExpenseCategory, Decimal)>,
        /// Simulate debit minus credit against this revenue.
        #[arg(long, value_parser = parse_brl)]
        revenue: Option<Decimal>,
    },

    /// IBS/CBS split of a base, optionally netting purchase credits.
    DualVat {
        #[arg(long, value_parser = parse_brl)]
        base: Decimal,
        /// Combined IVA rate in percent; defaults to the reference rate.
        #[arg(long, value_parser = parse_brl)]
        rate: Option<Decimal>,
        #[arg(long, value_parser = parse_brl)]
        purchases: Option<Decimal>,
        #[arg(long, value_parser = parse_selective)]
        selective: Option<SelectiveCategory>,
    },

    /// Year-by-year blend of old-system and new-system tax.
    Transition {
        #[arg(long, value_parser = parse_brl)]
        old_tax: Decimal,
        #[arg(long, value_parser = parse_brl)]
        new_tax: Decimal,
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
    },

    /// Legacy taxes against IBS/CBS, blended over the transition.
    Reform {
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        purchases: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        pis_pct: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        cofins_pct: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        icms_pct: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        iss_pct: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        ipi_pct: Decimal,
        #[arg(long, value_parser = parse_brl)]
        rate: Option<Decimal>,
        #[arg(long, value_parser = parse_selective)]
        selective: Option<SelectiveCategory>,
    },

    /// Ranks MEI, Simples, Presumido and Real for annual figures.
    Compare {
        #[arg(long, value_parser = parse_brl)]
        revenue: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        payroll: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        expenses: Decimal,
        #[arg(long, value_parser = parse_activity)]
        activity: Activity,
        /// Creditable purchases for Lucro Real (categoria=valor).
        #[arg(long = "credit", value_parser = parse_expense)]
        credits: Vec<(ExpenseCategory, Decimal)>,
    },

    /// MEI fee against Simples: crossover scan, or a comparison at a revenue.
    Mei {
        #[arg(long, value_parser = parse_activity)]
        activity: Activity,
        #[arg(long, value_parser = parse_brl)]
        revenue: Option<Decimal>,
    },

    /// Sale price with taxes for a product or service.
    Pricing {
        #[arg(long, value_parser = parse_brl)]
        unit_cost: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        fixed: Decimal,
        #[arg(long, value_parser = parse_brl, default_value = "0")]
        variable_pct: Decimal,
        #[arg(long, value_parser = parse_brl)]
        quantity: Decimal,
        #[arg(long, value_parser = parse_brl)]
        margin: Decimal,
        /// simples, presumido or real.
        #[arg(long, default_value = "simples")]
        regime: String,
        #[arg(long, value_parser = parse_anexo, default_value = "I")]
        anexo: Anexo,
        #[arg(long, value_parser = parse_brl)]
        rbt12: Option<Decimal>,
        #[arg(long, value_parser = parse_activity, default_value = "comercio")]
        activity: Activity,
        /// Compare against the other regimes too.
        #[arg(long, default_value_t = false)]
        compare: bool,
    },

    /// Runs a JSON endpoint (e.g. /margem/calcular) on a request body.
    Call {
        route: String,
        /// File with the JSON body, or "-" for stdin.
        #[arg(long, default_value = "-")]
        body: String,
    },
}

// ─── argument parsers ────────────────────────────────────────────────────────

fn parse_activity(s: &str) -> Result<Activity, String> {
    Activity::parse(s).ok_or_else(|| format!("unknown activity '{s}'"))
}

fn parse_anexo(s: &str) -> Result<Anexo, String> {
    Anexo::parse(s).ok_or_else(|| format!("unknown Anexo '{s}'"))
}

fn parse_period(s: &str) -> Result<ApurationPeriod, String> {
    ApurationPeriod::parse(s).ok_or_else(|| format!("unknown period '{s}'"))
}

fn parse_selective(s: &str) -> Result<SelectiveCategory, String> {
    SelectiveCategory::parse(s).ok_or_else(|| format!("unknown selective category '{s}'"))
}

fn expense_map(pairs: Vec<(ExpenseCategory, Decimal)>) -> BTreeMap<ExpenseCategory, Decimal> {
    let mut map = BTreeMap::new();
    for (category, amount) in pairs {
        *map.entry(category).or_insert(Decimal::ZERO) += amount;
    }
    map
}

// ─── commands ────────────────────────────────────────────────────────────────

fn run(
    policy: &TaxPolicy,
    command: Command,
) -> Result<String> {
    match command {
        Command::Simples {
            revenue,
            activity,
            payroll,
            anexo,
        } => {
            let anexo = match (anexo, activity) {
                (Some(anexo), _) => anexo,
                (None, Some(activity)) => {
                    FatorRClassifier::new(policy.simples.fator_r_threshold)
                        .anexo_for(activity, payroll, revenue)?
                        .anexo
                }
                (None, None) => anyhow::bail!("either --activity or --anexo is required"),
            };
            let table = policy.simples.table(anexo)?;
            let resolver = BracketResolver::new(table);
            let resolution = resolver.resolve(revenue)?;
            let tax = resolver.tax_for(revenue)?;
            app::render(&serde_json::json!({
                "resolution": resolution,
                "tax": tax,
            }))
        }

        Command::Presumido {
            revenue,
            activity,
            period,
        } => {
            let result = PresumedProfitCalculator::new(&policy.presumido).calculate(
                &PresumedProfitInput {
                    revenue,
                    activity,
                    period,
                },
            )?;
            app::render(&result)
        }

        Command::Real {
            revenue,
            expenses,
            payroll,
            pis_credits,
            cofins_credits,
            loss,
            period,
        } => {
            let input = ActualProfitInput {
                pis_credits,
                cofins_credits,
                compensable_loss: loss,
                ..ActualProfitInput::new(revenue, expenses, payroll, period)
            };
            let result =
                ActualProfitCalculator::new(&policy.real, &policy.credits).calculate(&input)?;
            app::render(&result)
        }

        Command::Credits { expenses, revenue } => {
            let ledger = CreditLedger::new(&policy.credits);
            let expenses = expense_map(expenses);
            match revenue {
                Some(revenue) => app::render(&ledger.simulate(&expenses, revenue)?),
                None => app::render(&ledger.calculate(&expenses)?),
            }
        }

        Command::DualVat {
            base,
            rate,
            purchases,
            selective,
        } => {
            let splitter = DualVatSplitter::new(&policy.reform);
            let rate = rate.unwrap_or(policy.reform.reference_iva_rate_pct);
            match purchases {
                Some(purchases) => {
                    app::render(&splitter.split_with_credits(base, purchases, rate, selective)?)
                }
                None => app::render(&splitter.split(base, rate, selective)?),
            }
        }

        Command::Transition {
            old_tax,
            new_tax,
            revenue,
        } => {
            let projection =
                TransitionBlender::new(&policy.transition).blend(old_tax, new_tax, revenue)?;
            app::render(&projection)
        }

        Command::Reform {
            revenue,
            purchases,
            pis_pct,
            cofins_pct,
            icms_pct,
            iss_pct,
            ipi_pct,
            rate,
            selective,
        } => {
            let input = ReformInput {
                revenue,
                creditable_purchases: purchases,
                legacy: LegacyRates {
                    pis_pct,
                    cofins_pct,
                    icms_pct,
                    iss_pct,
                    ipi_pct,
                },
                iva_rate_pct: rate,
                selective,
            };
            let scenario =
                ReformSimulator::new(&policy.reform, &policy.transition).simulate(&input)?;
            app::render(&scenario)
        }

        Command::Compare {
            revenue,
            payroll,
            expenses,
            activity,
            credits,
        } => {
            let input = ComparisonInput {
                annual_revenue: revenue,
                annual_payroll: payroll,
                annual_operating_expenses: expenses,
                activity,
                creditable_expenses: (!credits.is_empty()).then(|| expense_map(credits)),
            };
            let comparison = RegimeComparator::new(policy).compare(&input)?;
            for line in &comparison.recommendations {
                debug!(recommendation = %line);
            }
            app::render(&comparison)
        }

        Command::Mei { activity, revenue } => {
            let Some(fee) = policy.mei.monthly_fee(activity) else {
                let quote = mei_quote(&policy.mei, activity, revenue.unwrap_or(policy.mei.ceiling));
                return app::render(&quote);
            };
            let selection = FatorRClassifier::new(policy.simples.fator_r_threshold).anexo_for(
                activity,
                Decimal::ZERO,
                revenue.unwrap_or(policy.mei.ceiling),
            )?;
            let table = policy.simples.table(selection.anexo)?;
            let advisor = ThresholdAdvisor::new(&policy.mei, table);
            match revenue {
                Some(revenue) => app::render(&advisor.compare_at(revenue, fee)?),
                None => app::render(&advisor.find_crossover(fee)?),
            }
        }

        Command::Pricing {
            unit_cost,
            fixed,
            variable_pct,
            quantity,
            margin,
            regime,
            anexo,
            rbt12,
            activity,
            compare,
        } => {
            let rbt12 = rbt12.unwrap_or((unit_cost * quantity + fixed) * Decimal::from(12));
            let simples = PricingRegime::Simples { anexo, rbt12 };
            let presumido = PricingRegime::Presumido { activity };
            let selected = match regime.trim().to_ascii_lowercase().as_str() {
                "simples" => simples.clone(),
                "presumido" => presumido.clone(),
                "real" => PricingRegime::Real,
                other => anyhow::bail!("unknown pricing regime '{other}' (simples, presumido, real)"),
            };
            let input = PricingInput {
                unit_cost,
                monthly_fixed_expenses: fixed,
                variable_expenses_pct: variable_pct,
                monthly_quantity: quantity,
                desired_margin_pct: margin,
                regime: selected,
            };
            let calculator = PricingCalculator::new(policy);
            let result = if compare {
                calculator.compare(&input, &[simples, presumido, PricingRegime::Real])?
            } else {
                calculator.calculate(&input)?
            };
            app::render(&result)
        }

        Command::Call { route, body } => {
            let body = app::read_body(&body)?;
            let (status, response) = api::respond(policy, &route, &body);
            debug!(%route, status, "endpoint responded");
            let rendered = app::render(&response)?;
            if status != 200 {
                anyhow::bail!("{route} answered {status}:\n{rendered}");
            }
            Ok(rendered)
        }
    }
}

// ─── entry point ─────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    logging::init_logging();
    if let Some(level) = &cli.log_level {
        if let Err(error) = logging::set_log_level(level) {
            warn!(%error, "keeping the default log level");
        }
    }
    if let Some(path) = &cli.log_file {
        if let Err(error) = logging::enable_file_logging(path) {
            warn!(%error, "file logging disabled");
        }
    }

    let result = app::load_policy(cli.policy.as_deref(), cli.anexos.as_deref())
        .context("Failed to build tax policy")
        .and_then(|policy| run(&policy, cli.command));

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
