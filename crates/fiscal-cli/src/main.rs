//! fiscal: command-line front end to the fiscal computation engine.
//!
//! Every command prints its result as pretty JSON on stdout.
//!
//! Usage:
//!   fiscal income --income 60000 --status married --dependents 2
//!   fiscal household --income-a 45000 --income-b 15000 --status married
//!   fiscal wealth --worth 1350000
//!   fiscal succession --amount 200000 --heir direct_line --abatement-remaining 100000
//!   fiscal wrapper --type av --opened 2015-03-01 --valuation 80000 --yield 0.04 --marginal-rate 0.30 --couple
//!   fiscal deduction --contribution 5000 --professional-income 60000 --unused-ceilings 2000 --marginal-rate 0.30
//!   fiscal tco --type cto --opened 2019-01-01 --valuation 100000 --yield 0.05
//!   fiscal isin FR0010315770 US0378331005
//!   fiscal enrich FR0010315770 IE00B4L5Y983
//!   fiscal parameters

mod args;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use fiscal_core::{
    FiscalProfile, HeirClass, InvestmentWrapperSnapshot, MaritalStatus, SuccessionTransfer,
    WealthAssessmentInput, WrapperType,
};
use fiscal_engine::{FiscalParameters, RetirementExit, TaxpayerContext};
use openfigi_client::{EnrichmentConfig, IdentifierEnrichmentClient};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use crate::args::Args;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let mut raw: Vec<String> = std::env::args().skip(1).collect();
    if raw.is_empty() || raw[0] == "--help" || raw[0] == "help" {
        print_usage();
        return Ok(());
    }
    let command = raw.remove(0);
    let args = Args::new(raw);

    let params = FiscalParameters::from_env().context("Failed to load fiscal parameters")?;
    tracing::debug!("Using {} fiscal parameters", params.year);

    match command.as_str() {
        "income" => income(&params, &args),
        "household" => household(&params, &args),
        "wealth" => wealth(&params, &args),
        "succession" => succession(&params, &args),
        "wrapper" => wrapper(&params, &args),
        "deduction" => deduction(&params, &args),
        "tco" => tco(&params, &args),
        "isin" => isin(&args),
        "enrich" => enrich(&args).await,
        "parameters" => {
            println!("{}", params.to_json_pretty()?);
            Ok(())
        }
        other => {
            print_usage();
            bail!("unknown command '{}'", other)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fiscal_cli=info,openfigi_client=warn".into());

    // Logs go to stderr so stdout stays valid JSON
    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn marital_status(args: &Args) -> Result<MaritalStatus> {
    match args.value("--status") {
        Some(status) => Ok(status.parse()?),
        None => Ok(MaritalStatus::default()),
    }
}

/// Profile from `--income` with either explicit `--parts` or the household rules.
fn profile(args: &Args) -> Result<FiscalProfile> {
    let income = args.decimal_required("--income")?;
    let status = marital_status(args)?;
    let dependents: u32 = args.parse("--dependents")?.unwrap_or(0);

    let profile = match args.decimal("--parts")? {
        Some(parts) => FiscalProfile::new(income, parts, status, dependents)?,
        None => FiscalProfile::with_standard_parts(income, status, dependents)?,
    };
    Ok(profile)
}

fn as_of(args: &Args) -> Result<NaiveDate> {
    Ok(args.date("--as-of")?.unwrap_or_else(|| Utc::now().date_naive()))
}

fn income(params: &FiscalParameters, args: &Args) -> Result<()> {
    let profile = profile(args)?;
    let result = params.income_tax().compute(&profile)?;
    print_json(&json!({ "profile": profile, "result": result }))
}

fn household(params: &FiscalParameters, args: &Args) -> Result<()> {
    let comparison = params.income_tax().compare_household_filing(
        args.decimal_required("--income-a")?,
        args.decimal_required("--income-b")?,
        marital_status(args)?,
    )?;
    print_json(&comparison)
}

fn wealth(params: &FiscalParameters, args: &Args) -> Result<()> {
    let input = WealthAssessmentInput {
        net_real_estate_worth: args.decimal_required("--worth")?,
    };
    print_json(&params.wealth_tax().compute(&input)?)
}

fn succession(params: &FiscalParameters, args: &Args) -> Result<()> {
    let heir_class: HeirClass = args.required("--heir")?.parse()?;
    let calculator = params.succession();

    let abatement_remaining = match args.decimal("--abatement-remaining")? {
        Some(remaining) => remaining,
        None => calculator.remaining_abatement(
            heir_class,
            args.date("--last-transfer")?,
            args.decimal("--used")?.unwrap_or(Decimal::ZERO),
            as_of(args)?,
        )?,
    };

    let transfer = SuccessionTransfer {
        amount: args.decimal_required("--amount")?,
        heir_class,
        abatement_remaining,
    };
    print_json(&calculator.compute(&transfer)?)
}

fn snapshot(args: &Args) -> Result<InvestmentWrapperSnapshot> {
    let snapshot = InvestmentWrapperSnapshot {
        wrapper_type: args.required("--type")?.parse::<WrapperType>()?,
        valuation: args.decimal("--valuation")?.unwrap_or(Decimal::ZERO),
        opening_date: args.date_required("--opened")?,
        annual_yield_estimate: args.decimal("--yield")?.unwrap_or(Decimal::ZERO),
        secondary_allocation_ratio: args.decimal("--secondary-ratio")?,
    };
    snapshot.validate()?;
    Ok(snapshot)
}

/// Taxpayer options: `--marginal-rate`, or a rate derived from `--income`.
fn context(params: &FiscalParameters, args: &Args) -> Result<TaxpayerContext> {
    let base = match args.decimal("--marginal-rate")? {
        Some(rate) => TaxpayerContext::new(rate),
        None if args.value("--income").is_some() => {
            TaxpayerContext::from_profile(&profile(args)?, &params.income_tax_scale)?
        }
        None => return Err(anyhow!("either --marginal-rate or --income is required")),
    };

    let couple = base.couple || args.has("--couple");
    let exit = match args.parse::<u32>("--annuity-age")? {
        Some(age) => RetirementExit::Annuity {
            age_at_first_payment: age,
        },
        None => RetirementExit::LumpSum,
    };

    Ok(base
        .with_progressive_option(args.has("--progressive"))
        .with_couple(couple)
        .with_retirement_exit(exit))
}

fn wrapper(params: &FiscalParameters, args: &Args) -> Result<()> {
    let snapshot = snapshot(args)?;
    let context = context(params, args)?;
    let resolved = params
        .wrapper_resolver()
        .resolve(&snapshot, as_of(args)?, &context)?;

    let gain = args
        .decimal("--gain")?
        .unwrap_or_else(|| snapshot.annual_gain());
    print_json(&json!({
        "regime": resolved,
        "gain": gain,
        "tax": resolved.tax_on(gain),
        "effective_rate": resolved.effective_rate_on(gain),
        "annual_interest_levy": resolved.annual_interest_levy(gain),
    }))
}

fn deduction(params: &FiscalParameters, args: &Args) -> Result<()> {
    let resolver = params.wrapper_resolver();
    let deduction = resolver.retirement_deduction(
        args.decimal_required("--contribution")?,
        args.decimal_required("--professional-income")?,
        args.decimal("--unused-ceilings")?.unwrap_or(Decimal::ZERO),
        args.decimal_required("--marginal-rate")?,
    )?;
    print_json(&deduction)
}

fn tco(params: &FiscalParameters, args: &Args) -> Result<()> {
    let snapshot = snapshot(args)?;
    let context = match args.value("--marginal-rate").or(args.value("--income")) {
        Some(_) => context(params, args)?,
        None => TaxpayerContext::new(Decimal::ZERO),
    };
    let resolved = params
        .wrapper_resolver()
        .resolve(&snapshot, as_of(args)?, &context)?;

    let engine = params.tco();
    let fee_rate = args
        .decimal("--fee-rate")?
        .unwrap_or_else(|| engine.default_fee_rate(snapshot.wrapper_type));
    let opportunity_rate = args.decimal("--opportunity-rate")?.unwrap_or(Decimal::ZERO);

    let breakdown = engine.compute(&snapshot, &resolved, fee_rate, opportunity_rate)?;
    print_json(&json!({
        "regime": resolved.regime,
        "fee_rate": fee_rate,
        "breakdown": breakdown,
        "cost_ratio": breakdown.cost_ratio(snapshot.valuation),
    }))
}

fn isin(args: &Args) -> Result<()> {
    let codes = args.positional();
    if codes.is_empty() {
        bail!("at least one ISIN is required");
    }
    let records: Vec<_> = codes
        .iter()
        .map(|code| identifier_validator::inspect(code))
        .collect();
    print_json(&records)
}

async fn enrich(args: &Args) -> Result<()> {
    let codes = args.positional();
    if codes.is_empty() {
        bail!("at least one ISIN is required");
    }

    let config = EnrichmentConfig::from_env();
    if config.api_key.is_none() {
        tracing::info!("OPENFIGI_API_KEY not set, using the anonymous rate tier");
    }
    let client = IdentifierEnrichmentClient::from_config(&config);

    let results = client.enrich_batch(codes.as_slice()).await;
    let records: Vec<_> = codes
        .iter()
        .map(|code| identifier_validator::normalize(code))
        .filter_map(|code| results.get(&code).cloned())
        .collect();
    print_json(&records)
}

fn print_usage() {
    eprintln!("Usage: fiscal <command> [--flag value]...");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  income      --income X [--parts P | --status S --dependents N]");
    eprintln!("  household   --income-a X --income-b Y --status S");
    eprintln!("  wealth      --worth X");
    eprintln!("  succession  --amount X --heir H [--abatement-remaining A | --last-transfer DATE --used U] [--as-of DATE]");
    eprintln!("  wrapper     --type pea|cto|av|per --opened DATE [--valuation V --yield Y --gain G]");
    eprintln!("              (--marginal-rate R | --income X ...) [--progressive] [--couple]");
    eprintln!("              [--annuity-age N] [--secondary-ratio R] [--as-of DATE]");
    eprintln!("  deduction   --contribution C --professional-income I --marginal-rate R [--unused-ceilings U]");
    eprintln!("  tco         wrapper flags plus [--fee-rate F] [--opportunity-rate O]");
    eprintln!("  isin        CODE...   offline format and checksum check");
    eprintln!("  enrich      CODE...   OpenFIGI lookup with cache and retries");
    eprintln!("  parameters  print the active fiscal parameters");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FISCAL_PARAMETERS_PATH   JSON parameters file (default: built-in 2024 tables)");
    eprintln!("  OPENFIGI_API_KEY, OPENFIGI_BASE_URL, OPENFIGI_TIMEOUT_SECS, OPENFIGI_RATE_LIMIT");
    eprintln!("  ISIN_CACHE_TTL_DAYS, LOG_FORMAT=json, RUST_LOG");
}
