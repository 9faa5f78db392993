// modelrecon CLI - reconcile two versions of a spreadsheet financial model

mod exit_codes;
mod render;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use modelrecon_recon::{DrillDownOutcome, ReconConfig, ReconError, SheetSelection, StatementType};
use tracing_subscriber::EnvFilter;

use exit_codes::{
    recon_exit_code, EXIT_CONFIG, EXIT_DRILL_UNAVAILABLE, EXIT_ERROR, EXIT_OUTPUT, EXIT_SUCCESS,
};

#[derive(Parser)]
#[command(name = "modelrecon")]
#[command(about = "Reconcile two versions of a spreadsheet financial model")]
#[command(version)]
#[command(subcommand_required = false)]
struct Cli {
    /// TOML file with structural, matching and drill-down settings
    #[arg(long, global = true, env = "MODELRECON_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG applies otherwise.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the sheets of a workbook with their detected statement type
    #[command(after_help = "\
Examples:
  modelrecon sheets model_v1.xlsx
  modelrecon sheets model_v1.xlsx --against model_v2.xlsx
  modelrecon sheets model_v1.xlsx --json")]
    Sheets {
        /// Workbook to inspect
        file: PathBuf,

        /// Second workbook; sheets present in both are marked
        #[arg(long)]
        against: Option<PathBuf>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Parse one sheet into periods and line items
    #[command(after_help = "\
Examples:
  modelrecon parse model.xlsx --sheet \"Income Statement\"
  modelrecon parse model.xlsx -s IS --json
  modelrecon parse model.xlsx -s IS --chronological")]
    Parse {
        /// Workbook to read
        file: PathBuf,

        /// Sheet name
        #[arg(long, short = 's')]
        sheet: String,

        /// List periods in date order instead of column order
        #[arg(long)]
        chronological: bool,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Match line items across two model versions and compute variances
    #[command(after_help = "\
Sheets are assigned to statement types with TYPE=NAME, where TYPE is
income_statement (is), balance_sheet (bs) or cash_flow (cf).

Examples:
  modelrecon reconcile v1.xlsx v2.xlsx --sheet is=P&L --period 1Q25
  modelrecon reconcile v1.xlsx v2.xlsx --sheet is=IS --sheet bs=BS --period FY2024 --json
  modelrecon reconcile v1.xlsx v2.xlsx --sheet is=IS --new-sheet is=\"IS (restated)\" -p 1Q25")]
    Reconcile {
        /// Old model
        old: PathBuf,

        /// New model
        new: PathBuf,

        /// Sheet role in both models (TYPE=NAME, repeatable)
        #[arg(long = "sheet", short = 's', value_parser = parse_role)]
        sheets: Vec<(StatementType, String)>,

        /// Sheet role in the new model only, overriding --sheet (TYPE=NAME)
        #[arg(long = "new-sheet", value_parser = parse_role)]
        new_sheets: Vec<(StatementType, String)>,

        /// Period to compare, as written in the header row
        #[arg(long, short = 'p')]
        period: String,

        /// Output JSON to stdout instead of a table
        #[arg(long)]
        json: bool,

        /// Also write the JSON report to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Estimate whether a line item's formula can be drilled into
    #[command(after_help = "\
Examples:
  modelrecon preview model.xlsx --sheet IS --item \"Gross Profit\"")]
    Preview {
        /// Workbook to read
        file: PathBuf,

        /// Sheet name
        #[arg(long, short = 's')]
        sheet: String,

        /// Line item label
        #[arg(long, short = 'i')]
        item: String,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Attribute a line item's change to the inputs of its formula
    #[command(after_help = "\
Examples:
  modelrecon drill v1.xlsx v2.xlsx --sheet IS --item \"Gross Profit\" --period 1Q25
  modelrecon drill v1.xlsx v2.xlsx -s IS -i EBITDA -p FY2024 --depth 4 --json")]
    Drill {
        /// Old model
        old: PathBuf,

        /// New model
        new: PathBuf,

        /// Sheet name (same in both models)
        #[arg(long, short = 's')]
        sheet: String,

        /// Line item label
        #[arg(long, short = 'i')]
        item: String,

        /// Period to compare
        #[arg(long, short = 'p')]
        period: String,

        /// Dependency depth budget (defaults to drill_down.max_depth)
        #[arg(long)]
        depth: Option<usize>,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show usage
            eprintln!("Usage: modelrecon <command> [options]");
            eprintln!("       modelrecon --help for more information");
            Ok(())
        }
        Some(command) => load_config(cli.config.as_deref()).and_then(|config| run(command, &config)),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(command: Commands, config: &ReconConfig) -> Result<(), CliError> {
    match command {
        Commands::Sheets { file, against, json } => cmd_sheets(&file, against.as_deref(), json, config),
        Commands::Parse { file, sheet, chronological, json } => cmd_parse(&file, &sheet, chronological, json, config),
        Commands::Reconcile { old, new, sheets, new_sheets, period, json, output } => {
            let selection = build_selection(sheets, new_sheets);
            cmd_reconcile(&old, &new, &selection, &period, json, output.as_deref(), config)
        }
        Commands::Preview { file, sheet, item, json } => cmd_preview(&file, &sheet, &item, json, config),
        Commands::Drill { old, new, sheet, item, period, depth, json } => {
            cmd_drill(&old, &new, &sheet, &item, &period, depth, json, config)
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn output(err: io::Error) -> Self {
        Self { code: EXIT_OUTPUT, message: format!("cannot write output: {err}"), hint: None }
    }

    /// Create error from a library error with its registry exit code.
    pub fn recon(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::Structural(_) => {
                Some("run `modelrecon sheets <file>` to see which sheets have a period header".to_string())
            }
            ReconError::NoSheetsRequested => {
                Some("pass --sheet TYPE=NAME, e.g. --sheet income_statement=\"P&L\"".to_string())
            }
            ReconError::FileAccess(_) => Some("expected a readable .xlsx, .xlsm, .xls or .ods file".to_string()),
            _ => None,
        };
        let message = match &err {
            ReconError::AllSheetsFailed { failures } => {
                let mut msg = err.to_string();
                for f in failures {
                    msg.push_str(&format!("\n  {} '{}': {}", f.statement_type, f.sheet_name, f.error));
                }
                msg
            }
            _ => err.to_string(),
        };
        Self { code, message, hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        CliError::recon(err)
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<ReconConfig, CliError> {
    let Some(path) = path else {
        return Ok(ReconConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|e| CliError {
        code: EXIT_CONFIG,
        message: format!("cannot read config {}: {e}", path.display()),
        hint: None,
    })?;
    let config = ReconConfig::from_toml(&text)?;
    log::debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse `TYPE=NAME`. The sheet name may itself contain `=`.
fn parse_role(s: &str) -> Result<(StatementType, String), String> {
    let (kind, name) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=NAME, got '{s}'"))?;
    let kind: StatementType = kind.parse()?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing sheet name in '{s}'"));
    }
    Ok((kind, name.to_string()))
}

fn build_selection(
    shared: Vec<(StatementType, String)>,
    new_only: Vec<(StatementType, String)>,
) -> SheetSelection {
    let roles: BTreeMap<StatementType, String> = shared.into_iter().collect();
    let mut selection = SheetSelection::both(roles);
    selection.new.extend(new_only);
    selection
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CliError { code: EXIT_ERROR, message: format!("JSON serialization error: {e}"), hint: None })?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}").map_err(CliError::output)
}

// ============================================================================
// sheets
// ============================================================================

fn cmd_sheets(file: &Path, against: Option<&Path>, json: bool, config: &ReconConfig) -> Result<(), CliError> {
    let summaries = modelrecon_recon::discover_sheets(file, config)?;
    let common = match against {
        Some(other) => Some(modelrecon_recon::common_sheets(file, other)?),
        None => None,
    };

    if json {
        #[derive(serde::Serialize)]
        struct SheetsOutput<'a> {
            sheets: &'a [modelrecon_recon::SheetSummary],
            #[serde(skip_serializing_if = "Option::is_none")]
            common: Option<&'a [String]>,
        }
        return print_json(&SheetsOutput { sheets: &summaries, common: common.as_deref() });
    }

    let mut stdout = io::stdout().lock();
    render::sheets(&mut stdout, &summaries, common.as_deref()).map_err(CliError::output)
}

// ============================================================================
// parse
// ============================================================================

fn cmd_parse(file: &Path, sheet: &str, chronological: bool, json: bool, config: &ReconConfig) -> Result<(), CliError> {
    let mut statement = modelrecon_recon::parse_statement(file, sheet, config)?;
    if chronological {
        modelrecon_recon::sort_chronologically(&mut statement.periods);
    }
    if json {
        return print_json(&statement);
    }
    let mut stdout = io::stdout().lock();
    render::statement(&mut stdout, &statement).map_err(CliError::output)
}

// ============================================================================
// reconcile
// ============================================================================

fn cmd_reconcile(
    old: &Path,
    new: &Path,
    selection: &SheetSelection,
    period: &str,
    json: bool,
    output: Option<&Path>,
    config: &ReconConfig,
) -> Result<(), CliError> {
    if selection.old.is_empty() {
        return Err(CliError::recon(ReconError::NoSheetsRequested)
            .with_hint(format!("list candidate sheets with `modelrecon sheets {} --against {}`", old.display(), new.display())));
    }

    let report = modelrecon_recon::reconcile(old, new, selection, period, config)?;

    if let Some(path) = output {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError { code: EXIT_ERROR, message: format!("JSON serialization error: {e}"), hint: None })?;
        std::fs::write(path, json_str).map_err(CliError::output)?;
        eprintln!("wrote {}", path.display());
    }

    if json {
        return print_json(&report);
    }
    let mut stdout = io::stdout().lock();
    render::report(&mut stdout, &report).map_err(CliError::output)
}

// ============================================================================
// preview / drill
// ============================================================================

fn cmd_preview(file: &Path, sheet: &str, item: &str, json: bool, config: &ReconConfig) -> Result<(), CliError> {
    let preview = modelrecon_recon::preview_drill_down(file, sheet, item, config)?;
    if json {
        return print_json(&preview);
    }
    let mut stdout = io::stdout().lock();
    render::preview(&mut stdout, item, &preview).map_err(CliError::output)
}

#[allow(clippy::too_many_arguments)]
fn cmd_drill(
    old: &Path,
    new: &Path,
    sheet: &str,
    item: &str,
    period: &str,
    depth: Option<usize>,
    json: bool,
    config: &ReconConfig,
) -> Result<(), CliError> {
    let outcome = modelrecon_recon::drill_down(old, new, sheet, item, period, depth, config)?;

    if json {
        print_json(&outcome)?;
    }

    match outcome {
        DrillDownOutcome::Available(result) => {
            if json {
                return Ok(());
            }
            let mut stdout = io::stdout().lock();
            render::drill(&mut stdout, &result).map_err(CliError::output)
        }
        DrillDownOutcome::Unavailable { reason } => Err(CliError {
            code: EXIT_DRILL_UNAVAILABLE,
            message: format!("cannot drill into '{item}': {reason}"),
            hint: Some(format!("check with `modelrecon preview <file> --sheet {sheet} --item \"{item}\"`")),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("modelrecon").chain(args.iter().copied()))
    }

    #[test]
    fn role_parsing() {
        assert_eq!(parse_role("is=P&L").unwrap(), (StatementType::IncomeStatement, "P&L".into()));
        assert_eq!(parse_role("balance_sheet= BS ").unwrap(), (StatementType::BalanceSheet, "BS".into()));
        assert_eq!(parse_role("cf=Cash=Flow").unwrap(), (StatementType::CashFlow, "Cash=Flow".into()));
        assert!(parse_role("IS").is_err());
        assert!(parse_role("is=").is_err());
        assert!(parse_role("equity=Sheet1").is_err());
    }

    #[test]
    fn reconcile_args() {
        let cli = parse(&[
            "reconcile", "v1.xlsx", "v2.xlsx", "--sheet", "is=IS", "-s", "bs=Balance", "--new-sheet", "is=IS (new)",
            "--period", "1Q25", "--json",
        ])
        .unwrap();
        let Some(Commands::Reconcile { old, sheets, new_sheets, period, json, output, .. }) = cli.command else {
            panic!("expected reconcile");
        };
        assert_eq!(old, PathBuf::from("v1.xlsx"));
        assert_eq!(sheets.len(), 2);
        assert_eq!(period, "1Q25");
        assert!(json);
        assert!(output.is_none());

        let selection = build_selection(sheets, new_sheets);
        assert_eq!(selection.old[&StatementType::IncomeStatement], "IS");
        assert_eq!(selection.new[&StatementType::IncomeStatement], "IS (new)");
        assert_eq!(selection.new[&StatementType::BalanceSheet], "Balance");
    }

    #[test]
    fn reconcile_requires_period() {
        assert!(parse(&["reconcile", "v1.xlsx", "v2.xlsx", "--sheet", "is=IS"]).is_err());
    }

    #[test]
    fn bad_role_is_a_usage_error() {
        let err = match parse(&["reconcile", "a.xlsx", "b.xlsx", "--sheet", "IS", "-p", "1Q25"]) {
            Ok(_) => panic!("accepted a role without '='"),
            Err(e) => e,
        };
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn drill_args() {
        let cli = parse(&["drill", "a.xlsx", "b.xlsx", "-s", "IS", "-i", "Gross Profit", "-p", "FY2024", "--depth", "4"])
            .unwrap();
        let Some(Commands::Drill { item, depth, json, .. }) = cli.command else {
            panic!("expected drill");
        };
        assert_eq!(item, "Gross Profit");
        assert_eq!(depth, Some(4));
        assert!(!json);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["preview", "m.xlsx", "--sheet", "IS", "--item", "EBITDA", "-vv", "--config", "r.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("r.toml")));
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = parse(&[]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn missing_config_file_maps_to_config_code() {
        let err = load_config(Some(Path::new("/nonexistent/modelrecon.toml"))).unwrap_err();
        assert_eq!(err.code, EXIT_CONFIG);
    }

    #[test]
    fn all_sheets_failed_lists_each_failure() {
        use modelrecon_recon::model::SheetFailure;
        use modelrecon_recon::StructuralError;

        let err = CliError::recon(ReconError::AllSheetsFailed {
            failures: vec![SheetFailure {
                statement_type: StatementType::IncomeStatement,
                sheet_name: "IS".into(),
                error: StructuralError::NoHeaderRow { sheet: "IS".into(), scanned: 10 },
            }],
        });
        assert_eq!(err.code, exit_codes::EXIT_ALL_SHEETS_FAILED);
        assert!(err.message.contains("income_statement 'IS'"), "{}", err.message);
    }
}
