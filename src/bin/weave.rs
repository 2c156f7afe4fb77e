//! weave: the sqlweave CLI
//!
//! # Usage
//!
//! ```bash
//! # Show generated SQL for each dialect
//! weave compile script.weave --dialect mysql
//!
//! # Run a script
//! weave run script.weave --target postgres://localhost/app --var limit=10
//!
//! # Round-trip formatting
//! weave fmt script.weave
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlweave::ast::Value;
use sqlweave::binder::Binder;
use sqlweave::engine::{ExecutionContext, Record, ScriptExecutor, StatementOutcome, Target, VarValue};
use sqlweave::prelude::*;
use sqlweave::transpiler::ParamValue;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "weave")]
#[command(version)]
#[command(about = "One script, many backends", long_about = None)]
#[command(after_help = "EXAMPLES:
    weave tokens script.weave
    weave compile script.weave --dialect sqlserver
    weave run script.weave --var floor=10 --dry-run
    cat script.weave | weave fmt -")]
struct Cli {
    /// Config file (default: ./weave.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the token stream
    Tokens {
        /// Script file, or - for stdin
        script: String,
    },
    /// Dump the parsed syntax tree as JSON
    Parse {
        script: String,
    },
    /// Re-render the script in canonical form
    Fmt {
        script: String,
    },
    /// Bind and generate parameterized commands
    Compile {
        script: String,

        /// Target dialect (default from config)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Execute the script
    Run {
        script: String,

        /// Initial target URI
        #[arg(short, long, env = "WEAVE_TARGET")]
        target: Option<String>,

        /// Script variable, as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Don't execute, just show the generated commands
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = WeaveConfig::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    match cli.command {
        Commands::Tokens { script } => show_tokens(&read_script(&script)?),
        Commands::Parse { script } => {
            let model = sqlweave::parse(&read_script(&script)?)?;
            println!("{}", serde_json::to_string_pretty(&model)?);
            Ok(())
        }
        Commands::Fmt { script } => {
            let model = sqlweave::parse(&read_script(&script)?)?;
            print!("{}", format_script(&model));
            Ok(())
        }
        Commands::Compile {
            script,
            dialect,
            format,
        } => {
            let catalog = config.load_catalog()?;
            let bound = sqlweave::compile(&read_script(&script)?, &catalog)?;
            show_compiled(&bound, dialect.unwrap_or(config.dialect), format)
        }
        Commands::Run {
            script,
            target,
            vars,
            dry_run,
            format,
        } => run_script(&config, &read_script(&script)?, target, &vars, dry_run, format).await,
    }
}

fn init_logging(config: &WeaveConfig, verbose: bool) {
    let fallback = if verbose {
        "sqlweave=debug".to_string()
    } else {
        config.log_filter.clone().unwrap_or_else(|| "warn".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

fn read_script(source: &str) -> Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(source).with_context(|| format!("cannot read {}", source))
}

fn show_tokens(text: &str) -> Result<()> {
    for token in sqlweave::lexer::tokenize(text)? {
        println!(
            "{:>4}:{:<4} {:<18} {}",
            token.position.line,
            token.position.column,
            token.kind.describe().cyan(),
            token.lexeme.white()
        );
    }
    Ok(())
}

fn show_compiled(bound: &BoundScript, dialect: Dialect, format: OutputFormat) -> Result<()> {
    let compiled = generate(bound, dialect)?;
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&compiled)?);
        return Ok(());
    }

    println!("{} {}", "Dialect:".dimmed(), dialect.to_string().cyan());
    for statement in &compiled {
        let Some(command) = &statement.command else {
            println!("{} {}", format!("[{}]", statement.index).dimmed(), statement.verb.dimmed());
            continue;
        };
        println!("{} {}", format!("[{}]", statement.index).dimmed(), command.text.white());
        for param in &command.params {
            let value = match &param.value {
                ParamValue::Literal(v) => v.to_string(),
                ParamValue::Variable(name) => format!("@{}", name),
            };
            println!("      {} = {}", param.placeholder.cyan(), value.yellow());
        }
    }
    Ok(())
}

async fn run_script(
    config: &WeaveConfig,
    text: &str,
    target: Option<String>,
    vars: &[String],
    dry_run: bool,
    format: OutputFormat,
) -> Result<()> {
    let variables = vars
        .iter()
        .map(|v| parse_var(v))
        .collect::<Result<Vec<_>>>()?;

    let catalog = config.load_catalog()?;
    let script = sqlweave::parse(text)?;
    let bound = Binder::new(&catalog)
        .with_variables(variables.iter().map(|(name, _)| name.as_str()))
        .bind(script)?;

    let target = target.or_else(|| config.target.clone());

    if dry_run {
        let dialect = match &target {
            Some(uri) => Target::parse(uri)?.dialect().unwrap_or(config.dialect),
            None => config.dialect,
        };
        return show_compiled(&bound, dialect, format);
    }

    let executor = ScriptExecutor::with_defaults(config.http_timeout())?
        .with_named_targets(config.targets.clone());

    let mut context = ExecutionContext::new();
    if let Some(uri) = &target {
        context = context.with_target(uri)?;
    }
    for (name, value) in variables {
        context.set_variable(&name, VarValue::Scalar(value));
    }

    let token = context.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    match executor.execute(&bound, &mut context).await {
        Ok(report) => {
            for result in &report.results {
                show_outcome(result.index, result.verb, &result.outcome, format);
            }
            Ok(())
        }
        Err(failure) => {
            for result in &failure.completed.results {
                show_outcome(result.index, result.verb, &result.outcome, format);
            }
            bail!(failure)
        }
    }
}

/// `name=value`; the value is typed like a literal.
fn parse_var(text: &str) -> Result<(String, Value)> {
    let Some((name, raw)) = text.split_once('=') else {
        bail!("--var expects name=value, got '{}'", text);
    };
    let value = if let Ok(n) = raw.parse::<i64>() {
        Value::Int(n)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if raw.eq_ignore_ascii_case("true") {
        Value::Bool(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Value::Bool(false)
    } else if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else {
        Value::String(raw.to_string())
    };
    Ok((name.trim_start_matches('@').to_string(), value))
}

fn show_outcome(index: usize, verb: &str, outcome: &StatementOutcome, format: OutputFormat) {
    let label = format!("[{}] {}", index, verb).dimmed();
    match outcome {
        StatementOutcome::Skipped => {}
        StatementOutcome::TargetChanged(target) => println!("{} {} {}", label, "→".green(), target.cyan()),
        StatementOutcome::Affected(n) => println!("{} {} {} rows affected", label, "✓".green(), n),
        StatementOutcome::Produced(n) => println!("{} {} {} records produced", label, "✓".green(), n),
        StatementOutcome::Bound { variables, rows } => {
            let names: Vec<String> = variables.iter().map(|v| format!("@{}", v)).collect();
            println!("{} {} {} ({} rows)", label, "✓".green(), names.join(", ").cyan(), rows);
        }
        StatementOutcome::Rows(rows) => {
            println!("{}", label);
            format_output(rows, format);
        }
    }
}

fn format_output(results: &[Record], format: OutputFormat) {
    if results.is_empty() {
        println!("{}", "(no results)".dimmed());
        return;
    }

    match format {
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = results
                .iter()
                .map(sqlweave::engine::transport::record_to_json)
                .collect();
            println!("{}", serde_json::to_string_pretty(&json).unwrap_or_default());
        }
        OutputFormat::Table => {
            let columns: Vec<&String> = results[0].keys().collect();

            let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
            for row in results {
                for (i, col) in columns.iter().enumerate() {
                    let len = row.get(*col).map(cell).unwrap_or_default().chars().count();
                    widths[i] = widths[i].max(len);
                }
            }

            let header: Vec<String> = columns
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!("{:width$}", c, width = *w))
                .collect();
            println!("{}", header.join(" │ ").white().bold());

            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            println!("{}", sep.join("─┼─").dimmed());

            for row in results {
                let cells: Vec<String> = columns
                    .iter()
                    .zip(&widths)
                    .map(|(c, w)| format!("{:width$}", row.get(*c).map(cell).unwrap_or_default(), width = *w))
                    .collect();
                println!("{}", cells.join(" │ "));
            }

            println!();
            println!("{} row(s) returned", results.len().to_string().cyan());
        }
    }
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}
