//! Vigil CLI binary entry point.
//! Resolves configuration, runs the engine, and prints results.
//!
//! Exit codes: 0 clean, 1 blocking violations (or scan errors with
//! `--fail-on-errors`), 2 configuration or setup failure.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vigil::cli::{Cli, Commands, RulesetCmd};
use vigil::config::{self, CliOverrides};
use vigil::diff::{DiffSet, HunkHeaders};
use vigil::loader::load_ruleset;
use vigil::modules::default_registry;
use vigil::output;
use vigil::processor::{CancelToken, Strategy};
use vigil::scan::{Engine, ScanOptions, ScanTarget};
use vigil::target::DirectorySource;
use vigil::utils::{error_prefix, info_prefix, note_prefix, warn_prefix};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("VIGIL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let code = match run(cli.cmd) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", error_prefix(), e);
            2
        }
    };
    std::process::exit(code);
}

fn run(cmd: Commands) -> Result<i32> {
    match cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
        Commands::Scan {
            target,
            ruleset,
            threads,
            kind,
            diff,
            legacy_hunks,
            output,
            benchmark,
            timeout_secs,
            fail_on_errors,
        } => {
            let overrides = CliOverrides {
                target,
                ruleset,
                threads,
                output,
                benchmark: if benchmark { Some(true) } else { None },
                timeout_secs,
                kind,
            };
            let mode = if legacy_hunks {
                HunkHeaders::AsContent
            } else {
                HunkHeaders::Skip
            };
            run_scan(&overrides, diff.as_deref(), mode, fail_on_errors)
        }
        Commands::Modules { output } => {
            let registry = default_registry()?;
            output::print_modules(&registry, output.as_deref().unwrap_or("human"));
            Ok(0)
        }
        Commands::Designer {
            module,
            query,
            source,
        } => {
            let registry = default_registry()?;
            let designer = registry.designer(&module)?;
            let text = fs::read_to_string(&source)
                .with_context(|| format!("Source file not readable: {}", source))?;
            for line in designer.query(&query, &text) {
                println!("{}", line);
            }
            Ok(0)
        }
        Commands::Ruleset { cmd } => match cmd {
            RulesetCmd::Example { module } => {
                let registry = default_registry()?;
                let interpreter = registry.interpreter(&module)?;
                match interpreter.export(&interpreter.example())? {
                    Some(text) => print!("{}", text),
                    None => eprintln!("{} module '{}' has no example rules", note_prefix(), module),
                }
                Ok(0)
            }
            RulesetCmd::Check { path, output } => {
                let registry = default_registry()?;
                let ruleset = load_ruleset(&registry, Path::new(&path))?;
                output::print_ruleset(&ruleset, output.as_deref().unwrap_or("human"));
                Ok(0)
            }
        },
    }
}

fn run_scan(
    overrides: &CliOverrides,
    diff: Option<&str>,
    mode: HunkHeaders,
    fail_on_errors: bool,
) -> Result<i32> {
    let eff = config::resolve_effective(overrides).map_err(|e| anyhow!(e))?;
    if !eff.config_found {
        eprintln!("{} No vigil.toml found; using defaults.", note_prefix());
    }
    let ruleset_path = eff
        .ruleset
        .clone()
        .ok_or_else(|| anyhow!("Ruleset is not configured. Pass --ruleset or add vigil.toml."))?;

    let registry = default_registry()?;
    let ruleset = load_ruleset(&registry, &ruleset_path)
        .with_context(|| format!("Cannot load ruleset {}", ruleset_path.display()))?;
    if ruleset.num_rules() == 0 {
        eprintln!("{} Ruleset '{}' has no rules.", warn_prefix(), ruleset.name);
    }
    let ruleset = Arc::new(ruleset);

    let cancel = CancelToken::new();
    if let Some(secs) = eff.timeout_secs {
        let timer = cancel.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_secs(secs));
            tracing::warn!(secs, "scan timed out; no new files will be started");
            timer.cancel();
        });
    }
    let options = ScanOptions::default()
        .with_strategy(Strategy::from_threads(eff.threads))
        .with_benchmark(eff.benchmark)
        .with_cancel(cancel.clone());

    // Diff paths are repository-relative, so unit names must be too.
    let source = DirectorySource::new(&eff.target)
        .with_options(eff.walk.clone())
        .with_name_root(&eff.repo_root);
    let target = ScanTarget::new(eff.kind, source);
    let engine = Engine::new(&registry);

    let code = match diff {
        Some(diff_path) => {
            let text = fs::read_to_string(diff_path)
                .with_context(|| format!("Diff file not readable: {}", diff_path))?;
            let diffs = DiffSet::parse_multi(&text, mode);
            if diffs.is_empty() && eff.output != "json" {
                eprintln!("{} Diff touches no files; nothing will be reported.", info_prefix());
            }
            let scoped = engine.scan_pull_request(&target, ruleset, &diffs, &options)?;
            output::print_scoped(&scoped, &eff.output);
            let failing = scoped.has_blocking() || (fail_on_errors && !scoped.errors.is_empty());
            i32::from(failing)
        }
        None => {
            let report = engine.scan(&target, ruleset.clone(), &options)?;
            output::print_report(&report, &eff.output);
            let blocking = report
                .violations()
                .iter()
                .any(|v| ruleset.is_blocking(v.severity));
            i32::from(blocking || (fail_on_errors && !report.errors().is_empty()))
        }
    };
    if cancel.is_cancelled() && eff.output != "json" {
        eprintln!("{} Scan stopped early; results are partial.", warn_prefix());
    }
    Ok(code)
}
