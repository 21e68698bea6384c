//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vigil",
    version,
    about = "Vigil: pluggable static-analysis scans",
    long_about = "Vigil runs module scanners over a checkout, isolates per-file failures, and scopes results to a pull-request diff.\n\nConfiguration precedence: CLI > vigil.toml > defaults.",
    after_help = "Examples:\n  vigil scan . --ruleset rules/secrets.toml\n  vigil scan . --ruleset rules/secrets.toml --threads 8 --output json\n  vigil scan . --ruleset rules/secrets.toml --diff pr.patch --output markdown\n  vigil designer regex --query 'AKIA[0-9A-Z]{16}' --source src/config.rs",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current vigil version.")]
    Version,
    /// Scan a target with a ruleset
    #[command(
        about = "Scan a target",
        long_about = "Run every scanner bound to the target kind over the target. Per-file failures are reported as errors; setup failures abort with exit code 2.",
        after_help = "Examples:\n  vigil scan src --ruleset rules.toml\n  vigil scan . --ruleset rules.toml --diff changes.patch --fail-on-errors"
    )]
    Scan {
        #[arg(help = "Directory or file to scan (default: current dir)")]
        target: Option<String>,
        #[arg(long, help = "Path to a ruleset file (required unless set in vigil.toml)")]
        ruleset: Option<String>,
        #[arg(long, help = "Worker threads; 0 runs sequentially (default: 0)")]
        threads: Option<usize>,
        #[arg(long, help = "Target kind: code|scm (default: code)")]
        kind: Option<String>,
        #[arg(long, help = "Unified diff to scope results to (pull-request mode)")]
        diff: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Count later @@ lines as content (legacy line numbering)")]
        legacy_hunks: bool,
        #[arg(long, help = "Output mode: human|json|markdown (default: human)")]
        output: Option<String>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Collect and log phase and rule timings")]
        benchmark: bool,
        #[arg(long, help = "Stop starting new files after this many seconds")]
        timeout_secs: Option<u64>,
        #[arg(long, action = clap::ArgAction::SetTrue, help = "Exit non-zero when any file could not be scanned")]
        fail_on_errors: bool,
    },
    /// List registered modules
    #[command(
        about = "List modules",
        long_about = "List registered modules with their scanner kind, capabilities, and privileges."
    )]
    Modules {
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Try a rule query against a source file
    #[command(
        about = "Run the rule designer",
        long_about = "Run a module's rule designer query against a source file and print where it matches."
    )]
    Designer {
        #[arg(help = "Module name, e.g. regex")]
        module: String,
        #[arg(long, help = "Query to evaluate (module-specific syntax)")]
        query: String,
        #[arg(long, help = "Source file to evaluate the query against")]
        source: String,
    },
    /// Ruleset helpers
    Ruleset {
        #[command(subcommand)]
        cmd: RulesetCmd,
    },
}

#[derive(Subcommand)]
/// Subcommands for `vigil ruleset`
pub enum RulesetCmd {
    /// Print an example ruleset for a module
    #[command(
        about = "Print example ruleset",
        long_about = "Print an example ruleset in the module's import format."
    )]
    Example {
        #[arg(help = "Module name, e.g. regex")]
        module: String,
    },
    /// Validate a ruleset file and list its rules
    #[command(
        about = "Check a ruleset",
        long_about = "Load a ruleset file, resolving includes, and list the rules it binds."
    )]
    Check {
        #[arg(help = "Path to the ruleset file")]
        path: String,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
}
