//! # bunch CLI Entry Point
//!
//! This is the main executable for the `bunch` command-line tool.
//! It parses CLI arguments using clap and routes commands to the library.
//!
//! ## Command Structure
//!
//! Commands are organized into categories:
//! - **Dependencies**: `install`, `update`, `uninstall`, `prune`, `rebuild`
//! - **State**: `lock`, `outdated`, `generate`
//! - **Sandbox**: `go`, `exec`, `shell`, `shim`

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use std::path::Path;
use std::process;

use bunch::config::Settings;
use bunch::delegate::{self, Invocation};
use bunch::deps::{self, InstallOptions, Project, UninstallOptions};
use bunch::import::GoImportScanner;
use bunch::lock::LOCK_FILE;
use bunch::manifest::MANIFEST_FILE;
use bunch::report::Summary;
use bunch::sandbox::{self, Sandbox};
use bunch::ui;
use bunch::vendor::VendorStore;

#[derive(Parser)]
#[command(name = "bunch")]
#[command(about = "Vendored, pinned dependencies for Go", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch packages into the vendor store
    #[command(visible_alias = "i")]
    Install {
        /// Packages as `name` or `name@constraint` (default: every Bunchfile entry)
        packages: Vec<String>,
        /// Record the packages in the Bunchfile
        #[arg(long)]
        save: bool,
        /// Install into the global GOPATH instead
        #[arg(short, long)]
        global: bool,
    },
    /// Move packages to the newest revision matching their constraint
    #[command(visible_alias = "u")]
    Update {
        /// Packages to update (default: every Bunchfile entry)
        packages: Vec<String>,
    },
    /// Remove packages from the vendor store
    #[command(visible_alias = "r")]
    Uninstall {
        #[arg(required = true)]
        packages: Vec<String>,
        /// Also remove the packages from the Bunchfile
        #[arg(long)]
        save: bool,
        /// Remove from the global GOPATH instead
        #[arg(short, long)]
        global: bool,
    },
    /// Remove vendored packages the Bunchfile does not declare
    Prune,
    /// List packages whose vendored revision is behind upstream
    Outdated {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Record the vendored revisions in Bunchfile.lock
    Lock,
    /// Re-clone every vendored package from scratch
    Rebuild,
    /// Write a Bunchfile from the imports in the current directory
    Generate,
    /// Run a Go command against the vendor store (e.g. `bunch go build`)
    Go {
        #[arg(num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run any command against the vendor store (e.g. `bunch exec make`)
    Exec {
        program: String,
        #[arg(num_args = 0.., trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Start an interactive shell against the vendor store
    Shell,
    /// Print a shell function routing `go` through bunch inside projects
    Shim,
    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    try_delegate(&cwd);

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let code = run(cli.command, &cwd)?;
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new("bunch=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_env("BUNCH_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Hand the whole invocation to `.vendor/bin/bunch` when the project pins one.
fn try_delegate(cwd: &Path) {
    let settings = Settings::load(cwd).unwrap_or_default();
    let store = VendorStore::new(cwd.join(&settings.vendor_dir));
    let pinned = delegate::vendored_binary(&store);
    let pinned = pinned.canonicalize().unwrap_or(pinned);
    let current = std::env::current_exe().and_then(|p| p.canonicalize()).ok();
    let delegated = std::env::var_os(delegate::DELEGATED_ENV).is_some();

    if let Invocation::Vendored(binary) =
        delegate::choose(&pinned, current.as_deref(), delegated, Path::exists)
    {
        let args: Vec<String> = std::env::args().skip(1).collect();
        if delegate::run_vendored(&binary, &args) {
            process::exit(0);
        }
        println!(
            "{} Vendored bunch exited with a non-zero status, trying again with global bunch",
            "!".yellow()
        );
    }
}

fn run(command: Commands, cwd: &Path) -> Result<i32> {
    let project = || Project::open(cwd).context("Failed to load project settings");

    match command {
        Commands::Install {
            packages,
            save,
            global,
        } => {
            let options = InstallOptions {
                packages,
                save,
                global,
            };
            finish(deps::install(&project()?, &options)?)
        }
        Commands::Update { packages } => finish(deps::update(&project()?, &packages)?),
        Commands::Uninstall {
            packages,
            save,
            global,
        } => {
            let options = UninstallOptions {
                packages,
                save,
                global,
            };
            finish(deps::uninstall(&project()?, &options)?)
        }
        Commands::Prune => finish(deps::prune(&project()?)?),
        Commands::Rebuild => finish(deps::rebuild(&project()?)?),
        Commands::Outdated { json } => print_outdated(&project()?, json),
        Commands::Lock => print_lock(&project()?),
        Commands::Generate => {
            let project = project()?;
            let scanner = GoImportScanner::new(&project.settings.vendor_dir);
            let manifest = deps::generate(&project, &scanner)?;
            println!(
                "{} Wrote {} with {} package(s)",
                "✓".green(),
                MANIFEST_FILE,
                manifest.len()
            );
            Ok(0)
        }
        Commands::Go { args } => {
            let project = project()?;
            Ok(Sandbox::new(&project.store(), &project.settings)?.run_toolchain(&args)?)
        }
        Commands::Exec { program, args } => {
            let project = project()?;
            Ok(Sandbox::new(&project.store(), &project.settings)?.exec(&program, &args)?)
        }
        Commands::Shell => {
            let project = project()?;
            println!(
                "{} Entering vendored environment, exit the shell to leave",
                "📦".blue()
            );
            Ok(Sandbox::new(&project.store(), &project.settings)?.shell()?)
        }
        Commands::Shim => {
            let exe = std::env::current_exe()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|_| "bunch".to_string());
            let settings = Settings::load(cwd).unwrap_or_default();
            print!("{}", sandbox::shim(&settings.toolchain, &exe));
            Ok(0)
        }
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(0)
        }
    }
}

fn finish(summary: Summary) -> Result<i32> {
    summary.print();
    Ok(if summary.is_success() { 0 } else { 1 })
}

fn print_outdated(project: &Project, json: bool) -> Result<i32> {
    let report = deps::manage::outdated(project)?;

    if json {
        let out = serde_json::to_string_pretty(&report.drifted)
            .context("Failed to serialize outdated packages")?;
        println!("{}", out);
    } else if report.drifted.is_empty() {
        println!("{} All packages are up to date.", "✓".green());
    } else {
        let mut table = ui::Table::new(&["Package", "Current", "Latest"]);
        for drift in &report.drifted {
            let current = drift
                .current
                .as_deref()
                .map(|rev| rev.chars().take(12).collect::<String>())
                .unwrap_or_else(|| "not vendored".yellow().to_string());
            let latest: String = drift.latest.chars().take(12).collect();
            table.add_row(vec![drift.name.bold().to_string(), current, latest.green().to_string()]);
        }
        table.print();
    }

    for (name, err) in &report.errors {
        eprintln!("{} {} [{}]: {}", "x".red(), name.bold(), err.kind(), err);
    }
    Ok(if report.errors.is_empty() { 0 } else { 1 })
}

fn print_lock(project: &Project) -> Result<i32> {
    let report = deps::lock(project)?;
    println!(
        "{} Wrote {} ({} package(s))",
        "🔒".green(),
        LOCK_FILE,
        report.lockfile.packages.len()
    );
    for name in &report.undeclared {
        println!(
            "{} {} is vendored but not in the {}; run 'bunch prune' to remove it.",
            "!".yellow(),
            name.bold(),
            MANIFEST_FILE
        );
    }
    for name in &report.missing {
        println!(
            "{} {} is declared but not vendored; run 'bunch install' first.",
            "!".yellow(),
            name.bold()
        );
    }
    Ok(0)
}
