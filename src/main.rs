use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use gorgon::{compiler, mutants, operators, parser, report, runner, schemata, tree_print, workspace};

#[derive(Parser)]
#[command(name = "gorgon", version, about = "Schemata-based mutation testing for Go projects")]
struct Cli {
    /// Go source file or project directory to mutate
    path: PathBuf,

    /// Operator set: "all" or a comma-delimited list of operator names
    #[arg(long, default_value = "all")]
    operators: String,

    /// Parallel test-binary invocations (0 = CPU count)
    #[arg(long, default_value_t = 0)]
    concurrent: usize,

    /// Per-invocation timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Print the AST of the target and exit without mutating
    #[arg(long)]
    print_ast: bool,

    /// Output a JSON report instead of the table
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            report::print_error(&e.to_string());
            1
        }
    };
    process::exit(code);
}

fn run(cli: Cli) -> gorgon::Result<i32> {
    let operators = operators::select_operators(&cli.operators)?;

    if cli.print_ast {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        tree_print::print_path(&cli.path, &mut out)?;
        return Ok(0);
    }

    let sites = parser::discover_sites(&cli.path, &operators)?;
    let mutants = mutants::plan_mutants(&sites, &operators);
    if mutants.is_empty() {
        report::print_success("No mutation sites found.");
        return Ok(0);
    }

    let ws = workspace::build(&cli.path)?;
    let packages = schemata::weave(&ws, &mutants)?;
    report::print_phase(&format!(
        "{} mutants woven across {} packages",
        mutants.len(),
        packages.len()
    ));
    let binaries = compiler::compile_test_binaries(ws.root(), &packages)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let config = runner::RunConfig {
        concurrent: cli.concurrent,
        timeout: Duration::from_secs(cli.timeout),
    };
    let by_package = runner::group_by_package(&ws, &mutants)?;
    let table = runner::run_mutants(mutants.len(), &by_package, &binaries, &config, &cancel);

    if cli.json {
        println!("{}", report::json_report(&mutants, &table)?);
    } else {
        report::print_report(&mutants, &table);
    }
    Ok(0)
}
