/// Veneer batch checker CLI

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Context};
use clap::Parser;
use veneer_core::{
    Checker, ConfigLoader, ConfigScope, NullAnalyzer, OverlayManager, RealFileSystem,
    CONFIG_FILE_NAME,
};

#[derive(Parser, Debug)]
#[command(name = "veneerc")]
#[command(about = "Veneer checker - validates templates embedded in host-language projects")]
#[command(version)]
struct Args {
    /// Project directory or veneer.config.json path (defaults to cwd)
    #[arg(value_name = "PROJECT")]
    project: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(0) => {}
        Ok(_) => process::exit(1),
        Err(e) => {
            eprintln!("veneerc: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(args: &Args) -> anyhow::Result<usize> {
    let project = match &args.project {
        Some(path) => path.clone(),
        None => std::env::current_dir().context("cannot determine working directory")?,
    };

    let mut loader = ConfigLoader::new();
    let scope = if project.is_file() {
        loader.load(&project)?
    } else if project.join(CONFIG_FILE_NAME).is_file() {
        loader.load(&project.join(CONFIG_FILE_NAME))?
    } else if project.is_dir() {
        std::sync::Arc::new(ConfigScope::defaults_at(&project))
    } else {
        return Err(anyhow!("no such project: {}", project.display()));
    };

    if args.verbose {
        eprintln!("Checking project at {}", scope.root.display());
    }

    let overlay = OverlayManager::new(scope, RealFileSystem);
    let mut checker = Checker::new(overlay, NullAnalyzer);
    let report = checker.run()?;

    for diagnostic in &report.diagnostics {
        println!(
            "{}:{}..{}: {}",
            diagnostic.path.display(),
            diagnostic.range.start,
            diagnostic.range.end,
            diagnostic.message
        );
    }

    if args.verbose {
        eprintln!(
            "Checked {} files, {} problems",
            report.files_checked,
            report.diagnostics.len()
        );
    }

    Ok(report.diagnostics.len())
}
