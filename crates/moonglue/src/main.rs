//! moonglue CLI
//!
//! The main entry point for the moonglue script runner.

mod cli;
mod repl;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands, Settings};
use colored::Colorize;
use moonglue_core::Runtime;
use moonglue_std::StdOptions;
use std::path::Path;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Setup tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if cli.settings.no_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Some(Commands::Run { file, args }) => {
            run_file(&file, args, &cli.settings)?;
        }
        Some(Commands::Repl) => {
            repl::start(&cli.settings)?;
        }
        Some(Commands::Version) => {
            print_version();
        }
        None => {
            // If a file is provided as first argument, run it
            if let Some(file) = cli.file {
                run_file(&file, cli.args, &cli.settings)?;
            } else {
                // Otherwise, start REPL
                repl::start(&cli.settings)?;
            }
        }
    }

    Ok(())
}

/// Build a runtime rooted at `base_path` with every plugin registered.
fn create_runtime(base_path: &Path, settings: &Settings) -> Result<Runtime> {
    let runtime = Runtime::with_base_path(base_path)?;

    // Setup module loader
    runtime.setup_module_loader()?;

    let options = StdOptions {
        use_colors: settings.use_colors(),
        sandbox_root: settings
            .sandbox
            .clone()
            .unwrap_or_else(|| base_path.to_path_buf()),
        unsafe_os: settings.unsafe_os,
    };
    moonglue_std::register_all(runtime.lua(), &options)?;

    Ok(runtime)
}

fn run_file(file: &str, args: Vec<String>, settings: &Settings) -> Result<()> {
    let path = Path::new(file);

    let absolute_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let base_path = absolute_path.parent().unwrap_or(Path::new("."));
    let file_name = absolute_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file);

    let runtime = create_runtime(base_path, settings)?;

    // Set script arguments
    let lua = runtime.lua();
    let arg_table = lua.create_table()?;

    // arg[0] is the script name (original path given by user)
    arg_table.set(0, file)?;

    // arg[1..] are the arguments
    for (i, arg) in args.iter().enumerate() {
        arg_table.set(i as i64 + 1, arg.as_str())?;
    }

    lua.globals().set("arg", arg_table)?;

    // Run the main chunk, then drain deferred and delayed tasks
    let outcome = runtime
        .exec_file(file_name)
        .and_then(|()| runtime.run_scheduler());
    if let Err(e) = outcome {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

fn print_version() {
    println!(
        "{} {}",
        "moonglue".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("Lua 5.4 script runner written in Rust");
}
