//! Interactive REPL for moonglue

use crate::cli::Settings;
use anyhow::Result;
use colored::Colorize;
use moonglue_core::{FormatOptions, Runtime};
use std::io::{self, BufRead, Write};

/// Start the interactive REPL
pub fn start(settings: &Settings) -> Result<()> {
    println!(
        "{} {} - Interactive Mode",
        "moonglue".bright_cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("Type {} to exit, {} for help", ".exit".cyan(), ".help".cyan());
    println!();

    let base_path = std::env::current_dir()?;
    let runtime = crate::create_runtime(&base_path, settings)?;
    let options = FormatOptions::new()
        .quoted()
        .with_colors(settings.use_colors());

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        // Print prompt
        print!("{} ", ">".bright_green().bold());
        stdout.flush()?;

        // Read input
        let mut input = String::new();
        let bytes_read = stdin.lock().read_line(&mut input)?;

        // Handle EOF (Ctrl+D)
        if bytes_read == 0 {
            println!();
            break;
        }

        let input = input.trim();

        // Skip empty lines
        if input.is_empty() {
            continue;
        }

        // Handle REPL commands
        if input.starts_with('.') {
            match input {
                ".exit" | ".quit" | ".q" => break,
                ".help" | ".h" => {
                    print_help();
                    continue;
                }
                ".clear" | ".cls" => {
                    // Clear screen (ANSI escape code)
                    print!("\x1B[2J\x1B[1;1H");
                    stdout.flush()?;
                    continue;
                }
                _ => {
                    eprintln!("{}: Unknown command '{}'", "error".red(), input);
                    continue;
                }
            }
        }

        // Keep reading while the chunk ends mid-statement
        let mut code = input.to_string();
        while is_incomplete(&runtime, &code) {
            print!("{} ", "..".bright_black());
            stdout.flush()?;

            let mut continuation = String::new();
            if stdin.lock().read_line(&mut continuation)? == 0 {
                break;
            }
            code.push('\n');
            code.push_str(&continuation);
        }

        // Expressions are echoed, statements are just run
        let expression = format!("return {}", code);
        let outcome = if compiles(&runtime, &expression) {
            runtime.eval_with(&expression, options).map(|result| {
                if !result.is_empty() {
                    println!("{}", result);
                }
            })
        } else {
            runtime.exec(&code)
        };

        if let Err(e) = outcome.and_then(|()| runtime.run_scheduler()) {
            print_error(&e.to_string());
        }
    }

    println!("{}", "Goodbye!".bright_cyan());
    Ok(())
}

fn compiles(runtime: &Runtime, code: &str) -> bool {
    runtime.lua().load(code).into_function().is_ok()
}

/// Check if the code stops before the end of a statement
fn is_incomplete(runtime: &Runtime, code: &str) -> bool {
    matches!(
        runtime.lua().load(code).into_function(),
        Err(mlua::Error::SyntaxError {
            incomplete_input: true,
            ..
        })
    )
}

fn print_help() {
    println!("{}", "REPL Commands:".bright_cyan().bold());
    println!("  {}  - Exit the REPL", ".exit".cyan());
    println!("  {}  - Show this help", ".help".cyan());
    println!("  {} - Clear the screen", ".clear".cyan());
    println!();
    println!("{}", "Tips:".bright_cyan().bold());
    println!("  - Expressions are pretty printed");
    println!("  - Multi-line input is supported");
    println!("  - Press Ctrl+D to exit");
}

fn print_error(msg: &str) {
    // Clean up the error message
    let msg = msg
        .replace("[string \"??\"]:", "")
        .replace("runtime error: ", "");
    eprintln!("{}: {}", "error".red().bold(), msg);
}
