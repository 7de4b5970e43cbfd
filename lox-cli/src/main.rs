mod completer;
mod report;
mod state;

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use lox::{Config, Lox, Value};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use completer::LoxHelper;
use report::{exit_code, report_errors};
use state::ReplState;

/// Environment variable holding the log filter, e.g. `LOX_LOG=lox=debug`.
const LOG_ENV: &str = "LOX_LOG";

#[derive(Debug, Parser)]
#[command(name = "lox", version, about = "Run a Lox script, or start a REPL")]
struct Args {
    /// Script to run. Starts the interactive prompt when omitted.
    script: Option<PathBuf>,

    /// Nested calls allowed before a stack overflow error.
    #[arg(long, default_value_t = lox::DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(64)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing();

    let mut lox = Lox::with_config(Config {
        max_call_depth: args.max_call_depth,
    });

    match &args.script {
        Some(path) => run_file(&mut lox, path),
        None => run_repl(&mut lox),
    }
}

/// Logs go to stderr and only when `LOX_LOG` is set, so script output is
/// never mixed with them.
fn init_tracing() {
    if let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(true)
            .init();
    }
}

fn run_file(lox: &mut Lox, path: &Path) -> ExitCode {
    debug!(path = %path.display(), "running script");
    let errors = lox.run_file(path, io::stdout());
    report_errors(&errors, io::stderr());
    exit_code(&errors)
}

fn run_repl(lox: &mut Lox) -> ExitCode {
    let interactive = io::stdin().is_terminal();
    let mut rl: Editor<LoxHelper, _> = match Editor::with_config(rustyline::Config::default()) {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not start the REPL: {}", err);
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(LoxHelper::new(lox.global_names())));
    let mut state = ReplState::new();

    loop {
        match rl.readline(&state.prompt()) {
            Ok(line) => {
                let _ = rl.add_history_entry(&line);

                if !state.process_line(&line) {
                    continue;
                }

                let buffer = state.take_buffer();
                let source = if ReplState::needs_semicolon(&buffer) {
                    ReplState::complete_statement(&buffer)
                } else {
                    buffer
                };

                match lox.run_repl_line(&source, io::stdout()) {
                    Ok(Some(value)) if value != Value::Nil => println!("{}", value),
                    Ok(_) => {}
                    Err(errors) => {
                        report_errors(&errors, io::stderr());
                        // Piped input has nobody to read the error and retry
                        if !interactive {
                            return exit_code(&errors);
                        }
                    }
                }

                if let Some(helper) = rl.helper() {
                    helper.set_globals(lox.global_names());
                }
            }
            Err(ReadlineError::Interrupted) => {
                if state.is_empty() {
                    break;
                }
                state.cancel();
                println!();
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("REPL error: {:?}", err);
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
