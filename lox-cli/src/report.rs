use std::io::Write;
use std::process::ExitCode;

use lox::LoxError;

/// Writes each error on its own line.
pub fn report_errors<W: Write>(errors: &[LoxError], mut writer: W) {
    for error in errors {
        writeln!(writer, "{}", error).ok();
    }
}

/// sysexits-style status for a failed run: 65 for bad input, 70 for a
/// runtime failure, 74 when output could not be written, 101 for an
/// interpreter bug.
pub fn exit_code(errors: &[LoxError]) -> ExitCode {
    let code = errors.iter().map(status).max().unwrap_or(0);
    ExitCode::from(code)
}

fn status(error: &LoxError) -> u8 {
    match error {
        LoxError::Io(_) | LoxError::Scan { .. } | LoxError::Parse { .. } | LoxError::Static { .. } => {
            65
        }
        LoxError::Runtime { .. } => 70,
        LoxError::Output(_) => 74,
        LoxError::Internal(_) => 101,
    }
}
