use std::fmt;

use bootelf::ElfLog;

/// Loader diagnostics on stderr, prefixed with `bootelf:`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrLog;

impl ElfLog for StderrLog {
    fn log(&self, is_err: bool, args: fmt::Arguments<'_>) {
        eprintln!("{}", format_line(is_err, args));
    }
}

fn format_line(is_err: bool, args: fmt::Arguments<'_>) -> String {
    if is_err {
        format!("bootelf: error: {args}")
    } else {
        format!("bootelf: {args}")
    }
}
