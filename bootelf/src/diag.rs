//! Diagnostic callback interface.
//!
//! The loader never prints on its own. Every message goes to the [`ElfLog`]
//! held by the image context; errors are always delivered, informational
//! messages only when the context is verbose.

use core::fmt;

/// Receiver for loader diagnostics.
///
/// Messages carry no reference to the context that produced them. A sink is
/// borrowed per context, so state a caller wants attached to one image (a
/// name, a domain id) lives in the sink itself: give each context its own
/// sink value.
pub trait ElfLog {
    /// Deliver one formatted message.
    fn log(&self, is_err: bool, args: fmt::Arguments<'_>);
}

/// Default sink: forwards to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ElfLog for LogSink {
    fn log(&self, is_err: bool, args: fmt::Arguments<'_>) {
        if is_err {
            log::error!(target: "bootelf", "{}", args);
        } else {
            log::debug!(target: "bootelf", "{}", args);
        }
    }
}

pub(crate) static DEFAULT_SINK: LogSink = LogSink;

/// Sink plus verbosity, as held by an image context.
#[derive(Clone, Copy)]
pub(crate) struct Diag<'a> {
    pub(crate) sink: &'a dyn ElfLog,
    pub(crate) verbose: bool,
}

impl<'a> Diag<'a> {
    pub(crate) fn emit(&self, is_err: bool, args: fmt::Arguments<'_>) {
        if is_err || self.verbose {
            self.sink.log(is_err, args);
        }
    }
}

/// Informational message, delivered only when the context is verbose.
macro_rules! elf_msg {
    ($elf:expr, $($arg:tt)*) => {
        $elf.emit(false, format_args!($($arg)*))
    };
}

/// Error message, always delivered.
macro_rules! elf_err {
    ($elf:expr, $($arg:tt)*) => {
        $elf.emit(true, format_args!($($arg)*))
    };
}

pub(crate) use elf_err;
pub(crate) use elf_msg;
