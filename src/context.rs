//! Per-call state.
//!
//! A [`Context`] carries everything a query mutates while it runs: the
//! captured output, the structured report, and the tolerance counters. One
//! context belongs to one in-flight call; reusing it for the next call
//! requires [`Context::reset`], which the facade does on entry.

use crate::config::{DebugLevels, EngineConfig};
use crate::sink::{Report, Sink};
use crate::tolerance::{CommandClass, Tolerance};

/// Appends plain text to a context's sink.
macro_rules! out {
    ($ctx:expr, $($arg:tt)*) => {
        $ctx.sink.plain(format_args!($($arg)*))
    };
}
pub(crate) use out;

#[derive(Debug)]
pub struct Context {
    pub sink: Sink,
    pub report: Report,
    pub tolerance: Tolerance,
    pub debug: DebugLevels,
    seed: Tolerance,
}

impl Context {
    pub fn new(tolerance: Tolerance, debug: DebugLevels) -> Self {
        Self {
            sink: Sink::new(),
            report: Report::default(),
            tolerance,
            debug,
            seed: tolerance,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Tolerance::from_mode(config.tolerance), config.debug)
    }

    /// Drops captured output and the report, and refills the tolerance
    /// budget. Sink suppression is left as it is.
    pub fn reset(&mut self) {
        self.sink.clear();
        self.report.clear();
        self.tolerance = self.seed;
    }

    /// Consults the tolerance policy for a failed command.
    pub fn allow(&mut self, class: CommandClass) -> bool {
        self.tolerance.allow(class, &mut self.sink)
    }

    pub fn drain_lines(&mut self) -> Vec<String> {
        self.sink.drain_lines()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Tolerance::default(), DebugLevels::default())
    }
}
