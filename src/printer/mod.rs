//! Protocol printers.
//!
//! Each printer talks to an opened device through a protocol channel, writes
//! human-readable text to the context's sink and fills the structured report.
//! Every command outcome is weighed by the context's tolerance policy.

pub mod ata;
pub mod nvme;
pub mod scsi;

pub use self::ata::print_ata;
pub use self::nvme::print_nvme;
pub use self::scsi::print_scsi;

use crate::context::Context;

/// `1234567` → `1,234,567`.
pub(crate) fn with_commas(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Decimal unit string as printed next to byte counts, e.g. `500 GB`.
pub(crate) fn si_size(bytes: u128) -> String {
    const UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1000.0 && unit + 1 < UNITS.len() {
        scaled /= 1000.0;
        unit += 1;
    }
    if unit == 0 || scaled >= 100.0 {
        format!("{:.0} {}", scaled, UNITS[unit])
    } else if scaled >= 10.0 {
        format!("{:.1} {}", scaled, UNITS[unit])
    } else {
        format!("{:.2} {}", scaled, UNITS[unit])
    }
}

pub(crate) fn capacity_line(bytes: u128) -> String {
    format!("{} bytes [{}]", with_commas(bytes), si_size(bytes))
}

pub(crate) fn enabled(on: bool) -> &'static str {
    if on {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Notes a requested section this build cannot produce.
pub(crate) fn not_supported(ctx: &mut Context, section: &str) {
    ctx.sink
        .info(format_args!("{section} not supported by this build\n"));
}
