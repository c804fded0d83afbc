//! Device scan.

use serde_json::Value;

use crate::context::{out, Context};
use crate::device::{DeviceBackend, SmartDevice};

/// A scan argument string split into its pattern and annotation tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanArgs {
    /// Device name pattern handed to the backend.
    pub pattern: Option<String>,
    /// Tokens printed after `-d <type>` in place of the info comment.
    pub annotations: Vec<String>,
}

/// The first token is the pattern unless it starts with `-`.
pub fn parse_scan_args(append: &str) -> ScanArgs {
    let mut tokens = append.split_whitespace().map(str::to_string).peekable();
    let pattern = tokens.next_if(|first| !first.starts_with('-'));
    ScanArgs {
        pattern,
        annotations: tokens.collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// List what the backend found.
    Plain,
    /// Open every device before listing it.
    Open,
}

/// Scans for devices and writes one line per device to `ctx`.
///
/// Backend output during discovery is hidden unless a debug level is set.
/// The sink's suppression state is the same on return as on entry.
pub fn scan<B: DeviceBackend>(
    backend: &B,
    types: &[String],
    append: &str,
    mode: ScanMode,
    ctx: &mut Context,
) {
    let was_suppressed = ctx.sink.is_suppressed();
    run(backend, types, &parse_scan_args(append), mode, ctx);
    ctx.sink.set_suppressed(was_suppressed);
}

fn run<B: DeviceBackend>(
    backend: &B,
    types: &[String],
    args: &ScanArgs,
    mode: ScanMode,
    ctx: &mut Context,
) {
    ctx.sink.set_suppressed(!ctx.debug.any());
    let found = backend.scan(ctx, types, args.pattern.as_deref());
    ctx.sink.set_suppressed(false);

    let devices = match found {
        Ok(devices) => devices,
        Err(e) => {
            tracing::debug!(error = %e, "device scan failed");
            out!(ctx, "# scan_smart_devices: {e}\n");
            return;
        }
    };
    tracing::debug!(count = devices.len(), ?mode, "device scan finished");

    for (index, device) in devices.into_iter().enumerate() {
        let mut device = match mode {
            ScanMode::Plain => device,
            ScanMode::Open => device.autodetect_open(),
        };
        let protocol = device.protocols().to_string();
        let record = ctx.report.device(index);
        record.insert("name".to_string(), Value::from(device.name()));
        record.insert("info_name".to_string(), Value::from(device.info_name()));
        record.insert("type".to_string(), Value::from(device.dev_type()));
        record.insert("protocol".to_string(), Value::from(protocol.as_str()));

        if mode == ScanMode::Open && !device.is_open() {
            let reason = device.last_error().unwrap_or("unknown error").to_string();
            out!(
                ctx,
                "# {} -d {} # {}, {protocol} device open failed: {reason}\n",
                device.name(),
                device.dev_type(),
                device.info_name()
            );
            ctx.report
                .device(index)
                .insert("open_error".to_string(), Value::from(reason));
            continue;
        }

        if args.annotations.is_empty() {
            out!(
                ctx,
                "{} -d {} # {}, {protocol} device\n",
                device.name(),
                device.dev_type(),
                device.info_name()
            );
        } else {
            out!(
                ctx,
                "{} -d {} {}\n",
                device.name(),
                device.dev_type(),
                args.annotations.join(" ")
            );
        }
        if device.is_open() {
            device.close();
        }
    }
}
