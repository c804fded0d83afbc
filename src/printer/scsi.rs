//! SCSI printer.

use serde_json::{json, Value};

use crate::context::{out, Context};
use crate::error::SmartError;
use crate::options::ScsiFlags;
use crate::printer::{capacity_line, enabled, not_supported};
use crate::scsi::{self, CachingPage, InformationalExceptions, Inquiry, ScsiChannel};
use crate::tolerance::CommandClass;

const INQUIRY_LEN: u8 = 36;
const LOG_PAGE_LEN: u16 = 252;
const MODE_PAGE_LEN: u16 = 64;

pub fn print_scsi<C: ScsiChannel + ?Sized>(chan: &mut C, flags: &ScsiFlags, ctx: &mut Context) {
    let inquiry = match issue(chan, "INQUIRY", &scsi::inquiry_cdb(INQUIRY_LEN), INQUIRY_LEN.into(), ctx)
        .and_then(|bytes| Inquiry::from_bytes(&bytes))
    {
        Ok(inquiry) => Some(inquiry),
        Err(e) => {
            ctx.sink.error(format_args!(
                "Standard Inquiry ({INQUIRY_LEN} bytes) failed: {e}\n"
            ));
            if !ctx.allow(CommandClass::Mandatory) {
                return;
            }
            None
        }
    };

    if flags.drive_info {
        if let Some(inquiry) = &inquiry {
            if !print_drive_info(chan, inquiry, ctx) {
                return;
            }
        }
    }
    if (flags.get_rcd || flags.get_wce) && !print_caching(chan, flags, ctx) {
        return;
    }
    if flags.smart_check_status && !print_health(chan, flags.health_opt_count, ctx) {
        return;
    }

    let unsupported = [
        (flags.smart_vendor_attrib, "Vendor specific attributes"),
        (flags.smart_error_log, "Error counter log"),
        (flags.smart_selftest_log, "Self-test log"),
        (flags.smart_ss_media_log, "Solid state media log"),
        (flags.smart_background_log, "Background scan results log"),
        (flags.sasphy, "SAS Phy log"),
        (flags.smart_env_rep, "Environmental reports"),
        (flags.scsi_pending_defects, "Pending defects log"),
        (flags.tape_device_stats, "Tape device statistics"),
        (flags.zoned_device_stats, "Zoned device statistics"),
        (flags.general_stats_and_perf, "General statistics and performance log"),
    ];
    for (_, section) in unsupported.iter().filter(|(wanted, _)| *wanted) {
        not_supported(ctx, section);
    }
}

fn issue<C: ScsiChannel + ?Sized>(
    chan: &mut C,
    name: &'static str,
    cdb: &[u8],
    data_len: usize,
    ctx: &mut Context,
) -> Result<Vec<u8>, SmartError> {
    let result = chan.scsi_command(cdb, data_len);
    if let Err(e) = &result {
        tracing::debug!(command = name, error = %e, "SCSI command failed");
    }
    if ctx.debug.scsi > 0 {
        let status = if result.is_ok() { 0 } else { -1 };
        ctx.sink
            .info(format_args!("REPORT-IOCTL: {name} returned {status}\n"));
    }
    result
}

fn print_drive_info<C: ScsiChannel + ?Sized>(
    chan: &mut C,
    inquiry: &Inquiry,
    ctx: &mut Context,
) -> bool {
    out!(ctx, "=== START OF INFORMATION SECTION ===\n");
    out!(ctx, "Vendor:               {}\n", inquiry.vendor);
    out!(ctx, "Product:              {}\n", inquiry.product);
    out!(ctx, "Revision:             {}\n", inquiry.revision);
    let report = &mut ctx.report;
    report.set("scsi_vendor", inquiry.vendor.as_str());
    report.set("scsi_product", inquiry.product.as_str());
    report.set("scsi_revision", inquiry.revision.as_str());
    report.set(
        "model_name",
        format!("{} {}", inquiry.vendor, inquiry.product).trim(),
    );

    match issue(chan, "READ CAPACITY(10)", &scsi::read_capacity_cdb(), 8, ctx)
        .and_then(|bytes| scsi::parse_capacity(&bytes))
    {
        Ok((blocks, block_len)) => {
            let bytes = u128::from(blocks) * u128::from(block_len);
            out!(ctx, "User Capacity:        {}\n", capacity_line(bytes));
            out!(ctx, "Logical block size:   {block_len} bytes\n");
            ctx.report.set(
                "user_capacity",
                json!({ "blocks": blocks, "bytes": blocks * u64::from(block_len) }),
            );
            ctx.report.set("logical_block_size", block_len);
        }
        Err(e) => {
            ctx.sink
                .error(format_args!("Read Capacity failed: {e}\n"));
            if !ctx.allow(CommandClass::Optional) {
                return false;
            }
        }
    }
    out!(ctx, "Device type:          {}\n\n", inquiry.device_type_name());
    ctx.report.set(
        "device_type",
        json!({
            "scsi_value": inquiry.peripheral_type,
            "name": inquiry.device_type_name(),
        }),
    );
    true
}

fn print_caching<C: ScsiChannel + ?Sized>(
    chan: &mut C,
    flags: &ScsiFlags,
    ctx: &mut Context,
) -> bool {
    let cdb = scsi::mode_sense_cdb(scsi::PAGE_CACHING, MODE_PAGE_LEN);
    let page = match issue(chan, "MODE SENSE(10)", &cdb, MODE_PAGE_LEN.into(), ctx)
        .and_then(|bytes| CachingPage::from_mode_sense(&bytes))
    {
        Ok(page) => page,
        Err(e) => {
            ctx.sink
                .error(format_args!("Read caching mode page failed: {e}\n"));
            return ctx.allow(CommandClass::Optional);
        }
    };
    if flags.get_rcd {
        let on = !page.read_cache_disabled;
        out!(ctx, "Read Cache is:        {}\n", enabled(on));
        ctx.report.set("read_cache", json!({ "enabled": on }));
    }
    if flags.get_wce {
        let on = page.write_cache_enabled;
        out!(ctx, "Writeback Cache is:   {}\n", enabled(on));
        ctx.report.set("write_cache", json!({ "enabled": on }));
    }
    out!(ctx, "\n");
    true
}

/// `requests` counts how often a health report was asked for; repeated
/// requests add the raw sense codes.
fn print_health<C: ScsiChannel + ?Sized>(chan: &mut C, requests: u32, ctx: &mut Context) -> bool {
    let cdb = scsi::log_sense_cdb(scsi::PAGE_INFORMATIONAL_EXCEPTIONS, LOG_PAGE_LEN);
    let ie = match issue(chan, "LOG SENSE", &cdb, LOG_PAGE_LEN.into(), ctx)
        .and_then(|bytes| InformationalExceptions::from_bytes(&bytes))
    {
        Ok(ie) => ie,
        Err(e) => {
            ctx.sink.error(format_args!(
                "Read Informational Exceptions log page failed: {e}\n"
            ));
            return ctx.allow(CommandClass::Mandatory);
        }
    };
    out!(ctx, "=== START OF READ SMART DATA SECTION ===\n");
    out!(ctx, "SMART Health Status: {}\n", ie.status_text());
    if requests > 1 {
        out!(
            ctx,
            "Informational Exceptions: asc=0x{:02x}, ascq=0x{:02x}\n",
            ie.asc,
            ie.ascq
        );
    }
    if let Some(t) = ie.temperature {
        out!(ctx, "Current Drive Temperature:     {t} C\n");
        ctx.report
            .section("temperature")
            .insert("current".to_string(), Value::from(t));
    }
    out!(ctx, "\n");
    ctx.report
        .section("smart_status")
        .insert("passed".to_string(), Value::from(ie.passed()));
    true
}
