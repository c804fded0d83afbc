//! ATA printer.

use serde_json::{json, Value};

use crate::ata::{
    self, AtaChannel, AtaCommand, AtaResponse, IdentifyDeviceData, SctTemperatures, SelfTestEntry,
    SelfTestLog, SmartAttribute, SmartValues,
};
use crate::context::{out, Context};
use crate::error::SmartError;
use crate::options::{AtaFlags, OutputFormat};
use crate::printer::{capacity_line, enabled, not_supported, with_commas};
use crate::tolerance::CommandClass;

/// Prints the ATA sections selected by `flags`.
pub fn print_ata<C: AtaChannel + ?Sized>(chan: &mut C, flags: &AtaFlags, ctx: &mut Context) {
    let identity = match read_sector(chan, &AtaCommand::identify(), ctx)
        .and_then(|bytes| IdentifyDeviceData::from_bytes(&bytes))
    {
        Ok(id) => Some(id),
        Err(e) => {
            ctx.sink
                .error(format_args!("Read Device Identity failed: {e}\n\n"));
            if !ctx.allow(CommandClass::Mandatory) {
                return;
            }
            None
        }
    };

    if let Some(id) = &identity {
        if flags.drive_info {
            print_drive_info(id, flags, ctx);
        }
        if flags.identify_word_level >= 0 {
            print_identify(id, flags.identify_word_level, flags.identify_bit_level, ctx);
        }
        if flags.wants_settings() && !print_settings(chan, id, flags, ctx) {
            return;
        }
    }

    if wants_smart_section(flags) {
        out!(ctx, "=== START OF READ SMART DATA SECTION ===\n");
    }
    if flags.smart_check_status && !print_health(chan, ctx) {
        return;
    }
    if (flags.smart_general_values || flags.smart_vendor_attrib)
        && !print_smart_data(chan, flags, ctx)
    {
        return;
    }
    if (flags.gp_logdir || flags.smart_logdir) && !print_log_directories(chan, flags, ctx) {
        return;
    }
    if (flags.smart_error_log || flags.smart_ext_error_log > 0) && !print_error_logs(chan, flags, ctx)
    {
        return;
    }
    if (flags.smart_selftest_log || flags.smart_ext_selftest_log > 0)
        && !print_selftest_logs(chan, flags, ctx)
    {
        return;
    }
    if flags.smart_selective_selftest_log && !print_selective_log(chan, ctx) {
        return;
    }
    if flags.sct_temp_sts && !print_sct_temperatures(chan, ctx) {
        return;
    }
    if flags.sct_temp_hist {
        not_supported(ctx, "SCT Temperature History");
    }
    if flags.sct_erc_get > 0 {
        not_supported(ctx, "SCT Error Recovery Control");
    }
    if flags.devstat_all_pages && !print_device_statistics(chan, ctx) {
        return;
    }
    if flags.pending_defects_log > 0 && !print_pending_defects(chan, flags.pending_defects_log, ctx)
    {
        return;
    }
    if flags.sataphy {
        print_sata_phy(chan, ctx);
    }
}

fn wants_smart_section(flags: &AtaFlags) -> bool {
    flags.smart_check_status
        || flags.smart_general_values
        || flags.smart_vendor_attrib
        || flags.smart_error_log
        || flags.smart_ext_error_log > 0
        || flags.smart_selftest_log
        || flags.smart_ext_selftest_log > 0
        || flags.smart_selective_selftest_log
        || flags.smart_logdir
        || flags.gp_logdir
        || flags.sct_temp_sts
}

fn issue<C: AtaChannel + ?Sized>(
    chan: &mut C,
    cmd: &AtaCommand,
    ctx: &mut Context,
) -> Result<AtaResponse, SmartError> {
    let result = chan.ata_command(cmd);
    if let Err(e) = &result {
        tracing::debug!(command = cmd.name(), error = %e, "ATA command failed");
    }
    if ctx.debug.ata > 0 {
        let status = if result.is_ok() { 0 } else { -1 };
        ctx.sink
            .info(format_args!("REPORT-IOCTL: {} returned {status}\n", cmd.name()));
    }
    result
}

fn read_sector<C: AtaChannel + ?Sized>(
    chan: &mut C,
    cmd: &AtaCommand,
    ctx: &mut Context,
) -> Result<Vec<u8>, SmartError> {
    let resp = issue(chan, cmd, ctx)?;
    Ok(resp.sector()?.to_vec())
}

/// Reports a failed optional read. Returns whether printing may go on.
fn optional_failed(ctx: &mut Context, what: &str, err: &SmartError) -> bool {
    ctx.sink.error(format_args!("Read {what} failed: {err}\n\n"));
    ctx.allow(CommandClass::Optional)
}

fn print_drive_info(id: &IdentifyDeviceData, flags: &AtaFlags, ctx: &mut Context) {
    let (model, serial, firmware) = (id.model(), id.serial(), id.firmware());
    out!(ctx, "=== START OF INFORMATION SECTION ===\n");
    out!(ctx, "Device Model:     {model}\n");
    out!(ctx, "Serial Number:    {serial}\n");
    out!(ctx, "Firmware Version: {firmware}\n");
    let bytes = id.capacity_bytes();
    if bytes > 0 {
        out!(ctx, "User Capacity:    {}\n", capacity_line(u128::from(bytes)));
    }
    out!(ctx, "Sector Size:      {} bytes logical\n", id.logical_sector_size());
    match id.rotation_rate() {
        Some(0) => out!(ctx, "Rotation Rate:    Solid State Device\n"),
        Some(rpm) => out!(ctx, "Rotation Rate:    {rpm} rpm\n"),
        None => {}
    }
    if !flags.ignore_presets {
        out!(ctx, "Device is:        Not in drive database\n");
    }
    if id.smart_supported() {
        out!(ctx, "SMART support is: Available - device has SMART capability.\n");
        out!(ctx, "SMART support is: {}\n", enabled(id.smart_enabled()));
    } else {
        out!(ctx, "SMART support is: Unavailable - device lacks SMART capability.\n");
    }
    if id.checksum_ok() == Some(false) {
        ctx.sink.warn(format_args!(
            "Warning! Drive Identity Structure error: invalid SMART checksum.\n"
        ));
    }
    out!(ctx, "\n");

    let report = &mut ctx.report;
    report.set("model_name", model);
    report.set("serial_number", serial);
    report.set("firmware_version", firmware);
    report.set(
        "user_capacity",
        json!({ "blocks": id.sectors(), "bytes": bytes }),
    );
    report.set("logical_block_size", id.logical_sector_size());
    if let Some(rpm) = id.rotation_rate() {
        report.set("rotation_rate", rpm);
    }
    if !flags.ignore_presets {
        report.set("in_smartctl_database", false);
    }
    report.set(
        "smart_support",
        json!({ "available": id.smart_supported(), "enabled": id.smart_enabled() }),
    );
}

fn word_description(index: usize) -> Option<&'static str> {
    Some(match index {
        0 => "General configuration",
        10..=19 => "Serial number",
        23..=26 => "Firmware revision",
        27..=46 => "Model number",
        47 => "Max sectors per DRQ block",
        49 => "Capabilities",
        60..=61 => "Total addressable sectors (28-bit)",
        75 => "Queue depth",
        76 => "Serial ATA capabilities",
        80 => "Major version number",
        81 => "Minor version number",
        82..=84 => "Commands and feature sets supported",
        85..=87 => "Commands and feature sets enabled",
        91 => "Current APM level",
        94 => "Current AAM level",
        100..=103 => "Total addressable sectors (48-bit)",
        106 => "Physical/logical sector size",
        117..=118 => "Logical sector size",
        119 => "Commands and feature sets supported (cont.)",
        120 => "Commands and feature sets enabled (cont.)",
        128 => "Security status",
        206 => "SCT Command Transport",
        217 => "Nominal media rotation rate",
        255 => "Integrity word",
        _ => return None,
    })
}

/// Word dump: level 0 valid words, 1 all words. Bit dump: 0 bits of
/// described words, 1 bits of valid words, 2 every bit.
fn print_identify(id: &IdentifyDeviceData, word_level: i32, bit_level: i32, ctx: &mut Context) {
    out!(ctx, "=== ATA IDENTIFY DEVICE DATA ===\n");
    out!(ctx, "Word     Value   Description\n");
    let mut words = Vec::with_capacity(256);
    for index in 0..256 {
        let value = id.word(index);
        words.push(value);
        let valid = id.is_valid_word(index);
        if word_level < 1 && !valid {
            continue;
        }
        let description = word_description(index);
        out!(
            ctx,
            "{index:4}     0x{value:04x}  {}\n",
            description.unwrap_or("-")
        );
        let bits = match bit_level {
            0 => valid && description.is_some(),
            1 => valid,
            2 => true,
            _ => false,
        };
        if !bits {
            continue;
        }
        for bit in (0..16u32).rev() {
            let set = id.bit(index, bit);
            if set || bit_level >= 2 {
                out!(ctx, "{:>9}  {}\n", format!("{index}.{bit}"), u8::from(set));
            }
        }
    }
    out!(ctx, "\n");
    ctx.report
        .set("ata_identify_device", json!({ "words": words }));
}

fn print_settings<C: AtaChannel + ?Sized>(
    chan: &mut C,
    id: &IdentifyDeviceData,
    flags: &AtaFlags,
    ctx: &mut Context,
) -> bool {
    let want = |asked: bool| asked || !flags.get_set_used;

    if want(flags.get_aam) {
        let supported = id.bit(83, 9);
        let on = supported && id.bit(86, 9);
        let level = id.word(94);
        if !supported {
            out!(ctx, "AAM feature is:   Unavailable\n");
        } else if on {
            out!(
                ctx,
                "AAM level is:     {} (recommended {})\n",
                level & 0xff,
                level >> 8
            );
        } else {
            out!(ctx, "AAM feature is:   Disabled\n");
        }
        ctx.report.set(
            "ata_aam",
            json!({ "supported": supported, "enabled": on, "level": level & 0xff }),
        );
    }
    if want(flags.get_apm) {
        let supported = id.bit(83, 3);
        let on = supported && id.bit(86, 3);
        let level = id.word(91) & 0xff;
        if !supported {
            out!(ctx, "APM feature is:   Unavailable\n");
        } else if on {
            out!(ctx, "APM level is:     {level}\n");
        } else {
            out!(ctx, "APM feature is:   Disabled\n");
        }
        ctx.report.set(
            "ata_apm",
            json!({ "supported": supported, "enabled": on, "level": level }),
        );
    }
    if want(flags.get_lookahead) {
        feature_line(ctx, "Rd look-ahead is: ", "read_lookahead", id.bit(82, 6), id.bit(85, 6));
    }
    if want(flags.get_wcache) {
        feature_line(ctx, "Write cache is:   ", "write_cache", id.bit(82, 5), id.bit(85, 5));
    }
    if want(flags.get_dsn) {
        feature_line(ctx, "DSN feature is:   ", "ata_dsn", id.bit(119, 9), id.bit(120, 9));
    }
    if want(flags.get_security) {
        print_security(id.word(128), ctx);
    }

    if flags.sct_wcache_reorder_get {
        if !id.sct_feature_control_supported() {
            out!(ctx, "Wt Cache Reorder: Unavailable\n");
        } else {
            match sct_feature_state(chan, ata::SCT_FEATURE_WRITE_CACHE_REORDER, ctx) {
                Ok(state) => {
                    let text = match state {
                        1 => "Enabled".to_string(),
                        2 => "Disabled".to_string(),
                        other => format!("Unknown (state {other})"),
                    };
                    out!(ctx, "Wt Cache Reorder: {text}\n");
                    ctx.report.set(
                        "write_cache_reorder",
                        json!({ "supported": true, "enabled": state == 1 }),
                    );
                }
                Err(e) => {
                    if !optional_failed(ctx, "SCT Feature Control (write cache reorder)", &e) {
                        return false;
                    }
                }
            }
        }
    }
    if flags.sct_wcache_sct_get {
        if !id.sct_feature_control_supported() {
            out!(ctx, "SCT Write Cache Control: Unavailable\n");
        } else {
            match sct_feature_state(chan, ata::SCT_FEATURE_WRITE_CACHE, ctx) {
                Ok(state) => {
                    let text = match state {
                        1 => "Controlled by ATA",
                        2 => "Force Enabled",
                        3 => "Force Disabled",
                        _ => "Unknown",
                    };
                    out!(ctx, "SCT Write Cache Control: {text}\n");
                    ctx.report
                        .set("write_cache_sct", json!({ "state": state, "string": text }));
                }
                Err(e) => {
                    if !optional_failed(ctx, "SCT Feature Control (write cache)", &e) {
                        return false;
                    }
                }
            }
        }
    }
    out!(ctx, "\n");
    true
}

fn feature_line(ctx: &mut Context, label: &str, key: &str, supported: bool, on: bool) {
    if supported {
        out!(ctx, "{label}{}\n", enabled(on));
    } else {
        out!(ctx, "{label}Unavailable\n");
    }
    ctx.report.set(
        key,
        json!({ "supported": supported, "enabled": supported && on }),
    );
}

fn print_security(word: u16, ctx: &mut Context) {
    if word & 0x01 == 0 {
        out!(ctx, "ATA Security is:  Unavailable\n");
        ctx.report
            .set("ata_security", json!({ "state": word, "supported": false }));
        return;
    }
    let (on, locked, frozen) = (word & 0x02 != 0, word & 0x04 != 0, word & 0x08 != 0);
    let (level, text) = match (on, locked, frozen) {
        (false, _, false) => ("SEC1", "Disabled, NOT FROZEN"),
        (false, _, true) => ("SEC2", "Disabled, frozen"),
        (true, true, _) => ("SEC4", "ENABLED, **LOCKED**"),
        (true, false, false) => ("SEC5", "ENABLED, NOT FROZEN"),
        (true, false, true) => ("SEC6", "ENABLED, frozen"),
    };
    out!(ctx, "ATA Security is:  {text} [{level}]\n");
    ctx.report.set(
        "ata_security",
        json!({
            "state": word,
            "string": text,
            "enabled": on,
            "frozen": frozen,
            "locked": locked,
        }),
    );
}

fn sct_feature_state<C: AtaChannel + ?Sized>(
    chan: &mut C,
    feature: u16,
    ctx: &mut Context,
) -> Result<u8, SmartError> {
    let cmd = AtaCommand::smart_write_log(
        ata::LOG_SCT_STATUS,
        ata::sct_feature_state_request(feature),
    );
    Ok(issue(chan, &cmd, ctx)?.sector_count)
}

fn print_health<C: AtaChannel + ?Sized>(chan: &mut C, ctx: &mut Context) -> bool {
    let passed = match issue(chan, &AtaCommand::smart_return_status(), ctx) {
        Ok(resp) => resp.smart_passed(),
        Err(e) => {
            ctx.sink
                .error(format_args!("SMART Status command failed: {e}\n"));
            return ctx.allow(CommandClass::Mandatory);
        }
    };
    match passed {
        Some(true) => {
            out!(ctx, "SMART overall-health self-assessment test result: PASSED\n\n");
        }
        Some(false) => {
            out!(ctx, "SMART overall-health self-assessment test result: FAILED!\n");
            ctx.sink.warn(format_args!(
                "Drive failure expected in less than 24 hours. SAVE ALL DATA.\n\n"
            ));
        }
        None => {
            ctx.sink.error(format_args!(
                "SMART Status not supported: Incomplete response, ATA output registers missing\n"
            ));
            return ctx.allow(CommandClass::Mandatory);
        }
    }
    ctx.report
        .section("smart_status")
        .insert("passed".to_string(), Value::from(passed == Some(true)));
    true
}

fn print_smart_data<C: AtaChannel + ?Sized>(
    chan: &mut C,
    flags: &AtaFlags,
    ctx: &mut Context,
) -> bool {
    let values = match read_sector(chan, &AtaCommand::smart(ata::SMART_READ_DATA), ctx)
        .and_then(|bytes| SmartValues::from_bytes(&bytes))
    {
        Ok(values) => values,
        Err(e) => return optional_failed(ctx, "SMART Data", &e),
    };
    let mut thresholds = Vec::new();
    if flags.smart_vendor_attrib {
        match read_sector(chan, &AtaCommand::smart(ata::SMART_READ_THRESHOLDS), ctx)
            .and_then(|bytes| ata::parse_thresholds(&bytes))
        {
            Ok(found) => thresholds = found,
            Err(e) => {
                if !optional_failed(ctx, "SMART Thresholds", &e) {
                    return false;
                }
            }
        }
    }
    if flags.smart_general_values {
        print_general_values(&values, ctx);
    }
    if flags.smart_vendor_attrib {
        print_attributes(&values, &thresholds, flags.output_format, ctx);
    }
    true
}

fn print_general_values(values: &SmartValues, ctx: &mut Context) {
    let status = SelfTestEntry {
        test_type: 0,
        status: values.self_test_status,
        lifetime_hours: 0,
        failing_lba: None,
    };
    out!(ctx, "General SMART Values:\n");
    out!(
        ctx,
        "Offline data collection status:  (0x{:02x})\n",
        values.offline_status
    );
    out!(
        ctx,
        "Self-test execution status:      ({:4})\t{}\n",
        values.self_test_status,
        status.status_text()
    );
    if values.self_test_status >> 4 == 0xf {
        out!(
            ctx,
            "\t\t\t\t\t{}% of test remaining.\n",
            status.remaining_percent()
        );
    }
    out!(
        ctx,
        "Total time to complete Offline data collection: ({:5}) seconds.\n",
        values.offline_seconds
    );
    out!(
        ctx,
        "SMART capabilities:            (0x{:04x})\n",
        values.smart_capability
    );
    out!(
        ctx,
        "Error logging capability:        (0x{:02x})\tError logging {}supported.\n",
        values.errorlog_capability,
        if values.errorlog_capability & 0x01 != 0 { "" } else { "NOT " }
    );
    out!(
        ctx,
        "Short self-test routine recommended polling time:\t ({:4}) minutes.\n",
        values.short_test_minutes
    );
    out!(
        ctx,
        "Extended self-test routine recommended polling time:\t ({:4}) minutes.\n",
        values.extended_test_minutes
    );
    let conveyance = values.offline_capability & 0x20 != 0;
    if conveyance {
        out!(
            ctx,
            "Conveyance self-test routine recommended polling time:\t ({:4}) minutes.\n",
            values.conveyance_test_minutes
        );
    }
    out!(ctx, "\n");

    let mut polling = json!({
        "short": values.short_test_minutes,
        "extended": values.extended_test_minutes,
    });
    if conveyance {
        polling["conveyance"] = json!(values.conveyance_test_minutes);
    }
    ctx.report.set(
        "ata_smart_data",
        json!({
            "offline_data_collection": {
                "status": { "value": values.offline_status },
                "completion_seconds": values.offline_seconds,
            },
            "self_test": {
                "status": {
                    "value": values.self_test_status,
                    "string": status.status_text(),
                },
                "polling_minutes": polling,
            },
            "capabilities": {
                "values": [values.offline_capability, values.smart_capability],
                "error_logging_supported": values.errorlog_capability & 0x01 != 0,
            },
        }),
    );
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Failure {
    Never,
    Past,
    Now,
}

fn failure_state(attr: &SmartAttribute, threshold: Option<u8>) -> Failure {
    match threshold {
        Some(t) if t != 0 && attr.value <= t => Failure::Now,
        Some(t) if t != 0 && attr.worst <= t => Failure::Past,
        _ => Failure::Never,
    }
}

fn brief_flags(flags: u16) -> String {
    "POSRCK"
        .chars()
        .enumerate()
        .map(|(bit, c)| if flags & (1 << bit) != 0 { c } else { '-' })
        .collect()
}

fn print_attributes(
    values: &SmartValues,
    thresholds: &[(u8, u8)],
    format: OutputFormat,
    ctx: &mut Context,
) {
    out!(
        ctx,
        "SMART Attributes Data Structure revision number: {}\n",
        values.revision
    );
    out!(ctx, "Vendor Specific SMART Attributes with Thresholds:\n");
    if format.brief {
        out!(ctx, "ID# ATTRIBUTE_NAME          FLAGS    VALUE WORST THRESH FAIL RAW_VALUE\n");
    } else {
        out!(
            ctx,
            "ID# ATTRIBUTE_NAME          FLAG     VALUE WORST THRESH TYPE      UPDATED  WHEN_FAILED RAW_VALUE\n"
        );
    }

    let mut table = Vec::with_capacity(values.attributes.len());
    for attr in &values.attributes {
        let threshold = thresholds
            .iter()
            .find(|(id, _)| *id == attr.id)
            .map(|(_, t)| *t);
        let failure = failure_state(attr, threshold);
        let name = ata::attribute_name(attr.id);
        let id = if format.hex_id {
            format!("0x{:02x}", attr.id)
        } else {
            format!("{:3}", attr.id)
        };
        let raw = if format.hex_val {
            format!("0x{:012x}", attr.raw_value())
        } else {
            attr.raw_value().to_string()
        };
        let thresh = threshold.map_or_else(|| "---".to_string(), |t| format!("{t:03}"));

        if format.brief {
            let fail = match failure {
                Failure::Never => "-",
                Failure::Past => "Past",
                Failure::Now => "NOW",
            };
            out!(
                ctx,
                "{id} {name:<23} {}   {:03}   {:03}   {thresh}    {fail:<4} {raw}\n",
                brief_flags(attr.status_flags),
                attr.value,
                attr.worst
            );
        } else {
            let when = match failure {
                Failure::Never => "-",
                Failure::Past => "In_the_past",
                Failure::Now => "FAILING_NOW",
            };
            out!(
                ctx,
                "{id} {name:<23} 0x{:04x}   {:03}   {:03}   {thresh}    {:<9} {:<8} {when:<11} {raw}\n",
                attr.status_flags,
                attr.value,
                attr.worst,
                if attr.prefailure() { "Pre-fail" } else { "Old_age" },
                if attr.online() { "Always" } else { "Offline" }
            );
        }

        let when_failed = match failure {
            Failure::Never => "",
            Failure::Past => "past",
            Failure::Now => "now",
        };
        table.push(json!({
            "id": attr.id,
            "name": name,
            "value": attr.value,
            "worst": attr.worst,
            "thresh": threshold.unwrap_or(0),
            "when_failed": when_failed,
            "flags": {
                "value": attr.status_flags,
                "string": brief_flags(attr.status_flags),
                "prefailure": attr.prefailure(),
                "updated_online": attr.online(),
            },
            "raw": { "value": attr.raw_value(), "string": attr.raw_value().to_string() },
        }));
    }
    out!(ctx, "\n");
    ctx.report.set(
        "ata_smart_attributes",
        json!({ "revision": values.revision, "table": table }),
    );
}

fn print_log_directories<C: AtaChannel + ?Sized>(
    chan: &mut C,
    flags: &AtaFlags,
    ctx: &mut Context,
) -> bool {
    let mut dirs = serde_json::Map::new();
    if flags.gp_logdir {
        match read_sector(chan, &AtaCommand::read_log_ext(ata::LOG_DIRECTORY, 0), ctx)
            .and_then(|bytes| ata::log_directory(&bytes))
        {
            Ok((version, entries)) => {
                out!(ctx, "General Purpose Log Directory Version {version}\n");
                for (address, sectors) in &entries {
                    out!(ctx, "GP Log at address 0x{address:02x} has {sectors:5} sectors\n");
                }
                dirs.insert("gp_dir_version".to_string(), json!(version));
                dirs.insert("gp_table".to_string(), directory_table(&entries));
            }
            Err(e) => {
                if !optional_failed(ctx, "GP Log Directory", &e) {
                    return false;
                }
            }
        }
    }
    if flags.smart_logdir {
        match read_sector(chan, &AtaCommand::smart_read_log(ata::LOG_DIRECTORY), ctx)
            .and_then(|bytes| ata::log_directory(&bytes))
        {
            Ok((version, entries)) => {
                out!(ctx, "SMART Log Directory Version {version}\n");
                for (address, sectors) in &entries {
                    out!(ctx, "SMART Log at address 0x{address:02x} has {sectors:5} sectors\n");
                }
                dirs.insert("smart_dir_version".to_string(), json!(version));
                dirs.insert("smart_table".to_string(), directory_table(&entries));
            }
            Err(e) => {
                if !optional_failed(ctx, "SMART Log Directory", &e) {
                    return false;
                }
            }
        }
    }
    out!(ctx, "\n");
    if !dirs.is_empty() {
        ctx.report.set("ata_log_directory", Value::Object(dirs));
    }
    true
}

fn directory_table(entries: &[(u8, u16)]) -> Value {
    entries
        .iter()
        .map(|(address, sectors)| json!({ "address": address, "sectors": sectors }))
        .collect()
}

fn print_error_logs<C: AtaChannel + ?Sized>(
    chan: &mut C,
    flags: &AtaFlags,
    ctx: &mut Context,
) -> bool {
    let mut summary = flags.smart_error_log;
    if flags.smart_ext_error_log > 0 {
        let cmd = AtaCommand::read_log_ext(ata::LOG_EXT_COMPREHENSIVE_ERROR, 0);
        match read_sector(chan, &cmd, ctx).and_then(|bytes| ata::ext_error_count(&bytes)) {
            Ok((version, count)) => {
                out!(ctx, "SMART Extended Comprehensive Error Log Version: {version}\n");
                if count == 0 {
                    out!(ctx, "No Errors Logged\n\n");
                } else {
                    out!(
                        ctx,
                        "Device Error Count: {count} (showing at most {} entries)\n\n",
                        flags.smart_ext_error_log
                    );
                }
                ctx.report.section("ata_smart_error_log").insert(
                    "extended".to_string(),
                    json!({ "revision": version, "count": count }),
                );
            }
            Err(e) if flags.retry_error_log => {
                ctx.sink.info(format_args!(
                    "Read SMART Extended Comprehensive Error Log failed: {e}, retrying with SMART Error Log\n"
                ));
                summary = true;
            }
            Err(e) => {
                if !optional_failed(ctx, "SMART Extended Comprehensive Error Log", &e) {
                    return false;
                }
            }
        }
    }
    if !summary {
        return true;
    }
    match read_sector(chan, &AtaCommand::smart_read_log(ata::LOG_SUMMARY_ERROR), ctx)
        .and_then(|bytes| ata::summary_error_count(&bytes))
    {
        Ok((version, count)) => {
            out!(ctx, "SMART Error Log Version: {version}\n");
            if count == 0 {
                out!(ctx, "No Errors Logged\n\n");
            } else {
                out!(ctx, "ATA Error Count: {count}\n\n");
            }
            ctx.report.section("ata_smart_error_log").insert(
                "summary".to_string(),
                json!({ "revision": version, "count": count }),
            );
            true
        }
        Err(e) => optional_failed(ctx, "SMART Error Log", &e),
    }
}

fn print_selftest_logs<C: AtaChannel + ?Sized>(
    chan: &mut C,
    flags: &AtaFlags,
    ctx: &mut Context,
) -> bool {
    let mut standard = flags.smart_selftest_log;
    if flags.smart_ext_selftest_log > 0 {
        let cmd = AtaCommand::read_log_ext(ata::LOG_EXT_SELFTEST, 0);
        match read_sector(chan, &cmd, ctx).and_then(|bytes| SelfTestLog::from_ext_log(&bytes)) {
            Ok(log) => {
                out!(
                    ctx,
                    "SMART Extended Self-test Log Version: {}\n",
                    log.revision
                );
                let shown = flags.smart_ext_selftest_log as usize;
                let table = print_selftest_table(&log, shown, ctx);
                ctx.report
                    .section("ata_smart_self_test_log")
                    .insert("extended".to_string(), table);
            }
            Err(e) if flags.retry_selftest_log => {
                ctx.sink.info(format_args!(
                    "Read SMART Extended Self-test Log failed: {e}, retrying with SMART Self-test Log\n"
                ));
                standard = true;
            }
            Err(e) => {
                if !optional_failed(ctx, "SMART Extended Self-test Log", &e) {
                    return false;
                }
            }
        }
    }
    if !standard {
        return true;
    }
    match read_sector(chan, &AtaCommand::smart_read_log(ata::LOG_SELFTEST), ctx)
        .and_then(|bytes| SelfTestLog::from_smart_log(&bytes))
    {
        Ok(log) => {
            out!(
                ctx,
                "SMART Self-test log structure revision number {}\n",
                log.revision
            );
            let table = print_selftest_table(&log, usize::MAX, ctx);
            ctx.report
                .section("ata_smart_self_test_log")
                .insert("standard".to_string(), table);
            true
        }
        Err(e) => optional_failed(ctx, "SMART Self-test Log", &e),
    }
}

fn print_selftest_table(log: &SelfTestLog, limit: usize, ctx: &mut Context) -> Value {
    if log.entries.is_empty() {
        out!(ctx, "No self-tests have been logged.\n\n");
    } else {
        out!(
            ctx,
            "Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error\n"
        );
    }
    let mut table = Vec::new();
    for (i, entry) in log.entries.iter().take(limit).enumerate() {
        let lba = entry
            .failing_lba
            .map_or_else(|| "-".to_string(), |lba| lba.to_string());
        out!(
            ctx,
            "# {:<2} {:<18}  {:<29} {:02}%  {:>15}  {lba}\n",
            i + 1,
            entry.description(),
            entry.status_text(),
            entry.remaining_percent(),
            entry.lifetime_hours
        );
        let mut row = json!({
            "type": { "value": entry.test_type, "string": entry.description() },
            "status": {
                "value": entry.status,
                "string": entry.status_text(),
                "passed": entry.status >> 4 == 0,
            },
            "lifetime_hours": entry.lifetime_hours,
        });
        if let Some(lba) = entry.failing_lba {
            row["lba"] = json!(lba);
        }
        table.push(row);
    }
    if !log.entries.is_empty() {
        out!(ctx, "\n");
    }
    json!({ "revision": log.revision, "count": log.entries.len(), "table": table })
}

fn print_selective_log<C: AtaChannel + ?Sized>(chan: &mut C, ctx: &mut Context) -> bool {
    let cmd = AtaCommand::smart_read_log(ata::LOG_SELECTIVE_SELFTEST);
    let (revision, spans) = match read_sector(chan, &cmd, ctx)
        .and_then(|bytes| ata::selective_spans(&bytes))
    {
        Ok(found) => found,
        Err(e) => return optional_failed(ctx, "SMART Selective Self-test Log", &e),
    };
    out!(
        ctx,
        "SMART Selective self-test log data structure revision number {revision}\n"
    );
    out!(ctx, " SPAN  MIN_LBA  MAX_LBA  CURRENT_TEST_STATUS\n");
    for (i, (min, max)) in spans.iter().enumerate() {
        out!(ctx, "{:>5} {min:>8} {max:>8}  Not_testing\n", i + 1);
    }
    out!(ctx, "\n");
    let table: Vec<Value> = spans
        .iter()
        .map(|(min, max)| json!({ "lba_min": min, "lba_max": max }))
        .collect();
    ctx.report.set(
        "ata_smart_selective_self_test_log",
        json!({ "revision": revision, "table": table }),
    );
    true
}

fn print_sct_temperatures<C: AtaChannel + ?Sized>(chan: &mut C, ctx: &mut Context) -> bool {
    let temps = match read_sector(chan, &AtaCommand::smart_read_log(ata::LOG_SCT_STATUS), ctx)
        .and_then(|bytes| SctTemperatures::from_bytes(&bytes))
    {
        Ok(temps) => temps,
        Err(e) => return optional_failed(ctx, "SCT Status", &e),
    };
    let show = |t: Option<i8>| t.map_or_else(|| "?".to_string(), |t| t.to_string());
    out!(ctx, "SCT Status Version:                  {}\n", temps.version);
    out!(
        ctx,
        "Current Temperature:                 {} Celsius\n",
        show(temps.current)
    );
    out!(
        ctx,
        "Power Cycle Min/Max Temperature:     {}/{} Celsius\n",
        show(temps.power_cycle_min),
        show(temps.power_cycle_max)
    );
    out!(
        ctx,
        "Lifetime    Min/Max Temperature:     {}/{} Celsius\n\n",
        show(temps.lifetime_min),
        show(temps.lifetime_max)
    );
    ctx.report.set(
        "temperature",
        json!({
            "current": temps.current,
            "power_cycle_min": temps.power_cycle_min,
            "power_cycle_max": temps.power_cycle_max,
            "lifetime_min": temps.lifetime_min,
            "lifetime_max": temps.lifetime_max,
        }),
    );
    true
}

fn devstat_page_name(page: u8) -> &'static str {
    match page {
        0x00 => "List of supported log pages",
        0x01 => "General Statistics",
        0x02 => "Free-Fall Statistics",
        0x03 => "Rotating Media Statistics",
        0x04 => "General Errors Statistics",
        0x05 => "Temperature Statistics",
        0x06 => "Transport Statistics",
        0x07 => "Solid State Device Statistics",
        _ => "Vendor Specific Statistics",
    }
}

fn print_device_statistics<C: AtaChannel + ?Sized>(chan: &mut C, ctx: &mut Context) -> bool {
    let cmd = AtaCommand::read_log_ext(ata::LOG_DEVICE_STATISTICS, 0);
    let pages = match read_sector(chan, &cmd, ctx).and_then(|bytes| ata::devstat_pages(&bytes)) {
        Ok(pages) => pages,
        Err(e) => return optional_failed(ctx, "Device Statistics", &e),
    };
    out!(ctx, "Device Statistics (GP Log 0x04)\n");
    for page in &pages {
        out!(ctx, "Page  0x{page:02x}  {}\n", devstat_page_name(*page));
    }
    out!(ctx, "\n");
    let listed: Vec<Value> = pages
        .iter()
        .map(|page| json!({ "number": page, "name": devstat_page_name(*page) }))
        .collect();
    ctx.report
        .set("ata_device_statistics", json!({ "pages": listed }));
    true
}

fn print_pending_defects<C: AtaChannel + ?Sized>(
    chan: &mut C,
    limit: u32,
    ctx: &mut Context,
) -> bool {
    let cmd = AtaCommand::read_log_ext(ata::LOG_PENDING_DEFECTS, 0);
    let count = match read_sector(chan, &cmd, ctx)
        .and_then(|bytes| ata::pending_defect_count(&bytes))
    {
        Ok(count) => count,
        Err(e) => return optional_failed(ctx, "Pending Defects log", &e),
    };
    out!(ctx, "Pending Defects log (GP Log 0x0c)\n");
    if count == 0 {
        out!(ctx, "No Defects Logged\n\n");
    } else {
        out!(
            ctx,
            "{} entries (showing at most {limit})\n\n",
            with_commas(u128::from(count))
        );
    }
    ctx.report
        .set("ata_pending_defects_log", json!({ "size": count }));
    true
}

fn print_sata_phy<C: AtaChannel + ?Sized>(chan: &mut C, ctx: &mut Context) -> bool {
    let cmd = AtaCommand::read_log_ext(ata::LOG_SATA_PHY_EVENTS, 0);
    let counters = match read_sector(chan, &cmd, ctx)
        .and_then(|bytes| ata::sata_phy_counters(&bytes))
    {
        Ok(counters) => counters,
        Err(e) => return optional_failed(ctx, "SATA Phy Event Counters", &e),
    };
    out!(ctx, "SATA Phy Event Counters (GP Log 0x11)\n");
    out!(ctx, "ID          Value  Description\n");
    for (id, value) in &counters {
        out!(
            ctx,
            "0x{id:04x} {value:>10}  {}\n",
            ata::sata_phy_counter_name(*id)
        );
    }
    out!(ctx, "\n");
    let table: Vec<Value> = counters
        .iter()
        .map(|(id, value)| {
            json!({ "id": id, "name": ata::sata_phy_counter_name(*id), "value": value })
        })
        .collect();
    ctx.report
        .set("sata_phy_event_counters", json!({ "table": table }));
    true
}
