//! NVMe printer.

use serde_json::{json, Value};

use crate::context::{out, Context};
use crate::error::SmartError;
use crate::nvme::{
    self, IdentifyController, NvmeChannel, NvmeSmartLog, SelfTestLog, ERROR_ENTRY_LEN,
    NVME_LOG_ERROR_INFO, NVME_LOG_SELFTEST, NVME_LOG_SMART_INFO, SELFTEST_LOG_LEN, SMART_LOG_LEN,
};
use crate::options::NvmeFlags;
use crate::printer::{capacity_line, si_size, with_commas};
use crate::tolerance::CommandClass;

/// Bytes per "data unit" in the SMART / Health log.
const DATA_UNIT_BYTES: u128 = 512_000;

const OPTIONAL_ADMIN_COMMANDS: [&str; 10] = [
    "Security", "Format", "Frmw_DL", "NS_Mngmt", "Self_Test", "Directvs", "MI_Snd/Rec",
    "Vrt_Mngmt", "Drbl_Bf_Cfg", "Get_LBA_Sts",
];
const OPTIONAL_NVM_COMMANDS: [&str; 8] = [
    "Comp", "Wr_Unc", "DS_Mngmt", "Wr_Zero", "Sav/Sel_Feat", "Resv", "Timestmp", "Verify",
];
const CRITICAL_WARNINGS: [&str; 6] = [
    "available spare has fallen below threshold",
    "temperature is above or below thresholds",
    "NVM subsystem reliability has been degraded",
    "media has been placed in read only mode",
    "volatile memory backup device has failed",
    "persistent memory region has become read-only or unreliable",
];

pub fn print_nvme<C: NvmeChannel + ?Sized>(chan: &mut C, flags: &NvmeFlags, ctx: &mut Context) {
    let needs_identity = flags.drive_info
        || flags.drive_capabilities
        || flags.error_log_entries > 0
        || flags.smart_selftest_log;
    let mut identity = None;
    if needs_identity {
        match logged(ctx, "IDENTIFY CONTROLLER", nvme::identify_controller(chan)) {
            Ok(id) => identity = Some(id),
            Err(e) => {
                ctx.sink.error(format_args!(
                    "Read NVMe Identify Controller failed: {e}\n"
                ));
                if !ctx.allow(CommandClass::Mandatory) {
                    return;
                }
            }
        }
    }

    if let Some(id) = &identity {
        if flags.drive_info {
            print_drive_info(id, ctx);
        }
        if flags.drive_capabilities {
            print_capabilities(id, ctx);
        }
    }
    if (flags.smart_check_status || flags.smart_vendor_attrib)
        && !print_smart_log(chan, flags, ctx)
    {
        return;
    }
    if flags.error_log_entries > 0
        && !print_error_log(chan, flags.error_log_entries, identity.as_ref(), ctx)
    {
        return;
    }
    if flags.smart_selftest_log {
        print_selftest_log(chan, identity.as_ref(), ctx);
    }
}

fn logged<T>(ctx: &mut Context, name: &str, result: Result<T, SmartError>) -> Result<T, SmartError> {
    if let Err(e) = &result {
        tracing::debug!(command = name, error = %e, "NVMe admin command failed");
    }
    if ctx.debug.nvme > 0 {
        let status = if result.is_ok() { 0 } else { -1 };
        ctx.sink
            .info(format_args!("REPORT-IOCTL: {name} returned {status}\n"));
    }
    result
}

fn print_drive_info(id: &IdentifyController, ctx: &mut Context) {
    out!(ctx, "=== START OF INFORMATION SECTION ===\n");
    out!(ctx, "Model Number:                       {}\n", id.model);
    out!(ctx, "Serial Number:                      {}\n", id.serial);
    out!(ctx, "Firmware Version:                   {}\n", id.firmware);
    out!(
        ctx,
        "PCI Vendor/Subsystem ID:            0x{:04x}\n",
        id.vendor_id
    );
    out!(ctx, "IEEE OUI Identifier:                0x{:06x}\n", id.ieee_oui);
    if id.total_capacity > 0 {
        out!(
            ctx,
            "Total NVM Capacity:                 {}\n",
            capacity_line(id.total_capacity)
        );
    }
    out!(ctx, "Controller ID:                      {}\n", id.controller_id);
    out!(ctx, "NVMe Version:                       {}\n", id.version_string());
    out!(ctx, "Number of Namespaces:               {}\n\n", id.namespaces);

    let report = &mut ctx.report;
    report.set("model_name", id.model.as_str());
    report.set("serial_number", id.serial.as_str());
    report.set("firmware_version", id.firmware.as_str());
    report.set(
        "nvme_pci_vendor",
        json!({ "id": id.vendor_id, "subsystem_id": id.subsystem_vendor_id }),
    );
    report.set("nvme_ieee_oui_identifier", id.ieee_oui);
    if id.total_capacity > 0 {
        report.set(
            "nvme_total_capacity",
            u64::try_from(id.total_capacity).unwrap_or(u64::MAX),
        );
    }
    report.set("nvme_controller_id", id.controller_id);
    report.set(
        "nvme_version",
        json!({ "string": id.version_string(), "value": id.version }),
    );
    report.set("nvme_number_of_namespaces", id.namespaces);
}

fn bit_names(value: u16, names: &[&str]) -> String {
    let set: Vec<&str> = names
        .iter()
        .enumerate()
        .filter(|(bit, _)| value & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();
    if set.is_empty() {
        "-".to_string()
    } else {
        set.join(" ")
    }
}

fn print_capabilities(id: &IdentifyController, ctx: &mut Context) {
    let kelvin = |k: u16| {
        if k == 0 {
            "-".to_string()
        } else {
            format!("{} Celsius", i32::from(k) - 273)
        }
    };
    out!(
        ctx,
        "Optional Admin Commands (0x{:04x}):  {}\n",
        id.optional_admin_commands,
        bit_names(id.optional_admin_commands, &OPTIONAL_ADMIN_COMMANDS)
    );
    out!(
        ctx,
        "Optional NVM Commands (0x{:04x}):    {}\n",
        id.optional_nvm_commands,
        bit_names(id.optional_nvm_commands, &OPTIONAL_NVM_COMMANDS)
    );
    out!(
        ctx,
        "Volatile Write Cache:               {}\n",
        if id.volatile_write_cache { "Present" } else { "Not Present" }
    );
    out!(
        ctx,
        "Warning  Comp. Temp. Threshold:     {}\n",
        kelvin(id.warning_temp_kelvin)
    );
    out!(
        ctx,
        "Critical Comp. Temp. Threshold:     {}\n",
        kelvin(id.critical_temp_kelvin)
    );
    out!(ctx, "Error Log Page Entries:             {}\n", id.error_log_entries);
    out!(ctx, "Supported Power States:             {}\n\n", id.power_states);

    ctx.report.set(
        "nvme_capabilities",
        json!({
            "optional_admin_commands": id.optional_admin_commands,
            "optional_nvm_commands": id.optional_nvm_commands,
            "volatile_write_cache": id.volatile_write_cache,
            "warning_temperature_kelvin": id.warning_temp_kelvin,
            "critical_temperature_kelvin": id.critical_temp_kelvin,
            "error_log_entries": id.error_log_entries,
            "power_states": id.power_states,
        }),
    );
}

fn data_units(units: u128) -> String {
    format!(
        "{} [{}]",
        with_commas(units),
        si_size(units.saturating_mul(DATA_UNIT_BYTES))
    )
}

fn print_smart_log<C: NvmeChannel + ?Sized>(
    chan: &mut C,
    flags: &NvmeFlags,
    ctx: &mut Context,
) -> bool {
    let result = nvme::get_log_page(chan, NVME_LOG_SMART_INFO, SMART_LOG_LEN)
        .and_then(|bytes| NvmeSmartLog::from_bytes(&bytes));
    let log = match logged(ctx, "GET LOG PAGE", result) {
        Ok(log) => log,
        Err(e) => {
            ctx.sink.error(format_args!(
                "Read NVMe SMART/Health Information failed: {e}\n"
            ));
            let class = if flags.smart_check_status {
                CommandClass::Mandatory
            } else {
                CommandClass::Optional
            };
            return ctx.allow(class);
        }
    };

    out!(ctx, "=== START OF SMART DATA SECTION ===\n");
    if flags.smart_check_status {
        if log.passed() {
            out!(ctx, "SMART overall-health self-assessment test result: PASSED\n");
        } else {
            out!(ctx, "SMART overall-health self-assessment test result: FAILED!\n");
            for (bit, warning) in CRITICAL_WARNINGS.iter().enumerate() {
                if log.critical_warning & (1 << bit) != 0 {
                    ctx.sink.warn(format_args!("- {warning}\n"));
                }
            }
        }
        out!(ctx, "\n");
        let status = ctx.report.section("smart_status");
        status.insert("passed".to_string(), Value::from(log.passed()));
        status.insert(
            "nvme".to_string(),
            json!({ "value": log.critical_warning }),
        );
    }

    let celsius = log.temperature_celsius();
    ctx.report
        .section("temperature")
        .insert("current".to_string(), Value::from(celsius));
    if !flags.smart_vendor_attrib {
        return true;
    }

    out!(ctx, "SMART/Health Information (NVMe Log 0x02)\n");
    out!(ctx, "Critical Warning:                   0x{:02x}\n", log.critical_warning);
    out!(ctx, "Temperature:                        {celsius} Celsius\n");
    out!(ctx, "Available Spare:                    {}%\n", log.available_spare);
    out!(
        ctx,
        "Available Spare Threshold:          {}%\n",
        log.available_spare_threshold
    );
    out!(ctx, "Percentage Used:                    {}%\n", log.percentage_used);
    out!(ctx, "Data Units Read:                    {}\n", data_units(log.data_units_read));
    out!(
        ctx,
        "Data Units Written:                 {}\n",
        data_units(log.data_units_written)
    );
    let counters = [
        ("Host Read Commands:                 ", log.host_read_commands),
        ("Host Write Commands:                ", log.host_write_commands),
        ("Controller Busy Time:               ", log.controller_busy_time),
        ("Power Cycles:                       ", log.power_cycles),
        ("Power On Hours:                     ", log.power_on_hours),
        ("Unsafe Shutdowns:                   ", log.unsafe_shutdowns),
        ("Media and Data Integrity Errors:    ", log.media_errors),
        ("Error Information Log Entries:      ", log.num_err_log_entries),
    ];
    for (label, value) in counters {
        out!(ctx, "{label}{}\n", with_commas(value));
    }
    out!(
        ctx,
        "Warning  Comp. Temperature Time:    {}\n",
        log.warning_temp_minutes
    );
    out!(
        ctx,
        "Critical Comp. Temperature Time:    {}\n\n",
        log.critical_temp_minutes
    );

    let clamp = |v: u128| u64::try_from(v).unwrap_or(u64::MAX);
    let report = &mut ctx.report;
    report.set(
        "nvme_smart_health_information_log",
        json!({
            "critical_warning": log.critical_warning,
            "temperature": celsius,
            "available_spare": log.available_spare,
            "available_spare_threshold": log.available_spare_threshold,
            "percentage_used": log.percentage_used,
            "data_units_read": clamp(log.data_units_read),
            "data_units_written": clamp(log.data_units_written),
            "host_reads": clamp(log.host_read_commands),
            "host_writes": clamp(log.host_write_commands),
            "controller_busy_time": clamp(log.controller_busy_time),
            "power_cycles": clamp(log.power_cycles),
            "power_on_hours": clamp(log.power_on_hours),
            "unsafe_shutdowns": clamp(log.unsafe_shutdowns),
            "media_errors": clamp(log.media_errors),
            "num_err_log_entries": clamp(log.num_err_log_entries),
            "warning_temp_time": log.warning_temp_minutes,
            "critical_comp_time": log.critical_temp_minutes,
        }),
    );
    report.set("power_on_time", json!({ "hours": clamp(log.power_on_hours) }));
    report.set("power_cycle_count", clamp(log.power_cycles));
    true
}

fn print_error_log<C: NvmeChannel + ?Sized>(
    chan: &mut C,
    wanted: u32,
    identity: Option<&IdentifyController>,
    ctx: &mut Context,
) -> bool {
    let available = identity.map_or(16, |id| u32::from(id.error_log_entries));
    let count = wanted.min(available).max(1);
    let result = nvme::get_log_page(chan, NVME_LOG_ERROR_INFO, count as usize * ERROR_ENTRY_LEN);
    let bytes = match logged(ctx, "GET LOG PAGE", result) {
        Ok(bytes) => bytes,
        Err(e) => {
            ctx.sink.error(format_args!(
                "Read NVMe Error Information Log failed: {e}\n"
            ));
            return ctx.allow(CommandClass::Optional);
        }
    };
    let entries = nvme::parse_error_log(&bytes);
    out!(
        ctx,
        "Error Information (NVMe Log 0x01, {count} of {available} entries)\n"
    );
    if entries.is_empty() {
        out!(ctx, "No Errors Logged\n\n");
    } else {
        out!(ctx, "Num   ErrCount  SQId   CmdId  Status  NSID           LBA\n");
        for (i, entry) in entries.iter().enumerate() {
            out!(
                ctx,
                "{i:3} {:>10} {:>5}  0x{:04x}  0x{:04x} {:>5} {:>13}\n",
                entry.error_count,
                entry.submission_queue,
                entry.command_id,
                entry.status,
                entry.nsid,
                entry.lba
            );
        }
        out!(ctx, "\n");
    }
    let table: Vec<Value> = entries
        .iter()
        .map(|entry| {
            json!({
                "error_count": entry.error_count,
                "submission_queue_id": entry.submission_queue,
                "command_id": entry.command_id,
                "status_field": entry.status,
                "nsid": entry.nsid,
                "lba": entry.lba,
            })
        })
        .collect();
    ctx.report.set(
        "nvme_error_information_log",
        json!({ "size": available, "read": count, "logged": entries.len(), "table": table }),
    );
    true
}

fn print_selftest_log<C: NvmeChannel + ?Sized>(
    chan: &mut C,
    identity: Option<&IdentifyController>,
    ctx: &mut Context,
) -> bool {
    if identity.is_some_and(|id| !id.supports_self_test()) {
        ctx.sink
            .info(format_args!("Self-tests not supported\n\n"));
        return true;
    }
    let result = nvme::get_log_page(chan, NVME_LOG_SELFTEST, SELFTEST_LOG_LEN)
        .and_then(|bytes| SelfTestLog::from_bytes(&bytes));
    let log = match logged(ctx, "GET LOG PAGE", result) {
        Ok(log) => log,
        Err(e) => {
            ctx.sink
                .error(format_args!("Read Self-test Log failed: {e}\n"));
            return ctx.allow(CommandClass::Optional);
        }
    };
    out!(ctx, "Self-test Log (NVMe Log 0x06)\n");
    match log.current_operation {
        0 => out!(ctx, "Self-test status: No self-test in progress\n"),
        op => out!(
            ctx,
            "Self-test status: {} self-test in progress ({}% completed)\n",
            if op == 1 { "Short" } else { "Extended" },
            log.current_completion
        ),
    }
    if log.results.is_empty() {
        out!(ctx, "No Self-tests Logged\n\n");
    } else {
        out!(
            ctx,
            "Num  Test_Description  Status                       Power_on_Hours  Failing_LBA\n"
        );
        for (i, result) in log.results.iter().enumerate() {
            let lba = result
                .failing_lba
                .map_or_else(|| "-".to_string(), |lba| lba.to_string());
            out!(
                ctx,
                " {i:<2}  {:<16}  {:<28} {:>14}  {lba}\n",
                result.description(),
                result.result_text(),
                result.power_on_hours
            );
        }
        out!(ctx, "\n");
    }
    let table: Vec<Value> = log
        .results
        .iter()
        .map(|result| {
            let mut row = json!({
                "self_test_code": { "value": result.code, "string": result.description() },
                "self_test_result": { "value": result.result, "string": result.result_text() },
                "power_on_hours": result.power_on_hours,
            });
            if let Some(lba) = result.failing_lba {
                row["lba"] = json!(lba);
            }
            row
        })
        .collect();
    ctx.report.set(
        "nvme_self_test_log",
        json!({
            "current_self_test_operation": { "value": log.current_operation },
            "table": table,
        }),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvme::tests::{identify_reply, smart_reply};
    use crate::nvme::{NVME_ADMIN_GET_LOG_PAGE, NVME_ADMIN_IDENTIFY};

    #[derive(Default)]
    struct FakeNvme {
        identify: Option<Vec<u8>>,
        logs: Vec<(u8, Vec<u8>)>,
        requests: Vec<(u8, u32, usize)>,
    }

    impl NvmeChannel for FakeNvme {
        fn admin_command(
            &mut self,
            opcode: u8,
            _nsid: u32,
            cdw10: u32,
            data_len: usize,
        ) -> Result<Vec<u8>, SmartError> {
            self.requests.push((opcode, cdw10, data_len));
            let reply = match opcode {
                NVME_ADMIN_IDENTIFY => self.identify.clone(),
                NVME_ADMIN_GET_LOG_PAGE => self
                    .logs
                    .iter()
                    .find(|(lid, _)| u32::from(*lid) == cdw10 & 0xff)
                    .map(|(_, data)| {
                        let mut data = data.clone();
                        data.resize(data_len, 0);
                        data
                    }),
                _ => None,
            };
            reply.ok_or_else(|| SmartError::command("NVMe admin", "invalid field"))
        }
    }

    fn ssd() -> FakeNvme {
        FakeNvme {
            identify: Some(identify_reply("Samsung SSD 980 PRO 1TB", "S5GXNF0R")),
            logs: vec![(NVME_LOG_SMART_INFO, smart_reply(0, 318, 1523))],
            ..Default::default()
        }
    }

    fn text(ctx: &Context) -> String {
        ctx.sink.lines().join("\n")
    }

    #[test]
    fn drive_info_from_identify_controller() {
        let flags = NvmeFlags {
            drive_info: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut ssd(), &flags, &mut ctx);
        let lines = ctx.sink.lines();
        assert!(lines.contains(&"Model Number:                       Samsung SSD 980 PRO 1TB".to_string()));
        assert!(lines.contains(&"NVMe Version:                       1.4".to_string()));
        assert_eq!(ctx.report.get("serial_number").unwrap(), "S5GXNF0R");
    }

    #[test]
    fn health_and_attributes() {
        let flags = NvmeFlags {
            smart_check_status: true,
            smart_vendor_attrib: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        let mut chan = ssd();
        print_nvme(&mut chan, &flags, &mut ctx);
        let out = text(&ctx);
        assert!(out.contains("self-assessment test result: PASSED"));
        assert!(out.contains("Temperature:                        45 Celsius"));
        assert!(out.contains("Power On Hours:                     1,523"));
        assert_eq!(ctx.report.get("power_on_time").unwrap()["hours"], json!(1523));
        assert_eq!(chan.requests, vec![(NVME_ADMIN_GET_LOG_PAGE, 0x007f_0002, 512)]);
    }

    #[test]
    fn critical_warning_fails_health() {
        let mut chan = FakeNvme {
            logs: vec![(NVME_LOG_SMART_INFO, smart_reply(0x05, 330, 1))],
            ..ssd()
        };
        let flags = NvmeFlags {
            smart_check_status: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut chan, &flags, &mut ctx);
        let lines = ctx.sink.lines();
        assert!(lines.contains(&"SMART overall-health self-assessment test result: FAILED!".to_string()));
        assert!(lines.contains(&"- available spare has fallen below threshold".to_string()));
        assert!(lines.contains(&"- NVM subsystem reliability has been degraded".to_string()));
        assert_eq!(ctx.report.get("smart_status").unwrap()["passed"], json!(false));
    }

    #[test]
    fn error_log_is_bounded_by_request_and_device() {
        let mut errors = vec![0u8; ERROR_ENTRY_LEN * 2];
        errors[0..8].copy_from_slice(&12u64.to_le_bytes());
        let mut chan = FakeNvme {
            logs: vec![(NVME_LOG_ERROR_INFO, errors)],
            ..ssd()
        };
        let flags = NvmeFlags {
            error_log_entries: 16,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut chan, &flags, &mut ctx);
        assert!(text(&ctx).contains("Error Information (NVMe Log 0x01, 16 of 64 entries)"));
        assert_eq!(chan.requests[1], (NVME_ADMIN_GET_LOG_PAGE, 0x00ff_0001, 1024));
        let log = ctx.report.get("nvme_error_information_log").unwrap();
        assert_eq!(log["logged"], json!(1));
        assert_eq!(log["table"][0]["error_count"], json!(12));
    }

    #[test]
    fn self_test_log_reports_in_progress_test() {
        let mut selftest = vec![0u8; SELFTEST_LOG_LEN];
        selftest[0] = 0x02;
        selftest[1] = 40;
        for slot in selftest[4..].chunks_exact_mut(28) {
            slot[0] = 0x0f;
        }
        let mut chan = FakeNvme {
            logs: vec![(NVME_LOG_SELFTEST, selftest)],
            ..ssd()
        };
        let flags = NvmeFlags {
            smart_selftest_log: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut chan, &flags, &mut ctx);
        let lines = ctx.sink.lines();
        assert!(lines.contains(&"Self-test status: Extended self-test in progress (40% completed)".to_string()));
        assert!(lines.contains(&"No Self-tests Logged".to_string()));
    }

    #[test]
    fn missing_identify_is_mandatory() {
        let mut chan = FakeNvme::default();
        let flags = NvmeFlags {
            drive_info: true,
            smart_check_status: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut chan, &flags, &mut ctx);
        assert_eq!(chan.requests.len(), 1);
        assert_eq!(
            ctx.sink.lines().last().map(String::as_str),
            Some("ERROR: A mandatory SMART command failed.")
        );
    }

    #[test]
    fn capabilities_list_supported_commands() {
        let flags = NvmeFlags {
            drive_capabilities: true,
            ..Default::default()
        };
        let mut ctx = Context::default();
        print_nvme(&mut ssd(), &flags, &mut ctx);
        let out = text(&ctx);
        assert!(out.contains("Optional Admin Commands (0x0017):  Security Format Frmw_DL Self_Test"));
        assert!(out.contains("Volatile Write Cache:               Present"));
        assert!(out.contains("Error Log Page Entries:             64"));
    }
}
