use crate::error::SmartError;

/// `struct nvme_admin_cmd` as consumed by `NVME_IOCTL_ADMIN_CMD`.
#[repr(C)]
#[derive(Debug, Default)]
pub struct NvmePassthruCommand {
    pub opcode: u8, pub flags: u8, pub rsvd1: u16, pub nsid: u32, pub cdw2: u32,
    pub cdw3: u32, pub metadata: u64, pub addr: u64, pub metadata_len: u32,
    pub data_len: u32, pub cdw10: u32, pub cdw11: u32, pub cdw12: u32,
    pub cdw13: u32, pub cdw14: u32, pub cdw15: u32, pub timeout_ms: u32, pub result: u32,
}

pub const NVME_ADMIN_GET_LOG_PAGE: u8 = 0x02;
pub const NVME_ADMIN_IDENTIFY: u8 = 0x06;
pub const NVME_LOG_ERROR_INFO: u8 = 0x01;
pub const NVME_LOG_SMART_INFO: u8 = 0x02;
pub const NVME_LOG_SELFTEST: u8 = 0x06;
pub const NVME_NSID_ALL: u32 = 0xFFFF_FFFF;

const IDENTIFY_CNS_CONTROLLER: u32 = 0x01;
pub const IDENTIFY_LEN: usize = 4096;
pub const SMART_LOG_LEN: usize = 512;
pub const ERROR_ENTRY_LEN: usize = 64;
pub const SELFTEST_LOG_LEN: usize = 564;

/// Transport able to execute NVMe admin commands on an opened controller.
pub trait NvmeChannel {
    fn admin_command(
        &mut self,
        opcode: u8,
        nsid: u32,
        cdw10: u32,
        data_len: usize,
    ) -> Result<Vec<u8>, SmartError>;
}

pub fn get_log_page<C: NvmeChannel + ?Sized>(
    chan: &mut C,
    page: u8,
    len: usize,
) -> Result<Vec<u8>, SmartError> {
    let numd = (len as u32 / 4).saturating_sub(1);
    chan.admin_command(
        NVME_ADMIN_GET_LOG_PAGE,
        NVME_NSID_ALL,
        u32::from(page) | (numd << 16),
        len,
    )
}

pub fn identify_controller<C: NvmeChannel + ?Sized>(
    chan: &mut C,
) -> Result<IdentifyController, SmartError> {
    let data = chan.admin_command(NVME_ADMIN_IDENTIFY, 0, IDENTIFY_CNS_CONTROLLER, IDENTIFY_LEN)?;
    IdentifyController::from_bytes(&data)
}

fn require(bytes: &[u8], len: usize, what: &str) -> Result<(), SmartError> {
    if bytes.len() < len {
        return Err(SmartError::Parsing(format!(
            "{what}: need {len} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(())
}

fn le16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn le32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn le64(b: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn le128(b: &[u8], at: usize) -> u128 {
    let mut raw = [0u8; 16];
    raw.copy_from_slice(&b[at..at + 16]);
    u128::from_le_bytes(raw)
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifyController {
    pub vendor_id: u16,
    pub subsystem_vendor_id: u16,
    pub serial: String,
    pub model: String,
    pub firmware: String,
    pub ieee_oui: u32,
    pub controller_id: u16,
    pub version: u32,
    pub optional_admin_commands: u16,
    /// Error log page entries, 1-based.
    pub error_log_entries: u16,
    pub power_states: u16,
    pub warning_temp_kelvin: u16,
    pub critical_temp_kelvin: u16,
    pub total_capacity: u128,
    pub namespaces: u32,
    pub optional_nvm_commands: u16,
    pub volatile_write_cache: bool,
}

impl IdentifyController {
    pub fn from_bytes(b: &[u8]) -> Result<Self, SmartError> {
        require(b, IDENTIFY_LEN, "IDENTIFY CONTROLLER")?;
        Ok(IdentifyController {
            vendor_id: le16(b, 0),
            subsystem_vendor_id: le16(b, 2),
            serial: ascii(&b[4..24]),
            model: ascii(&b[24..64]),
            firmware: ascii(&b[64..72]),
            ieee_oui: u32::from(b[73]) | (u32::from(b[74]) << 8) | (u32::from(b[75]) << 16),
            controller_id: le16(b, 78),
            version: le32(b, 80),
            optional_admin_commands: le16(b, 256),
            error_log_entries: u16::from(b[262]) + 1,
            power_states: u16::from(b[263]) + 1,
            warning_temp_kelvin: le16(b, 266),
            critical_temp_kelvin: le16(b, 268),
            total_capacity: le128(b, 280),
            namespaces: le32(b, 516),
            optional_nvm_commands: le16(b, 520),
            volatile_write_cache: b[525] & 0x01 != 0,
        })
    }

    pub fn version_string(&self) -> String {
        if self.version == 0 {
            return "<1.2".to_string();
        }
        let (major, minor, tertiary) = (
            self.version >> 16,
            (self.version >> 8) & 0xff,
            self.version & 0xff,
        );
        if tertiary == 0 {
            format!("{major}.{minor}")
        } else {
            format!("{major}.{minor}.{tertiary}")
        }
    }

    pub fn supports_self_test(&self) -> bool {
        self.optional_admin_commands & (1 << 4) != 0
    }
}

/// SMART / Health Information log page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NvmeSmartLog {
    pub critical_warning: u8,
    pub temperature_kelvin: u16,
    pub available_spare: u8,
    pub available_spare_threshold: u8,
    pub percentage_used: u8,
    pub data_units_read: u128,
    pub data_units_written: u128,
    pub host_read_commands: u128,
    pub host_write_commands: u128,
    pub controller_busy_time: u128,
    pub power_cycles: u128,
    pub power_on_hours: u128,
    pub unsafe_shutdowns: u128,
    pub media_errors: u128,
    pub num_err_log_entries: u128,
    pub warning_temp_minutes: u32,
    pub critical_temp_minutes: u32,
}

impl NvmeSmartLog {
    pub fn from_bytes(b: &[u8]) -> Result<Self, SmartError> {
        require(b, SMART_LOG_LEN, "SMART/Health log")?;
        Ok(NvmeSmartLog {
            critical_warning: b[0],
            temperature_kelvin: le16(b, 1),
            available_spare: b[3],
            available_spare_threshold: b[4],
            percentage_used: b[5],
            data_units_read: le128(b, 32),
            data_units_written: le128(b, 48),
            host_read_commands: le128(b, 64),
            host_write_commands: le128(b, 80),
            controller_busy_time: le128(b, 96),
            power_cycles: le128(b, 112),
            power_on_hours: le128(b, 128),
            unsafe_shutdowns: le128(b, 144),
            media_errors: le128(b, 160),
            num_err_log_entries: le128(b, 176),
            warning_temp_minutes: le32(b, 192),
            critical_temp_minutes: le32(b, 196),
        })
    }

    pub fn temperature_celsius(&self) -> i64 {
        i64::from(self.temperature_kelvin) - 273
    }

    pub fn passed(&self) -> bool {
        self.critical_warning == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorLogEntry {
    pub error_count: u64,
    pub submission_queue: u16,
    pub command_id: u16,
    pub status: u16,
    pub lba: u64,
    pub nsid: u32,
}

/// Non-empty entries of the Error Information log.
pub fn parse_error_log(b: &[u8]) -> Vec<ErrorLogEntry> {
    b.chunks_exact(ERROR_ENTRY_LEN)
        .map(|e| ErrorLogEntry {
            error_count: le64(e, 0),
            submission_queue: le16(e, 8),
            command_id: le16(e, 10),
            status: le16(e, 12),
            lba: le64(e, 16),
            nsid: le32(e, 24),
        })
        .filter(|e| e.error_count != 0)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestResult {
    pub code: u8,
    pub result: u8,
    pub power_on_hours: u64,
    pub failing_lba: Option<u64>,
}

impl SelfTestResult {
    pub fn description(&self) -> &'static str {
        match self.code {
            0x1 => "Short",
            0x2 => "Extended",
            0xe => "Vendor specific",
            _ => "Unknown",
        }
    }

    pub fn result_text(&self) -> &'static str {
        match self.result {
            0x0 => "Completed without error",
            0x1 => "Aborted: Self-test command",
            0x2 => "Aborted: Controller Reset",
            0x3 => "Aborted: Namespace removed",
            0x4 => "Aborted: Format NVM command",
            0x5 => "Fatal or unknown test error",
            0x6 => "Completed: unknown failed segment",
            0x7 => "Completed: failed segments",
            0x8 => "Aborted: unknown reason",
            0x9 => "Aborted: sanitize operation",
            _ => "Unknown result",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelfTestLog {
    pub current_operation: u8,
    pub current_completion: u8,
    pub results: Vec<SelfTestResult>,
}

impl SelfTestLog {
    pub fn from_bytes(b: &[u8]) -> Result<Self, SmartError> {
        require(b, SELFTEST_LOG_LEN, "self-test log")?;
        let results = b[4..SELFTEST_LOG_LEN]
            .chunks_exact(28)
            .filter(|r| r[0] & 0x0f != 0x0f)
            .map(|r| SelfTestResult {
                code: r[0] >> 4,
                result: r[0] & 0x0f,
                power_on_hours: le64(r, 4),
                failing_lba: (r[2] & 0x02 != 0).then(|| le64(r, 16)),
            })
            .collect();
        Ok(SelfTestLog {
            current_operation: b[0] & 0x0f,
            current_completion: b[1] & 0x7f,
            results,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn identify_reply(model: &str, serial: &str) -> Vec<u8> {
        let mut b = vec![0u8; IDENTIFY_LEN];
        let mut put = |at: usize, len: usize, text: &str| {
            let mut field = text.as_bytes().to_vec();
            field.resize(len, b' ');
            b[at..at + len].copy_from_slice(&field);
        };
        put(4, 20, serial);
        put(24, 40, model);
        put(64, 8, "1B2QEXM7");
        b[80..84].copy_from_slice(&0x0001_0400u32.to_le_bytes());
        b[256] = 0x17;
        b[262] = 63;
        b[525] = 1;
        b
    }

    pub(crate) fn smart_reply(warning: u8, kelvin: u16, hours: u128) -> Vec<u8> {
        let mut b = vec![0u8; SMART_LOG_LEN];
        b[0] = warning;
        b[1..3].copy_from_slice(&kelvin.to_le_bytes());
        b[3] = 100;
        b[4] = 10;
        b[5] = 3;
        b[128..144].copy_from_slice(&hours.to_le_bytes());
        b
    }

    #[test]
    fn identify_controller_fields() {
        let id = IdentifyController::from_bytes(&identify_reply("Samsung SSD 980", "S64D")).unwrap();
        assert_eq!(id.model, "Samsung SSD 980");
        assert_eq!(id.serial, "S64D");
        assert_eq!(id.firmware, "1B2QEXM7");
        assert_eq!(id.version_string(), "1.4");
        assert_eq!(id.error_log_entries, 64);
        assert!(id.supports_self_test());
        assert!(id.volatile_write_cache);
    }

    #[test]
    fn smart_log_is_unaligned_safe() {
        let log = NvmeSmartLog::from_bytes(&smart_reply(0, 310, 4321)).unwrap();
        assert_eq!(log.temperature_celsius(), 37);
        assert_eq!(log.power_on_hours, 4321);
        assert_eq!(log.percentage_used, 3);
        assert!(log.passed());
        assert!(NvmeSmartLog::from_bytes(&[0u8; 16]).is_err());
    }

    #[test]
    fn error_log_skips_empty_entries() {
        let mut b = vec![0u8; ERROR_ENTRY_LEN * 3];
        b[64..72].copy_from_slice(&7u64.to_le_bytes());
        b[64 + 12..64 + 14].copy_from_slice(&0x4004u16.to_le_bytes());
        let entries = parse_error_log(&b);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].error_count, 7);
        assert_eq!(entries[0].status, 0x4004);
    }

    #[test]
    fn self_test_log_skips_unused_slots() {
        let mut b = vec![0u8; SELFTEST_LOG_LEN];
        for slot in b[4..].chunks_exact_mut(28) {
            slot[0] = 0x0f;
        }
        b[4] = 0x10;
        b[8..16].copy_from_slice(&900u64.to_le_bytes());
        let log = SelfTestLog::from_bytes(&b).unwrap();
        assert_eq!(log.results.len(), 1);
        assert_eq!(log.results[0].description(), "Short");
        assert_eq!(log.results[0].result_text(), "Completed without error");
        assert_eq!(log.results[0].power_on_hours, 900);
    }
}
