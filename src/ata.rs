use std::fmt;

use crate::error::SmartError;

pub const SECTOR_SIZE: usize = 512;

pub const ATA_IDENTIFY_DEVICE: u8 = 0xEC;
pub const ATA_READ_LOG_EXT: u8 = 0x2F;
pub const ATA_SMART_CMD: u8 = 0xB0;

pub const SMART_READ_DATA: u8 = 0xD0;
pub const SMART_READ_THRESHOLDS: u8 = 0xD1;
pub const SMART_READ_LOG: u8 = 0xD5;
pub const SMART_WRITE_LOG: u8 = 0xD6;
pub const SMART_RETURN_STATUS: u8 = 0xDA;

const SMART_LBA_MID: u8 = 0x4F;
const SMART_LBA_HIGH: u8 = 0xC2;
const SMART_FAILED_LBA_MID: u8 = 0xF4;
const SMART_FAILED_LBA_HIGH: u8 = 0x2C;

pub const LOG_DIRECTORY: u8 = 0x00;
pub const LOG_SUMMARY_ERROR: u8 = 0x01;
pub const LOG_EXT_COMPREHENSIVE_ERROR: u8 = 0x03;
pub const LOG_DEVICE_STATISTICS: u8 = 0x04;
pub const LOG_SELFTEST: u8 = 0x06;
pub const LOG_EXT_SELFTEST: u8 = 0x07;
pub const LOG_SELECTIVE_SELFTEST: u8 = 0x09;
pub const LOG_PENDING_DEFECTS: u8 = 0x0C;
pub const LOG_SATA_PHY_EVENTS: u8 = 0x11;
pub const LOG_SCT_STATUS: u8 = 0xE0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    None,
    In,
    Out,
}

/// One ATA taskfile command, as sent through ATA PASS-THROUGH.
#[derive(Debug, Clone)]
pub struct AtaCommand {
    pub command: u8,
    pub features: u8,
    pub sector_count: u8,
    pub lba_low: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
    /// 48-bit command.
    pub extended: bool,
    pub direction: DataDirection,
    pub data_out: Vec<u8>,
    /// Ask for the output registers back.
    pub check_condition: bool,
}

impl AtaCommand {
    fn data_in(command: u8, features: u8) -> Self {
        AtaCommand {
            command,
            features,
            sector_count: 1,
            lba_low: 0,
            lba_mid: 0,
            lba_high: 0,
            extended: false,
            direction: DataDirection::In,
            data_out: Vec::new(),
            check_condition: false,
        }
    }

    pub fn identify() -> Self {
        Self::data_in(ATA_IDENTIFY_DEVICE, 0)
    }

    pub fn smart(feature: u8) -> Self {
        AtaCommand {
            lba_mid: SMART_LBA_MID,
            lba_high: SMART_LBA_HIGH,
            ..Self::data_in(ATA_SMART_CMD, feature)
        }
    }

    pub fn smart_read_log(address: u8) -> Self {
        AtaCommand {
            lba_low: address,
            ..Self::smart(SMART_READ_LOG)
        }
    }

    pub fn smart_write_log(address: u8, sector: Vec<u8>) -> Self {
        AtaCommand {
            lba_low: address,
            direction: DataDirection::Out,
            data_out: sector,
            check_condition: true,
            ..Self::smart(SMART_WRITE_LOG)
        }
    }

    pub fn smart_return_status() -> Self {
        AtaCommand {
            sector_count: 0,
            direction: DataDirection::None,
            check_condition: true,
            ..Self::smart(SMART_RETURN_STATUS)
        }
    }

    pub fn read_log_ext(address: u8, page: u8) -> Self {
        AtaCommand {
            lba_low: address,
            lba_mid: page,
            extended: true,
            ..Self::data_in(ATA_READ_LOG_EXT, 0)
        }
    }

    pub fn name(&self) -> &'static str {
        match (self.command, self.features) {
            (ATA_IDENTIFY_DEVICE, _) => "IDENTIFY DEVICE",
            (ATA_READ_LOG_EXT, _) => "READ LOG EXT",
            (ATA_SMART_CMD, SMART_READ_DATA) => "SMART READ DATA",
            (ATA_SMART_CMD, SMART_READ_THRESHOLDS) => "SMART READ THRESHOLDS",
            (ATA_SMART_CMD, SMART_READ_LOG) => "SMART READ LOG",
            (ATA_SMART_CMD, SMART_WRITE_LOG) => "SMART WRITE LOG",
            (ATA_SMART_CMD, SMART_RETURN_STATUS) => "SMART RETURN STATUS",
            _ => "ATA command",
        }
    }
}

/// Data and output registers of a completed command.
#[derive(Debug, Clone, Default)]
pub struct AtaResponse {
    pub data: Vec<u8>,
    pub sector_count: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
}

impl AtaResponse {
    pub fn sector(&self) -> Result<&[u8], SmartError> {
        self.data
            .get(..SECTOR_SIZE)
            .ok_or_else(|| SmartError::Parsing(format!("short ATA reply ({} bytes)", self.data.len())))
    }

    /// Reading of the SMART RETURN STATUS registers. `None` when the
    /// registers hold neither signature.
    pub fn smart_passed(&self) -> Option<bool> {
        match (self.lba_mid, self.lba_high) {
            (SMART_LBA_MID, SMART_LBA_HIGH) => Some(true),
            (SMART_FAILED_LBA_MID, SMART_FAILED_LBA_HIGH) => Some(false),
            _ => None,
        }
    }
}

/// Transport able to execute ATA commands on an opened device.
pub trait AtaChannel {
    fn ata_command(&mut self, cmd: &AtaCommand) -> Result<AtaResponse, SmartError>;
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn le_n(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
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

/// IDENTIFY DEVICE data as 256 little-endian words.
#[derive(Clone)]
pub struct IdentifyDeviceData {
    words: [u16; 256],
}

impl IdentifyDeviceData {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmartError> {
        require(bytes, SECTOR_SIZE, "IDENTIFY DEVICE")?;
        let mut words = [0u16; 256];
        for (i, w) in words.iter_mut().enumerate() {
            *w = le16(bytes, i * 2);
        }
        Ok(Self { words })
    }

    pub fn word(&self, index: usize) -> u16 {
        self.words[index]
    }

    pub fn bit(&self, index: usize, bit: u32) -> bool {
        self.words[index] & (1 << bit) != 0
    }

    /// Words 0x0000 and 0xffff mean "not reported".
    pub fn is_valid_word(&self, index: usize) -> bool {
        !matches!(self.words[index], 0x0000 | 0xffff)
    }

    fn fix_string(words: &[u16]) -> String {
        words
            .iter()
            .flat_map(|w| w.to_be_bytes())
            .map(|b| b as char)
            .collect::<String>()
            .trim()
            .to_string()
    }

    pub fn serial(&self) -> String {
        Self::fix_string(&self.words[10..20])
    }

    pub fn firmware(&self) -> String {
        Self::fix_string(&self.words[23..27])
    }

    pub fn model(&self) -> String {
        Self::fix_string(&self.words[27..47])
    }

    pub fn supports_lba48(&self) -> bool {
        self.bit(83, 10)
    }

    pub fn sectors(&self) -> u64 {
        if self.supports_lba48() {
            le_n(
                &self.words[100..104]
                    .iter()
                    .flat_map(|w| w.to_le_bytes())
                    .collect::<Vec<_>>(),
            )
        } else {
            u64::from(self.words[60]) | (u64::from(self.words[61]) << 16)
        }
    }

    /// Words 117-118 count 16-bit words. Sizes outside 512..=64KiB or not a
    /// multiple of 512 fall back to 512.
    pub fn logical_sector_size(&self) -> u32 {
        let w106 = self.words[106];
        if w106 & 0xc000 != 0x4000 || w106 & (1 << 12) == 0 {
            return SECTOR_SIZE as u32;
        }
        let words = u64::from(self.words[117]) | (u64::from(self.words[118]) << 16);
        let size = words * 2;
        match u32::try_from(size) {
            Ok(size) if (512..=65536).contains(&size) && size % 512 == 0 => size,
            _ => SECTOR_SIZE as u32,
        }
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.sectors()
            .saturating_mul(u64::from(self.logical_sector_size()))
    }

    /// `Some(0)` for solid state devices.
    pub fn rotation_rate(&self) -> Option<u16> {
        match self.words[217] {
            1 => Some(0),
            rpm @ 0x0401..=0xfffe => Some(rpm),
            _ => None,
        }
    }

    pub fn smart_supported(&self) -> bool {
        self.bit(82, 0)
    }

    pub fn smart_enabled(&self) -> bool {
        self.bit(85, 0)
    }

    pub fn sct_feature_control_supported(&self) -> bool {
        self.bit(206, 0) && self.bit(206, 4)
    }

    pub fn gp_logging_supported(&self) -> bool {
        self.bit(84, 5)
    }

    /// `None` if the checksum signature is absent.
    pub fn checksum_ok(&self) -> Option<bool> {
        if self.words[255] & 0xff != 0xa5 {
            return None;
        }
        let sum = self
            .words
            .iter()
            .flat_map(|w| w.to_le_bytes())
            .fold(0u8, u8::wrapping_add);
        Some(sum == 0)
    }
}

impl fmt::Debug for IdentifyDeviceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyDeviceData")
            .field("model", &self.model())
            .field("serial", &self.serial())
            .finish()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SmartAttribute {
    pub id: u8,
    pub status_flags: u16,
    pub value: u8,
    pub worst: u8,
    pub vendor_data: [u8; 6],
}

impl SmartAttribute {
    pub fn raw_value(&self) -> i64 {
        le_n(&self.vendor_data) as i64
    }

    pub fn prefailure(&self) -> bool {
        self.status_flags & 0x01 != 0
    }

    pub fn online(&self) -> bool {
        self.status_flags & 0x02 != 0
    }
}

impl fmt::Debug for SmartAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmartAttribute")
            .field("id", &self.id)
            .field("raw_value", &self.raw_value())
            .finish()
    }
}

/// SMART READ DATA sector.
#[derive(Debug, Clone)]
pub struct SmartValues {
    pub revision: u16,
    pub attributes: Vec<SmartAttribute>,
    pub offline_status: u8,
    pub self_test_status: u8,
    pub offline_seconds: u16,
    pub offline_capability: u8,
    pub smart_capability: u16,
    pub errorlog_capability: u8,
    pub short_test_minutes: u8,
    pub extended_test_minutes: u16,
    pub conveyance_test_minutes: u8,
}

impl SmartValues {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmartError> {
        require(bytes, SECTOR_SIZE, "SMART READ DATA")?;
        let attributes = bytes[2..362]
            .chunks_exact(12)
            .filter(|raw| raw[0] != 0)
            .map(|raw| SmartAttribute {
                id: raw[0],
                status_flags: le16(raw, 1),
                value: raw[3],
                worst: raw[4],
                vendor_data: [raw[5], raw[6], raw[7], raw[8], raw[9], raw[10]],
            })
            .collect();
        let extended_short = bytes[373];
        Ok(SmartValues {
            revision: le16(bytes, 0),
            attributes,
            offline_status: bytes[362],
            self_test_status: bytes[363],
            offline_seconds: le16(bytes, 364),
            offline_capability: bytes[367],
            smart_capability: le16(bytes, 368),
            errorlog_capability: bytes[370],
            short_test_minutes: bytes[372],
            extended_test_minutes: if extended_short == 0xff {
                le16(bytes, 375)
            } else {
                u16::from(extended_short)
            },
            conveyance_test_minutes: bytes[374],
        })
    }
}

/// `(id, threshold)` pairs from SMART READ THRESHOLDS.
pub fn parse_thresholds(bytes: &[u8]) -> Result<Vec<(u8, u8)>, SmartError> {
    require(bytes, SECTOR_SIZE, "SMART READ THRESHOLDS")?;
    Ok(bytes[2..362]
        .chunks_exact(12)
        .filter(|raw| raw[0] != 0)
        .map(|raw| (raw[0], raw[1]))
        .collect())
}

pub fn attribute_name(id: u8) -> &'static str {
    match id {
        1 => "Raw_Read_Error_Rate",
        2 => "Throughput_Performance",
        3 => "Spin_Up_Time",
        4 => "Start_Stop_Count",
        5 => "Reallocated_Sector_Ct",
        7 => "Seek_Error_Rate",
        8 => "Seek_Time_Performance",
        9 => "Power_On_Hours",
        10 => "Spin_Retry_Count",
        11 => "Calibration_Retry_Count",
        12 => "Power_Cycle_Count",
        177 => "Wear_Leveling_Count",
        183 => "Runtime_Bad_Block",
        184 => "End-to-End_Error",
        187 => "Reported_Uncorrect",
        188 => "Command_Timeout",
        190 => "Airflow_Temperature_Cel",
        191 => "G-Sense_Error_Rate",
        192 => "Power-Off_Retract_Count",
        193 => "Load_Cycle_Count",
        194 => "Temperature_Celsius",
        195 => "Hardware_ECC_Recovered",
        196 => "Reallocated_Event_Count",
        197 => "Current_Pending_Sector",
        198 => "Offline_Uncorrectable",
        199 => "UDMA_CRC_Error_Count",
        200 => "Multi_Zone_Error_Rate",
        231 => "Temperature_Celsius",
        233 => "Media_Wearout_Indicator",
        241 => "Total_LBAs_Written",
        242 => "Total_LBAs_Read",
        _ => "Unknown_Attribute",
    }
}

/// Error count from the SMART summary error log (log 0x01).
pub fn summary_error_count(bytes: &[u8]) -> Result<(u8, u16), SmartError> {
    require(bytes, SECTOR_SIZE, "summary error log")?;
    Ok((bytes[0], le16(bytes, 452)))
}

/// Error count from the extended comprehensive error log (GP log 0x03).
pub fn ext_error_count(bytes: &[u8]) -> Result<(u16, u16), SmartError> {
    require(bytes, SECTOR_SIZE, "extended error log")?;
    Ok((le16(bytes, 0), le16(bytes, 500)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestEntry {
    pub test_type: u8,
    pub status: u8,
    pub lifetime_hours: u16,
    pub failing_lba: Option<u64>,
}

impl SelfTestEntry {
    pub fn description(&self) -> String {
        match self.test_type {
            0x00 => "Offline".to_string(),
            0x01 => "Short offline".to_string(),
            0x02 => "Extended offline".to_string(),
            0x03 => "Conveyance offline".to_string(),
            0x04 => "Selective offline".to_string(),
            0x81 => "Short captive".to_string(),
            0x82 => "Extended captive".to_string(),
            0x83 => "Conveyance captive".to_string(),
            0x84 => "Selective captive".to_string(),
            other => format!("Vendor (0x{other:02x})"),
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self.status >> 4 {
            0x0 => "Completed without error",
            0x1 => "Aborted by host",
            0x2 => "Interrupted (host reset)",
            0x3 => "Fatal or unknown error",
            0x4 => "Completed: unknown failure",
            0x5 => "Completed: electrical failure",
            0x6 => "Completed: servo/seek failure",
            0x7 => "Completed: read failure",
            0x8 => "Completed: handling damage??",
            0xf => "Self-test routine in progress",
            _ => "Unknown status",
        }
    }

    pub fn remaining_percent(&self) -> u8 {
        (self.status & 0x0f) * 10
    }
}

/// Entries of a self-test log, most recent first.
#[derive(Debug, Clone, Default)]
pub struct SelfTestLog {
    pub revision: u16,
    pub entries: Vec<SelfTestEntry>,
}

impl SelfTestLog {
    /// SMART self-test log (log 0x06): 21 descriptors of 24 bytes.
    pub fn from_smart_log(bytes: &[u8]) -> Result<Self, SmartError> {
        require(bytes, SECTOR_SIZE, "self-test log")?;
        let descriptors: Vec<&[u8]> = bytes[2..2 + 21 * 24].chunks_exact(24).collect();
        let entries = Self::newest_first(&descriptors, usize::from(bytes[508]), |raw| {
            let lba = u64::from(u32::from_le_bytes([raw[5], raw[6], raw[7], raw[8]]));
            SelfTestEntry {
                test_type: raw[0],
                status: raw[1],
                lifetime_hours: le16(raw, 2),
                failing_lba: Some(lba).filter(|l| *l != 0xffff_ffff && raw[1] >> 4 != 0),
            }
        });
        Ok(SelfTestLog {
            revision: le16(bytes, 0),
            entries,
        })
    }

    /// Extended self-test log (GP log 0x07, first page): 19 descriptors of
    /// 26 bytes.
    pub fn from_ext_log(bytes: &[u8]) -> Result<Self, SmartError> {
        require(bytes, SECTOR_SIZE, "extended self-test log")?;
        let descriptors: Vec<&[u8]> = bytes[4..4 + 19 * 26].chunks_exact(26).collect();
        let entries = Self::newest_first(&descriptors, usize::from(le16(bytes, 2)), |raw| {
            let lba = le_n(&raw[5..11]);
            SelfTestEntry {
                test_type: raw[0],
                status: raw[1],
                lifetime_hours: le16(raw, 2),
                failing_lba: Some(lba).filter(|l| *l != 0xffff_ffff_ffff && raw[1] >> 4 != 0),
            }
        });
        Ok(SelfTestLog {
            revision: u16::from(bytes[0]),
            entries,
        })
    }

    fn newest_first(
        descriptors: &[&[u8]],
        index: usize,
        parse: impl Fn(&[u8]) -> SelfTestEntry,
    ) -> Vec<SelfTestEntry> {
        let n = descriptors.len();
        if index == 0 || index > n {
            return Vec::new();
        }
        (0..n)
            .map(|back| descriptors[(index - 1 + n - back) % n])
            .filter(|raw| raw.iter().any(|b| *b != 0))
            .map(parse)
            .collect()
    }
}

/// Spans of the selective self-test log (log 0x09).
pub fn selective_spans(bytes: &[u8]) -> Result<(u16, Vec<(u64, u64)>), SmartError> {
    require(bytes, SECTOR_SIZE, "selective self-test log")?;
    let spans = bytes[2..82]
        .chunks_exact(16)
        .map(|raw| (le_n(&raw[0..8]), le_n(&raw[8..16])))
        .collect();
    Ok((le16(bytes, 0), spans))
}

/// `(version, [(log address, sectors)])` from a SMART or GP log directory.
pub fn log_directory(bytes: &[u8]) -> Result<(u16, Vec<(u8, u16)>), SmartError> {
    require(bytes, SECTOR_SIZE, "log directory")?;
    let entries = (1..=255u8)
        .map(|addr| (addr, le16(bytes, usize::from(addr) * 2)))
        .filter(|(_, sectors)| *sectors != 0)
        .collect();
    Ok((le16(bytes, 0), entries))
}

/// Temperatures from the SCT status sector (log 0xE0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SctTemperatures {
    pub version: u16,
    pub current: Option<i8>,
    pub power_cycle_min: Option<i8>,
    pub power_cycle_max: Option<i8>,
    pub lifetime_min: Option<i8>,
    pub lifetime_max: Option<i8>,
}

impl SctTemperatures {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmartError> {
        require(bytes, SECTOR_SIZE, "SCT status")?;
        let temp = |at: usize| Some(bytes[at] as i8).filter(|t| *t != i8::MIN);
        Ok(SctTemperatures {
            version: le16(bytes, 0),
            current: temp(200),
            power_cycle_min: temp(201),
            power_cycle_max: temp(202),
            lifetime_min: temp(203),
            lifetime_max: temp(204),
        })
    }
}

/// SCT Feature Control "return current state" for `feature`.
pub fn sct_feature_state_request(feature: u16) -> Vec<u8> {
    let mut sector = vec![0u8; SECTOR_SIZE];
    sector[0..2].copy_from_slice(&4u16.to_le_bytes());
    sector[2..4].copy_from_slice(&2u16.to_le_bytes());
    sector[4..6].copy_from_slice(&feature.to_le_bytes());
    sector
}

pub const SCT_FEATURE_WRITE_CACHE: u16 = 1;
pub const SCT_FEATURE_WRITE_CACHE_REORDER: u16 = 2;

/// Supported device statistics pages from GP log 0x04 page 0.
pub fn devstat_pages(bytes: &[u8]) -> Result<Vec<u8>, SmartError> {
    require(bytes, SECTOR_SIZE, "device statistics")?;
    let count = usize::from(bytes[8]).min(SECTOR_SIZE - 9);
    Ok(bytes[9..9 + count].to_vec())
}

pub fn pending_defect_count(bytes: &[u8]) -> Result<u32, SmartError> {
    require(bytes, SECTOR_SIZE, "pending defects log")?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// `(counter id, value)` pairs from the SATA Phy event counters log.
pub fn sata_phy_counters(bytes: &[u8]) -> Result<Vec<(u16, u64)>, SmartError> {
    require(bytes, SECTOR_SIZE, "SATA Phy event counters")?;
    let mut counters = Vec::new();
    let mut at = 4;
    while at + 2 <= SECTOR_SIZE - 4 {
        let raw = le16(bytes, at);
        let id = raw & 0x0fff;
        if id == 0 {
            break;
        }
        let size = usize::from((raw >> 12) & 0x7) * 2;
        at += 2;
        if size == 0 || at + size > SECTOR_SIZE - 4 {
            break;
        }
        counters.push((id, le_n(&bytes[at..at + size])));
        at += size;
    }
    Ok(counters)
}

pub fn sata_phy_counter_name(id: u16) -> &'static str {
    match id {
        0x001 => "Command failed due to ICRC error",
        0x002 => "R_ERR response for data FIS",
        0x003 => "R_ERR response for device-to-host data FIS",
        0x004 => "R_ERR response for host-to-device data FIS",
        0x005 => "R_ERR response for non-data FIS",
        0x006 => "R_ERR response for device-to-host non-data FIS",
        0x007 => "R_ERR response for host-to-device non-data FIS",
        0x008 => "Device-to-host non-data FIS retries",
        0x009 => "Transition from drive PhyRdy to drive PhyNRdy",
        0x00a => "Device-to-host register FISes sent due to a COMRESET",
        0x00b => "CRC errors within host-to-device FIS",
        0x00d => "Non-CRC errors within host-to-device FIS",
        0x00f => "R_ERR response for host-to-device data FIS, CRC",
        0x010 => "R_ERR response for host-to-device data FIS, non-CRC",
        0x012 => "R_ERR response for host-to-device non-data FIS, CRC",
        0x013 => "R_ERR response for host-to-device non-data FIS, non-CRC",
        _ => "Unknown",
    }
}
