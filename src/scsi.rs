use crate::error::SmartError;

pub const INQUIRY: u8 = 0x12;
pub const READ_CAPACITY_10: u8 = 0x25;
pub const LOG_SENSE: u8 = 0x4D;
pub const MODE_SENSE_10: u8 = 0x5A;

pub const PAGE_INFORMATIONAL_EXCEPTIONS: u8 = 0x2F;
pub const PAGE_CACHING: u8 = 0x08;

/// Transport able to execute data-in SCSI commands on an opened device.
pub trait ScsiChannel {
    /// Runs `cdb`, reading up to `data_len` bytes (none when zero).
    fn scsi_command(&mut self, cdb: &[u8], data_len: usize) -> Result<Vec<u8>, SmartError>;
}

pub fn inquiry_cdb(alloc: u8) -> [u8; 6] {
    [INQUIRY, 0, 0, 0, alloc, 0]
}

pub fn read_capacity_cdb() -> [u8; 10] {
    [READ_CAPACITY_10, 0, 0, 0, 0, 0, 0, 0, 0, 0]
}

/// LOG SENSE for the current cumulative values of `page`.
pub fn log_sense_cdb(page: u8, alloc: u16) -> [u8; 10] {
    let [hi, lo] = alloc.to_be_bytes();
    [LOG_SENSE, 0, 0x40 | (page & 0x3f), 0, 0, 0, 0, hi, lo, 0]
}

/// MODE SENSE(10) for the current values of `page`, without block
/// descriptors.
pub fn mode_sense_cdb(page: u8, alloc: u16) -> [u8; 10] {
    let [hi, lo] = alloc.to_be_bytes();
    [MODE_SENSE_10, 0x08, page & 0x3f, 0, 0, 0, 0, hi, lo, 0]
}

fn ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inquiry {
    pub peripheral_type: u8,
    pub vendor: String,
    pub product: String,
    pub revision: String,
}

impl Inquiry {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmartError> {
        if bytes.len() < 36 {
            return Err(SmartError::Parsing(format!(
                "short INQUIRY reply ({} bytes)",
                bytes.len()
            )));
        }
        Ok(Inquiry {
            peripheral_type: bytes[0] & 0x1f,
            vendor: ascii(&bytes[8..16]),
            product: ascii(&bytes[16..32]),
            revision: ascii(&bytes[32..36]),
        })
    }

    /// libata reports ATA disks behind a SCSI translation layer with this
    /// vendor id.
    pub fn is_ata_translated(&self) -> bool {
        self.vendor == "ATA"
    }

    pub fn device_type_name(&self) -> &'static str {
        match self.peripheral_type {
            0x00 => "disk",
            0x01 => "tape",
            0x05 => "CD/DVD",
            0x07 => "optical disk",
            0x0d => "enclosure",
            0x14 => "host managed zoned block",
            _ => "other",
        }
    }
}

/// `(last LBA + 1, block length)` from READ CAPACITY(10).
pub fn parse_capacity(bytes: &[u8]) -> Result<(u64, u32), SmartError> {
    if bytes.len() < 8 {
        return Err(SmartError::Parsing("short READ CAPACITY reply".to_string()));
    }
    let last = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let block = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok((u64::from(last) + 1, block))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InformationalExceptions {
    pub asc: u8,
    pub ascq: u8,
    pub temperature: Option<u8>,
}

impl InformationalExceptions {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SmartError> {
        if bytes.len() < 10 || bytes[0] & 0x3f != PAGE_INFORMATIONAL_EXCEPTIONS {
            return Err(SmartError::Parsing(
                "malformed Informational Exceptions log page".to_string(),
            ));
        }
        let param_len = usize::from(bytes[7]);
        let temperature = if param_len >= 3 && bytes.len() > 10 {
            Some(bytes[10]).filter(|t| *t != 0xff && *t != 0)
        } else {
            None
        };
        Ok(InformationalExceptions {
            asc: bytes[8],
            ascq: bytes[9],
            temperature,
        })
    }

    pub fn passed(&self) -> bool {
        self.asc == 0
    }

    pub fn status_text(&self) -> String {
        match (self.asc, self.ascq) {
            (0x00, _) => "OK".to_string(),
            (0x5d, 0xff) => "FAILURE PREDICTION THRESHOLD EXCEEDED (false positive test)".to_string(),
            (0x5d, _) => "FAILURE PREDICTION THRESHOLD EXCEEDED".to_string(),
            (0x0b, 0x01) => "WARNING - SPECIFIED TEMPERATURE EXCEEDED".to_string(),
            (asc, ascq) => format!("FAILURE PREDICTION (asc=0x{asc:02x}, ascq=0x{ascq:02x})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachingPage {
    pub write_cache_enabled: bool,
    pub read_cache_disabled: bool,
}

impl CachingPage {
    /// Parses a MODE SENSE(10) reply holding the caching page.
    pub fn from_mode_sense(bytes: &[u8]) -> Result<Self, SmartError> {
        if bytes.len() < 8 {
            return Err(SmartError::Parsing("short MODE SENSE reply".to_string()));
        }
        let block_desc_len = usize::from(u16::from_be_bytes([bytes[6], bytes[7]]));
        let page = bytes
            .get(8 + block_desc_len..)
            .filter(|page| page.len() >= 3 && page[0] & 0x3f == PAGE_CACHING)
            .ok_or_else(|| SmartError::Parsing("caching mode page missing".to_string()))?;
        Ok(CachingPage {
            write_cache_enabled: page[2] & 0x04 != 0,
            read_cache_disabled: page[2] & 0x01 != 0,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn inquiry_reply(vendor: &str, product: &str) -> Vec<u8> {
        let mut bytes = vec![0u8; 36];
        let mut put = |at: usize, len: usize, text: &str| {
            let mut field = text.as_bytes().to_vec();
            field.resize(len, b' ');
            bytes[at..at + len].copy_from_slice(&field);
        };
        put(8, 8, vendor);
        put(16, 16, product);
        put(32, 4, "0001");
        bytes
    }

    #[test]
    fn inquiry_fields_are_trimmed() {
        let inq = Inquiry::from_bytes(&inquiry_reply("ATA", "Samsung SSD")).unwrap();
        assert!(inq.is_ata_translated());
        assert_eq!(inq.product, "Samsung SSD");
        assert_eq!(inq.revision, "0001");
        assert_eq!(inq.device_type_name(), "disk");
        assert!(Inquiry::from_bytes(&[0; 10]).is_err());
    }

    #[test]
    fn capacity_counts_last_block() {
        let reply = [0, 0, 0x0f, 0xff, 0, 0, 0x02, 0];
        assert_eq!(parse_capacity(&reply).unwrap(), (0x1000, 512));
    }

    #[test]
    fn ie_page_reports_threshold_exceeded() {
        let page = [0x2f, 0, 0, 8, 0, 0, 0x03, 4, 0x5d, 0x10, 38, 0];
        let ie = InformationalExceptions::from_bytes(&page).unwrap();
        assert!(!ie.passed());
        assert_eq!(ie.temperature, Some(38));
        assert_eq!(ie.status_text(), "FAILURE PREDICTION THRESHOLD EXCEEDED");
    }

    #[test]
    fn caching_page_bits() {
        let mut reply = vec![0u8; 8];
        reply.extend_from_slice(&[0x08, 0x12, 0x05, 0]);
        let page = CachingPage::from_mode_sense(&reply).unwrap();
        assert!(page.write_cache_enabled);
        assert!(page.read_cache_disabled);
        assert!(CachingPage::from_mode_sense(&reply[..9]).is_err());
    }
}
