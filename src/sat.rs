//! ATA commands tunnelled through SCSI (SAT).
//!
//! Builds ATA PASS-THROUGH(16) CDBs and reads the ATA output registers back
//! out of the sense data the translating layer returns.

use crate::ata::{AtaCommand, DataDirection};

pub const ATA_PASS_THROUGH_16: u8 = 0x85;

const PROTOCOL_NON_DATA: u8 = 3;
const PROTOCOL_PIO_DATA_IN: u8 = 4;
const PROTOCOL_PIO_DATA_OUT: u8 = 5;

const CK_COND: u8 = 0x20;
const T_DIR_IN: u8 = 0x08;
const BYT_BLOK: u8 = 0x04;
/// Transfer length is in the sector count field.
const T_LENGTH_SECTOR_COUNT: u8 = 0x02;

pub const SENSE_KEY_NO_SENSE: u8 = 0x00;
pub const SENSE_KEY_RECOVERED_ERROR: u8 = 0x01;
/// ASCQ of "ATA pass through information available".
const ASCQ_ATA_INFO_AVAILABLE: u8 = 0x1d;

const DESCRIPTOR_ATA_STATUS_RETURN: u8 = 0x09;

pub fn pass_through_cdb(cmd: &AtaCommand) -> [u8; 16] {
    let protocol = match cmd.direction {
        DataDirection::None => PROTOCOL_NON_DATA,
        DataDirection::In => PROTOCOL_PIO_DATA_IN,
        DataDirection::Out => PROTOCOL_PIO_DATA_OUT,
    };
    let mut flags = 0;
    if cmd.check_condition {
        flags |= CK_COND;
    }
    match cmd.direction {
        DataDirection::None => {}
        DataDirection::In => flags |= T_DIR_IN | BYT_BLOK | T_LENGTH_SECTOR_COUNT,
        DataDirection::Out => flags |= BYT_BLOK | T_LENGTH_SECTOR_COUNT,
    }

    let mut cdb = [0u8; 16];
    cdb[0] = ATA_PASS_THROUGH_16;
    cdb[1] = (protocol << 1) | u8::from(cmd.extended);
    cdb[2] = flags;
    cdb[4] = cmd.features;
    cdb[6] = cmd.sector_count;
    cdb[8] = cmd.lba_low;
    cdb[10] = cmd.lba_mid;
    cdb[12] = cmd.lba_high;
    cdb[14] = cmd.command;
    cdb
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenseInfo {
    pub key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseInfo {
    /// The device completed the command and attached its registers.
    pub fn is_ata_info(&self) -> bool {
        self.key == SENSE_KEY_RECOVERED_ERROR
            || (self.key == SENSE_KEY_NO_SENSE && self.asc == 0 && self.ascq == ASCQ_ATA_INFO_AVAILABLE)
    }
}

/// Sense key and additional sense code, fixed or descriptor format.
pub fn parse_sense(sense: &[u8]) -> Option<SenseInfo> {
    match sense.first()? & 0x7f {
        0x72 | 0x73 if sense.len() >= 4 => Some(SenseInfo {
            key: sense[1] & 0x0f,
            asc: sense[2],
            ascq: sense[3],
        }),
        0x70 | 0x71 if sense.len() >= 14 => Some(SenseInfo {
            key: sense[2] & 0x0f,
            asc: sense[12],
            ascq: sense[13],
        }),
        _ => None,
    }
}

/// `(sector_count, lba_mid, lba_high)` as returned with CK_COND set.
pub fn ata_registers(sense: &[u8]) -> Option<(u8, u8, u8)> {
    match sense.first()? & 0x7f {
        0x72 | 0x73 => {
            let end = sense.len().min(8 + usize::from(*sense.get(7)?));
            let mut at = 8;
            while at + 2 <= end {
                let len = usize::from(sense[at + 1]) + 2;
                if sense[at] == DESCRIPTOR_ATA_STATUS_RETURN && at + 12 <= end {
                    let d = &sense[at..at + 12];
                    return Some((d[5], d[9], d[11]));
                }
                at += len;
            }
            None
        }
        // Information and command-specific fields carry the registers.
        0x70 | 0x71 if sense.len() >= 12 => Some((sense[6], sense[10], sense[9])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ata::{LOG_EXT_SELFTEST, SMART_READ_DATA};

    #[test]
    fn identify_is_pio_data_in() {
        let cdb = pass_through_cdb(&AtaCommand::identify());
        assert_eq!(cdb[0], 0x85);
        assert_eq!(cdb[1], 4 << 1);
        assert_eq!(cdb[2], 0x0e);
        assert_eq!(cdb[6], 1);
        assert_eq!(cdb[14], 0xec);
    }

    #[test]
    fn smart_commands_carry_the_signature() {
        let cdb = pass_through_cdb(&AtaCommand::smart(SMART_READ_DATA));
        assert_eq!((cdb[4], cdb[10], cdb[12], cdb[14]), (0xd0, 0x4f, 0xc2, 0xb0));

        let status = pass_through_cdb(&AtaCommand::smart_return_status());
        assert_eq!(status[1], 3 << 1);
        assert_eq!(status[2], 0x20);
    }

    #[test]
    fn extended_commands_set_the_extend_bit() {
        let cdb = pass_through_cdb(&AtaCommand::read_log_ext(LOG_EXT_SELFTEST, 0));
        assert_eq!(cdb[1] & 1, 1);
        assert_eq!(cdb[8], LOG_EXT_SELFTEST);
        assert_eq!(cdb[14], 0x2f);
    }

    #[test]
    fn descriptor_sense_yields_registers() {
        let mut sense = vec![0x72, 0x01, 0x00, 0x1d, 0, 0, 0, 14];
        sense.extend_from_slice(&[0x09, 0x0c, 0, 0, 0, 0x01, 0, 0, 0, 0x4f, 0, 0xc2, 0, 0x50]);
        let info = parse_sense(&sense).unwrap();
        assert!(info.is_ata_info());
        assert_eq!(ata_registers(&sense), Some((0x01, 0x4f, 0xc2)));
    }

    #[test]
    fn other_sense_is_an_error() {
        let sense = [0x70, 0, 0x05, 0, 0, 0, 0, 10, 0, 0, 0, 0, 0x20, 0x00];
        let info = parse_sense(&sense).unwrap();
        assert_eq!(info.key, 0x05);
        assert_eq!(info.asc, 0x20);
        assert!(!info.is_ata_info());
        assert_eq!(parse_sense(&[]), None);
    }
}
