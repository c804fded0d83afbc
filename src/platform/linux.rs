use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::ptr;

use nix::libc::{c_int, c_uchar, c_uint, c_ushort, c_void};
use regex::Regex;

use crate::ata::{AtaChannel, AtaCommand, AtaResponse, DataDirection, SECTOR_SIZE};
use crate::context::Context;
use crate::device::{DeviceBackend, Protocol, ProtocolSet, SmartDevice};
use crate::error::SmartError;
use crate::nvme::{NvmeChannel, NvmePassthruCommand};
use crate::options::{AtaFlags, NvmeFlags, ScsiFlags};
use crate::printer::{print_ata, print_nvme, print_scsi};
use crate::sat;
use crate::scsi::{inquiry_cdb, Inquiry, ScsiChannel};

/// `struct sg_io_hdr` from `<scsi/sg.h>`.
#[repr(C)]
#[derive(Debug)]
#[allow(dead_code)]
pub struct SgIoHdr {
    interface_id: c_int,
    dxfer_direction: c_int,
    cmd_len: c_uchar,
    mx_sb_len: c_uchar,
    iovec_count: c_ushort,
    dxfer_len: c_uint,
    dxferp: *mut c_void,
    cmdp: *mut c_uchar,
    sbp: *mut c_uchar,
    timeout: c_uint,
    flags: c_uint,
    pack_id: c_int,
    usr_ptr: *mut c_void,
    status: c_uchar,
    masked_status: c_uchar,
    msg_status: c_uchar,
    sb_len_wr: c_uchar,
    host_status: c_ushort,
    driver_status: c_ushort,
    resid: c_int,
    duration: c_uint,
    info: c_uint,
}

nix::ioctl_readwrite_bad!(sg_io, 0x2285, SgIoHdr);
nix::ioctl_readwrite!(nvme_admin_cmd, b'N', 0x41, NvmePassthruCommand);

const SG_DXFER_NONE: c_int = -1;
const SG_DXFER_TO_DEV: c_int = -2;
const SG_DXFER_FROM_DEV: c_int = -3;
const SG_TIMEOUT_MS: c_uint = 60_000;
const NVME_TIMEOUT_MS: u32 = 60_000;
const SENSE_LEN: usize = 32;
const SCSI_STATUS_GOOD: u8 = 0x00;
const DRIVER_SENSE: u16 = 0x08;

const DRIVEDB_PATHS: [&str; 3] = [
    "/usr/share/smartmontools/drivedb.h",
    "/var/lib/smartmontools/drivedb/drivedb.h",
    "/etc/smart_drivedb.h",
];

enum Transfer<'a> {
    None,
    In(&'a mut [u8]),
    Out(&'a [u8]),
}

struct SgReply {
    status: u8,
    host_status: u16,
    driver_status: u16,
    sense: [u8; SENSE_LEN],
    sense_len: usize,
}

impl SgReply {
    fn sense(&self) -> &[u8] {
        &self.sense[..self.sense_len.min(SENSE_LEN)]
    }

    /// With `ata_info`, a CHECK CONDITION carrying ATA registers is success.
    fn check(&self, ata_info: bool) -> Result<(), String> {
        if self.host_status != 0 {
            return Err(format!("host status 0x{:04x}", self.host_status));
        }
        let driver = self.driver_status & 0x0f;
        if driver != 0 && driver != DRIVER_SENSE {
            return Err(format!("driver status 0x{:04x}", self.driver_status));
        }
        if self.status == SCSI_STATUS_GOOD {
            return Ok(());
        }
        match sat::parse_sense(self.sense()) {
            Some(info) if ata_info && info.is_ata_info() => Ok(()),
            Some(info) => Err(format!(
                "sense key 0x{:x}, asc 0x{:02x}, ascq 0x{:02x}",
                info.key, info.asc, info.ascq
            )),
            None => Err(format!("SCSI status 0x{:02x}", self.status)),
        }
    }
}

fn sg_command(fd: RawFd, cdb: &[u8], transfer: Transfer<'_>) -> Result<SgReply, SmartError> {
    let mut cdb = cdb.to_vec();
    let mut sense = [0u8; SENSE_LEN];
    let (direction, data, len) = match transfer {
        Transfer::None => (SG_DXFER_NONE, ptr::null_mut(), 0),
        Transfer::In(buf) => (SG_DXFER_FROM_DEV, buf.as_mut_ptr().cast::<c_void>(), buf.len()),
        Transfer::Out(buf) => (SG_DXFER_TO_DEV, buf.as_ptr() as *mut c_void, buf.len()),
    };
    let mut hdr = SgIoHdr {
        interface_id: c_int::from(b'S'),
        dxfer_direction: direction,
        cmd_len: cdb.len() as c_uchar,
        mx_sb_len: SENSE_LEN as c_uchar,
        iovec_count: 0,
        dxfer_len: len as c_uint,
        dxferp: data,
        cmdp: cdb.as_mut_ptr(),
        sbp: sense.as_mut_ptr(),
        timeout: SG_TIMEOUT_MS,
        flags: 0,
        pack_id: 0,
        usr_ptr: ptr::null_mut(),
        status: 0,
        masked_status: 0,
        msg_status: 0,
        sb_len_wr: 0,
        host_status: 0,
        driver_status: 0,
        resid: 0,
        duration: 0,
        info: 0,
    };
    // SAFETY: the CDB, sense and data pointers refer to buffers that outlive
    // the call and whose lengths are the ones stored in `hdr`.
    unsafe { sg_io(fd, &mut hdr) }?;
    Ok(SgReply {
        status: hdr.status,
        host_status: hdr.host_status,
        driver_status: hdr.driver_status,
        sense,
        sense_len: usize::from(hdr.sb_len_wr),
    })
}

/// A block device reached through SG_IO or the NVMe admin ioctl.
#[derive(Debug)]
pub struct LinuxDevice {
    name: String,
    dev_type: String,
    info_name: String,
    /// Type asked for by the caller; `None` autodetects on open.
    requested: Option<String>,
    protocols: ProtocolSet,
    file: Option<File>,
    last_error: Option<String>,
}

impl LinuxDevice {
    fn new(name: String, requested: Option<&str>) -> Self {
        let requested = requested.filter(|t| *t != "auto").map(str::to_string);
        let (dev_type, protocols) = match requested.as_deref() {
            Some("nvme") => ("nvme", ProtocolSet::of(Protocol::Nvme)),
            Some(t @ ("ata" | "sat")) => (t, ProtocolSet::of(Protocol::Ata)),
            Some(_) => ("scsi", ProtocolSet::of(Protocol::Scsi)),
            None if is_nvme_name(&name) => ("nvme", ProtocolSet::of(Protocol::Nvme)),
            None => ("scsi", ProtocolSet::of(Protocol::Scsi)),
        };
        let dev_type = dev_type.to_string();
        LinuxDevice {
            info_name: name.clone(),
            name,
            dev_type,
            requested,
            protocols,
            file: None,
            last_error: None,
        }
    }

    fn fd(&self) -> Result<RawFd, SmartError> {
        self.file
            .as_ref()
            .map(AsRawFd::as_raw_fd)
            .ok_or_else(|| SmartError::OpenFailed {
                name: self.name.clone(),
                reason: "device is not open".to_string(),
            })
    }

    fn open_file(&mut self) -> Result<(), SmartError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(&self.name)?;
        self.file = Some(file);
        Ok(())
    }

    /// Tells a SAT bridge from a native SCSI device by its INQUIRY vendor.
    fn detect_sat(&mut self) -> Result<(), SmartError> {
        let reply = self.scsi_command(&inquiry_cdb(36), 36)?;
        let inquiry = Inquiry::from_bytes(&reply)?;
        self.apply_inquiry(&inquiry);
        Ok(())
    }

    fn apply_inquiry(&mut self, inquiry: &Inquiry) {
        if inquiry.is_ata_translated() {
            self.become_sat();
        }
    }

    /// Labels a scanned disk without keeping it open. Unreadable disks stay `scsi`.
    fn classify(mut self) -> Self {
        if let Err(e) = self.open_file().and_then(|()| self.detect_sat()) {
            tracing::debug!(device = %self.name, error = %e, "scan could not classify device");
        }
        self.close();
        self
    }

    fn become_sat(&mut self) {
        self.dev_type = "sat".to_string();
        self.info_name = format!("{} [SAT]", self.name);
        self.protocols = ProtocolSet::of(Protocol::Ata);
    }
}

fn is_nvme_name(name: &str) -> bool {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("nvme"))
}

impl SmartDevice for LinuxDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn dev_type(&self) -> &str {
        &self.dev_type
    }

    fn info_name(&self) -> &str {
        &self.info_name
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn autodetect_open(mut self) -> Self {
        let mut opened = self.open_file();
        if opened.is_ok() {
            let requested = self.requested.clone();
            match requested.as_deref() {
                Some("sat") => self.become_sat(),
                None if self.dev_type == "scsi" => opened = self.detect_sat(),
                _ => {}
            }
        }
        if let Err(e) = opened {
            tracing::debug!(device = %self.name, error = %e, "open failed");
            self.last_error = Some(match e {
                SmartError::Io(io) => io.to_string(),
                other => other.to_string(),
            });
            self.file = None;
        }
        self
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn protocols(&self) -> ProtocolSet {
        self.protocols
    }
}

impl ScsiChannel for LinuxDevice {
    fn scsi_command(&mut self, cdb: &[u8], data_len: usize) -> Result<Vec<u8>, SmartError> {
        let fd = self.fd()?;
        let mut data = vec![0u8; data_len];
        let transfer = if data_len == 0 {
            Transfer::None
        } else {
            Transfer::In(&mut data)
        };
        let reply = sg_command(fd, cdb, transfer)?;
        reply
            .check(false)
            .map_err(|reason| SmartError::command("SCSI command", reason))?;
        Ok(data)
    }
}

impl AtaChannel for LinuxDevice {
    fn ata_command(&mut self, cmd: &AtaCommand) -> Result<AtaResponse, SmartError> {
        let fd = self.fd()?;
        let cdb = sat::pass_through_cdb(cmd);
        let mut data = match cmd.direction {
            DataDirection::In => vec![0u8; SECTOR_SIZE * usize::from(cmd.sector_count.max(1))],
            _ => Vec::new(),
        };
        let transfer = match cmd.direction {
            DataDirection::None => Transfer::None,
            DataDirection::In => Transfer::In(&mut data),
            DataDirection::Out => Transfer::Out(&cmd.data_out),
        };
        let reply = sg_command(fd, &cdb, transfer)?;
        reply
            .check(cmd.check_condition)
            .map_err(|reason| SmartError::command(cmd.name(), reason))?;

        let mut response = AtaResponse {
            data,
            ..AtaResponse::default()
        };
        if cmd.check_condition {
            if let Some((count, mid, high)) = sat::ata_registers(reply.sense()) {
                response.sector_count = count;
                response.lba_mid = mid;
                response.lba_high = high;
            }
        }
        Ok(response)
    }
}

impl NvmeChannel for LinuxDevice {
    fn admin_command(
        &mut self,
        opcode: u8,
        nsid: u32,
        cdw10: u32,
        data_len: usize,
    ) -> Result<Vec<u8>, SmartError> {
        let fd = self.fd()?;
        let mut data = vec![0u8; data_len];
        let mut cmd = NvmePassthruCommand {
            opcode,
            nsid,
            addr: data.as_mut_ptr() as u64,
            data_len: data_len as u32,
            cdw10,
            timeout_ms: NVME_TIMEOUT_MS,
            ..NvmePassthruCommand::default()
        };
        // SAFETY: `addr` points at `data`, which is `data_len` bytes long and
        // lives until after the call.
        let status = unsafe { nvme_admin_cmd(fd, &mut cmd) }?;
        if status != 0 {
            return Err(SmartError::Ioctl(format!(
                "NVMe admin opcode 0x{opcode:02x} status 0x{status:04x}"
            )));
        }
        Ok(data)
    }
}

/// Turns a shell-style device pattern (`*`, `?`) into an anchored regex.
fn glob_regex(pattern: &str) -> Result<Regex, SmartError> {
    let escaped = regex::escape(pattern)
        .replace(r"\*", ".*")
        .replace(r"\?", ".");
    Regex::new(&format!("^{escaped}$")).map_err(|e| SmartError::Parsing(e.to_string()))
}

/// Whether a device of `dev_type` is wanted by a scan restricted to `types`.
fn type_wanted(types: &[String], dev_type: &str) -> bool {
    types.is_empty()
        || types.iter().any(|t| match dev_type {
            "scsi" => matches!(t.as_str(), "scsi" | "sat" | "ata"),
            other => t == other,
        })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxBackend;

impl LinuxBackend {
    pub fn new() -> Self {
        LinuxBackend
    }
}

impl DeviceBackend for LinuxBackend {
    type Device = LinuxDevice;

    fn init(&self) -> Result<(), SmartError> {
        if !Path::new("/dev").is_dir() {
            return Err(SmartError::DeviceNotFound("/dev".to_string()));
        }
        Ok(())
    }

    fn lookup(&self, name: &str, type_hint: Option<&str>) -> Option<LinuxDevice> {
        if let Some(t) = type_hint {
            if !matches!(t, "auto" | "ata" | "sat" | "scsi" | "nvme") {
                tracing::debug!(device = name, type_hint = t, "unknown device type");
                return None;
            }
        }
        let path = if name.starts_with('/') {
            name.to_string()
        } else {
            format!("/dev/{name}")
        };
        Some(LinuxDevice::new(path, type_hint))
    }

    fn init_drive_database(&self, use_default: bool) -> bool {
        let found: Vec<&str> = DRIVEDB_PATHS
            .iter()
            .copied()
            .filter(|p| Path::new(p).is_file())
            .collect();
        tracing::debug!(?found, use_default, "drive database files");
        use_default || !found.is_empty()
    }

    fn scan(
        &self,
        ctx: &mut Context,
        types: &[String],
        pattern: Option<&str>,
    ) -> Result<Vec<LinuxDevice>, SmartError> {
        for t in types {
            if !matches!(t.as_str(), "ata" | "sat" | "scsi" | "nvme") {
                return Err(SmartError::UnknownDeviceType(t.clone()));
            }
        }
        let filter = pattern.map(glob_regex).transpose()?;
        let disk = Regex::new(r"^sd[a-z]+$").map_err(|e| SmartError::Parsing(e.to_string()))?;
        let controller =
            Regex::new(r"^nvme[0-9]+$").map_err(|e| SmartError::Parsing(e.to_string()))?;

        let mut disks = Vec::new();
        let mut controllers = Vec::new();
        for entry in std::fs::read_dir("/dev")? {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let path = format!("/dev/{file_name}");
            if filter.as_ref().is_some_and(|re| !re.is_match(&path)) {
                continue;
            }
            if disk.is_match(&file_name) && type_wanted(types, "scsi") {
                disks.push(path);
            } else if controller.is_match(&file_name) && type_wanted(types, "nvme") {
                controllers.push(path);
            }
        }
        disks.sort();
        controllers.sort();
        ctx.sink.info(format_args!(
            "scan: {} SCSI/SAT and {} NVMe candidates\n",
            disks.len(),
            controllers.len()
        ));

        Ok(disks
            .into_iter()
            .map(|path| LinuxDevice::new(path, None).classify())
            .chain(controllers.into_iter().map(|path| LinuxDevice::new(path, None)))
            .collect())
    }

    fn run_ata(&self, device: &mut LinuxDevice, flags: &AtaFlags, ctx: &mut Context) {
        print_ata(device, flags, ctx);
    }

    fn run_scsi(&self, device: &mut LinuxDevice, flags: &ScsiFlags, ctx: &mut Context) {
        print_scsi(device, flags, ctx);
    }

    fn run_nvme(&self, device: &mut LinuxDevice, flags: &NvmeFlags, ctx: &mut Context) {
        print_nvme(device, flags, ctx);
    }
}
