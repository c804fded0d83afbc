#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use smartmon::options::{AtaFlags, NvmeFlags, ScsiFlags};
use smartmon::{CommandClass, Context, DeviceBackend, Protocol, ProtocolSet, SmartDevice, SmartError};

/// Ordered record of every backend and device call.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.0.borrow().iter().filter(|e| e.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone)]
pub struct Spec {
    pub name: &'static str,
    pub dev_type: &'static str,
    pub protocols: ProtocolSet,
    pub open_error: Option<&'static str>,
}

impl Spec {
    pub fn new(name: &'static str, dev_type: &'static str, protocols: &[Protocol]) -> Self {
        Spec {
            name,
            dev_type,
            protocols: protocols.iter().copied().collect(),
            open_error: None,
        }
    }

    pub fn failing(mut self, error: &'static str) -> Self {
        self.open_error = Some(error);
        self
    }
}

#[derive(Debug)]
pub struct FakeDevice {
    spec: Spec,
    open: bool,
    journal: Journal,
}

impl SmartDevice for FakeDevice {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn dev_type(&self) -> &str {
        self.spec.dev_type
    }

    fn info_name(&self) -> &str {
        self.spec.name
    }

    fn last_error(&self) -> Option<&str> {
        self.spec.open_error
    }

    fn autodetect_open(mut self) -> Self {
        self.journal.push(format!("open {}", self.spec.name));
        self.open = self.spec.open_error.is_none();
        self
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.journal.push(format!("close {}", self.spec.name));
        self.open = false;
    }

    fn protocols(&self) -> ProtocolSet {
        self.spec.protocols
    }
}

/// Deterministic backend that renders the flags it was handed.
#[derive(Debug, Default)]
pub struct FakeBackend {
    pub devices: Vec<Spec>,
    pub journal: Journal,
    pub init_error: bool,
    pub no_drive_db: bool,
    pub scan_error: Option<&'static str>,
    /// Mandatory commands the ATA printer pretends failed.
    pub failing_mandatory: u8,
}

impl FakeBackend {
    pub fn with_devices(devices: Vec<Spec>) -> Self {
        FakeBackend {
            devices,
            ..FakeBackend::default()
        }
    }

    fn device(&self, spec: &Spec) -> FakeDevice {
        FakeDevice {
            spec: spec.clone(),
            open: false,
            journal: self.journal.clone(),
        }
    }
}

impl DeviceBackend for FakeBackend {
    type Device = FakeDevice;

    fn init(&self) -> Result<(), SmartError> {
        if self.init_error {
            return Err(SmartError::UnsupportedDevice);
        }
        Ok(())
    }

    fn lookup(&self, name: &str, type_hint: Option<&str>) -> Option<FakeDevice> {
        self.journal.push(format!("lookup {name} {type_hint:?}"));
        self.devices
            .iter()
            .find(|s| s.name == name)
            .map(|s| self.device(s))
    }

    fn init_drive_database(&self, _use_default: bool) -> bool {
        self.journal.push("drivedb".to_string());
        !self.no_drive_db
    }

    fn scan(
        &self,
        ctx: &mut Context,
        types: &[String],
        pattern: Option<&str>,
    ) -> Result<Vec<FakeDevice>, SmartError> {
        self.journal.push(format!("scan {types:?} {pattern:?}"));
        ctx.sink.info(format_args!("probing {} candidates\n", self.devices.len()));
        if let Some(reason) = self.scan_error {
            return Err(SmartError::CommandFailed {
                command: "device scan",
                reason: reason.to_string(),
            });
        }
        Ok(self
            .devices
            .iter()
            .filter(|s| pattern.map_or(true, |p| s.name.contains(p)))
            .map(|s| self.device(s))
            .collect())
    }

    fn run_ata(&self, device: &mut FakeDevice, flags: &AtaFlags, ctx: &mut Context) {
        self.journal.push(format!("ata {}", device.name()));
        for _ in 0..self.failing_mandatory {
            let carry_on = ctx.allow(CommandClass::Mandatory);
            ctx.sink.plain(format_args!("mandatory failure tolerated: {carry_on}\n"));
            if !carry_on {
                return;
            }
        }
        ctx.report.set("model_name", device.name());
        ctx.sink.plain(format_args!(
            "ATA {} info={} presets_ignored={} health={} words={} bits={}\n",
            device.name(),
            flags.drive_info,
            flags.ignore_presets,
            flags.smart_check_status,
            flags.identify_word_level,
            flags.identify_bit_level,
        ));
        ctx.sink.plain(format_args!(
            "ATA settings aam={} apm={} security={} lookahead={} wcache={} dsn={} used={}\n",
            flags.get_aam,
            flags.get_apm,
            flags.get_security,
            flags.get_lookahead,
            flags.get_wcache,
            flags.get_dsn,
            flags.get_set_used,
        ));
    }

    fn run_scsi(&self, device: &mut FakeDevice, flags: &ScsiFlags, ctx: &mut Context) {
        self.journal.push(format!("scsi {}", device.name()));
        ctx.sink.plain(format_args!(
            "SCSI {} info={} health={} rcd={} wce={} health_opts={}\n",
            device.name(),
            flags.drive_info,
            flags.smart_check_status,
            flags.get_rcd,
            flags.get_wce,
            flags.health_opt_count,
        ));
    }

    fn run_nvme(&self, device: &mut FakeDevice, flags: &NvmeFlags, ctx: &mut Context) {
        self.journal.push(format!("nvme {}", device.name()));
        ctx.sink.plain(format_args!(
            "NVMe {} info={} health={} errors={}\n",
            device.name(),
            flags.drive_info,
            flags.smart_check_status,
            flags.error_log_entries,
        ));
    }
}
