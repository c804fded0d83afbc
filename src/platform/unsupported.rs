use crate::context::Context;
use crate::device::{DeviceBackend, ProtocolSet, SmartDevice};
use crate::error::SmartError;
use crate::options::{AtaFlags, NvmeFlags, ScsiFlags};

/// Backend for targets without device pass-through. Bring-up fails, so the
/// interface built on it answers every query with an empty result.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedBackend;

impl UnsupportedBackend {
    pub fn new() -> Self {
        UnsupportedBackend
    }
}

#[derive(Debug)]
pub struct UnsupportedDevice {
    name: String,
}

impl SmartDevice for UnsupportedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn dev_type(&self) -> &str {
        ""
    }

    fn info_name(&self) -> &str {
        &self.name
    }

    fn last_error(&self) -> Option<&str> {
        Some("Operation not supported")
    }

    fn autodetect_open(self) -> Self {
        self
    }

    fn is_open(&self) -> bool {
        false
    }

    fn close(&mut self) {}

    fn protocols(&self) -> ProtocolSet {
        ProtocolSet::EMPTY
    }
}

impl DeviceBackend for UnsupportedBackend {
    type Device = UnsupportedDevice;

    fn init(&self) -> Result<(), SmartError> {
        Err(SmartError::UnsupportedDevice)
    }

    fn lookup(&self, _name: &str, _type_hint: Option<&str>) -> Option<UnsupportedDevice> {
        None
    }

    fn init_drive_database(&self, _use_default: bool) -> bool {
        false
    }

    fn scan(
        &self,
        _ctx: &mut Context,
        _types: &[String],
        _pattern: Option<&str>,
    ) -> Result<Vec<UnsupportedDevice>, SmartError> {
        Err(SmartError::UnsupportedDevice)
    }

    fn run_ata(&self, _device: &mut UnsupportedDevice, _flags: &AtaFlags, _ctx: &mut Context) {}

    fn run_scsi(&self, _device: &mut UnsupportedDevice, _flags: &ScsiFlags, _ctx: &mut Context) {}

    fn run_nvme(&self, _device: &mut UnsupportedDevice, _flags: &NvmeFlags, _ctx: &mut Context) {}
}
