//! Devices, backends and the per-call device session.

use std::fmt;

use crate::context::Context;
use crate::error::SmartError;
use crate::options::{AtaFlags, NvmeFlags, QueryConfig, ScsiFlags};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ata,
    Scsi,
    Nvme,
}

impl Protocol {
    /// Dispatch order.
    pub const ALL: [Protocol; 3] = [Protocol::Ata, Protocol::Scsi, Protocol::Nvme];

    pub fn name(self) -> &'static str {
        match self {
            Protocol::Ata => "ATA",
            Protocol::Scsi => "SCSI",
            Protocol::Nvme => "NVMe",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Protocol::Ata => 0b001,
            Protocol::Scsi => 0b010,
            Protocol::Nvme => 0b100,
        }
    }
}

/// The protocols an opened device answers to. A device may speak more than
/// one (e.g. a SAT bridge).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ProtocolSet(u8);

impl ProtocolSet {
    pub const EMPTY: ProtocolSet = ProtocolSet(0);
    pub const ALL: ProtocolSet = ProtocolSet(0b111);

    pub fn of(protocol: Protocol) -> Self {
        ProtocolSet(protocol.bit())
    }

    #[must_use]
    pub fn with(self, protocol: Protocol) -> Self {
        ProtocolSet(self.0 | protocol.bit())
    }

    pub fn insert(&mut self, protocol: Protocol) {
        self.0 |= protocol.bit();
    }

    pub fn contains(&self, protocol: Protocol) -> bool {
        self.0 & protocol.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub fn intersection(self, other: ProtocolSet) -> Self {
        ProtocolSet(self.0 & other.0)
    }

    /// Members in dispatch order: ATA, SCSI, NVMe.
    pub fn iter(&self) -> impl Iterator<Item = Protocol> {
        let set = *self;
        Protocol::ALL.into_iter().filter(move |p| set.contains(*p))
    }
}

impl FromIterator<Protocol> for ProtocolSet {
    fn from_iter<I: IntoIterator<Item = Protocol>>(iter: I) -> Self {
        iter.into_iter().fold(ProtocolSet::EMPTY, ProtocolSet::with)
    }
}

impl fmt::Display for ProtocolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, p) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(p.name())?;
        }
        Ok(())
    }
}

/// Which device a query is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub name: String,
    /// Backend device type (`ata`, `scsi`, `nvme`, `sat`, ...). `None`
    /// autodetects.
    pub type_hint: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_hint: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, type_hint: impl Into<String>) -> Self {
        self.type_hint = Some(type_hint.into());
        self
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }
}

/// A backend-native device handle.
pub trait SmartDevice {
    fn name(&self) -> &str;
    /// Type tag as accepted by `-d` (e.g. `sat`, `nvme`).
    fn dev_type(&self) -> &str;
    /// Human readable name, e.g. `/dev/sda [SAT]`.
    fn info_name(&self) -> &str;
    fn last_error(&self) -> Option<&str>;
    /// Detects the concrete protocol and opens the device. The returned
    /// handle replaces `self`; check [`SmartDevice::is_open`] afterwards.
    fn autodetect_open(self) -> Self
    where
        Self: Sized;
    fn is_open(&self) -> bool;
    fn close(&mut self);
    fn protocols(&self) -> ProtocolSet;
}

/// The engine that finds devices and renders protocol sections.
///
/// `run_*` report failures only through the context: diagnostic lines in the
/// sink and the tolerance policy.
pub trait DeviceBackend {
    type Device: SmartDevice;

    fn init(&self) -> Result<(), SmartError> {
        Ok(())
    }

    fn lookup(&self, name: &str, type_hint: Option<&str>) -> Option<Self::Device>;

    fn init_drive_database(&self, use_default: bool) -> bool;

    fn scan(
        &self,
        ctx: &mut Context,
        types: &[String],
        pattern: Option<&str>,
    ) -> Result<Vec<Self::Device>, SmartError>;

    fn run_ata(&self, device: &mut Self::Device, flags: &AtaFlags, ctx: &mut Context);

    fn run_scsi(&self, device: &mut Self::Device, flags: &ScsiFlags, ctx: &mut Context);

    fn run_nvme(&self, device: &mut Self::Device, flags: &NvmeFlags, ctx: &mut Context);
}

/// Looks a descriptor up in the backend.
pub fn resolve<B: DeviceBackend>(
    backend: &B,
    descriptor: &DeviceDescriptor,
) -> Result<B::Device, SmartError> {
    if !descriptor.is_valid() {
        return Err(SmartError::DeviceNotFound(String::new()));
    }
    backend
        .lookup(&descriptor.name, descriptor.type_hint.as_deref())
        .ok_or_else(|| SmartError::DeviceNotFound(descriptor.name.clone()))
}

/// An opened device, closed when the session ends.
#[derive(Debug)]
pub struct DeviceSession<D: SmartDevice> {
    device: D,
}

impl<D: SmartDevice> DeviceSession<D> {
    /// Autodetects and opens `device`. On failure the device is closed before
    /// the error is returned.
    pub fn open(device: D) -> Result<Self, SmartError> {
        let mut device = device.autodetect_open();
        if !device.is_open() {
            let err = SmartError::OpenFailed {
                name: device.name().to_string(),
                reason: device.last_error().unwrap_or("unknown error").to_string(),
            };
            device.close();
            return Err(err);
        }
        tracing::debug!(
            device = device.name(),
            dev_type = device.dev_type(),
            protocols = %device.protocols(),
            "device session opened"
        );
        Ok(Self { device })
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn protocols(&self) -> ProtocolSet {
        self.device.protocols()
    }

    /// Runs every protocol printer both the device and the query allow,
    /// ATA then SCSI then NVMe.
    pub fn dispatch<B>(&mut self, backend: &B, cfg: &QueryConfig, ctx: &mut Context)
    where
        B: DeviceBackend<Device = D>,
    {
        let wanted = self.protocols().intersection(cfg.protocols);
        if wanted.is_empty() {
            tracing::debug!(
                device = self.device.name(),
                protocols = %self.protocols(),
                "query does not apply to this device"
            );
        }
        for protocol in wanted.iter() {
            tracing::debug!(device = self.device.name(), protocol = protocol.name(), "dispatch");
            match protocol {
                Protocol::Ata => backend.run_ata(&mut self.device, &cfg.ata, ctx),
                Protocol::Scsi => backend.run_scsi(&mut self.device, &cfg.scsi, ctx),
                Protocol::Nvme => backend.run_nvme(&mut self.device, &cfg.nvme, ctx),
            }
        }
    }

    pub fn close(self) {}
}

impl<D: SmartDevice> Drop for DeviceSession<D> {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.device.close();
            tracing::debug!(device = self.device.name(), "device session closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Probe {
        opens: bool,
        open: bool,
        closes: Rc<Cell<u32>>,
    }

    impl SmartDevice for Probe {
        fn name(&self) -> &str {
            "/dev/probe"
        }
        fn dev_type(&self) -> &str {
            "test"
        }
        fn info_name(&self) -> &str {
            "/dev/probe"
        }
        fn last_error(&self) -> Option<&str> {
            (!self.open).then_some("No such device")
        }
        fn autodetect_open(mut self) -> Self {
            self.open = self.opens;
            self
        }
        fn is_open(&self) -> bool {
            self.open
        }
        fn close(&mut self) {
            self.open = false;
            self.closes.set(self.closes.get() + 1);
        }
        fn protocols(&self) -> ProtocolSet {
            ProtocolSet::of(Protocol::Nvme)
        }
    }

    fn probe(opens: bool) -> (Probe, Rc<Cell<u32>>) {
        let closes = Rc::new(Cell::new(0));
        let probe = Probe {
            opens,
            open: false,
            closes: Rc::clone(&closes),
        };
        (probe, closes)
    }

    #[test]
    fn protocol_set_renders_in_dispatch_order() {
        let set: ProtocolSet = [Protocol::Nvme, Protocol::Ata].into_iter().collect();
        assert_eq!(set.to_string(), "ATA+NVMe");
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![Protocol::Ata, Protocol::Nvme]
        );
        assert!(!set.contains(Protocol::Scsi));
        assert_eq!(ProtocolSet::EMPTY.to_string(), "");
        assert_eq!(set.intersection(ProtocolSet::of(Protocol::Nvme)), ProtocolSet::of(Protocol::Nvme));
        assert!(set.intersection(ProtocolSet::of(Protocol::Scsi)).is_empty());
        assert_eq!(ProtocolSet::ALL.to_string(), "ATA+SCSI+NVMe");
    }

    #[test]
    fn session_closes_exactly_once() {
        let (device, closes) = probe(true);
        let session = DeviceSession::open(device).unwrap();
        assert_eq!(session.protocols(), ProtocolSet::of(Protocol::Nvme));
        session.close();
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn failed_open_reports_reason() {
        let (device, _) = probe(false);
        match DeviceSession::open(device) {
            Err(SmartError::OpenFailed { name, reason }) => {
                assert_eq!(name, "/dev/probe");
                assert_eq!(reason, "No such device");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn descriptor_requires_a_name() {
        assert!(!DeviceDescriptor::new("").is_valid());
        let desc = DeviceDescriptor::new("/dev/sda").with_type("sat");
        assert_eq!(desc.type_hint.as_deref(), Some("sat"));
    }
}
