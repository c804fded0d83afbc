//! # smartmon-rs
//! SMART diagnostics for ATA, SCSI and NVMe devices behind a small set of
//! request/response calls. Each query returns the report as a list of text
//! lines instead of printing it.
//!
//! ## Usage
//! ```no_run
//! let smart = smartmon::get_interface();
//! for line in smart.device_health("/dev/sda") {
//!     println!("{line}");
//! }
//! ```
//!
//! Every entry point returns an empty result when the interface is
//! unavailable, an argument is invalid, or the device cannot be found or
//! opened. [`Interface::run_query`] and [`Interface::run_scan`] take an
//! explicit [`Context`] and also expose the structured report.
//!
//! ## Current Scope
//! *   **Linux**: ATA (through SAT), SCSI and NVMe devices via `SG_IO` and
//!     the NVMe admin ioctl.
//! *   **Other targets**: the interface is always unavailable.
//!
//! # Permissions
//! Device queries need read access to the block device nodes, which usually
//! means root.

pub mod ata;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod interface;
pub mod nvme;
pub mod options;
mod platform;
pub mod printer;
pub mod sat;
pub mod scan;
pub mod scsi;
pub mod sink;
pub mod tolerance;
pub mod version;

use std::sync::OnceLock;

pub use config::{DebugLevels, EngineConfig};
pub use context::Context;
pub use device::{DeviceBackend, DeviceDescriptor, DeviceSession, Protocol, ProtocolSet, SmartDevice};
pub use error::SmartError;
pub use interface::{Interface, Status};
pub use options::{IdentifyMode, QueryConfig, QueryKind, SettingsGroup};
pub use platform::{SystemBackend, SystemDevice};
pub use scan::ScanMode;
pub use sink::{Event, EventKind, Report, Sink};
pub use tolerance::{CommandClass, Tolerance, ToleranceMode};
pub use version::{BuiltinVersion, VersionSource};

static INTERFACE: OnceLock<Interface<SystemBackend>> = OnceLock::new();

/// The process-wide interface over the platform backend, brought up on the
/// first call with [`EngineConfig::load`].
pub fn get_interface() -> &'static Interface<SystemBackend> {
    INTERFACE.get_or_init(|| Interface::new(SystemBackend::new(), EngineConfig::load()))
}
