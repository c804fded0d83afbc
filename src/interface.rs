//! The query facade.
//!
//! Every public query on [`Interface`] follows the same shape: validate the
//! arguments, reset a [`Context`], resolve and open the device, build the
//! flag records for the query, run the printers for each protocol the
//! device speaks, close the device and hand back the captured lines. Any
//! failure along the way yields an empty result.

use std::sync::OnceLock;

use crate::config::EngineConfig;
use crate::context::Context;
use crate::device::{resolve, DeviceBackend, DeviceDescriptor, DeviceSession};
use crate::error::SmartError;
use crate::options::{IdentifyMode, QueryConfig, QueryKind, SettingsGroup};
use crate::scan::{self, ScanMode};
use crate::version::{self, BuiltinVersion, VersionSource, PROGRAM_NAME};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    /// Bring-up failed; every query returns empty.
    Unavailable(String),
}

pub struct Interface<B: DeviceBackend> {
    backend: B,
    config: EngineConfig,
    status: Status,
    version: Box<dyn VersionSource + Send + Sync>,
    drive_db: OnceLock<bool>,
}

impl<B: DeviceBackend> std::fmt::Debug for Interface<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interface")
            .field("status", &self.status)
            .field("config", &self.config)
            .field("drive_db", &self.drive_db.get())
            .finish_non_exhaustive()
    }
}

impl<B: DeviceBackend> Interface<B> {
    /// Validates `config` and brings the backend up. Never fails; a failed
    /// bring-up leaves the interface [`Status::Unavailable`].
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let status = match config.validate().and_then(|()| backend.init()) {
            Ok(()) => {
                tracing::info!(tolerance = ?config.tolerance, "SMART interface ready");
                Status::Ready
            }
            Err(e) => {
                tracing::warn!(error = %e, "SMART interface unavailable");
                Status::Unavailable(e.to_string())
            }
        };
        Self {
            backend,
            config,
            status,
            version: Box::new(BuiltinVersion),
            drive_db: OnceLock::new(),
        }
    }

    #[must_use]
    pub fn with_version_source(mut self, source: impl VersionSource + Send + Sync + 'static) -> Self {
        self.version = Box::new(source);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.status == Status::Ready
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// A fresh context seeded from the configuration.
    pub fn context(&self) -> Context {
        Context::from_config(&self.config)
    }

    /// Loads the drive database the first time it is asked for.
    fn drive_database(&self) -> bool {
        *self.drive_db.get_or_init(|| {
            let loaded = self.backend.init_drive_database(self.config.use_default_db);
            tracing::debug!(loaded, use_default = self.config.use_default_db, "drive database");
            loaded
        })
    }

    fn version_text(&self, program: &str) -> String {
        self.version.format_version_info(program, true)
    }

    pub fn version(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        version::banner(&self.version_text(PROGRAM_NAME))
    }

    pub fn copyright(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        version::copyright(&self.version_text(PROGRAM_NAME))
    }

    pub fn license(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        version::license(&self.version_text(PROGRAM_NAME))
    }

    pub fn build_info(&self) -> String {
        if !self.is_valid() {
            return String::new();
        }
        version::build_info(&self.version_text("x"), self.version.package())
    }

    /// Runs `kind` against `descriptor` and leaves the output in `ctx`.
    ///
    /// The context is reset on entry. An `Err` means nothing was queried;
    /// once the device is open the result is `Ok` whatever the printers
    /// reported.
    pub fn run_query(
        &self,
        ctx: &mut Context,
        descriptor: &DeviceDescriptor,
        kind: QueryKind,
    ) -> Result<(), SmartError> {
        if let Status::Unavailable(reason) = &self.status {
            return Err(SmartError::Unavailable(reason.clone()));
        }
        ctx.reset();
        let device = resolve(&self.backend, descriptor)?;

        let mut cfg = QueryConfig::build(kind, &self.config.baseline);
        if !self.drive_database() {
            cfg.ata.ignore_presets = true;
        }

        let mut session = DeviceSession::open(device)?;
        tracing::debug!(
            device = %descriptor.name,
            query = kind.name(),
            protocols = %session.protocols(),
            "running query"
        );
        session.dispatch(&self.backend, &cfg, ctx);
        session.close();
        Ok(())
    }

    /// Scans for devices and leaves one line per device in `ctx`.
    pub fn run_scan(&self, ctx: &mut Context, append: &str, mode: ScanMode) -> Result<(), SmartError> {
        if let Status::Unavailable(reason) = &self.status {
            return Err(SmartError::Unavailable(reason.clone()));
        }
        if !self.drive_database() {
            return Err(SmartError::InvalidConfig(
                "drive database unavailable".to_string(),
            ));
        }
        ctx.reset();
        scan::scan(&self.backend, &self.config.scan_types, append, mode, ctx);
        Ok(())
    }

    fn query_lines(&self, name: &str, kind: QueryKind) -> Vec<String> {
        let mut ctx = self.context();
        match self.run_query(&mut ctx, &DeviceDescriptor::new(name), kind) {
            Ok(()) => ctx.drain_lines(),
            Err(e) => {
                tracing::debug!(device = name, query = kind.name(), error = %e, "query skipped");
                Vec::new()
            }
        }
    }

    fn scan_lines(&self, append: &str, mode: ScanMode) -> Vec<String> {
        let mut ctx = self.context();
        match self.run_scan(&mut ctx, append, mode) {
            Ok(()) => ctx.drain_lines(),
            Err(e) => {
                tracing::debug!(error = %e, "scan skipped");
                Vec::new()
            }
        }
    }

    pub fn device_identity(&self, name: &str) -> Vec<String> {
        self.query_lines(name, QueryKind::Identity)
    }

    /// `choice`: 0 all words, 1 no bits, 2 valid words with bits, 3 every bit.
    pub fn identify_device(&self, name: &str, choice: i32) -> Vec<String> {
        match IdentifyMode::try_from(choice) {
            Ok(mode) => self.query_lines(name, QueryKind::IdentifyDevice(mode)),
            Err(e) => {
                tracing::debug!(error = %e, "identify skipped");
                Vec::new()
            }
        }
    }

    /// `choice` selects a [`SettingsGroup`], 0 for all of them.
    pub fn device_settings(&self, name: &str, choice: i32) -> Vec<String> {
        match SettingsGroup::try_from(choice) {
            Ok(group) => self.query_lines(name, QueryKind::Settings(group)),
            Err(e) => {
                tracing::debug!(error = %e, "settings skipped");
                Vec::new()
            }
        }
    }

    pub fn smart_info(&self, name: &str) -> Vec<String> {
        self.query_lines(name, QueryKind::SmartInfo)
    }

    pub fn info(&self, name: &str) -> Vec<String> {
        self.query_lines(name, QueryKind::Info)
    }

    pub fn device_health(&self, name: &str) -> Vec<String> {
        self.query_lines(name, QueryKind::Health)
    }

    /// `append` is an optional device pattern followed by tokens printed
    /// after each device instead of the info comment.
    pub fn scan_devices(&self, append: &str) -> Vec<String> {
        self.scan_lines(append, ScanMode::Plain)
    }

    /// Like [`Interface::scan_devices`] but opens every device first and
    /// reports the ones that fail to open.
    pub fn scan_devices_open(&self, append: &str) -> Vec<String> {
        self.scan_lines(append, ScanMode::Open)
    }
}
