//! Per-protocol feature flags and the mapping from a query to those flags.
//!
//! A [`QueryConfig`] is built fresh for every call from a [`Baseline`]; the
//! baseline itself is never touched. Building never does I/O and never fails.

use serde::{Deserialize, Serialize};

use crate::device::{Protocol, ProtocolSet};
use crate::error::SmartError;

/// Attribute table layout for the ATA printer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFormat {
    pub brief: bool,
    pub hex_id: bool,
    pub hex_val: bool,
}

/// Sections the ATA printer should produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtaFlags {
    pub drive_info: bool,
    pub ignore_presets: bool,
    /// `-1` skips the IDENTIFY dump, `0` prints valid words, `1` all 256.
    pub identify_word_level: i32,
    /// `-1` no bits, `0` bits of described words, `1` bits of valid words,
    /// `2` every bit.
    pub identify_bit_level: i32,
    pub smart_check_status: bool,
    pub smart_general_values: bool,
    pub smart_vendor_attrib: bool,
    pub smart_error_log: bool,
    pub smart_selftest_log: bool,
    pub smart_selective_selftest_log: bool,
    pub smart_ext_error_log: u32,
    pub retry_error_log: bool,
    pub smart_ext_selftest_log: u32,
    pub retry_selftest_log: bool,
    pub smart_logdir: bool,
    pub gp_logdir: bool,
    pub sct_temp_sts: bool,
    pub sct_temp_hist: bool,
    pub sct_erc_get: u8,
    pub sct_wcache_reorder_get: bool,
    pub sct_wcache_sct_get: bool,
    pub devstat_all_pages: bool,
    pub pending_defects_log: u32,
    pub sataphy: bool,
    /// Report only the settings that were asked for.
    pub get_set_used: bool,
    pub get_aam: bool,
    pub get_apm: bool,
    pub get_security: bool,
    pub get_lookahead: bool,
    pub get_wcache: bool,
    pub get_dsn: bool,
    pub output_format: OutputFormat,
}

impl Default for AtaFlags {
    fn default() -> Self {
        Self {
            drive_info: false,
            ignore_presets: false,
            identify_word_level: -1,
            identify_bit_level: -1,
            smart_check_status: false,
            smart_general_values: false,
            smart_vendor_attrib: false,
            smart_error_log: false,
            smart_selftest_log: false,
            smart_selective_selftest_log: false,
            smart_ext_error_log: 0,
            retry_error_log: false,
            smart_ext_selftest_log: 0,
            retry_selftest_log: false,
            smart_logdir: false,
            gp_logdir: false,
            sct_temp_sts: false,
            sct_temp_hist: false,
            sct_erc_get: 0,
            sct_wcache_reorder_get: false,
            sct_wcache_sct_get: false,
            devstat_all_pages: false,
            pending_defects_log: 0,
            sataphy: false,
            get_set_used: false,
            get_aam: false,
            get_apm: false,
            get_security: false,
            get_lookahead: false,
            get_wcache: false,
            get_dsn: false,
            output_format: OutputFormat::default(),
        }
    }
}

impl AtaFlags {
    pub fn wants_settings(&self) -> bool {
        self.get_aam
            || self.get_apm
            || self.get_security
            || self.get_lookahead
            || self.get_wcache
            || self.get_dsn
            || self.sct_wcache_reorder_get
            || self.sct_wcache_sct_get
    }
}

/// Sections the SCSI printer should produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScsiFlags {
    pub drive_info: bool,
    pub smart_check_status: bool,
    pub smart_vendor_attrib: bool,
    pub smart_error_log: bool,
    pub smart_selftest_log: bool,
    pub smart_ss_media_log: bool,
    pub smart_background_log: bool,
    pub get_rcd: bool,
    pub get_wce: bool,
    pub sasphy: bool,
    pub smart_env_rep: bool,
    pub scsi_pending_defects: bool,
    pub tape_device_stats: bool,
    pub zoned_device_stats: bool,
    pub general_stats_and_perf: bool,
    /// Number of times a health report was requested for this call.
    pub health_opt_count: u32,
}

/// Sections the NVMe printer should produce.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NvmeFlags {
    pub drive_info: bool,
    pub smart_check_status: bool,
    pub drive_capabilities: bool,
    pub smart_vendor_attrib: bool,
    pub error_log_entries: u32,
    pub smart_selftest_log: bool,
}

/// Process-wide flag defaults every query starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Baseline {
    pub ata: AtaFlags,
    pub scsi: ScsiFlags,
    pub nvme: NvmeFlags,
    /// Set when `ata.output_format` was chosen explicitly.
    pub output_format_set: bool,
}

/// `--identify` variants, selected by choice 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyMode {
    AllWords,
    NoBits,
    ValidWordBits,
    AllBits,
}

impl TryFrom<i32> for IdentifyMode {
    type Error = SmartError;

    fn try_from(choice: i32) -> Result<Self, Self::Error> {
        match choice {
            0 => Ok(Self::AllWords),
            1 => Ok(Self::NoBits),
            2 => Ok(Self::ValidWordBits),
            3 => Ok(Self::AllBits),
            _ => Err(SmartError::InvalidChoice { choice, max: 3 }),
        }
    }
}

/// Device settings groups, selected by choice 0..=9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsGroup {
    All,
    Aam,
    Apm,
    Dsn,
    Lookahead,
    Security,
    Wcache,
    Rcache,
    WcacheReorder,
    WcacheSct,
}

impl SettingsGroup {
    pub fn name(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Aam => "aam",
            Self::Apm => "apm",
            Self::Dsn => "dsn",
            Self::Lookahead => "lookahead",
            Self::Security => "security",
            Self::Wcache => "wcache",
            Self::Rcache => "rcache",
            Self::WcacheReorder => "wcreorder",
            Self::WcacheSct => "wcache-sct",
        }
    }
}

impl TryFrom<i32> for SettingsGroup {
    type Error = SmartError;

    fn try_from(choice: i32) -> Result<Self, Self::Error> {
        match choice {
            0 => Ok(Self::All),
            1 => Ok(Self::Aam),
            2 => Ok(Self::Apm),
            3 => Ok(Self::Dsn),
            4 => Ok(Self::Lookahead),
            5 => Ok(Self::Security),
            6 => Ok(Self::Wcache),
            7 => Ok(Self::Rcache),
            8 => Ok(Self::WcacheReorder),
            9 => Ok(Self::WcacheSct),
            _ => Err(SmartError::InvalidChoice { choice, max: 9 }),
        }
    }
}

/// A device-scoped query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Identity,
    IdentifyDevice(IdentifyMode),
    Settings(SettingsGroup),
    SmartInfo,
    Info,
    Health,
}

impl QueryKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::IdentifyDevice(_) => "identify",
            Self::Settings(_) => "settings",
            Self::SmartInfo => "smart-info",
            Self::Info => "info",
            Self::Health => "health",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryConfig {
    pub ata: AtaFlags,
    pub scsi: ScsiFlags,
    pub nvme: NvmeFlags,
    /// Printers this query may run; a session dispatches to the overlap
    /// with what the device speaks.
    pub protocols: ProtocolSet,
}

impl QueryConfig {
    pub fn build(kind: QueryKind, baseline: &Baseline) -> Self {
        let mut cfg = QueryConfig {
            ata: baseline.ata.clone(),
            scsi: baseline.scsi.clone(),
            nvme: baseline.nvme.clone(),
            protocols: ProtocolSet::ALL,
        };
        match kind {
            QueryKind::Identity => {
                cfg.ata.drive_info = true;
                cfg.ata.ignore_presets = false;
                cfg.scsi.drive_info = true;
                cfg.nvme.drive_info = true;
            }
            QueryKind::IdentifyDevice(mode) => {
                cfg.apply_identify(mode);
                cfg.protocols = ProtocolSet::of(Protocol::Ata);
            }
            QueryKind::Settings(group) => cfg.apply_settings(group),
            QueryKind::SmartInfo => cfg.apply_smart_info(),
            QueryKind::Info => cfg.apply_info(baseline.output_format_set),
            QueryKind::Health => {
                cfg.ata.smart_check_status = true;
                cfg.scsi.smart_check_status = true;
                cfg.scsi.smart_ss_media_log = true;
                cfg.scsi.health_opt_count += 1;
                cfg.nvme.smart_check_status = true;
            }
        }
        cfg
    }

    fn apply_identify(&mut self, mode: IdentifyMode) {
        let ata = &mut self.ata;
        ata.identify_word_level = 0;
        ata.identify_bit_level = 0;
        match mode {
            IdentifyMode::AllWords => ata.identify_word_level = 1,
            IdentifyMode::NoBits => ata.identify_bit_level = -1,
            IdentifyMode::ValidWordBits => ata.identify_bit_level = 1,
            IdentifyMode::AllBits => ata.identify_bit_level = 2,
        }
    }

    fn apply_settings(&mut self, group: SettingsGroup) {
        let (ata, scsi) = (&mut self.ata, &mut self.scsi);
        match group {
            SettingsGroup::All => {
                ata.get_aam = true;
                ata.get_apm = true;
                ata.get_security = true;
                ata.get_lookahead = true;
                ata.get_wcache = true;
                ata.get_dsn = true;
                scsi.get_rcd = true;
                scsi.get_wce = true;
            }
            SettingsGroup::Aam => ata.get_aam = true,
            SettingsGroup::Apm => ata.get_apm = true,
            SettingsGroup::Dsn => ata.get_dsn = true,
            SettingsGroup::Lookahead => ata.get_lookahead = true,
            SettingsGroup::Security => ata.get_security = true,
            SettingsGroup::Wcache => {
                ata.get_wcache = true;
                scsi.get_wce = true;
            }
            SettingsGroup::Rcache => scsi.get_rcd = true,
            SettingsGroup::WcacheReorder => ata.sct_wcache_reorder_get = true,
            SettingsGroup::WcacheSct => ata.sct_wcache_sct_get = true,
        }
        ata.get_set_used = true;
    }

    fn apply_smart_info(&mut self) {
        let ata = &mut self.ata;
        ata.drive_info = true;
        ata.smart_check_status = true;
        ata.smart_general_values = true;
        ata.smart_vendor_attrib = true;
        ata.smart_error_log = true;
        ata.smart_selftest_log = true;
        ata.smart_selective_selftest_log = true;

        let scsi = &mut self.scsi;
        scsi.drive_info = true;
        scsi.smart_check_status = true;
        scsi.smart_vendor_attrib = true;
        scsi.smart_error_log = true;
        scsi.smart_selftest_log = true;
        scsi.smart_ss_media_log = true;

        self.apply_nvme_all();
    }

    fn apply_info(&mut self, output_format_set: bool) {
        let ata = &mut self.ata;
        ata.drive_info = true;
        ata.smart_check_status = true;
        ata.smart_general_values = true;
        ata.smart_vendor_attrib = true;
        ata.smart_ext_error_log = 8;
        ata.retry_error_log = true;
        ata.smart_ext_selftest_log = 25;
        ata.retry_selftest_log = true;
        ata.smart_selective_selftest_log = true;
        ata.smart_logdir = true;
        ata.gp_logdir = true;
        ata.sct_temp_sts = true;
        ata.sct_temp_hist = true;
        ata.sct_erc_get = 1;
        ata.sct_wcache_reorder_get = true;
        ata.devstat_all_pages = true;
        ata.pending_defects_log = 31;
        ata.sataphy = true;
        ata.get_set_used = true;
        ata.get_aam = true;
        ata.get_apm = true;
        ata.get_security = true;
        ata.get_lookahead = true;
        ata.get_wcache = true;
        ata.get_dsn = true;
        if !output_format_set {
            ata.output_format.brief = true;
        }

        let scsi = &mut self.scsi;
        scsi.drive_info = true;
        scsi.smart_check_status = true;
        scsi.smart_vendor_attrib = true;
        scsi.smart_error_log = true;
        scsi.smart_selftest_log = true;
        scsi.get_rcd = true;
        scsi.get_wce = true;
        scsi.smart_background_log = true;
        scsi.smart_ss_media_log = true;
        scsi.sasphy = true;
        scsi.smart_env_rep = true;
        scsi.scsi_pending_defects = true;
        scsi.tape_device_stats = true;
        scsi.zoned_device_stats = true;
        scsi.general_stats_and_perf = true;

        self.apply_nvme_all();
    }

    fn apply_nvme_all(&mut self) {
        let nvme = &mut self.nvme;
        nvme.drive_info = true;
        nvme.smart_check_status = true;
        nvme.drive_capabilities = true;
        nvme.smart_vendor_attrib = true;
        nvme.error_log_entries = 16;
        nvme.smart_selftest_log = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(kind: QueryKind) -> QueryConfig {
        QueryConfig::build(kind, &Baseline::default())
    }

    #[test]
    fn identity_sets_drive_info_everywhere() {
        let mut baseline = Baseline::default();
        baseline.ata.ignore_presets = true;
        let cfg = QueryConfig::build(QueryKind::Identity, &baseline);
        assert!(cfg.ata.drive_info && cfg.scsi.drive_info && cfg.nvme.drive_info);
        assert!(!cfg.ata.ignore_presets);
        assert!(baseline.ata.ignore_presets);
        assert!(!baseline.ata.drive_info);
    }

    #[test]
    fn identify_choices_map_to_levels() {
        let levels = |choice: i32| {
            let mode = IdentifyMode::try_from(choice).unwrap();
            let cfg = build(QueryKind::IdentifyDevice(mode));
            (cfg.ata.identify_word_level, cfg.ata.identify_bit_level)
        };
        assert_eq!(levels(0), (1, 0));
        assert_eq!(levels(1), (0, -1));
        assert_eq!(levels(2), (0, 1));
        assert_eq!(levels(3), (0, 2));
        assert!(IdentifyMode::try_from(4).is_err());
        assert!(IdentifyMode::try_from(-1).is_err());
    }

    #[test]
    fn identify_runs_only_the_ata_printer() {
        for choice in 0..=3 {
            let mode = IdentifyMode::try_from(choice).unwrap();
            let cfg = build(QueryKind::IdentifyDevice(mode));
            assert_eq!(cfg.protocols, ProtocolSet::of(Protocol::Ata));
        }
        assert_eq!(build(QueryKind::Health).protocols, ProtocolSet::ALL);
        assert_eq!(build(QueryKind::Info).protocols, ProtocolSet::ALL);
    }

    #[test]
    fn settings_all_is_union_of_single_groups() {
        let all = build(QueryKind::Settings(SettingsGroup::All));
        let mut union = QueryConfig::default();
        for choice in 1..=7 {
            let group = SettingsGroup::try_from(choice).unwrap();
            let cfg = build(QueryKind::Settings(group));
            union.ata.get_aam |= cfg.ata.get_aam;
            union.ata.get_apm |= cfg.ata.get_apm;
            union.ata.get_security |= cfg.ata.get_security;
            union.ata.get_lookahead |= cfg.ata.get_lookahead;
            union.ata.get_wcache |= cfg.ata.get_wcache;
            union.ata.get_dsn |= cfg.ata.get_dsn;
            union.scsi.get_rcd |= cfg.scsi.get_rcd;
            union.scsi.get_wce |= cfg.scsi.get_wce;
            assert!(cfg.ata.get_set_used);
        }
        assert_eq!(all.ata.get_aam, union.ata.get_aam);
        assert_eq!(all.ata.get_apm, union.ata.get_apm);
        assert_eq!(all.ata.get_security, union.ata.get_security);
        assert_eq!(all.ata.get_lookahead, union.ata.get_lookahead);
        assert_eq!(all.ata.get_wcache, union.ata.get_wcache);
        assert_eq!(all.ata.get_dsn, union.ata.get_dsn);
        assert_eq!(all.scsi.get_rcd, union.scsi.get_rcd);
        assert_eq!(all.scsi.get_wce, union.scsi.get_wce);
        assert!(all.ata.get_set_used);
        assert!(!all.ata.sct_wcache_reorder_get && !all.ata.sct_wcache_sct_get);
    }

    #[test]
    fn sct_settings_are_ata_only() {
        let reorder = build(QueryKind::Settings(SettingsGroup::WcacheReorder));
        assert!(reorder.ata.sct_wcache_reorder_get);
        assert_eq!(reorder.scsi, ScsiFlags::default());
        let sct = build(QueryKind::Settings(SettingsGroup::WcacheSct));
        assert!(sct.ata.sct_wcache_sct_get);
        assert!(SettingsGroup::try_from(10).is_err());
    }

    #[test]
    fn info_defaults_to_brief_only_without_explicit_format() {
        assert!(build(QueryKind::Info).ata.output_format.brief);

        let mut baseline = Baseline::default();
        baseline.output_format_set = true;
        baseline.ata.output_format.hex_val = true;
        let cfg = QueryConfig::build(QueryKind::Info, &baseline);
        assert!(!cfg.ata.output_format.brief);
        assert!(cfg.ata.output_format.hex_val);
        assert_eq!(cfg.ata.smart_ext_error_log, 8);
        assert_eq!(cfg.ata.smart_ext_selftest_log, 25);
        assert_eq!(cfg.ata.pending_defects_log, 31);
        assert!(cfg.scsi.general_stats_and_perf);
    }

    #[test]
    fn smart_info_bounds_nvme_error_log() {
        let cfg = build(QueryKind::SmartInfo);
        assert_eq!(cfg.nvme.error_log_entries, 16);
        assert!(cfg.ata.smart_selective_selftest_log);
        assert!(cfg.scsi.smart_ss_media_log);
        assert_eq!(cfg.ata.smart_ext_error_log, 0);
    }

    #[test]
    fn health_counts_scsi_requests() {
        let mut baseline = Baseline::default();
        baseline.scsi.health_opt_count = 2;
        let cfg = QueryConfig::build(QueryKind::Health, &baseline);
        assert_eq!(cfg.scsi.health_opt_count, 3);
        assert!(cfg.scsi.smart_ss_media_log);
        assert!(cfg.ata.smart_check_status && cfg.nvme.smart_check_status);
        assert!(!cfg.ata.drive_info);
        assert_eq!(baseline.scsi.health_opt_count, 2);
    }
}
