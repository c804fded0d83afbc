mod common;

use common::{FakeBackend, Spec};
use smartmon::{
    DeviceDescriptor, EngineConfig, Interface, Protocol, QueryKind, Status, ToleranceMode,
    VersionSource,
};

const SATA: &str = "/dev/sda";
const NVME: &str = "/dev/nvme0";

fn backend() -> FakeBackend {
    FakeBackend::with_devices(vec![
        Spec::new(SATA, "sat", &[Protocol::Ata]),
        Spec::new(NVME, "nvme", &[Protocol::Nvme]),
        Spec::new("/dev/sdb", "scsi", &[Protocol::Scsi]).failing("No such device or address"),
        Spec::new(
            "/dev/bridge",
            "sat",
            &[Protocol::Nvme, Protocol::Scsi, Protocol::Ata],
        ),
    ])
}

fn interface(backend: FakeBackend) -> Interface<FakeBackend> {
    Interface::new(backend, EngineConfig::default())
}

struct FixedVersion;

impl VersionSource for FixedVersion {
    fn format_version_info(&self, program: &str, _full: bool) -> String {
        format!(
            "{program} 7.4 2023-08-01 r5530 [x86_64-linux-6.1] (local build)\n\
             Copyright (C) 2002-23, Bruce Allen, Christian Franke, www.smartmontools.org\n\
             \n\
             {program} comes with ABSOLUTELY NO WARRANTY. This is free\n\
             software, and you are welcome to redistribute it under\n\
             the terms of the GNU General Public License.\n\
             \n\
             smartmontools release 7.4 dated 2023-08-01\n\
             smartmontools build host: x86_64-pc-linux-gnu\n"
        )
    }

    fn package(&self) -> &str {
        "smartmontools"
    }
}

#[test]
fn unavailable_interface_answers_nothing() {
    let mut failing = backend();
    failing.init_error = true;
    let journal = failing.journal.clone();
    let smart = interface(failing);

    assert!(!smart.is_valid());
    assert!(matches!(smart.status(), Status::Unavailable(_)));
    assert!(smart.device_identity(SATA).is_empty());
    assert!(smart.identify_device(SATA, 0).is_empty());
    assert!(smart.device_settings(SATA, 0).is_empty());
    assert!(smart.smart_info(SATA).is_empty());
    assert!(smart.info(SATA).is_empty());
    assert!(smart.device_health(SATA).is_empty());
    assert!(smart.scan_devices("").is_empty());
    assert!(smart.scan_devices_open("").is_empty());
    assert_eq!(smart.version(), "");
    assert_eq!(smart.copyright(), "");
    assert_eq!(smart.license(), "");
    assert_eq!(smart.build_info(), "");
    assert!(journal.entries().is_empty());
}

#[test]
fn invalid_configuration_makes_the_interface_unavailable() {
    let mut config = EngineConfig::default();
    config.scan_types = vec!["sat auto".to_string()];
    let smart = Interface::new(backend(), config);
    assert!(!smart.is_valid());
    assert!(smart.device_health(SATA).is_empty());
}

#[test]
fn out_of_range_choices_touch_no_device() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    for choice in [-1, 4, 100] {
        assert!(smart.identify_device(SATA, choice).is_empty());
    }
    for choice in [-1, 10] {
        assert!(smart.device_settings(SATA, choice).is_empty());
    }
    assert!(journal.entries().is_empty());
}

#[test]
fn identify_choices_select_word_and_bit_levels() {
    let smart = interface(backend());
    let expected = [(0, "words=1 bits=0"), (1, "words=0 bits=-1"), (2, "words=0 bits=1"), (3, "words=0 bits=2")];
    for (choice, levels) in expected {
        let lines = smart.identify_device(SATA, choice);
        assert!(
            lines[0].ends_with(levels),
            "choice {choice}: {:?}",
            lines[0]
        );
    }
}

#[test]
fn identify_skips_devices_without_ata() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    assert!(smart.identify_device(NVME, 0).is_empty());
    assert_eq!(smart.identify_device("/dev/bridge", 2).len(), 2);
    assert_eq!(journal.count("nvme"), 0);
    assert_eq!(journal.count("scsi"), 0);
    assert_eq!(journal.count("ata /dev/bridge"), 1);
    assert_eq!(journal.count("close /dev/nvme0"), 1);
}

#[test]
fn settings_choice_zero_covers_every_group() {
    let smart = interface(backend());
    let all = smart.device_settings("/dev/bridge", 0);
    assert!(all.contains(
        &"ATA settings aam=true apm=true security=true lookahead=true wcache=true dsn=true used=true"
            .to_string()
    ));
    assert!(all.contains(&"SCSI /dev/bridge info=false health=false rcd=true wce=true health_opts=0".to_string()));

    let aam = smart.device_settings(SATA, 1);
    assert_eq!(
        aam[1],
        "ATA settings aam=true apm=false security=false lookahead=false wcache=false dsn=false used=true"
    );
    let rcache = smart.device_settings("/dev/bridge", 7);
    assert!(rcache.contains(&"SCSI /dev/bridge info=false health=false rcd=true wce=false health_opts=0".to_string()));
}

#[test]
fn repeated_queries_do_not_leak_output() {
    let smart = interface(backend());
    let first = smart.device_health(NVME);
    let second = smart.device_health(NVME);
    assert_eq!(first, vec!["NVMe /dev/nvme0 info=false health=true errors=0"]);
    assert_eq!(first, second);

    let identity = smart.device_identity(NVME);
    assert_eq!(identity, vec!["NVMe /dev/nvme0 info=true health=false errors=0"]);
}

#[test]
fn every_protocol_runs_in_fixed_order() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    let lines = smart.device_health("/dev/bridge");
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("ATA /dev/bridge"));
    assert!(lines[1].starts_with("ATA settings"));
    assert_eq!(lines[2], "SCSI /dev/bridge info=false health=true rcd=false wce=false health_opts=1");
    assert!(lines[3].starts_with("NVMe /dev/bridge"));

    let calls: Vec<String> = journal
        .entries()
        .into_iter()
        .filter(|e| !e.starts_with("lookup") && e != "drivedb")
        .collect();
    assert_eq!(
        calls,
        vec![
            "open /dev/bridge",
            "ata /dev/bridge",
            "scsi /dev/bridge",
            "nvme /dev/bridge",
            "close /dev/bridge",
        ]
    );
}

#[test]
fn unknown_or_unopenable_devices_yield_nothing() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    assert!(smart.device_health("").is_empty());
    assert!(journal.entries().is_empty());

    assert!(smart.device_health("/dev/sdz").is_empty());
    assert_eq!(journal.count("open"), 0);

    assert!(smart.device_health("/dev/sdb").is_empty());
    assert_eq!(journal.count("open /dev/sdb"), 1);
    assert_eq!(journal.count("close /dev/sdb"), 1);
    assert_eq!(journal.count("scsi"), 0);
}

#[test]
fn sessions_close_once_per_query() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    smart.smart_info(SATA);
    smart.info(SATA);
    assert_eq!(journal.count("open /dev/sda"), 2);
    assert_eq!(journal.count("close /dev/sda"), 2);
}

#[test]
fn drive_database_is_loaded_once() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);

    smart.device_identity(SATA);
    smart.device_health(NVME);
    smart.scan_devices("");
    assert_eq!(journal.count("drivedb"), 1);
}

#[test]
fn missing_drive_database_disables_presets() {
    let mut fake = backend();
    fake.no_drive_db = true;
    let smart = interface(fake);

    let lines = smart.device_identity(SATA);
    assert_eq!(lines[0], "ATA /dev/sda info=true presets_ignored=true health=false words=-1 bits=-1");
    assert!(smart.scan_devices("").is_empty());
}

#[test]
fn explicit_context_exposes_the_report() {
    let fake = backend();
    let journal = fake.journal.clone();
    let smart = interface(fake);
    let mut ctx = smart.context();

    let descriptor = DeviceDescriptor::new(SATA).with_type("sat");
    smart
        .run_query(&mut ctx, &descriptor, QueryKind::Identity)
        .unwrap();
    assert_eq!(ctx.report.get("model_name").and_then(|v| v.as_str()), Some(SATA));
    assert_eq!(journal.count("lookup /dev/sda Some(\"sat\")"), 1);
    assert_eq!(ctx.drain_lines().len(), 2);

    let missing = DeviceDescriptor::new("/dev/sdz");
    assert!(smart.run_query(&mut ctx, &missing, QueryKind::Health).is_err());
    assert!(ctx.report.is_empty());
}

#[test]
fn permissive_budget_is_refilled_per_call() {
    let mut fake = backend();
    fake.failing_mandatory = 2;
    let mut config = EngineConfig::default();
    config.tolerance = ToleranceMode::Permissive;
    let smart = Interface::new(fake, config);

    let expected = vec![
        "mandatory failure tolerated: true",
        "ERROR: A mandatory SMART command failed.",
        "mandatory failure tolerated: false",
    ];
    assert_eq!(smart.device_health(SATA), expected);
    assert_eq!(smart.device_health(SATA), expected);
}

#[test]
fn metadata_comes_from_the_version_text() {
    let smart = interface(backend()).with_version_source(FixedVersion);

    assert_eq!(
        smart.version(),
        "smartmon-rs 7.4 2023-08-01 r5530 [x86_64-linux-6.1] (local build)"
    );
    assert_eq!(
        smart.copyright(),
        "Copyright (C) 2002-23, Bruce Allen, Christian Franke, www.smartmontools.org"
    );
    assert_eq!(smart.license().lines().count(), 3);
    assert!(smart.license().starts_with("smartmon-rs comes with"));
    assert_eq!(
        smart.build_info(),
        "smartmontools release 7.4 dated 2023-08-01\nsmartmontools build host: x86_64-pc-linux-gnu"
    );
}

#[test]
fn builtin_version_names_this_crate() {
    let smart = interface(backend());
    assert!(smart.version().starts_with("smartmon-rs "));
    assert!(smart.copyright().starts_with("Copyright "));
    assert!(smart.build_info().starts_with("smartmon-rs release"));
}
