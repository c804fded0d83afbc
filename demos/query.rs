use smartmon::get_interface;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: query <version|scan|scan-open|identity|identify N|settings N|smart|info|health> [device]";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let smart = get_interface();
    if !smart.is_valid() {
        eprintln!("[ERROR] SMART interface unavailable: {:?}", smart.status());
        eprintln!("NOTE: device queries are only supported on Linux.");
        std::process::exit(1);
    }

    let device = |at: usize| args.get(at).map(String::as_str).unwrap_or("");
    let choice = |at: usize| args.get(at).and_then(|c| c.parse::<i32>().ok()).unwrap_or(-1);

    let lines = match command.as_str() {
        "version" => vec![
            smart.version(),
            smart.copyright(),
            smart.license(),
            smart.build_info(),
        ],
        "scan" => smart.scan_devices(&args[1..].join(" ")),
        "scan-open" => smart.scan_devices_open(&args[1..].join(" ")),
        "identity" => smart.device_identity(device(1)),
        "identify" => smart.identify_device(device(2), choice(1)),
        "settings" => smart.device_settings(device(2), choice(1)),
        "smart" => smart.smart_info(device(1)),
        "info" => smart.info(device(1)),
        "health" => smart.device_health(device(1)),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if lines.is_empty() {
        println!("(no output; check the device path and that you are running as root)");
    }
    for line in lines {
        println!("{line}");
    }
}
