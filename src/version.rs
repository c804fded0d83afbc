//! Version, copyright, license and build metadata.
//!
//! A [`VersionSource`] produces the full multi-line version text; the
//! extractors below cut the individual pieces out of it.

pub const PROGRAM_NAME: &str = env!("CARGO_PKG_NAME");

pub trait VersionSource {
    /// Multi-line version text. The first line is the banner for `program`.
    fn format_version_info(&self, program: &str, full: bool) -> String;

    /// Prefix of the build-info lines.
    fn package(&self) -> &str {
        PROGRAM_NAME
    }
}

/// Version text describing this crate build.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinVersion;

impl VersionSource for BuiltinVersion {
    fn format_version_info(&self, program: &str, full: bool) -> String {
        let version = env!("CARGO_PKG_VERSION");
        let target = format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS);
        let profile = if cfg!(debug_assertions) {
            "debug"
        } else {
            "release"
        };
        let package = self.package();

        let mut text = format!("{program} {version} [{target}] ({profile} build)\n");
        text.push_str("Copyright (C) 2002-26, the smartmontools and smartmon-rs developers\n");
        if !full {
            return text;
        }
        text.push_str(&format!(
            "\n{program} comes with ABSOLUTELY NO WARRANTY. This is free\n\
             software, and you are welcome to redistribute it under\n\
             the terms of the GNU General Public License; either version 2, or (at\n\
             your option) any later version. See https://www.gnu.org for further details.\n\n"
        ));
        text.push_str(&format!("{package} release {version}\n"));
        text.push_str(&format!("{package} build target: {target}\n"));
        text.push_str(&format!("{package} build profile: {profile}\n"));
        text.push_str(&format!(
            "{package} build features: {}\n",
            if cfg!(target_os = "linux") {
                "sg_io,nvme_ioctl"
            } else {
                "none"
            }
        ));
        text
    }
}

pub fn banner(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

pub fn copyright(text: &str) -> String {
    text.lines()
        .find(|line| line.starts_with("Copyright "))
        .unwrap_or_default()
        .to_string()
}

/// The paragraph starting at the line containing ` comes `, up to the next
/// blank line.
pub fn license(text: &str) -> String {
    text.lines()
        .skip_while(|line| !line.contains(" comes "))
        .take_while(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything from the first line starting with `package` to the end.
pub fn build_info(text: &str, package: &str) -> String {
    text.lines()
        .skip_while(|line| !line.starts_with(package))
        .collect::<Vec<_>>()
        .join("\n")
}
