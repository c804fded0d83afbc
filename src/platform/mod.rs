//! Operating system backends.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "linux")]
pub use self::linux::{LinuxBackend as SystemBackend, LinuxDevice as SystemDevice};

#[cfg(not(target_os = "linux"))]
mod unsupported;
#[cfg(not(target_os = "linux"))]
pub use self::unsupported::{UnsupportedBackend as SystemBackend, UnsupportedDevice as SystemDevice};
