use thiserror::Error;

/// Errors raised inside backends, printers and configuration loading.
///
/// None of these cross the public query boundary: the facade turns every
/// `Err` into an empty result.
#[derive(Debug, Error)]
pub enum SmartError {
    #[error("I/O Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ioctl Error: {0}")]
    Ioctl(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    #[error("Unable to open {name}: {reason}")]
    OpenFailed { name: String, reason: String },
    #[error("SMART interface unavailable: {0}")]
    Unavailable(String),
    #[error("The device or its protocol is not supported by this backend")]
    UnsupportedDevice,
    #[error("Unknown device type '{0}'")]
    UnknownDeviceType(String),
    #[error("Failed to parse device data: {0}")]
    Parsing(String),
    #[error("Choice {choice} is outside 0..={max}")]
    InvalidChoice { choice: i32, max: i32 },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{command} failed: {reason}")]
    CommandFailed { command: &'static str, reason: String },
}

#[cfg(target_os = "linux")]
impl From<nix::Error> for SmartError {
    fn from(err: nix::Error) -> Self {
        SmartError::Ioctl(err.to_string())
    }
}

impl SmartError {
    pub(crate) fn command(command: &'static str, reason: impl Into<String>) -> Self {
        SmartError::CommandFailed {
            command,
            reason: reason.into(),
        }
    }
}
