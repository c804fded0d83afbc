//! Command-failure tolerance.

use serde::{Deserialize, Serialize};

use crate::sink::Sink;

/// How a failing sub-command is classified by the printer that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandClass {
    /// Failure only loses an optional section of output.
    Optional,
    /// Failure makes the rest of the protocol printer meaningless.
    Mandatory,
}

/// Configured tolerance level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToleranceMode {
    #[default]
    Normal,
    Conservative,
    Permissive,
    VeryPermissive,
}

impl ToleranceMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "conservative" => Some(Self::Conservative),
            "permissive" => Some(Self::Permissive),
            "verypermissive" => Some(Self::VeryPermissive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tolerance {
    permissive: u8,
    conservative: bool,
}

impl Tolerance {
    pub fn new(permissive: u8, conservative: bool) -> Self {
        Self {
            permissive,
            conservative,
        }
    }

    pub fn from_mode(mode: ToleranceMode) -> Self {
        match mode {
            ToleranceMode::Normal => Self::new(0, false),
            ToleranceMode::Conservative => Self::new(0, true),
            ToleranceMode::Permissive => Self::new(1, false),
            ToleranceMode::VeryPermissive => Self::new(u8::MAX, false),
        }
    }

    pub fn permissive(&self) -> u8 {
        self.permissive
    }

    pub fn conservative(&self) -> bool {
        self.conservative
    }

    /// Decides whether the caller may carry on after a failed command.
    ///
    /// A zero permissive budget never tolerates a mandatory failure; the
    /// budget saturates at zero.
    pub fn allow(&mut self, class: CommandClass, sink: &mut Sink) -> bool {
        match class {
            CommandClass::Optional => {
                if !self.conservative {
                    return true;
                }
                sink.error(format_args!("An optional SMART command failed\n"));
                false
            }
            CommandClass::Mandatory => {
                if self.permissive > 0 {
                    self.permissive -= 1;
                    return true;
                }
                sink.error(format_args!("ERROR: A mandatory SMART command failed.\n"));
                false
            }
        }
    }
}
