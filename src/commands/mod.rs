//! CLI command implementations
//!
//! Metadata commands (`list-targets`, `info`, `sections`) only read the
//! device packs or an image. The programming commands build a request,
//! plan it, and hand the plan to a sequencer driving atprogram.

mod info;
mod list;
pub mod program;
mod sections;

pub use info::cmd_info;
pub use list::{list_programmers, list_targets};
pub use sections::cmd_sections;

use crate::cli::DeviceArgs;
use crate::config::Settings;
use crate::programmers;

/// Result type shared by command implementations
pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Target, programmer and interface after applying config defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub target: String,
    pub programmer: String,
    pub interface: String,
}

impl Device {
    /// Merge command line selection over configured defaults
    ///
    /// Unknown programmer or interface names are passed through with a
    /// warning; atprogram has the final say.
    pub fn resolve(args: &DeviceArgs, settings: &Settings) -> Self {
        let target = args
            .target
            .clone()
            .unwrap_or_else(|| settings.target.clone());

        let programmer = args
            .programmer
            .clone()
            .unwrap_or_else(|| settings.programmer.clone());
        let programmer = match programmers::find_programmer(&programmer) {
            Some(info) => info.name.to_string(),
            None => {
                log::warn!("Unknown programmer '{}'", programmer);
                programmer
            }
        };

        let interface = args
            .interface
            .clone()
            .unwrap_or_else(|| settings.interface.clone());
        let interface = match programmers::find_interface(&interface) {
            Some(name) => name.to_string(),
            None => {
                log::warn!("Unknown interface '{}'", interface);
                interface
            }
        };

        Self {
            target,
            programmer,
            interface,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileConfig;

    #[test]
    fn test_resolve_uses_defaults() {
        let settings = Settings::from(FileConfig::default());
        let device = Device::resolve(&DeviceArgs::default(), &settings);
        assert_eq!(
            device,
            Device {
                target: "ATmega32U4".into(),
                programmer: "atmelice".into(),
                interface: "ISP".into(),
            }
        );
    }

    #[test]
    fn test_resolve_canonicalizes() {
        let settings = Settings::from(FileConfig::default());
        let args = DeviceArgs {
            target: Some("attiny1614".into()),
            programmer: Some("JTAGICE3".into()),
            interface: Some("updi".into()),
        };
        let device = Device::resolve(&args, &settings);
        assert_eq!(device.target, "attiny1614");
        assert_eq!(device.programmer, "jtagice3");
        assert_eq!(device.interface, "UPDI");
    }

    #[test]
    fn test_resolve_keeps_unknown() {
        let settings = Settings::from(FileConfig::default());
        let args = DeviceArgs {
            interface: Some("spi".into()),
            ..Default::default()
        };
        assert_eq!(Device::resolve(&args, &settings).interface, "spi");
    }
}
