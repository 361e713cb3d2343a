//! Programmer and interface vocabulary
//!
//! These are the tool types and physical interfaces atprogram accepts for
//! `-t` and `-i`. They are shown in help text and checked before anything
//! is launched; atprogram itself is the final authority.

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Name passed to `-t`
    pub name: &'static str,
    /// Short description
    pub description: &'static str,
}

/// Tool types known to atprogram
pub const PROGRAMMERS: &[ProgrammerInfo] = &[
    ProgrammerInfo {
        name: "avrdragon",
        description: "AVR Dragon",
    },
    ProgrammerInfo {
        name: "avrispmk2",
        description: "AVRISP mkII",
    },
    ProgrammerInfo {
        name: "avrone",
        description: "AVR ONE!",
    },
    ProgrammerInfo {
        name: "jtagice3",
        description: "JTAGICE3",
    },
    ProgrammerInfo {
        name: "jtagicemkii",
        description: "JTAGICE mkII",
    },
    ProgrammerInfo {
        name: "qt600",
        description: "QT600 touch development kit",
    },
    ProgrammerInfo {
        name: "stk500",
        description: "STK500 starter kit",
    },
    ProgrammerInfo {
        name: "stk600",
        description: "STK600 starter kit",
    },
    ProgrammerInfo {
        name: "samice",
        description: "SAM-ICE",
    },
    ProgrammerInfo {
        name: "edbg",
        description: "Embedded debugger on Xplained boards",
    },
    ProgrammerInfo {
        name: "medbg",
        description: "mEDBG on Xplained Mini boards",
    },
    ProgrammerInfo {
        name: "atmelice",
        description: "Atmel-ICE",
    },
    ProgrammerInfo {
        name: "powerdebugger",
        description: "Power Debugger",
    },
    ProgrammerInfo {
        name: "megadfu",
        description: "megaAVR USB DFU bootloader",
    },
    ProgrammerInfo {
        name: "flip",
        description: "FLIP compatible bootloader",
    },
];

/// Physical interfaces known to atprogram
pub const INTERFACES: &[&str] = &[
    "aWire",
    "debugWIRE",
    "HVPP",
    "HVSP",
    "ISP",
    "JTAG",
    "PDI",
    "UPDI",
    "TPI",
    "SWD",
];

/// Look up a programmer by name (case-insensitive)
pub fn find_programmer(name: &str) -> Option<&'static ProgrammerInfo> {
    PROGRAMMERS
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Canonical spelling of an interface name (case-insensitive)
pub fn find_interface(name: &str) -> Option<&'static str> {
    INTERFACES
        .iter()
        .copied()
        .find(|i| i.eq_ignore_ascii_case(name))
}

/// Comma-separated programmer names for help text
pub fn programmer_names_short() -> String {
    PROGRAMMERS
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Comma-separated interface names for help text
pub fn interface_names_short() -> String {
    INTERFACES.join(", ")
}
