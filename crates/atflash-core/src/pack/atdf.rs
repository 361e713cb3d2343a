//! Schema walks over device pack XML
//!
//! Both `package.content` and `.atdf` files follow a fixed, known schema.
//! Every query here is a fixed path of optional element lookups; a missing
//! node anywhere along the path ends the walk with an empty result.
//!
//! ```text
//! package/content/resources[@target]
//!
//! avr-tools-device-file/
//!   devices/device[@name]/
//!     address-spaces/address-space[@name]
//!     interfaces/interface[@name]
//!     peripherals/module/instance[@name="FUSE"]/register-group[@name-in-module]
//!   modules/module/register-group[@name]/register[@name, @caption]
//! ```

use std::fs;
use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};

use super::types::{DeviceInfo, FuseField};

/// Root element of a `package.content` file
const PACKAGE_ROOT: &str = "package";

/// Root element of an `.atdf` device descriptor
const ATDF_ROOT: &str = "avr-tools-device-file";

/// Peripheral instance name that carries the fuse register group
const FUSE_INSTANCE: &str = "FUSE";

/// Read an XML file into memory
///
/// Pack files are sometimes saved in a legacy 8-bit encoding, so invalid
/// UTF-8 is replaced rather than rejected.
pub(crate) fn read_xml(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            log::debug!("Skipping unreadable {}: {}", path.display(), e);
            None
        }
    }
}

/// Parse XML text, allowing a DTD in the prolog
pub(crate) fn parse(text: &str) -> Option<Document<'_>> {
    let mut options = ParsingOptions::default();
    options.allow_dtd = true;

    match Document::parse_with_options(text, options) {
        Ok(doc) => Some(doc),
        Err(e) => {
            log::debug!("XML parse error: {}", e);
            None
        }
    }
}

/// First child element with the given tag
fn child<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

/// All child elements with the given tag, in document order
fn children<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(move |n| n.has_tag_name(tag))
}

/// The document element, if it has the expected tag
fn root<'a, 'input>(doc: &'a Document<'input>, tag: &str) -> Option<Node<'a, 'input>> {
    let root = doc.root_element();
    root.has_tag_name(tag).then_some(root)
}

/// Targets listed in a `package.content` document
pub(crate) fn package_targets(doc: &Document<'_>) -> Vec<String> {
    let Some(content) = root(doc, PACKAGE_ROOT).and_then(|p| child(p, "content")) else {
        return Vec::new();
    };

    children(content, "resources")
        .filter_map(|r| r.attribute("target"))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// The `device` element describing `target`
fn device<'a, 'input>(doc: &'a Document<'input>, target: &str) -> Option<Node<'a, 'input>> {
    let devices = child(root(doc, ATDF_ROOT)?, "devices")?;
    children(devices, "device").find(|d| {
        d.attribute("name")
            .is_some_and(|name| name.eq_ignore_ascii_case(target))
    })
}

/// Address space names of `target`
pub(crate) fn memories(doc: &Document<'_>, target: &str) -> Vec<String> {
    let Some(spaces) = device(doc, target).and_then(|d| child(d, "address-spaces")) else {
        return Vec::new();
    };

    children(spaces, "address-space")
        .filter_map(|s| s.attribute("name"))
        .map(str::to_string)
        .collect()
}

/// Programming interface names of `target`
pub(crate) fn interfaces(doc: &Document<'_>, target: &str) -> Vec<String> {
    let Some(list) = device(doc, target).and_then(|d| child(d, "interfaces")) else {
        return Vec::new();
    };

    children(list, "interface")
        .filter_map(|i| i.attribute("name"))
        .map(str::to_string)
        .collect()
}

/// Module register group name used by the `FUSE` peripheral instance
pub(crate) fn fuse_module_name<'a>(doc: &'a Document<'_>, target: &str) -> Option<&'a str> {
    let peripherals = child(device(doc, target)?, "peripherals")?;

    children(peripherals, "module")
        .flat_map(|m| children(m, "instance"))
        .find(|i| i.attribute("name") == Some(FUSE_INSTANCE))
        .and_then(|i| child(i, "register-group"))
        .and_then(|g| g.attribute("name-in-module"))
}

/// Fuse registers of `target`, in document order
pub(crate) fn fuse_fields(doc: &Document<'_>, target: &str) -> Vec<FuseField> {
    let Some(module_name) = fuse_module_name(doc, target).filter(|n| !n.is_empty()) else {
        return Vec::new();
    };
    let Some(modules) = root(doc, ATDF_ROOT).and_then(|r| child(r, "modules")) else {
        return Vec::new();
    };

    let group = children(modules, "module")
        .flat_map(|m| children(m, "register-group"))
        .find(|g| g.attribute("name") == Some(module_name));

    match group {
        Some(group) => children(group, "register")
            .map(|r| {
                FuseField::new(
                    r.attribute("name").unwrap_or_default(),
                    r.attribute("caption").unwrap_or_default(),
                )
            })
            .collect(),
        None => Vec::new(),
    }
}

/// All device information from one descriptor document
pub(crate) fn device_info(doc: &Document<'_>, target: &str) -> Option<DeviceInfo> {
    let name = device(doc, target)?.attribute("name").unwrap_or(target);

    Some(DeviceInfo {
        name: name.to_string(),
        memories: memories(doc, target),
        interfaces: interfaces(doc, target),
        fuses: fuse_fields(doc, target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ATDF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<avr-tools-device-file schema-version="0.3">
  <devices>
    <device name="ATmega328P" architecture="AVR8" family="megaAVR">
      <address-spaces>
        <address-space name="prog" id="prog" start="0x0000" size="0x8000"/>
        <address-space name="signatures" id="signatures"/>
        <address-space name="fuses" id="fuses"/>
        <address-space name="lockbits" id="lockbits"/>
        <address-space name="data" id="data"/>
        <address-space name="eeprom" id="eeprom"/>
      </address-spaces>
      <peripherals>
        <module name="CPU">
          <instance name="CPU" caption="CPU Registers">
            <register-group name="CPU" name-in-module="CPU"/>
          </instance>
        </module>
        <module name="FUSE">
          <instance name="FUSE" caption="Fuses">
            <register-group name="FUSE" name-in-module="FUSE" offset="0x00" address-space="fuses"/>
          </instance>
        </module>
      </peripherals>
      <interfaces>
        <interface name="ISP" type="isp"/>
        <interface name="HVPP" type="hvpp"/>
        <interface name="debugWIRE" type="dw"/>
      </interfaces>
    </device>
  </devices>
  <modules>
    <module caption="Fuses" name="FUSE">
      <register-group caption="Fuses" name="FUSE">
        <register caption="" name="EXTENDED" offset="0x02" size="1"/>
        <register caption="" name="HIGH" offset="0x01" size="1"/>
        <register caption="" name="LOW" offset="0x00" size="1"/>
      </register-group>
    </module>
  </modules>
</avr-tools-device-file>
"#;

    #[test]
    fn test_memories_in_document_order() {
        let doc = parse(ATDF).unwrap();
        assert_eq!(
            memories(&doc, "ATmega328P"),
            ["prog", "signatures", "fuses", "lockbits", "data", "eeprom"]
        );
    }

    #[test]
    fn test_device_name_match_ignores_case() {
        let doc = parse(ATDF).unwrap();
        assert_eq!(interfaces(&doc, "atmega328p"), ["ISP", "HVPP", "debugWIRE"]);
    }

    #[test]
    fn test_other_device_yields_nothing() {
        let doc = parse(ATDF).unwrap();
        assert!(memories(&doc, "ATtiny85").is_empty());
        assert!(interfaces(&doc, "ATtiny85").is_empty());
        assert!(fuse_fields(&doc, "ATtiny85").is_empty());
        assert!(device_info(&doc, "ATtiny85").is_none());
    }

    #[test]
    fn test_fuse_module_resolution() {
        let doc = parse(ATDF).unwrap();
        assert_eq!(fuse_module_name(&doc, "ATmega328P"), Some("FUSE"));

        let fuses = fuse_fields(&doc, "ATmega328P");
        let names: Vec<_> = fuses.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["EXTENDED", "HIGH", "LOW"]);
    }

    #[test]
    fn test_missing_register_group_is_empty() {
        let xml = ATDF.replace(
            r#"<register-group caption="Fuses" name="FUSE">"#,
            r#"<register-group caption="Fuses" name="NVM_FUSES">"#,
        );
        let doc = parse(&xml).unwrap();
        assert!(fuse_fields(&doc, "ATmega328P").is_empty());
    }

    #[test]
    fn test_package_targets() {
        let xml = r#"<?xml version="1.0" encoding="ASCII"?>
<package>
  <content>
    <resources target="ATmega328P" type="pic"/>
    <resources type="documentation"/>
    <resources target="" type="x"/>
    <resources target="ATmega32U4"/>
  </content>
</package>"#;
        let doc = parse(xml).unwrap();
        assert_eq!(package_targets(&doc), ["ATmega328P", "ATmega32U4"]);
    }

    #[test]
    fn test_wrong_root_is_empty() {
        let doc = parse("<other><content><resources target=\"X\"/></content></other>").unwrap();
        assert!(package_targets(&doc).is_empty());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse("<package><content>").is_none());
    }
}
