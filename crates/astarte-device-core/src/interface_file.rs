//! Loads interface descriptors from Astarte's standard JSON interface
//! file shape into an `Interface`. Shared by both binaries in the
//! workspace so a device daemon and the verification harness agree on
//! what "the interfaces directory" means.

use crate::error::{Error, Result};
use crate::interface::{Aggregation, Interface, InterfaceType, Mapping, Ownership, Reliability, Retention};
use crate::value::MappingType;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct InterfaceFile {
    interface_name: String,
    version_major: u32,
    version_minor: u32,
    #[serde(rename = "type")]
    interface_type: String,
    ownership: String,
    #[serde(default)]
    aggregation: Option<String>,
    mappings: Vec<MappingFile>,
}

#[derive(Deserialize)]
struct MappingFile {
    endpoint: String,
    #[serde(rename = "type")]
    mapping_type: String,
    #[serde(default)]
    reliability: Option<String>,
    #[serde(default)]
    retention: Option<String>,
    #[serde(default)]
    explicit_timestamp: bool,
}

pub fn load_interface_file(path: impl AsRef<Path>) -> Result<Interface> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::InterfaceFile(format!("{}: {e}", path.display())))?;
    let parsed: InterfaceFile =
        serde_json::from_str(&text).map_err(|e| Error::InterfaceFile(format!("{}: {e}", path.display())))?;

    let interface_type = match parsed.interface_type.as_str() {
        "datastream" => InterfaceType::Datastream,
        "properties" => InterfaceType::Property,
        other => return Err(Error::InterfaceFile(format!("unknown interface type \"{other}\""))),
    };
    let ownership = match parsed.ownership.as_str() {
        "device" => Ownership::Device,
        "server" => Ownership::Server,
        other => return Err(Error::InterfaceFile(format!("unknown ownership \"{other}\""))),
    };
    let aggregation = match parsed.aggregation.as_deref() {
        Some("object") => Aggregation::Object,
        _ => Aggregation::Individual,
    };

    let mappings = parsed
        .mappings
        .into_iter()
        .map(|m| -> Result<Mapping> {
            let mapping_type = mapping_type_from_str(&m.mapping_type)?;
            let mut mapping = Mapping::new(m.endpoint, mapping_type).with_explicit_timestamp(m.explicit_timestamp);
            if let Some(r) = m.reliability.as_deref() {
                mapping = mapping.with_reliability(match r {
                    "unreliable" => Reliability::Unreliable,
                    "guaranteed" => Reliability::Guaranteed,
                    "unique" => Reliability::Unique,
                    other => return Err(Error::InterfaceFile(format!("unknown reliability \"{other}\""))),
                });
            }
            if let Some(r) = m.retention.as_deref() {
                mapping = mapping.with_retention(match r {
                    "discard" => Retention::Discard,
                    "volatile" => Retention::Volatile,
                    "stored" => Retention::Stored,
                    other => return Err(Error::InterfaceFile(format!("unknown retention \"{other}\""))),
                });
            }
            Ok(mapping)
        })
        .collect::<Result<Vec<_>>>()?;

    Interface::new(
        parsed.interface_name,
        parsed.version_major,
        parsed.version_minor,
        ownership,
        aggregation,
        interface_type,
        mappings,
    )
}

pub fn mapping_type_from_str(s: &str) -> Result<MappingType> {
    Ok(match s {
        "boolean" => MappingType::Bool,
        "datetime" => MappingType::DateTime,
        "double" => MappingType::Double,
        "integer" => MappingType::Int32,
        "longinteger" => MappingType::Int64,
        "string" => MappingType::String,
        "binaryblob" => MappingType::Binary,
        "booleanarray" => MappingType::BoolArray,
        "datetimearray" => MappingType::DateTimeArray,
        "doublearray" => MappingType::DoubleArray,
        "integerarray" => MappingType::Int32Array,
        "longintegerarray" => MappingType::Int64Array,
        "stringarray" => MappingType::StringArray,
        "binaryblobarray" => MappingType::BinaryArray,
        other => return Err(Error::InterfaceFile(format!("unknown mapping type \"{other}\""))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_simple_individual_interface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.example.Sensors.json");
        std::fs::write(
            &path,
            r#"{
                "interface_name": "org.example.Sensors",
                "version_major": 1,
                "version_minor": 0,
                "type": "datastream",
                "ownership": "device",
                "mappings": [
                    {"endpoint": "/temperature", "type": "double"}
                ]
            }"#,
        )
        .unwrap();

        let iface = load_interface_file(&path).unwrap();
        assert_eq!(iface.name, "org.example.Sensors");
        assert_eq!(iface.aggregation, Aggregation::Individual);
    }

    #[test]
    fn rejects_unknown_mapping_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(
            &path,
            r#"{
                "interface_name": "org.example.Bad",
                "version_major": 1,
                "version_minor": 0,
                "type": "datastream",
                "ownership": "device",
                "mappings": [{"endpoint": "/x", "type": "nope"}]
            }"#,
        )
        .unwrap();

        assert!(load_interface_file(&path).is_err());
    }
}
