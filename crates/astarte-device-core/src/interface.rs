//! Interface descriptors and introspection (C3).
//!
//! An `Interface` is an immutable descriptor; `Introspection` owns the
//! device's declared set of them and answers the lookups the facade and
//! connection state machine need (by name, by concrete path, and as the
//! canonical string sent on connect).

use crate::error::{Error, Result};
use crate::value::MappingType;
use std::collections::HashMap;

/// Which side of the connection originates writes on an interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    Device,
    Server,
}

/// Whether a publish carries one value or a structured record of siblings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Aggregation {
    Individual,
    Object,
}

/// Datastream (a timestamped stream of values) or Property (retained, settable state).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceType {
    Datastream,
    Property,
}

/// MQTT delivery reliability, mapped 1:1 onto QoS levels 0/1/2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reliability {
    Unreliable,
    Guaranteed,
    Unique,
}

impl Reliability {
    pub fn qos(self) -> u8 {
        match self {
            Reliability::Unreliable => 0,
            Reliability::Guaranteed => 1,
            Reliability::Unique => 2,
        }
    }
}

/// Server-side retention policy for a mapping's values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Retention {
    Discard,
    Volatile,
    Stored,
}

/// One path (possibly parameterized with `%{param}` placeholders) within an interface.
#[derive(Clone, Debug)]
pub struct Mapping {
    pub path_pattern: String,
    pub mapping_type: MappingType,
    pub reliability: Reliability,
    pub retention: Retention,
    pub explicit_timestamp: bool,
}

impl Mapping {
    pub fn new(path_pattern: impl Into<String>, mapping_type: MappingType) -> Self {
        Mapping {
            path_pattern: path_pattern.into(),
            mapping_type,
            reliability: Reliability::Unreliable,
            retention: Retention::Discard,
            explicit_timestamp: false,
        }
    }

    pub fn with_reliability(mut self, r: Reliability) -> Self {
        self.reliability = r;
        self
    }

    pub fn with_retention(mut self, r: Retention) -> Self {
        self.retention = r;
        self
    }

    pub fn with_explicit_timestamp(mut self, v: bool) -> Self {
        self.explicit_timestamp = v;
        self
    }

    fn pattern_segments(&self) -> Vec<&str> {
        self.path_pattern.trim_start_matches('/').split('/').collect()
    }

    /// Exact match on the concrete path after placeholder substitution:
    /// each `%{k}` segment matches any single non-empty, slash-free segment.
    fn matches(&self, concrete_segments: &[&str]) -> bool {
        let pattern = self.pattern_segments();
        if pattern.len() != concrete_segments.len() {
            return false;
        }
        pattern.iter().zip(concrete_segments).all(|(p, c)| {
            if p.starts_with("%{") && p.ends_with('}') {
                !c.is_empty()
            } else {
                p == c
            }
        })
    }
}

/// An immutable interface descriptor.
#[derive(Clone, Debug)]
pub struct Interface {
    pub name: String,
    pub major_version: u32,
    pub minor_version: u32,
    pub ownership: Ownership,
    pub aggregation: Aggregation,
    pub interface_type: InterfaceType,
    pub mappings: Vec<Mapping>,
}

impl Interface {
    pub fn new(
        name: impl Into<String>,
        major_version: u32,
        minor_version: u32,
        ownership: Ownership,
        aggregation: Aggregation,
        interface_type: InterfaceType,
        mappings: Vec<Mapping>,
    ) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        if major_version == 0 && minor_version == 0 {
            return Err(Error::invalid_param(
                "interface version must not be 0.0",
            ));
        }
        for m in &mappings {
            if !m.path_pattern.starts_with('/') {
                return Err(Error::invalid_param(format!(
                    "mapping path pattern must start with '/': {}",
                    m.path_pattern
                )));
            }
        }
        Ok(Interface {
            name,
            major_version,
            minor_version,
            ownership,
            aggregation,
            interface_type,
            mappings,
        })
    }

    /// Find the mapping matching a concrete path (e.g. `/temperature`).
    ///
    /// Longest match is implied by requiring equal segment counts; on
    /// ambiguity (two equally-specific patterns matching) the
    /// first-registered mapping wins.
    pub fn get_mapping(&self, concrete_path: &str) -> Option<&Mapping> {
        let segments: Vec<&str> = concrete_path.trim_start_matches('/').split('/').collect();
        self.mappings.iter().find(|m| m.matches(&segments))
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 128 {
        return Err(Error::invalid_param("interface name must be 1-128 characters"));
    }
    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_param("interface name has an empty label"));
        }
        let bytes = label.as_bytes();
        let alnum_hyphen = |b: u8| b.is_ascii_alphanumeric() || b == b'-';
        if !bytes.iter().all(|&b| alnum_hyphen(b))
            || bytes[0] == b'-'
            || bytes[bytes.len() - 1] == b'-'
        {
            return Err(Error::invalid_param(format!(
                "interface name label '{label}' is not domain-limited ASCII"
            )));
        }
    }
    Ok(())
}

/// Validates a concrete (non-parameterized) path: must start with `/`, use
/// `/` as separator, and contain no empty segments.
pub fn validate_concrete_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        return Err(Error::invalid_param("path must begin with '/'"));
    }
    if path.split('/').skip(1).any(|seg| seg.is_empty()) {
        return Err(Error::invalid_param("path contains an empty segment"));
    }
    Ok(())
}

/// The device's self-declared set of supported interfaces.
#[derive(Clone, Debug, Default)]
pub struct Introspection {
    interfaces: HashMap<String, Interface>,
    /// Insertion order, preserved for the canonical string form.
    order: Vec<String>,
}

impl Introspection {
    pub fn init() -> Self {
        Introspection::default()
    }

    pub fn add(&mut self, iface: Interface) {
        if !self.interfaces.contains_key(&iface.name) {
            self.order.push(iface.name.clone());
        }
        self.interfaces.insert(iface.name.clone(), iface);
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    pub fn get_mapping(&self, iface_name: &str, concrete_path: &str) -> Option<&Mapping> {
        self.interfaces.get(iface_name)?.get_mapping(concrete_path)
    }

    /// `"name:major:minor;..."`, ordered by insertion; trailing `;` optional (we omit it).
    pub fn canonical_string(&self) -> String {
        self.order
            .iter()
            .filter_map(|name| self.interfaces.get(name))
            .map(|i| format!("{}:{}:{}", i.name, i.major_version, i.minor_version))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Interface> {
        self.order.iter().filter_map(move |name| self.interfaces.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temperature_iface() -> Interface {
        Interface::new(
            "org.example.Sensors",
            1,
            0,
            Ownership::Device,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![Mapping::new("/temperature", MappingType::Double)
                .with_reliability(Reliability::Guaranteed)
                .with_explicit_timestamp(true)],
        )
        .unwrap()
    }

    #[test]
    fn canonical_string_is_stable() {
        let mut intro = Introspection::init();
        intro.add(temperature_iface());
        assert_eq!(intro.canonical_string(), "org.example.Sensors:1:0");
    }

    #[test]
    fn mapping_lookup_substitutes_placeholders() {
        let iface = Interface::new(
            "org.example.Cfg",
            0,
            1,
            Ownership::Server,
            Aggregation::Individual,
            InterfaceType::Property,
            vec![Mapping::new("/%{sensor_id}/enabled", MappingType::Bool)],
        )
        .unwrap();

        assert!(iface.get_mapping("/sensor0/enabled").is_some());
        assert!(iface.get_mapping("/enabled").is_none());
    }

    #[test]
    fn rejects_oversized_or_malformed_names() {
        let long_name = "a".repeat(129);
        assert!(Interface::new(
            long_name,
            1,
            0,
            Ownership::Device,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![]
        )
        .is_err());

        assert!(Interface::new(
            "bad name!",
            1,
            0,
            Ownership::Device,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![]
        )
        .is_err());
    }

    #[test]
    fn first_registered_mapping_wins_on_ambiguity() {
        let iface = Interface::new(
            "org.example.Ambiguous",
            1,
            0,
            Ownership::Device,
            Aggregation::Individual,
            InterfaceType::Datastream,
            vec![
                Mapping::new("/%{a}", MappingType::Int32),
                Mapping::new("/fixed", MappingType::String),
            ],
        )
        .unwrap();

        // Both mappings match a one-segment path "/fixed"; the first wins.
        let m = iface.get_mapping("/fixed").unwrap();
        assert_eq!(m.mapping_type, MappingType::Int32);
    }
}
