//! Line-oriented command grammar read from stdin (§4.7).
//!
//! `<command> <interface> [path] [json-payload]`, one per line. The nine
//! commands: four `expect_*` assertions against what the device under
//! test sends, four `send_*` actions the harness performs toward the
//! device, and a bare `disconnect`.

use astarte_device_core::{Error as CoreError, Introspection, MappingType, ObjectEntry, TypedValue};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("empty command line")]
    Empty,
    #[error("unknown command \"{0}\"")]
    UnknownCommand(String),
    #[error("command \"{0}\" expects {1} arguments")]
    WrongArity(String, &'static str),
    #[error("unknown interface \"{0}\"")]
    UnknownInterface(String),
    #[error("unknown mapping for {0}{1}")]
    UnknownMapping(String, String),
    #[error("invalid json payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Value(#[from] CoreError),
}

#[derive(Debug, Clone)]
pub enum Command {
    ExpectIndividual { interface: String, path: String, value: TypedValue },
    ExpectObject { interface: String, entries: Vec<ObjectEntry> },
    ExpectPropertySet { interface: String, path: String, value: TypedValue },
    ExpectPropertyUnset { interface: String, path: String },
    SendIndividual { interface: String, path: String, value: TypedValue },
    SendObject { interface: String, entries: Vec<ObjectEntry> },
    SendPropertySet { interface: String, path: String, value: TypedValue },
    SendPropertyUnset { interface: String, path: String },
    Disconnect,
}

pub fn parse_line(line: &str, introspection: &Introspection) -> Result<Command, CommandError> {
    let line = line.trim();
    let mut parts = line.splitn(4, ' ');
    let keyword = parts.next().filter(|s| !s.is_empty()).ok_or(CommandError::Empty)?;

    if keyword == "disconnect" {
        return Ok(Command::Disconnect);
    }

    let interface = parts.next().ok_or_else(|| {
        CommandError::WrongArity(keyword.to_string(), "<interface> [path] [json]")
    })?;

    match keyword {
        "expect_property_unset" | "send_property_unset" => {
            let path = parts
                .next()
                .ok_or_else(|| CommandError::WrongArity(keyword.to_string(), "<interface> <path>"))?;
            let (interface, path) = (interface.to_string(), path.to_string());
            Ok(match keyword {
                "expect_property_unset" => Command::ExpectPropertyUnset { interface, path },
                _ => Command::SendPropertyUnset { interface, path },
            })
        }
        "expect_object" | "send_object" => {
            let rest = parts.next().ok_or_else(|| {
                CommandError::WrongArity(keyword.to_string(), "<interface> <json-object>")
            })?;
            let entries = parse_object_entries(interface, rest, introspection)?;
            Ok(match keyword {
                "expect_object" => Command::ExpectObject { interface: interface.to_string(), entries },
                _ => Command::SendObject { interface: interface.to_string(), entries },
            })
        }
        "expect_individual" | "send_individual" | "expect_property_set" | "send_property_set" => {
            let path = parts
                .next()
                .ok_or_else(|| CommandError::WrongArity(keyword.to_string(), "<interface> <path> <json>"))?;
            let json = parts
                .next()
                .ok_or_else(|| CommandError::WrongArity(keyword.to_string(), "<interface> <path> <json>"))?;
            let value = parse_scalar_value(interface, path, json, introspection)?;
            let (interface, path) = (interface.to_string(), path.to_string());
            Ok(match keyword {
                "expect_individual" => Command::ExpectIndividual { interface, path, value },
                "send_individual" => Command::SendIndividual { interface, path, value },
                "expect_property_set" => Command::ExpectPropertySet { interface, path, value },
                _ => Command::SendPropertySet { interface, path, value },
            })
        }
        other => Err(CommandError::UnknownCommand(other.to_string())),
    }
}

fn mapping_type_for(interface: &str, path: &str, introspection: &Introspection) -> Result<MappingType, CommandError> {
    let iface = introspection
        .get_by_name(interface)
        .ok_or_else(|| CommandError::UnknownInterface(interface.to_string()))?;
    iface
        .get_mapping(path)
        .map(|m| m.mapping_type)
        .ok_or_else(|| CommandError::UnknownMapping(interface.to_string(), path.to_string()))
}

fn parse_scalar_value(
    interface: &str,
    path: &str,
    json: &str,
    introspection: &Introspection,
) -> Result<TypedValue, CommandError> {
    let mapping_type = mapping_type_for(interface, path, introspection)?;
    let json: serde_json::Value = serde_json::from_str(json)?;
    Ok(json_to_typed(&json, mapping_type)?)
}

fn parse_object_entries(
    interface: &str,
    json: &str,
    introspection: &Introspection,
) -> Result<Vec<ObjectEntry>, CommandError> {
    let iface = introspection
        .get_by_name(interface)
        .ok_or_else(|| CommandError::UnknownInterface(interface.to_string()))?;
    let obj: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
    let mut entries = Vec::with_capacity(obj.len());
    for (key, v) in obj {
        let path = format!("/{key}");
        let mapping_type = iface
            .get_mapping(&path)
            .map(|m| m.mapping_type)
            .ok_or_else(|| CommandError::UnknownMapping(interface.to_string(), path.clone()))?;
        let value = json_to_typed(&v, mapping_type)?;
        entries.push(ObjectEntry::new(path, value));
    }
    Ok(entries)
}

fn json_to_typed(json: &serde_json::Value, mapping_type: MappingType) -> Result<TypedValue, CoreError> {
    use serde_json::Value;
    let invalid = || CoreError::invalid_param(format!("json value does not fit mapping type {mapping_type}"));
    Ok(match mapping_type {
        MappingType::Bool => TypedValue::from_bool(json.as_bool().ok_or_else(invalid)?),
        MappingType::DateTime => TypedValue::from_datetime(json.as_i64().ok_or_else(invalid)?),
        MappingType::Double => TypedValue::from_double(json.as_f64().ok_or_else(invalid)?),
        MappingType::Int32 => TypedValue::from_int32(json.as_i64().ok_or_else(invalid)? as i32),
        MappingType::Int64 => TypedValue::from_int64(json.as_i64().ok_or_else(invalid)?),
        MappingType::String => TypedValue::from_string(json.as_str().ok_or_else(invalid)?.to_string()),
        MappingType::Binary => {
            let arr = json.as_array().ok_or_else(invalid)?;
            let bytes = arr
                .iter()
                .map(|v| v.as_u64().map(|n| n as u8).ok_or_else(invalid))
                .collect::<Result<Vec<u8>, _>>()?;
            TypedValue::from_binary(bytes)
        }
        MappingType::BoolArray => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_bool_array(arr.iter().map(|v| v.as_bool().ok_or_else(invalid)).collect::<Result<_, _>>()?)
        }
        MappingType::DateTimeArray => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_datetime_array(arr.iter().map(|v| v.as_i64().ok_or_else(invalid)).collect::<Result<_, _>>()?)
        }
        MappingType::DoubleArray => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_double_array(arr.iter().map(|v| v.as_f64().ok_or_else(invalid)).collect::<Result<_, _>>()?)
        }
        MappingType::Int32Array => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_int32_array(arr.iter().map(|v| v.as_i64().map(|n| n as i32).ok_or_else(invalid)).collect::<Result<_, _>>()?)
        }
        MappingType::Int64Array => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_int64_array(arr.iter().map(|v| v.as_i64().ok_or_else(invalid)).collect::<Result<_, _>>()?)
        }
        MappingType::StringArray => {
            let arr = as_array(json, &invalid)?;
            TypedValue::from_string_array(
                arr.iter()
                    .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
                    .collect::<Result<_, _>>()?,
            )
        }
        MappingType::BinaryArray => {
            let arr = as_array(json, &invalid)?;
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                let inner = v.as_array().ok_or_else(invalid)?;
                out.push(
                    inner
                        .iter()
                        .map(|b| b.as_u64().map(|n| n as u8).ok_or_else(invalid))
                        .collect::<Result<Vec<u8>, _>>()?,
                );
            }
            TypedValue::from_binary_array(out)
        }
    })
}

fn as_array<'a>(
    json: &'a serde_json::Value,
    invalid: &impl Fn() -> CoreError,
) -> Result<&'a Vec<serde_json::Value>, CoreError> {
    json.as_array().ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use astarte_device_core::{Aggregation, Interface, InterfaceType, Mapping, Ownership};

    fn introspection() -> Introspection {
        let mut intro = Introspection::init();
        intro.add(
            Interface::new(
                "org.example.Sensors",
                1,
                0,
                Ownership::Device,
                Aggregation::Individual,
                InterfaceType::Datastream,
                vec![Mapping::new("/temperature", MappingType::Double)],
            )
            .unwrap(),
        );
        intro
    }

    #[test]
    fn parses_expect_individual() {
        let intro = introspection();
        let cmd = parse_line("expect_individual org.example.Sensors /temperature 21.5", &intro).unwrap();
        match cmd {
            Command::ExpectIndividual { interface, path, value } => {
                assert_eq!(interface, "org.example.Sensors");
                assert_eq!(path, "/temperature");
                assert_eq!(value, TypedValue::from_double(21.5));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_interface() {
        let intro = introspection();
        let err = parse_line("expect_individual org.example.Nope /x 1", &intro).unwrap_err();
        assert!(matches!(err, CommandError::UnknownInterface(_)));
    }

    #[test]
    fn parses_disconnect_with_no_args() {
        let intro = introspection();
        assert!(matches!(parse_line("disconnect", &intro).unwrap(), Command::Disconnect));
    }
}
