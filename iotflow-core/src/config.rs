//! JSON traffic-profile loader
//!
//! Reads the `packet-classes` document format. Loading is lenient the way
//! the deployed profile files demand: a malformed class entry (or a
//! malformed point inside a distribution entry) is logged and skipped, and
//! whatever parsed cleanly becomes the profile. Only an unreadable or
//! unparsable file is an error.
//!
//! Three entry forms are recognized:
//! - `"type": "basic"` with `payload-size` / `inter-packet-times` parameter
//!   objects (min, max, mean, std-dev);
//! - `"type": "distribution"` (or `"dist"`) with `payload-sizes` /
//!   `inter-packet-times` point lists;
//! - no `type` field, with `payload-size` / `inter-packet-time` holding a
//!   tagged generator spec each.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{GeneratorSpec, TrafficClass, TrafficProfile};

#[derive(Debug, Deserialize)]
struct ProfileDoc {
    #[serde(rename = "packet-classes")]
    packet_classes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct StatParams {
    min: f64,
    max: f64,
    mean: f64,
    #[serde(rename = "std-dev")]
    std_dev: f64,
}

#[derive(Debug, Deserialize)]
struct BasicEntry {
    id: u16,
    #[serde(rename = "payload-size")]
    payload_size: StatParams,
    #[serde(rename = "inter-packet-times")]
    inter_packet_times: StatParams,
}

/// One point of a payload-size distribution. The weight key is spelled
/// `prabability` in the deployed files; the corrected spelling is accepted
/// too.
#[derive(Debug, Deserialize)]
struct SizePoint {
    size: f64,
    #[serde(alias = "probability", alias = "prabability")]
    weight: f64,
}

#[derive(Debug, Deserialize)]
struct TimePoint {
    time: f64,
    #[serde(alias = "probability", alias = "prabability")]
    weight: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct GenericEntry {
    id: u16,
    #[serde(rename = "payload-size")]
    payload_size: GeneratorSpec,
    #[serde(rename = "inter-packet-time")]
    inter_packet_time: GeneratorSpec,
}

/// Load a traffic profile from a JSON string.
pub fn load_profile_str(text: &str) -> Result<TrafficProfile> {
    let doc: ProfileDoc = serde_json::from_str(text)
        .map_err(|e| Error::Config(format!("profile document is not valid: {e}")))?;

    let mut profile = TrafficProfile::new();
    for (idx, entry) in doc.packet_classes.into_iter().enumerate() {
        match parse_entry(&entry) {
            Ok(class) => {
                tracing::info!(id = class.id(), "packet class loaded");
                profile.push(Arc::new(class));
            }
            Err(e) => {
                tracing::warn!(index = idx, error = %e, "skipping malformed packet class");
            }
        }
    }
    Ok(profile)
}

/// Load a traffic profile from a JSON file.
pub fn load_profile_file<P: AsRef<Path>>(path: P) -> Result<TrafficProfile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    load_profile_str(&text)
}

/// Serialize a profile back to the document format, using the generic entry
/// form. `load_profile_str` on the output reproduces the same generators.
pub fn dump_profile(profile: &TrafficProfile) -> Result<String> {
    let entries: Vec<GenericEntry> = profile
        .iter()
        .map(|class| {
            let (payload_size, inter_packet_time) = class.specs();
            GenericEntry { id: class.id(), payload_size, inter_packet_time }
        })
        .collect();
    let doc = serde_json::json!({ "packet-classes": entries });
    serde_json::to_string_pretty(&doc)
        .map_err(|e| Error::Config(format!("cannot serialize profile: {e}")))
}

fn parse_entry(entry: &Value) -> Result<TrafficClass> {
    match entry.get("type") {
        None => {
            let generic: GenericEntry = serde_json::from_value(entry.clone())
                .map_err(|e| Error::Config(format!("bad generic entry: {e}")))?;
            TrafficClass::from_specs(generic.id, &generic.payload_size, &generic.inter_packet_time)
        }
        Some(Value::String(kind)) => {
            let id = entry
                .get("id")
                .and_then(Value::as_u64)
                .filter(|id| *id <= u16::MAX as u64)
                .ok_or_else(|| Error::Config("entry has no usable 'id' field".to_string()))?
                as u16;
            match kind.as_str() {
                "basic" => parse_basic(entry),
                "distribution" | "dist" => parse_distribution(id, entry),
                other => Err(Error::Config(format!("unknown packet class type '{other}'"))),
            }
        }
        Some(_) => Err(Error::Config("'type' field is not a string".to_string())),
    }
}

fn parse_basic(entry: &Value) -> Result<TrafficClass> {
    let basic: BasicEntry = serde_json::from_value(entry.clone())
        .map_err(|e| Error::Config(format!("bad basic entry: {e}")))?;
    let s = basic.payload_size;
    let t = basic.inter_packet_times;
    TrafficClass::basic(
        basic.id, s.min, s.max, s.mean, s.std_dev, t.min, t.max, t.mean, t.std_dev,
    )
}

fn parse_distribution(id: u16, entry: &Value) -> Result<TrafficClass> {
    let sizes = point_array(entry, "payload-sizes")?;
    let times = point_array(entry, "inter-packet-times")?;

    // a malformed point skips that point, not the entry
    let mut size_pairs = Vec::new();
    for point in sizes {
        match serde_json::from_value::<SizePoint>(point.clone()) {
            Ok(p) => size_pairs.push((p.size, p.weight)),
            Err(e) => tracing::warn!(class_id = id, error = %e, "skipping payload-size point"),
        }
    }
    let mut time_pairs = Vec::new();
    for point in times {
        match serde_json::from_value::<TimePoint>(point.clone()) {
            Ok(p) => time_pairs.push((p.time, p.weight)),
            Err(e) => tracing::warn!(class_id = id, error = %e, "skipping inter-packet-time point"),
        }
    }

    TrafficClass::distribution(id, &size_pairs, &time_pairs)
}

fn point_array<'a>(entry: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    entry
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Config(format!("distribution entry has no '{key}' array")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_basic_entry() {
        let doc = r#"{
            "packet-classes": [
                {
                    "type": "basic",
                    "id": 1,
                    "payload-size": { "min": 100, "max": 1400, "mean": 900, "std-dev": 200 },
                    "inter-packet-times": { "min": 0.01, "max": 0.2, "mean": 0.05, "std-dev": 0.02 }
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.classes()[0].id(), 1);
    }

    #[test]
    fn test_load_distribution_entry_with_misspelled_weight() {
        let doc = r#"{
            "packet-classes": [
                {
                    "type": "distribution",
                    "id": 7,
                    "payload-sizes": [
                        { "size": 1448, "prabability": 0.8 },
                        { "size": 52, "prabability": 0.2 }
                    ],
                    "inter-packet-times": [
                        { "time": 0.033, "probability": 1.0 }
                    ]
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.classes()[0].id(), 7);
    }

    #[test]
    fn test_load_generic_entry() {
        let doc = r#"{
            "packet-classes": [
                {
                    "id": 3,
                    "payload-size": { "type": "normal", "min": 100, "max": 1400, "mean": 800, "std-dev": 150 },
                    "inter-packet-time": { "type": "rv", "min": 0.01, "max": 0.1, "mean": 0.04, "std-dev": 0.01 }
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.classes()[0].id(), 3);
    }

    #[test]
    fn test_malformed_entry_skipped_not_fatal() {
        let doc = r#"{
            "packet-classes": [
                { "type": "basic", "id": 1 },
                { "type": "teleport", "id": 2 },
                { "id": "not-a-number" },
                {
                    "type": "basic",
                    "id": 4,
                    "payload-size": { "min": 10, "max": 20, "mean": 15, "std-dev": 1 },
                    "inter-packet-times": { "min": 1, "max": 1, "mean": 1, "std-dev": 0 }
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        assert_eq!(profile.len(), 1);
        assert_eq!(profile.classes()[0].id(), 4);
    }

    #[test]
    fn test_malformed_point_skipped_inside_entry() {
        let doc = r#"{
            "packet-classes": [
                {
                    "type": "dist",
                    "id": 5,
                    "payload-sizes": [
                        { "size": 100, "prabability": 1.0 },
                        { "size": 200 }
                    ],
                    "inter-packet-times": [
                        { "time": 0.5, "prabability": 1.0 }
                    ]
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        assert_eq!(profile.len(), 1);
    }

    #[test]
    fn test_invalid_document_is_an_error() {
        assert!(load_profile_str("not json").is_err());
        assert!(load_profile_str(r#"{ "packet-classes": 5 }"#).is_err());
    }

    #[test]
    fn test_dump_then_load_round_trips() {
        let doc = r#"{
            "packet-classes": [
                {
                    "id": 3,
                    "payload-size": { "type": "normal", "min": 100, "max": 1400, "mean": 800, "std-dev": 150 },
                    "inter-packet-time": { "type": "dist", "values": [
                        { "value": 0.02, "weight": 3.0 },
                        { "value": 0.08, "weight": 1.0 }
                    ] }
                }
            ]
        }"#;
        let profile = load_profile_str(doc).unwrap();
        let dumped = dump_profile(&profile).unwrap();
        let reloaded = load_profile_str(&dumped).unwrap();

        assert_eq!(reloaded.len(), profile.len());
        for (a, b) in profile.iter().zip(reloaded.iter()) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.specs(), b.specs());
        }
    }

    #[test]
    fn test_empty_class_list_is_a_legal_profile() {
        let profile = load_profile_str(r#"{ "packet-classes": [] }"#).unwrap();
        assert!(profile.is_empty());
    }
}
