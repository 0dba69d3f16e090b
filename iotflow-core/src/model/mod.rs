//! Traffic model: random generators, traffic classes, profiles
//!
//! A traffic class pairs a payload-size generator with an inter-packet-time
//! generator under an identifier; a profile is the ordered set of classes a
//! connection streams concurrently.

pub mod generator;
pub mod profile;
pub mod traffic_class;

pub use generator::{GeneratorSpec, RandomGenerator, WeightedValue};
pub use profile::TrafficProfile;
pub use traffic_class::TrafficClass;
