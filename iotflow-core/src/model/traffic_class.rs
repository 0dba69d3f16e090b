//! Traffic classes (sub-flows)
//!
//! A traffic class is one independent, perpetually-repeating packet stream:
//! an identifier plus a payload-size generator and an inter-packet-time
//! generator. The two legacy shapes ("basic" eight-parameter and explicit
//! "distribution") are alternate constructions of the same type.

use std::sync::Arc;

use rand::rngs::SmallRng;

use crate::error::Result;
use crate::model::generator::{GeneratorSpec, RandomGenerator};

#[derive(Debug, Clone)]
pub struct TrafficClass {
    id: u16,
    payload_size: Arc<RandomGenerator>,
    inter_packet_time: Arc<RandomGenerator>,
}

impl TrafficClass {
    pub fn new(
        id: u16,
        payload_size: Arc<RandomGenerator>,
        inter_packet_time: Arc<RandomGenerator>,
    ) -> Self {
        Self { id, payload_size, inter_packet_time }
    }

    /// Legacy "basic" shape: bounded noise on both axes, from eight
    /// statistical parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn basic(
        id: u16,
        min_size: f64,
        max_size: f64,
        mean_size: f64,
        std_dev_size: f64,
        min_time: f64,
        max_time: f64,
        mean_time: f64,
        std_dev_time: f64,
    ) -> Result<Self> {
        Ok(Self::new(
            id,
            Arc::new(RandomGenerator::bounded_noise(min_size, max_size, mean_size, std_dev_size)?),
            Arc::new(RandomGenerator::bounded_noise(min_time, max_time, mean_time, std_dev_time)?),
        ))
    }

    /// Legacy "distribution" shape: explicit weighted lists for both axes.
    pub fn distribution(
        id: u16,
        payload_sizes: &[(f64, f64)],
        inter_packet_times: &[(f64, f64)],
    ) -> Result<Self> {
        Ok(Self::new(
            id,
            Arc::new(RandomGenerator::empirical(payload_sizes)?),
            Arc::new(RandomGenerator::empirical(inter_packet_times)?),
        ))
    }

    /// Generic shape: any generator spec per axis.
    pub fn from_specs(id: u16, payload_size: &GeneratorSpec, inter_packet_time: &GeneratorSpec) -> Result<Self> {
        Ok(Self::new(
            id,
            Arc::new(RandomGenerator::from_spec(payload_size)?),
            Arc::new(RandomGenerator::from_spec(inter_packet_time)?),
        ))
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// Draw the next payload size in bytes; the sample is floored to an
    /// integer and never goes below zero.
    pub fn payload_size(&self, rng: &mut SmallRng) -> u32 {
        let sample = self.payload_size.sample(rng).floor();
        if sample <= 0.0 {
            0
        } else {
            sample as u32
        }
    }

    /// Draw the next inter-packet time in seconds, floored at zero.
    pub fn inter_packet_time(&self, rng: &mut SmallRng) -> f64 {
        self.inter_packet_time.sample(rng).max(0.0)
    }

    /// The serializable parameters of both generators (payload size, then
    /// inter-packet time).
    pub fn specs(&self) -> (GeneratorSpec, GeneratorSpec) {
        (self.payload_size.spec(), self.inter_packet_time.spec())
    }
}
