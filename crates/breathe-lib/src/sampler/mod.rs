//! Host resource sampling
//!
//! A [`MetricSource`] produces one [`MetricSample`] per call; the
//! [`SamplingLoop`] drives it on a fixed period and pushes every sample into
//! the shared [`TimeSeriesStore`](crate::store::TimeSeriesStore).

mod host;
mod r#loop;

pub use host::HostSampler;
pub use r#loop::{SamplerConfig, SamplingLoop, SamplingLoopBuilder, DEFAULT_SAMPLE_PERIOD};

use crate::error::Result;
use crate::models::MetricSample;
use async_trait::async_trait;

/// Producer of host resource samples
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Take one sample stamped with the current time
    async fn sample(&self) -> Result<MetricSample>;
}
