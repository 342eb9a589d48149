//! `sysinfo`-backed host sampler

use super::MetricSource;
use crate::error::{ForecastError, Result};
use crate::models::MetricSample;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use sysinfo::{Networks, Pid, ProcessesToUpdate, System};

struct HostState {
    system: System,
    networks: Networks,
}

/// Samples global CPU, memory, network counters and this process's RSS
pub struct HostSampler {
    state: Mutex<HostState>,
    pid: Option<Pid>,
}

impl HostSampler {
    /// Create a sampler. The initial refresh primes CPU usage, which sysinfo
    /// reports as a delta between two refreshes.
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();
        Self {
            state: Mutex::new(HostState {
                system,
                networks: Networks::new_with_refreshed_list(),
            }),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for HostSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricSource for HostSampler {
    async fn sample(&self) -> Result<MetricSample> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ForecastError::Sampling("host sampler state poisoned".to_string()))?;
        let HostState { system, networks } = &mut *state;

        system.refresh_cpu_all();
        system.refresh_memory();
        networks.refresh(true);

        let total_memory = system.total_memory();
        if total_memory == 0 {
            return Err(ForecastError::Sampling(
                "total memory reported as zero".to_string(),
            ));
        }
        let memory_percent = (system.used_memory() as f64 / total_memory as f64 * 100.0) as f32;

        let (net_recv_bytes, net_sent_bytes) = networks
            .list()
            .values()
            .fold((0u64, 0u64), |(recv, sent), data| {
                (
                    recv.saturating_add(data.total_received()),
                    sent.saturating_add(data.total_transmitted()),
                )
            });

        let process_rss_bytes = self
            .pid
            .and_then(|pid| {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system.process(pid).map(sysinfo::Process::memory)
            })
            .unwrap_or(0);

        Ok(MetricSample {
            timestamp: Utc::now(),
            cpu_percent: system.global_cpu_usage(),
            memory_percent,
            net_sent_bytes,
            net_recv_bytes,
            process_rss_bytes,
        })
    }
}
