use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::time::timeout;
use tracing::debug;

use crate::bus::EventBus;
use crate::channels::{AdapterHealth, ChannelRegistry};
use crate::model::ChannelType;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    /// A dependency that should be up is not. Degrades the composite verdict.
    Error,
    /// Not configured (or informational-only, like the AI service). Never
    /// degrades.
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub state: CheckState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl CheckResult {
    fn ok() -> Self {
        Self {
            state: CheckState::Ok,
            detail: None,
        }
    }

    fn error(detail: impl Into<String>) -> Self {
        Self {
            state: CheckState::Error,
            detail: Some(detail.into()),
        }
    }

    fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            state: CheckState::Unavailable,
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

/// Composite verdict over all downstream dependencies.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub checks: BTreeMap<String, CheckResult>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == OverallStatus::Healthy
    }
}

/// Three-tier health: deep composite check (should traffic route here at
/// all), shallow readiness (is the backbone reachable), trivial liveness
/// (should the process be restarted). Probes run concurrently, each under
/// its own timeout so one hung vendor cannot make the gateway appear dead.
pub struct HealthAggregator {
    bus: Arc<EventBus>,
    registry: Arc<ChannelRegistry>,
    ai_service_url: Option<String>,
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(
        bus: Arc<EventBus>,
        registry: Arc<ChannelRegistry>,
        ai_service_url: Option<String>,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            registry,
            ai_service_url: ai_service_url.filter(|u| !u.is_empty()),
            client: reqwest::Client::new(),
            probe_timeout,
        }
    }

    async fn probe_bus(&self) -> CheckResult {
        match timeout(self.probe_timeout, self.bus.ping()).await {
            Ok(Ok(())) => CheckResult::ok(),
            Ok(Err(e)) => CheckResult::error(format!("event bus ping failed: {}", e)),
            Err(_) => CheckResult::error("event bus ping timed out"),
        }
    }

    async fn probe_adapter(&self, channel: ChannelType) -> CheckResult {
        match timeout(self.probe_timeout, self.registry.health(channel)).await {
            Ok(AdapterHealth::Healthy) => CheckResult::ok(),
            Ok(AdapterHealth::Unconfigured) => CheckResult::unavailable("not configured"),
            Ok(AdapterHealth::Failed(reason)) => CheckResult::error(reason),
            Err(_) => CheckResult::error(format!("{} health probe timed out", channel)),
        }
    }

    /// AI service availability is informational only: unconfigured or
    /// unreachable both report `unavailable` and never degrade.
    async fn probe_ai(&self) -> CheckResult {
        let Some(url) = self.ai_service_url.as_deref() else {
            return CheckResult::unavailable("not configured");
        };
        let probe = self.client.get(format!("{}/health", url.trim_end_matches('/'))).send();
        match timeout(self.probe_timeout, probe).await {
            Ok(Ok(response)) if response.status().is_success() => CheckResult::ok(),
            Ok(Ok(response)) => {
                CheckResult::unavailable(format!("AI service returned {}", response.status()))
            }
            Ok(Err(e)) => CheckResult::unavailable(format!("AI service unreachable: {}", e)),
            Err(_) => CheckResult::unavailable("AI service probe timed out"),
        }
    }

    /// Probe everything concurrently and aggregate: degraded iff at least one
    /// check errored.
    pub async fn composite(&self) -> HealthReport {
        let bus = self.probe_bus();
        let ai = self.probe_ai();
        let adapters = join_all(
            ChannelType::ALL
                .iter()
                .map(|&channel| async move { (channel, self.probe_adapter(channel).await) }),
        );

        let (bus_result, ai_result, adapter_results) = tokio::join!(bus, ai, adapters);

        let mut checks = BTreeMap::new();
        checks.insert("eventBus".to_string(), bus_result);
        checks.insert("ai".to_string(), ai_result);
        for (channel, result) in adapter_results {
            checks.insert(channel.as_str().to_string(), result);
        }

        let degraded = checks.values().any(|c| c.state == CheckState::Error);
        let report = HealthReport {
            status: if degraded {
                OverallStatus::Degraded
            } else {
                OverallStatus::Healthy
            },
            timestamp: Utc::now(),
            checks,
        };
        debug!("composite health: {:?}", report.status);
        report
    }

    /// Shallow readiness: the backbone answers, nothing else is consulted.
    /// Cheap enough for orchestrator gating.
    pub async fn ready(&self) -> bool {
        matches!(self.probe_bus().await.state, CheckState::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusTransport, MemoryTransport};
    use crate::channels::{ChannelAdapter, SendReceipt, SendRequest};
    use anyhow::Result;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct DeadTransport;

    #[async_trait]
    impl BusTransport for DeadTransport {
        async fn publish(&self, _channel: &str, _payload: &[u8]) -> Result<()> {
            anyhow::bail!("refused")
        }
        async fn ping(&self) -> Result<()> {
            anyhow::bail!("refused")
        }
        async fn subscribe(&self, _channel: &str) -> Result<mpsc::UnboundedReceiver<Vec<u8>>> {
            anyhow::bail!("refused")
        }
        async fn close(&self) {}
    }

    struct FixedAdapter {
        channel: ChannelType,
        health: AdapterHealth,
    }

    #[async_trait]
    impl ChannelAdapter for FixedAdapter {
        fn channel_type(&self) -> ChannelType {
            self.channel
        }
        async fn send(&self, _request: &SendRequest) -> Result<SendReceipt> {
            anyhow::bail!("not under test")
        }
        async fn health(&self) -> AdapterHealth {
            self.health.clone()
        }
    }

    struct HungAdapter;

    #[async_trait]
    impl ChannelAdapter for HungAdapter {
        fn channel_type(&self) -> ChannelType {
            ChannelType::WhatsApp
        }
        async fn send(&self, _request: &SendRequest) -> Result<SendReceipt> {
            anyhow::bail!("not under test")
        }
        async fn health(&self) -> AdapterHealth {
            tokio::time::sleep(Duration::from_secs(60)).await;
            AdapterHealth::Healthy
        }
    }

    fn aggregator(
        transport: Arc<dyn BusTransport>,
        registry: ChannelRegistry,
        probe_timeout: Duration,
    ) -> HealthAggregator {
        HealthAggregator::new(
            Arc::new(EventBus::new(transport)),
            Arc::new(registry),
            None,
            probe_timeout,
        )
    }

    #[tokio::test]
    async fn bus_failure_degrades_despite_healthy_adapters() {
        let mut registry = ChannelRegistry::new();
        for channel in ChannelType::ALL {
            registry.register(Arc::new(FixedAdapter {
                channel,
                health: AdapterHealth::Healthy,
            }));
        }
        let agg = aggregator(Arc::new(DeadTransport), registry, DEFAULT_PROBE_TIMEOUT);
        let report = agg.composite().await;
        assert_eq!(report.status, OverallStatus::Degraded);
        assert_eq!(report.checks["eventBus"].state, CheckState::Error);
        assert_eq!(report.checks["telegram"].state, CheckState::Ok);
    }

    #[tokio::test]
    async fn unconfigured_adapter_does_not_degrade() {
        let registry = ChannelRegistry::new(); // nothing registered
        let agg = aggregator(
            Arc::new(MemoryTransport::new()),
            registry,
            DEFAULT_PROBE_TIMEOUT,
        );
        let report = agg.composite().await;
        assert_eq!(report.status, OverallStatus::Healthy);
        assert_eq!(report.checks["whatsapp"].state, CheckState::Unavailable);
        assert_eq!(report.checks["ai"].state, CheckState::Unavailable);
    }

    #[tokio::test]
    async fn failed_adapter_degrades() {
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(FixedAdapter {
            channel: ChannelType::Telegram,
            health: AdapterHealth::Failed("bot API unreachable".into()),
        }));
        let agg = aggregator(
            Arc::new(MemoryTransport::new()),
            registry,
            DEFAULT_PROBE_TIMEOUT,
        );
        let report = agg.composite().await;
        assert_eq!(report.status, OverallStatus::Degraded);
        assert_eq!(report.checks["telegram"].state, CheckState::Error);
    }

    #[tokio::test]
    async fn hung_adapter_times_out_instead_of_blocking() {
        let mut registry = ChannelRegistry::new();
        registry.register(Arc::new(HungAdapter));
        let agg = aggregator(
            Arc::new(MemoryTransport::new()),
            registry,
            Duration::from_millis(50),
        );
        let report = agg.composite().await;
        assert_eq!(report.checks["whatsapp"].state, CheckState::Error);
        assert_eq!(report.status, OverallStatus::Degraded);
    }

    #[tokio::test]
    async fn ready_only_consults_the_bus() {
        let agg = aggregator(
            Arc::new(MemoryTransport::new()),
            ChannelRegistry::new(),
            DEFAULT_PROBE_TIMEOUT,
        );
        assert!(agg.ready().await);

        let dead = aggregator(
            Arc::new(DeadTransport),
            ChannelRegistry::new(),
            DEFAULT_PROBE_TIMEOUT,
        );
        assert!(!dead.ready().await);
    }
}
