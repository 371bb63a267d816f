use crate::config::{Billing, MeteringOptions, PriceInfo};
use crate::engine::{EngineError, MeteringEngine};
use crate::identity::Identity;
use crate::query::Query;
use crate::types::{HierarchyResult, MeteringResult};
use async_trait::async_trait;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub fn test_price_info() -> PriceInfo {
    PriceInfo {
        currency_unit: "USD".into(),
        cpu_per_core_per_hour: 0.05,
        mem_per_gigabytes_per_hour: 0.01,
        ingress_network_traffic_per_megabytes_per_hour: 0.001,
        egress_network_traffic_per_megabytes_per_hour: 0.002,
        pvc_per_gigabytes_per_hour: 0.003,
    }
}

pub fn test_options() -> MeteringOptions {
    MeteringOptions {
        retention_day: 7,
        billing: Billing {
            price_info: test_price_info(),
        },
    }
}

/// A recorded engine invocation.
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Metering(Identity, Query),
    Hierarchy(Identity, Query),
}

/// Engine that returns canned results and records every call.
#[derive(Default)]
pub struct FakeEngine {
    pub metrics: MeteringResult,
    pub hierarchy: HierarchyResult,
    pub error: Option<EngineError>,
    calls: Mutex<Vec<Call>>,
}

impl FakeEngine {
    pub fn new(metrics: MeteringResult, hierarchy: HierarchyResult) -> Self {
        FakeEngine {
            metrics,
            hierarchy,
            ..Default::default()
        }
    }

    pub fn failing(error: EngineError) -> Self {
        FakeEngine {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(call);
        match &self.error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MeteringEngine for FakeEngine {
    async fn metering(
        &self,
        user: &Identity,
        query: &Query,
        _price_info: &PriceInfo,
    ) -> Result<MeteringResult, EngineError> {
        self.record(Call::Metering(user.clone(), query.clone()))?;
        Ok(self.metrics.clone())
    }

    async fn metering_hierarchy(
        &self,
        user: &Identity,
        query: &Query,
        _price_info: &PriceInfo,
    ) -> Result<HierarchyResult, EngineError> {
        self.record(Call::Hierarchy(user.clone(), query.clone()))?;
        Ok(self.hierarchy.clone())
    }
}

/// Recorder that keeps counter totals, keyed by `name,label=value,...`, and
/// the names of described metrics.
#[derive(Default)]
pub struct CountingRecorder {
    counters: Mutex<BTreeMap<String, Arc<AtomicU64>>>,
    described: Mutex<Vec<String>>,
}

impl CountingRecorder {
    pub fn described(&self) -> Vec<String> {
        self.described.lock().unwrap().clone()
    }

    fn describe(&self, key: KeyName) {
        self.described.lock().unwrap().push(key.as_str().to_string());
    }

    pub fn count(&self, id: &str) -> u64 {
        self.counters
            .lock()
            .unwrap()
            .get(id)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
        self.describe(key);
    }

    fn describe_gauge(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
        self.describe(key);
    }

    fn describe_histogram(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
        self.describe(key);
    }

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let mut id = key.name().to_string();
        for label in key.labels() {
            id.push_str(&format!(",{}={}", label.key(), label.value()));
        }
        let counter = self.counters.lock().unwrap().entry(id).or_default().clone();
        Counter::from_arc(counter)
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
