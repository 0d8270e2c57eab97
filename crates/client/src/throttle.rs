//! Process-wide outbound query throttle.
//!
//! Well-known geocoding services enforce usage policies of the form "at
//! most one request per interval, per client". The throttle keeps one
//! last-dispatch timestamp per recognized service, shared by every session
//! in the process, and gates outbound fetches on it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use tokio::sync::Mutex;

use gazetteer_core::Service;

static GLOBAL: Lazy<Arc<QueryThrottle>> = Lazy::new(|| Arc::new(QueryThrottle::new()));

/// Per-service minimum-interval gate guarding outbound fetches.
#[derive(Debug, Default)]
pub struct QueryThrottle {
    slots: Mutex<HashMap<Service, Instant>>,
}

impl QueryThrottle {
    /// An empty throttle with no dispatch history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared process-wide throttle instance.
    pub fn global() -> Arc<QueryThrottle> {
        GLOBAL.clone()
    }

    /// Wait until a dispatch to `service` is allowed, then claim the slot.
    ///
    /// The slot lock is held across the check-sleep-record sequence, so
    /// concurrent callers targeting the same service serialize and no two
    /// dispatches are spaced closer than `min_interval`. The recorded
    /// timestamp is the moment the gate opens — the dispatch time, not the
    /// response time. Services with no centrally-enforced rate limit pass
    /// straight through.
    pub async fn acquire(&self, service: &Service, min_interval: Duration) {
        if !service.is_throttled() {
            return;
        }

        let mut slots = self.slots.lock().await;
        if let Some(last) = slots.get(service) {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                tokio::time::sleep(min_interval - elapsed).await;
            }
        }
        slots.insert(service.clone(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(80);

    #[tokio::test]
    async fn test_concurrent_dispatch_spacing() {
        let throttle = QueryThrottle::new();
        let service = Service::OsmNominatim;

        let (a, b) = tokio::join!(
            async {
                throttle.acquire(&service, INTERVAL).await;
                Instant::now()
            },
            async {
                throttle.acquire(&service, INTERVAL).await;
                Instant::now()
            },
        );

        let gap = if a > b { a - b } else { b - a };
        assert!(gap >= INTERVAL, "dispatch gap {gap:?} below {INTERVAL:?}");
    }

    #[tokio::test]
    async fn test_sequential_dispatch_spacing() {
        let throttle = QueryThrottle::new();
        let service = Service::MapQuestNominatim;

        throttle.acquire(&service, INTERVAL).await;
        let first = Instant::now();
        throttle.acquire(&service, INTERVAL).await;
        assert!(first.elapsed() >= INTERVAL - Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_services_throttle_independently() {
        let throttle = QueryThrottle::new();

        throttle.acquire(&Service::OsmNominatim, INTERVAL).await;
        let start = Instant::now();
        throttle.acquire(&Service::MapQuestNominatim, INTERVAL).await;
        assert!(start.elapsed() < INTERVAL);
    }

    #[tokio::test]
    async fn test_custom_service_fails_open() {
        let throttle = QueryThrottle::new();
        let service = Service::Custom("my_private_geocoder".into());

        let start = Instant::now();
        throttle.acquire(&service, INTERVAL).await;
        throttle.acquire(&service, INTERVAL).await;
        assert!(start.elapsed() < INTERVAL);
    }
}
