//! Rate conformance of detail lookups across a whole pass

use rolemap_crawler::memory::{MemoryCatalog, MemoryDirectory, MemoryHierarchy};
use rolemap_crawler::{CrawlMetrics, CrawlMode, Crawler, CrawlerConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Largest number of calls observed in any window of `window` starting at a call
fn max_calls_in_window(times: &[Instant], window: Duration) -> usize {
    let mut sorted = times.to_vec();
    sorted.sort();

    sorted
        .iter()
        .enumerate()
        .map(|(i, start)| sorted[i..].iter().take_while(|t| **t - *start < window).count())
        .max()
        .unwrap_or(0)
}

fn crawler(directory: Arc<MemoryDirectory>, rate: f64, burst: u32) -> Crawler {
    Crawler::new(
        CrawlerConfig {
            rate_per_second: rate,
            burst,
            max_in_flight: Some(32),
            page_size: Some(50),
            ..Default::default()
        },
        directory,
        Arc::new(MemoryHierarchy::new()),
        Arc::new(MemoryCatalog::new()),
        Arc::new(CrawlMetrics::new().unwrap()),
    )
    .unwrap()
}

#[cfg(test)]
mod conformance {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_lookups_respect_rate_and_burst() {
        let directory = Arc::new(MemoryDirectory::new());
        for i in 0..40 {
            directory.add("", &format!("roles/r{}", i), &["p1"]);
        }

        let crawler = crawler(directory.clone(), 4.0, 4);
        let started = Instant::now();
        let report = crawler
            .run(&CrawlMode::Default, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.passes[0].resolved, 40);
        let times = directory.get_call_times();
        assert_eq!(times.len(), 40);

        // rate × window + burst
        assert!(max_calls_in_window(&times, Duration::from_secs(1)) <= 8);
        assert!(max_calls_in_window(&times, Duration::from_secs(5)) <= 24);

        // 4 immediately, the remaining 36 at 4 per second
        assert!(started.elapsed() >= Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_burst_is_not_delayed() {
        let directory = Arc::new(MemoryDirectory::new());
        for i in 0..3 {
            directory.add("", &format!("roles/r{}", i), &["p1"]);
        }

        let crawler = crawler(directory.clone(), 1.0, 3);
        let started = Instant::now();
        crawler
            .run(&CrawlMode::Default, &CancellationToken::new())
            .await
            .unwrap();

        assert!(directory
            .get_call_times()
            .iter()
            .all(|t| t.duration_since(started) < Duration::from_millis(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_limiter_shared_between_tasks() {
        let limiter = Arc::new(RateLimiter::new(2.0, 2).unwrap());
        let cancel = CancellationToken::new();
        let started = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                limiter.acquire(&cancel).await.unwrap();
                Instant::now()
            }));
        }

        let mut times = Vec::new();
        for handle in handles {
            times.push(handle.await.unwrap());
        }

        assert!(max_calls_in_window(&times, Duration::from_secs(1)) <= 4);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
