//! Background cache-warming job.
//!
//! The job runs on a dedicated worker thread: for each band in ascending
//! order it reads a block covering the view window (warming the provider's
//! read cache) and computes contrast-stretch bounds from sampled
//! statistics. Progress and the final result flow back to the controller
//! over a channel, which preserves the order events were produced in.
//! Cancellation is cooperative and polled between bands, so cancel latency
//! is bounded by one band's processing time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use crate::raster::{RasterProvider, ViewWindow};
use crate::stats::{StatsTable, stretch_range};

/// Event emitted by a cache-warming job, delivered in production order.
///
/// A run ends with exactly one terminal event: `Finished`, `Canceled`, or
/// `Failed`. For a successful run the terminal event follows the last
/// per-band `Progress` event.
#[derive(Debug)]
pub enum JobEvent {
    /// One band has been warmed and its stretch bounds computed
    Progress {
        /// Band just processed (1-based)
        band: u32,
        /// Total number of bands in this run
        total: u32,
        /// Completion percentage, `band / total * 100`
        percent: f64,
    },
    /// All bands processed; the completed lookup table
    Finished(StatsTable),
    /// The job observed a cancellation request; no table was produced
    Canceled,
    /// A provider call failed; no table was produced
    Failed(String),
}

/// Tuning inputs for one job run, snapshotted from `ScrubConfig` at spawn.
#[derive(Debug, Clone, Copy)]
pub struct WarmParams {
    /// Standard-deviation multiplier for the stretch window
    pub stretch_multiplier: f64,
    /// Sample cap for per-band statistics
    pub sample_size: u32,
}

/// Handle to an in-flight (or finished) cache-warming job.
///
/// Owns the event receiver, so dropping the handle discards any late
/// events from a superseded run. Dropping requests cancellation and
/// detaches the worker: the caller never waits on worker I/O, and the
/// worker reaps itself on its next cancel poll or when a send against the
/// dropped receiver fails.
pub struct JobHandle {
    /// Cooperative cancellation flag, polled by the worker between bands
    cancel_flag: Arc<AtomicBool>,
    /// Receiver for progress and terminal events
    events: Receiver<JobEvent>,
}

impl JobHandle {
    /// Spawn a cache-warming job for `band_count` bands over `window`.
    ///
    /// The provider is the only piece of the layer the worker touches; it
    /// must tolerate concurrent reads while the interactive thread keeps
    /// issuing repaints. Returns `Err` if the worker thread fails to spawn.
    pub fn spawn(
        provider: Arc<dyn RasterProvider>,
        band_count: u32,
        window: ViewWindow,
        params: WarmParams,
    ) -> Result<Self, String> {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel::<JobEvent>();

        // Detached on purpose: the interactive thread must never wait on
        // worker I/O, so nothing ever joins this thread. The worker exits
        // on its own once it observes the cancel flag or the receiver is
        // gone.
        let worker_cancel = Arc::clone(&cancel_flag);
        thread::Builder::new()
            .name("cache-warmer".to_string())
            .spawn(move || {
                log::debug!("Cache-warming worker started ({} bands)", band_count);
                Self::run_job(provider, band_count, window, params, worker_cancel, event_tx);
                log::debug!("Cache-warming worker exiting");
            })
            .map_err(|e| format!("Failed to spawn cache-warming thread: {}", e))?;

        Ok(Self {
            cancel_flag,
            events: event_rx,
        })
    }

    /// Worker main loop. Converts provider faults into a `Failed` event
    /// instead of unwinding; nothing here panics across the job boundary.
    fn run_job(
        provider: Arc<dyn RasterProvider>,
        band_count: u32,
        window: ViewWindow,
        params: WarmParams,
        cancel: Arc<AtomicBool>,
        events: Sender<JobEvent>,
    ) {
        let mut table = StatsTable::new();

        for band in 1..=band_count {
            if cancel.load(Ordering::Relaxed) {
                log::info!("Cache warming canceled at band {}/{}", band, band_count);
                let _ = events.send(JobEvent::Canceled);
                return;
            }

            // Warm the provider's read cache; the block content is unused.
            if let Err(e) = provider.read_block(band, &window) {
                log::error!("Block read failed: {}", e);
                let _ = events.send(JobEvent::Failed(e.to_string()));
                return;
            }

            let stats = match provider.band_statistics(band, &window.extent, params.sample_size) {
                Ok(stats) => stats,
                Err(e) => {
                    log::error!("Statistics failed: {}", e);
                    let _ = events.send(JobEvent::Failed(e.to_string()));
                    return;
                }
            };

            table.insert(band, stretch_range(&stats, params.stretch_multiplier));

            let percent = f64::from(band) / f64::from(band_count) * 100.0;
            log::debug!("Warmed band {}/{} ({:.0}%)", band, band_count, percent);
            if events
                .send(JobEvent::Progress {
                    band,
                    total: band_count,
                    percent,
                })
                .is_err()
            {
                // Receiver dropped: the controller discarded this run.
                log::warn!("Event channel closed, cache warmer exiting");
                return;
            }
        }

        log::info!("Cache warming finished ({} bands)", band_count);
        let _ = events.send(JobEvent::Finished(table));
    }

    /// Request cancellation of the job.
    ///
    /// Idempotent and always safe: on an already-finished run the worker
    /// never observes the flag again and the request is a no-op.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested on this handle.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Take the next event from the job, if one is ready. Non-blocking.
    pub fn try_next_event(&self) -> Option<JobEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::ProviderError;
    use crate::raster::{BandStatistics, Extent, RasterDataType};

    /// Scripted provider: fixed statistics per band, optional failure band,
    /// optional per-call delay, and a log of block reads.
    struct ScriptedProvider {
        stats: Vec<BandStatistics>,
        fail_stats_on_band: Option<u32>,
        block_delay: Duration,
        block_reads: Mutex<Vec<u32>>,
    }

    impl ScriptedProvider {
        fn new(stats: Vec<BandStatistics>) -> Self {
            Self {
                stats,
                fail_stats_on_band: None,
                block_delay: Duration::ZERO,
                block_reads: Mutex::new(Vec::new()),
            }
        }

        fn uniform(band_count: u32) -> Self {
            let stats = (0..band_count)
                .map(|_| BandStatistics {
                    mean: 100.0,
                    std_dev: 10.0,
                    minimum: 0.0,
                    maximum: 255.0,
                })
                .collect();
            Self::new(stats)
        }
    }

    impl RasterProvider for ScriptedProvider {
        fn read_block(&self, band: u32, _window: &ViewWindow) -> Result<(), ProviderError> {
            if !self.block_delay.is_zero() {
                thread::sleep(self.block_delay);
            }
            self.block_reads.lock().unwrap().push(band);
            Ok(())
        }

        fn band_statistics(
            &self,
            band: u32,
            _extent: &Extent,
            _sample_size: u32,
        ) -> Result<BandStatistics, ProviderError> {
            if self.fail_stats_on_band == Some(band) {
                return Err(ProviderError::new(band, "sampling failed"));
            }
            Ok(self.stats[(band - 1) as usize])
        }

        fn data_type(&self, _band: u32) -> RasterDataType {
            RasterDataType::Float32
        }
    }

    fn test_window() -> ViewWindow {
        ViewWindow {
            extent: Extent::new(0.0, 0.0, 100.0, 100.0),
            width: 640,
            height: 480,
        }
    }

    fn default_params() -> WarmParams {
        WarmParams {
            stretch_multiplier: 2.0,
            sample_size: 25_000,
        }
    }

    /// Drain events until a terminal one arrives or the deadline passes.
    fn collect_run(handle: &JobHandle) -> Vec<JobEvent> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut events = Vec::new();
        while Instant::now() < deadline {
            match handle.try_next_event() {
                Some(event) => {
                    let terminal = !matches!(event, JobEvent::Progress { .. });
                    events.push(event);
                    if terminal {
                        return events;
                    }
                }
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        panic!("job produced no terminal event within deadline");
    }

    #[test]
    fn test_successful_run_emits_ordered_progress_then_table() {
        let provider = Arc::new(ScriptedProvider::uniform(3));
        let handle = JobHandle::spawn(
            Arc::clone(&provider) as Arc<dyn RasterProvider>,
            3,
            test_window(),
            default_params(),
        )
        .expect("spawn");

        let events = collect_run(&handle);
        assert_eq!(events.len(), 4);

        for (i, event) in events[..3].iter().enumerate() {
            let expected_band = (i + 1) as u32;
            match event {
                JobEvent::Progress {
                    band,
                    total,
                    percent,
                } => {
                    assert_eq!(*band, expected_band);
                    assert_eq!(*total, 3);
                    let expected = f64::from(expected_band) / 3.0 * 100.0;
                    assert!((percent - expected).abs() < 1e-9);
                }
                other => panic!("expected progress, got {:?}", other),
            }
        }

        match &events[3] {
            JobEvent::Finished(table) => {
                assert_eq!(table.len(), 3);
                for band in 1..=3 {
                    let stats = table.get(band).expect("band present");
                    assert_eq!(stats.low, 80.0);
                    assert_eq!(stats.high, 120.0);
                }
            }
            other => panic!("expected finished, got {:?}", other),
        }

        // One warm read per band, ascending.
        assert_eq!(*provider.block_reads.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bounds_lie_within_observed_range() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            BandStatistics {
                mean: 5.0,
                std_dev: 50.0,
                minimum: 0.0,
                maximum: 255.0,
            },
            BandStatistics {
                mean: 42.0,
                std_dev: 0.0,
                minimum: 42.0,
                maximum: 42.0,
            },
        ]));
        let handle = JobHandle::spawn(provider, 2, test_window(), default_params()).expect("spawn");

        let events = collect_run(&handle);
        let JobEvent::Finished(table) = events.last().unwrap() else {
            panic!("expected finished");
        };
        let band1 = table.get(1).unwrap();
        assert_eq!((band1.low, band1.high), (0.0, 105.0));
        let band2 = table.get(2).unwrap();
        assert_eq!((band2.low, band2.high), (42.0, 42.0));
    }

    #[test]
    fn test_provider_fault_reports_failed_without_table() {
        let mut provider = ScriptedProvider::uniform(3);
        provider.fail_stats_on_band = Some(2);
        let handle =
            JobHandle::spawn(Arc::new(provider), 3, test_window(), default_params()).expect("spawn");

        let events = collect_run(&handle);
        assert!(matches!(events[0], JobEvent::Progress { band: 1, .. }));
        match events.last().unwrap() {
            JobEvent::Failed(message) => assert!(message.contains("band 2")),
            other => panic!("expected failed, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, JobEvent::Finished(_))));
    }

    #[test]
    fn test_cancel_stops_run_without_table() {
        let mut provider = ScriptedProvider::uniform(100);
        provider.block_delay = Duration::from_millis(20);
        let handle = JobHandle::spawn(Arc::new(provider), 100, test_window(), default_params())
            .expect("spawn");

        handle.cancel();
        assert!(handle.is_cancel_requested());

        let events = collect_run(&handle);
        match events.last().unwrap() {
            JobEvent::Canceled => {}
            other => panic!("expected canceled, got {:?}", other),
        }
        assert!(!events.iter().any(|e| matches!(e, JobEvent::Finished(_))));
        // Cancel is polled between bands, so at most a band or two slipped
        // through before the flag was observed.
        assert!(events.len() <= 3);
    }

    #[test]
    fn test_cancel_after_completion_is_a_tolerated_noop() {
        let handle = JobHandle::spawn(
            Arc::new(ScriptedProvider::uniform(1)),
            1,
            test_window(),
            default_params(),
        )
        .expect("spawn");

        let events = collect_run(&handle);
        assert!(matches!(events.last().unwrap(), JobEvent::Finished(_)));

        handle.cancel();
        handle.cancel();
        assert!(handle.try_next_event().is_none());
    }

    #[test]
    fn test_drop_does_not_wait_on_worker_io() {
        let mut provider = ScriptedProvider::uniform(100);
        provider.block_delay = Duration::from_millis(300);
        let handle = JobHandle::spawn(Arc::new(provider), 100, test_window(), default_params())
            .expect("spawn");

        // Let the worker get well inside a blocking block read.
        thread::sleep(Duration::from_millis(30));

        let start = Instant::now();
        drop(handle);
        let elapsed = start.elapsed();
        assert!(
            elapsed < Duration::from_millis(100),
            "drop waited {:?} on worker I/O",
            elapsed
        );
    }

    #[test]
    fn test_zero_bands_finishes_with_empty_table() {
        let handle = JobHandle::spawn(
            Arc::new(ScriptedProvider::uniform(0)),
            0,
            test_window(),
            default_params(),
        )
        .expect("spawn");

        let events = collect_run(&handle);
        match events.last().unwrap() {
            JobEvent::Finished(table) => assert!(table.is_empty()),
            other => panic!("expected finished, got {:?}", other),
        }
    }
}
