use crate::error::{BagpiperError, Result};
use crate::playback::PlaybackEngine;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Engine shared between the tick task and the host
pub type SharedEngine = Arc<Mutex<PlaybackEngine>>;

/// Runs the periodic playback tick on the tokio runtime
///
/// Every engine entry point goes through the one mutex, so ticks and host
/// calls never interleave. Hosts must call [`PlaybackDriver::shutdown`] when
/// done; dropping the driver also aborts the task.
pub struct PlaybackDriver {
    engine: SharedEngine,
    period: Duration,
    stop_signal: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl PlaybackDriver {
    /// Start ticking `engine` every `period`.
    ///
    /// The period must be non-zero and below one second so that every
    /// whole-second rollover is observed by a tick. Must be called from
    /// within a tokio runtime.
    pub fn start(engine: PlaybackEngine, period: Duration) -> Result<Self> {
        Self::start_shared(Arc::new(Mutex::new(engine)), period)
    }

    pub fn start_shared(engine: SharedEngine, period: Duration) -> Result<Self> {
        if period.is_zero() || period >= Duration::from_secs(1) {
            return Err(BagpiperError::InvalidTickPeriod(period));
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let task_engine = engine.clone();
        let task_stop = stop_signal.clone();
        let task_ticks = ticks.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // Late ticks are dropped rather than bunched up
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                if task_stop.load(Ordering::SeqCst) {
                    break;
                }
                task_engine.lock().await.tick();
                task_ticks.fetch_add(1, Ordering::Relaxed);
            }
            debug!("Playback tick task exited");
        });

        info!("Playback driver started ({:?} tick)", period);
        Ok(Self {
            engine,
            period,
            stop_signal,
            ticks,
            handle: Some(handle),
        })
    }

    /// Handle to the engine for host calls
    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the tick task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.stop_signal.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("Playback driver stopped after {} ticks", self.tick_count());
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BagMessage, VirtualTime};
    use crate::input::{IngestionResult, Record};
    use crate::playback::{callback, PlaybackState};
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    fn short_log() -> IngestionResult {
        IngestionResult {
            start_time: VirtualTime::new(50, 0),
            end_time: VirtualTime::new(50, 300_000_000),
            connections: BTreeMap::new(),
            records: vec![Record {
                topic: "/x".to_string(),
                message: BagMessage::stamped(VirtualTime::new(50, 100_000_000)),
            }],
        }
    }

    #[test]
    fn test_rejects_bad_periods() {
        for period in [Duration::ZERO, Duration::from_secs(1), Duration::from_secs(5)] {
            let err = PlaybackDriver::start(PlaybackEngine::default(), period).err();
            assert!(matches!(err, Some(BagpiperError::InvalidTickPeriod(p)) if p == period));
        }
    }

    #[tokio::test]
    async fn test_plays_log_to_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut engine = PlaybackEngine::default();
        engine.load(short_log());
        engine
            .subscribe(
                "/x",
                callback(move |msg| {
                    let _ = tx.send(msg.map(BagMessage::stamp));
                }),
            )
            .unwrap();

        let driver = PlaybackDriver::start(engine, Duration::from_millis(10)).unwrap();
        assert!(driver.is_running());
        assert_eq!(driver.period(), Duration::from_millis(10));

        let delivered = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(delivered, Some(Some(VirtualTime::new(50, 100_000_000))));

        // End of log resets the subscriber
        let reset = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(reset, Some(None));

        let engine = driver.engine();
        assert_eq!(engine.lock().await.state(), PlaybackState::Stopped);
        assert!(driver.tick_count() > 0);
        driver.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_ticking() {
        let driver = PlaybackDriver::start(PlaybackEngine::default(), Duration::from_millis(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let engine = driver.engine();
        driver.shutdown().await;

        // Only the test's handle remains once the task is gone
        assert_eq!(Arc::strong_count(&engine), 1);
    }
}
