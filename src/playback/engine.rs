use crate::config::PlayerOptions;
use crate::core::{BagMessage, VirtualTime};
use crate::error::{BagpiperError, Result};
use crate::input::{IngestionResult, LogSource};
use crate::playback::{
    Callback, ControlCallback, ControlMessage, PlaybackState, SubscriptionId, SubscriptionRegistry, TopicBuffer,
    TopicTypeMap,
};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Absolute start and end of the loaded log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBounds {
    pub start: VirtualTime,
    pub end: VirtualTime,
}

/// Replays a decoded log to topic subscribers on a virtual clock
///
/// The engine never schedules itself. A host calls [`PlaybackEngine::tick`]
/// at a fixed cadence well below one second (see
/// [`crate::playback::PlaybackDriver`]); each tick advances the virtual clock
/// by the wall-clock time since the previous tick and delivers every message
/// that came due.
pub struct PlaybackEngine {
    options: PlayerOptions,
    state: PlaybackState,
    /// Playback position relative to the log start
    current_time: VirtualTime,
    bounds: Option<LogBounds>,
    buffers: HashMap<String, TopicBuffer>,
    topic_types: TopicTypeMap,
    registry: SubscriptionRegistry,
    control: Option<ControlCallback>,
    /// Wall-clock reference for the next tick delta
    last_tick: Instant,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(PlayerOptions::default())
    }
}

impl PlaybackEngine {
    pub fn new(options: PlayerOptions) -> Self {
        Self {
            options,
            state: PlaybackState::Stopped,
            current_time: VirtualTime::ZERO,
            bounds: None,
            buffers: HashMap::new(),
            topic_types: TopicTypeMap::new(),
            registry: SubscriptionRegistry::new(),
            control: None,
            last_tick: Instant::now(),
        }
    }

    pub fn options(&self) -> PlayerOptions {
        self.options
    }

    pub fn set_options(&mut self, options: PlayerOptions) {
        self.options = options;
    }

    /// Get current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Playback position relative to the log start
    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    /// Absolute start of the log, zero when nothing is loaded
    pub fn start_time(&self) -> VirtualTime {
        self.bounds.map(|b| b.start).unwrap_or_default()
    }

    /// Absolute end of the log, zero when nothing is loaded
    pub fn end_time(&self) -> VirtualTime {
        self.bounds.map(|b| b.end).unwrap_or_default()
    }

    pub fn bounds(&self) -> Option<LogBounds> {
        self.bounds
    }

    /// Whole seconds between log start and end
    pub fn duration(&self) -> u64 {
        self.bounds
            .map(|b| b.end.sec.saturating_sub(b.start.sec))
            .unwrap_or(0)
    }

    /// True once a log with at least one message has been loaded
    pub fn is_ready(&self) -> bool {
        !self.buffers.is_empty()
    }

    /// Topic types of the loaded log
    pub fn topics(&self) -> &TopicTypeMap {
        &self.topic_types
    }

    /// Absolute log time playback has reached
    pub fn bag_time(&self) -> VirtualTime {
        self.start_time() + self.current_time
    }

    /// Read cursor of a topic buffer
    pub fn cursor(&self, topic: &str) -> Result<usize> {
        self.buffers
            .get(topic)
            .map(TopicBuffer::cursor)
            .ok_or_else(|| BagpiperError::UnknownTopic(topic.to_string()))
    }

    /// First buffered message of a topic, for schema discovery
    pub fn first_topic_message(&self, topic: &str) -> Result<&BagMessage> {
        self.buffers
            .get(topic)
            .and_then(TopicBuffer::first)
            .ok_or_else(|| BagpiperError::NoMessages(topic.to_string()))
    }

    /// Replace the loaded log and start playing it
    ///
    /// Returns the topic -> type map of the new log.
    pub fn load(&mut self, result: IngestionResult) -> TopicTypeMap {
        self.clear();
        self.install(result)
    }

    /// Ingest a log from `source` and start playing it.
    ///
    /// The previous log is dropped before ingestion starts, so a failed
    /// ingestion leaves the engine stopped with nothing loaded.
    pub async fn open<S: LogSource + ?Sized>(&mut self, source: &mut S) -> Result<TopicTypeMap> {
        self.clear();
        match source.ingest().await {
            Ok(result) => Ok(self.install(result)),
            Err(e) => {
                warn!("Failed to load {}: {:#}", source.name(), e);
                Err(e.into())
            }
        }
    }

    fn clear(&mut self) {
        self.stop();
        self.buffers.clear();
        self.topic_types.clear();
        self.bounds = None;
    }

    fn install(&mut self, result: IngestionResult) -> TopicTypeMap {
        let mut grouped: HashMap<String, Vec<BagMessage>> = HashMap::new();
        for record in result.records {
            grouped.entry(record.topic).or_default().push(record.message);
        }
        self.buffers = grouped
            .into_iter()
            .map(|(topic, messages)| (topic, TopicBuffer::new(messages)))
            .collect();

        self.bounds = Some(LogBounds {
            start: result.start_time,
            end: result.end_time,
        });
        self.current_time = VirtualTime::ZERO;
        self.topic_types = result.connections.clone();

        info!(
            "Loaded log {} .. {} with {} topics",
            result.start_time,
            result.end_time,
            self.buffers.len()
        );

        self.toggle_play();
        result.connections
    }

    /// Advance playback by the wall-clock time since the previous tick
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Advance playback as if the tick ran at `now`
    pub fn tick_at(&mut self, now: Instant) {
        let delta = if now >= self.last_tick {
            now - self.last_tick
        } else {
            self.last_tick - now
        };
        self.last_tick = now;

        if !self.is_playing() {
            return;
        }

        let nanos = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        // One message per tick that crossed a second, however many it crossed
        if self.current_time.advance(nanos) > 0 {
            self.send_control_message();
        }

        let position = self.bag_time();
        if self.options.debug_mode {
            debug!("tick bag time {}", position);
        }

        // End of the log reached
        if position > self.end_time() {
            self.stop();
            return;
        }

        for (topic, subscribers) in self.registry.topics() {
            let Some(buffer) = self.buffers.get_mut(topic) else {
                continue;
            };
            let first = buffer.cursor();
            for (i, message) in buffer.take_due(position).iter().enumerate() {
                if self.options.debug_mode {
                    debug!("{} sending message #{} stamped {}", topic, first + i, message.stamp());
                }
                for subscriber in subscribers {
                    (subscriber.callback)(Some(message));
                }
            }
        }
    }

    /// Flip between playing and paused. Does nothing while no log is loaded.
    pub fn toggle_play(&mut self) {
        self.toggle_play_at(Instant::now());
    }

    /// Flip between playing and paused, taking `now` as the new tick reference
    pub fn toggle_play_at(&mut self, now: Instant) {
        if !self.is_ready() && !self.is_playing() {
            return;
        }

        self.state = if self.is_playing() {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        };
        self.last_tick = now;
        self.send_control_message();
    }

    /// Jump to `offset_secs` whole seconds after the log start
    ///
    /// Every subscriber receives a reset signal before this returns.
    pub fn seek(&mut self, offset_secs: u64) {
        self.current_time = VirtualTime::from_secs(offset_secs);
        self.send_control_message();

        let target = self.bag_time();
        info!("Seeking to {}s (bag time {})", offset_secs, target);

        for (topic, subscribers) in self.registry.topics() {
            if let Some(buffer) = self.buffers.get_mut(topic) {
                let cursor = if self.options.historical_seek {
                    0
                } else {
                    buffer.index_at_or_after(target)
                };
                buffer.set_cursor(cursor);
            }
            for subscriber in subscribers {
                (subscriber.callback)(None);
            }
        }
    }

    /// Stop playback, rewind to the log start and reset every subscriber
    pub fn stop(&mut self) {
        self.current_time = VirtualTime::ZERO;
        if self.is_playing() {
            self.toggle_play();
        }
        self.state = PlaybackState::Stopped;

        for callback in self.registry.callbacks() {
            callback(None);
        }
        for buffer in self.buffers.values_mut() {
            buffer.rewind();
        }
    }

    pub fn subscribe(&mut self, topic: &str, callback: Callback) -> Result<SubscriptionId> {
        let id = self.registry.subscribe(topic, callback)?;
        debug!("{} subscribed to {}", id, topic);
        Ok(id)
    }

    pub fn unsubscribe(&mut self, callback: &Callback) -> Result<()> {
        let id = self.registry.unsubscribe(callback)?;
        debug!("{} unsubscribed", id);
        Ok(())
    }

    /// Register the single control listener, replacing any previous one
    pub fn subscribe_control<F>(&mut self, callback: F)
    where
        F: Fn(ControlMessage) + Send + Sync + 'static,
    {
        self.control = Some(Box::new(callback));
    }

    pub fn unsubscribe_control(&mut self) {
        self.control = None;
    }

    fn send_control_message(&self) {
        if let Some(control) = &self.control {
            control(ControlMessage {
                is_playing: self.is_playing(),
                current_time_s: self.current_time.sec,
            });
        }
    }
}
