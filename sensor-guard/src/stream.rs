//! Chronological merge of all source files into one paced event stream.

use std::path::Path;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::time::Instant;
use tracing::{info, instrument};

use crate::error::Result;
use crate::events::SensorEvent;
use crate::sensors::SensorIdentityResolver;
use crate::sources::{discover_files, IngestOptions, TabularSource};

/// Pacing between emitted events when none is configured.
pub const DEFAULT_EMIT_DELAY: Duration = Duration::from_micros(100);

/// All events from every source file, ordered by timestamp.
///
/// The sort is stable: events sharing a timestamp keep their discovery order
/// (files sorted by path, rows in file order, columns left to right), so a
/// rerun over the same files reproduces the exact same sequence.
#[derive(Debug, Clone, Default)]
pub struct ChronologicalMerge {
    events: Vec<SensorEvent>,
    files: usize,
}

impl ChronologicalMerge {
    /// Orders already-ingested events.
    pub fn from_events(mut events: Vec<SensorEvent>) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self { events, files: 0 }
    }

    /// Reads every tabular file under `root` and merges their events.
    ///
    /// Unreadable files contribute nothing. Blocking; run it off the async
    /// executor.
    ///
    /// # Errors
    ///
    /// Fails only if `root` is not an existing directory.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn collect(
        root: &Path,
        resolver: &SensorIdentityResolver,
        options: &IngestOptions,
    ) -> Result<Self> {
        let files = discover_files(root, options.extension())?;
        let mut events = Vec::new();
        for path in &files {
            events.extend(TabularSource::new(path, options.clone()).events(resolver));
        }

        let merged = Self {
            files: files.len(),
            ..Self::from_events(events)
        };
        info!(
            files = files.len(),
            events = merged.len(),
            "Merged source files"
        );
        Ok(merged)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of files the events were read from.
    pub fn file_count(&self) -> usize {
        self.files
    }

    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    /// Emits the events one at a time, the n-th no earlier than `n * delay`
    /// after the stream is first polled.
    ///
    /// Deadlines are absolute, so delays finer than the timer's millisecond
    /// resolution still average out: events whose deadline has already passed
    /// only yield to the scheduler, which is also what a zero delay does so
    /// that a concurrently running consumer gets to make progress.
    pub fn into_paced_stream(self, delay: Duration) -> impl Stream<Item = SensorEvent> {
        let mut pacer = Pacer::new(delay);
        stream::iter(self.events).then(move |event| {
            let deadline = pacer.next_deadline();
            async move {
                match deadline {
                    Some(deadline) if deadline > Instant::now() => {
                        tokio::time::sleep_until(deadline).await;
                    }
                    _ => tokio::task::yield_now().await,
                }
                event
            }
        })
    }
}

/// Running emit schedule of a paced stream.
#[derive(Debug, Clone)]
struct Pacer {
    delay: Duration,
    last: Option<Instant>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self { delay, last: None }
    }

    /// Deadline of the next event; `None` when there is nothing to wait for.
    fn next_deadline(&mut self) -> Option<Instant> {
        if self.delay.is_zero() {
            return None;
        }
        let base = self.last.unwrap_or_else(Instant::now);
        let deadline = base.checked_add(self.delay)?;
        self.last = Some(deadline);
        Some(deadline)
    }
}

impl IntoIterator for ChronologicalMerge {
    type Item = SensorEvent;
    type IntoIter = std::vec::IntoIter<SensorEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn event(minute: u32, sensor: &str) -> SensorEvent {
        SensorEvent::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, minute, 0).unwrap(),
            sensor,
            1.0,
            "test",
        )
    }

    #[test]
    fn test_from_events_sorts_stably() {
        let merged = ChronologicalMerge::from_events(vec![
            event(5, "a"),
            event(1, "b"),
            event(5, "c"),
            event(1, "d"),
        ]);
        let ids: Vec<&str> = merged.events().iter().map(|e| e.sensor_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_collect_interleaves_files() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("veg_01.csv"),
            "time,temp\n2020-01-01 00:00:00,20\n2020-01-01 00:02:00,21\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("veg_02.csv"),
            "time,temp\n2020-01-01 00:01:00,19\n2020-01-01 00:03:00,18\n",
        )
        .unwrap();

        let merged = ChronologicalMerge::collect(
            dir.path(),
            &SensorIdentityResolver::default(),
            &IngestOptions::default(),
        )
        .unwrap();
        assert_eq!(merged.file_count(), 2);
        let ids: Vec<&str> = merged.events().iter().map(|e| e.sensor_id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["veg_01-temp", "veg_02-temp", "veg_01-temp", "veg_02-temp"]
        );
    }

    #[test]
    fn test_collect_missing_root_fails() {
        let result = ChronologicalMerge::collect(
            Path::new("/no/such/root"),
            &SensorIdentityResolver::default(),
            &IngestOptions::default(),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_paced_stream_preserves_order() {
        let merged = ChronologicalMerge::from_events(vec![event(2, "b"), event(1, "a")]);
        let emitted: Vec<SensorEvent> = merged
            .into_paced_stream(Duration::ZERO)
            .collect()
            .await;
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].sensor_id, "a");
        assert_eq!(emitted[1].sensor_id, "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_stream_waits_between_events() {
        let merged =
            ChronologicalMerge::from_events(vec![event(1, "a"), event(2, "b"), event(3, "c")]);
        let start = Instant::now();
        let emitted: Vec<SensorEvent> = merged
            .into_paced_stream(Duration::from_millis(10))
            .collect()
            .await;
        assert_eq!(emitted.len(), 3);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_millisecond_delay_paces_on_average() {
        let events: Vec<SensorEvent> = (0..200).map(|i| event(i % 60, "a")).collect();
        let merged = ChronologicalMerge::from_events(events);
        let start = Instant::now();
        let emitted: Vec<SensorEvent> = merged
            .into_paced_stream(Duration::from_micros(100))
            .collect()
            .await;
        let elapsed = start.elapsed();
        assert_eq!(emitted.len(), 200);
        assert!(elapsed >= Duration::from_millis(20), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(25), "{elapsed:?}");
    }

    #[test]
    fn test_pacer_deadlines_accumulate() {
        let mut pacer = Pacer::new(Duration::ZERO);
        assert!(pacer.next_deadline().is_none());

        let mut pacer = Pacer::new(Duration::from_micros(100));
        let first = pacer.next_deadline().unwrap();
        let tenth = (0..9).filter_map(|_| pacer.next_deadline()).last().unwrap();
        assert_eq!(tenth - first, Duration::from_micros(900));
    }
}
