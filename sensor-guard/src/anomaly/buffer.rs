use std::sync::Arc;

use tokio::sync::Mutex;

use super::AnomalyRecord;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<AnomalyRecord>,
    appended: u64,
    drained: u64,
}

/// Shared, unbounded, insertion-ordered store of anomaly records.
///
/// Clones share the same storage. Every operation takes the lock exactly once,
/// so a drain observes either all or none of a concurrent append, and every
/// appended record is returned by exactly one drain.
#[derive(Debug, Clone, Default)]
pub struct AnomalyBuffer {
    inner: Arc<Mutex<Inner>>,
}

impl AnomalyBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub async fn push(&self, record: AnomalyRecord) {
        let mut inner = self.inner.lock().await;
        inner.records.push(record);
        inner.appended += 1;
    }

    /// Appends all `records` as a single atomic step.
    pub async fn extend(&self, records: Vec<AnomalyRecord>) {
        if records.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.appended += records.len() as u64;
        inner.records.extend(records);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    /// Removes and returns everything currently buffered.
    pub async fn drain_all(&self) -> Vec<AnomalyRecord> {
        let mut inner = self.inner.lock().await;
        let records = std::mem::take(&mut inner.records);
        inner.drained += records.len() as u64;
        records
    }

    /// Drains only if at least `min` records are buffered; the size check and
    /// the drain happen under one lock.
    pub async fn drain_if_at_least(&self, min: usize) -> Option<Vec<AnomalyRecord>> {
        let mut inner = self.inner.lock().await;
        if inner.records.is_empty() || inner.records.len() < min {
            return None;
        }
        let records = std::mem::take(&mut inner.records);
        inner.drained += records.len() as u64;
        Some(records)
    }

    /// Copies the current contents without removing them.
    pub async fn peek_all(&self) -> Vec<AnomalyRecord> {
        self.inner.lock().await.records.clone()
    }

    /// Records appended over the buffer's lifetime.
    pub async fn total_appended(&self) -> u64 {
        self.inner.lock().await.appended
    }

    /// Records handed out by drains over the buffer's lifetime.
    pub async fn total_drained(&self) -> u64 {
        self.inner.lock().await.drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyDetail, AnomalyKind};
    use crate::events::SensorEvent;
    use chrono::Utc;

    fn record(value: f64) -> AnomalyRecord {
        let event = SensorEvent::new(Utc::now(), "tank-level", value, "tank");
        AnomalyRecord::from_event(&event, AnomalyKind::Trend, AnomalyDetail::Trend { rate: value })
    }

    #[tokio::test]
    async fn test_push_and_drain_all() {
        let buffer = AnomalyBuffer::new();
        buffer.push(record(1.0)).await;
        buffer.extend(vec![record(2.0), record(3.0)]).await;
        assert_eq!(buffer.len().await, 3);

        let drained = buffer.drain_all().await;
        let values: Vec<f64> = drained.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert!(buffer.is_empty().await);
        assert!(buffer.drain_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let buffer = AnomalyBuffer::new();
        let producer = buffer.clone();
        producer.push(record(1.0)).await;
        assert_eq!(buffer.len().await, 1);
        assert_eq!(buffer.peek_all().await.len(), 1);
        assert_eq!(producer.len().await, 1);
    }

    #[tokio::test]
    async fn test_drain_if_at_least() {
        let buffer = AnomalyBuffer::new();
        assert!(buffer.drain_if_at_least(1).await.is_none());
        assert!(buffer.drain_if_at_least(0).await.is_none());

        buffer.push(record(1.0)).await;
        assert!(buffer.drain_if_at_least(2).await.is_none());
        assert_eq!(buffer.len().await, 1);

        buffer.push(record(2.0)).await;
        assert_eq!(buffer.drain_if_at_least(2).await.unwrap().len(), 2);
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn test_lifetime_counters() {
        let buffer = AnomalyBuffer::new();
        buffer.extend(vec![record(1.0), record(2.0)]).await;
        buffer.drain_all().await;
        buffer.push(record(3.0)).await;
        assert_eq!(buffer.total_appended().await, 3);
        assert_eq!(buffer.total_drained().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_append_and_drain_loses_nothing() {
        let buffer = AnomalyBuffer::new();
        let producer = buffer.clone();

        let writer = tokio::spawn(async move {
            for i in 0..1_000 {
                producer.push(record(i as f64)).await;
                if i % 7 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        });

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(buffer.drain_all().await);
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        seen.extend(buffer.drain_all().await);

        let values: Vec<f64> = seen.iter().map(|r| r.value).collect();
        let expected: Vec<f64> = (0..1_000).map(|i| i as f64).collect();
        assert_eq!(values, expected);
    }
}
