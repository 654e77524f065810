use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use rootcid_ledger::RootLedger;
use rootcid_types::RootEvent;

use crate::deadline;

const CHANNEL_CAPACITY: usize = 64;

/// Streams root pointer changes by polling the ledger's event log.
///
/// Events are delivered in block order, each at most once. Polling stops
/// when the watcher is dropped.
pub struct RootWatcher {
    events: mpsc::Receiver<RootEvent>,
    task: JoinHandle<()>,
}

impl RootWatcher {
    /// Start watching for events at or after `from_block`.
    pub fn spawn(
        ledger: Arc<dyn RootLedger>,
        from_block: u64,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        let (tx, events) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(poll(ledger, from_block, poll_interval, timeout, tx));
        Self { events, task }
    }

    /// The next event, or `None` once polling has stopped.
    pub async fn recv(&mut self) -> Option<RootEvent> {
        self.events.recv().await
    }
}

impl Drop for RootWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn poll(
    ledger: Arc<dyn RootLedger>,
    mut cursor: u64,
    poll_interval: Duration,
    timeout: Duration,
    tx: mpsc::Sender<RootEvent>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let polled = ledger.events_since(cursor);
        let events = match deadline::ledger(timeout, "events_since", polled).await {
            Ok(events) => events,
            Err(e) => {
                warn!(cursor, error = %e, "root watch poll failed");
                continue;
            }
        };
        // One block can hold several events; advance past it only after the batch.
        let start = cursor;
        let mut last_block = None;
        for event in events {
            if event.block < start {
                continue;
            }
            last_block = Some(event.block);
            debug!(block = event.block, fingerprint = %event.fingerprint, "root event");
            if tx.send(event).await.is_err() {
                return;
            }
        }
        if let Some(block) = last_block {
            cursor = cursor.max(block + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootcid_ledger::{InMemoryRootLedger, LedgerError, LedgerResult};
    use rootcid_types::{CommitReceipt, Fingerprint, RootPointer};

    async fn next(watcher: &mut RootWatcher) -> RootEvent {
        tokio::time::timeout(Duration::from_secs(2), watcher.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn delivers_each_event_once_in_order() {
        let ledger = Arc::new(InMemoryRootLedger::new());
        let a = Fingerprint::compute(b"a");
        let b = Fingerprint::compute(b"b");
        ledger.set_current(&a).await.unwrap();

        let mut watcher = RootWatcher::spawn(
            ledger.clone(),
            0,
            Duration::from_millis(5),
            Duration::from_secs(1),
        );
        assert_eq!(next(&mut watcher).await.fingerprint, a);

        ledger.set_current(&b).await.unwrap();
        let event = next(&mut watcher).await;
        assert_eq!(event.fingerprint, b);
        assert_eq!(event.block, 2);

        ledger.set_current(&a).await.unwrap();
        assert_eq!(next(&mut watcher).await.block, 3);
    }

    #[tokio::test]
    async fn starts_from_requested_block() {
        let ledger = Arc::new(InMemoryRootLedger::new());
        for tag in [&b"a"[..], b"b", b"c"] {
            ledger.set_current(&Fingerprint::compute(tag)).await.unwrap();
        }
        let mut watcher = RootWatcher::spawn(
            ledger.clone(),
            3,
            Duration::from_millis(5),
            Duration::from_secs(1),
        );
        let event = next(&mut watcher).await;
        assert_eq!(event.block, 3);
        assert_eq!(event.fingerprint, Fingerprint::compute(b"c"));
    }

    /// Replays a fixed log where two transactions landed in block 7.
    struct SameBlockLedger {
        events: Vec<RootEvent>,
    }

    #[async_trait::async_trait]
    impl RootLedger for SameBlockLedger {
        async fn read_current(&self) -> LedgerResult<RootPointer> {
            Ok(RootPointer::Unset)
        }

        async fn set_current(&self, _: &Fingerprint) -> LedgerResult<CommitReceipt> {
            Err(LedgerError::rejected("read only"))
        }

        async fn events_since(&self, from_block: u64) -> LedgerResult<Vec<RootEvent>> {
            Ok(self
                .events
                .iter()
                .filter(|e| e.block >= from_block)
                .cloned()
                .collect())
        }

        fn name(&self) -> &'static str {
            "same-block"
        }
    }

    #[tokio::test]
    async fn delivers_every_event_in_a_shared_block() {
        let event = |tag: &[u8], block, tx: &str| RootEvent {
            fingerprint: Fingerprint::compute(tag),
            block,
            transaction: tx.to_string(),
        };
        let ledger = Arc::new(SameBlockLedger {
            events: vec![event(b"a", 7, "0x1"), event(b"b", 7, "0x2"), event(b"c", 8, "0x3")],
        });
        let mut watcher = RootWatcher::spawn(
            ledger,
            0,
            Duration::from_millis(5),
            Duration::from_secs(1),
        );
        assert_eq!(next(&mut watcher).await.transaction, "0x1");
        let second = next(&mut watcher).await;
        assert_eq!(second.transaction, "0x2");
        assert_eq!(second.fingerprint, Fingerprint::compute(b"b"));
        assert_eq!(next(&mut watcher).await.transaction, "0x3");

        // Later polls start past block 8 and repeat nothing.
        let repeat = tokio::time::timeout(Duration::from_millis(50), watcher.recv()).await;
        assert!(repeat.is_err());
    }

    #[tokio::test]
    async fn survives_ledger_outage() {
        let ledger = Arc::new(InMemoryRootLedger::new());
        ledger.set_available(false);
        let mut watcher = RootWatcher::spawn(
            ledger.clone(),
            0,
            Duration::from_millis(5),
            Duration::from_secs(1),
        );
        tokio::time::sleep(Duration::from_millis(30)).await;

        ledger.set_available(true);
        let fp = Fingerprint::compute(b"after outage");
        ledger.set_current(&fp).await.unwrap();
        assert_eq!(next(&mut watcher).await.fingerprint, fp);
    }
}
