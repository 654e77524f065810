use std::future::Future;
use std::time::Duration;

use rootcid_ledger::{LedgerError, LedgerResult};
use rootcid_store::{StoreError, StoreResult};

/// Run a store call, mapping an expired deadline to `Unavailable`.
pub(crate) async fn store<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = StoreResult<T>>,
) -> StoreResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(StoreError::unavailable(timed_out(op, limit))))
}

/// Run a ledger call, mapping an expired deadline to `Unavailable`.
pub(crate) async fn ledger<T>(
    limit: Duration,
    op: &str,
    call: impl Future<Output = LedgerResult<T>>,
) -> LedgerResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(LedgerError::unavailable(timed_out(op, limit))))
}

fn timed_out(op: &str, limit: Duration) -> String {
    format!("{op} timed out after {limit:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn expiry_is_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        };
        let err = store(Duration::from_millis(10), "put", slow).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref m) if m.contains("put timed out")));
    }

    #[tokio::test]
    async fn inner_errors_pass_through() {
        let err = ledger(Duration::from_secs(1), "set_current", async {
            Err::<(), _>(LedgerError::rejected("reverted"))
        })
        .await
        .unwrap_err();
        assert_eq!(err, LedgerError::rejected("reverted"));
    }
}
