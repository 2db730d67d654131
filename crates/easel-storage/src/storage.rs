use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use easel_host_http::{Fetcher, TransportError};
use easel_task::{PendingFetch, TaskRunner};
use futures::FutureExt;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::entry::{EntryStatus, Outcome, Slot, StoreEntry};
use crate::notifier::{Completion, CompletionNotifier};
use crate::store::Store;

/// What a call to [`Storage::fetch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
  /// A new background retrieval was started.
  Scheduled,
  /// The key is already being fetched; nothing was started.
  AlreadyPending,
  /// The key already holds a value; nothing was started.
  AlreadyReady,
  /// The key already failed; nothing was started.
  AlreadyFailed,
  /// The runner is shutting down. The entry was recorded as failed and its
  /// completion was still reported.
  Rejected,
}

/// Storage facade handed to handlers.
///
/// Cloning is cheap and every clone sees the same store.
#[derive(Clone)]
pub struct Storage {
  inner: Arc<Inner>,
}

struct Inner {
  store: Store,
  fetcher: Arc<dyn Fetcher>,
  runner: TaskRunner,
  notifier: Arc<dyn CompletionNotifier>,
  /// Fetches whose completion has not been reported yet.
  outstanding: AtomicUsize,
  idle: Notify,
}

/// Counts one outstanding fetch until dropped, whether the fetch reported its
/// completion, panicked or was abandoned.
struct OutstandingGuard(Arc<Inner>);

impl OutstandingGuard {
  fn new(inner: Arc<Inner>) -> Self {
    inner.outstanding.fetch_add(1, Ordering::SeqCst);
    Self(inner)
  }
}

impl Drop for OutstandingGuard {
  fn drop(&mut self) {
    if self.0.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
      self.0.idle.notify_waiters();
    }
  }
}

impl Storage {
  pub fn new(
    fetcher: Arc<dyn Fetcher>,
    runner: TaskRunner,
    notifier: impl CompletionNotifier + 'static,
  ) -> Self {
    Self {
      inner: Arc::new(Inner {
        store: Store::new(),
        fetcher,
        runner,
        notifier: Arc::new(notifier),
        outstanding: AtomicUsize::new(0),
        idle: Notify::new(),
      }),
    }
  }

  /// Start fetching `target` into `key` and return without waiting.
  ///
  /// Only the first call for a key starts a retrieval. Later calls, whatever
  /// the state of the entry, change nothing and report no new completion.
  pub fn fetch(&self, target: &str, key: &str) -> FetchOutcome {
    let (slot, created) = self.inner.store.reserve(key, target);
    if !created {
      let outcome = match slot.status() {
        EntryStatus::Pending => FetchOutcome::AlreadyPending,
        EntryStatus::Ready => FetchOutcome::AlreadyReady,
        EntryStatus::Failed => FetchOutcome::AlreadyFailed,
      };
      debug!(key = %key, ?outcome, "fetch ignored for existing entry");
      return outcome;
    }

    let inner = self.inner.clone();
    let work_slot = slot.clone();
    let work_key = key.to_string();
    let guard = OutstandingGuard::new(self.inner.clone());
    let work = async move {
      // Dropped after `complete`, so the count only falls once the
      // completion is already queued.
      let _guard = guard;
      let fetch = AssertUnwindSafe(async { inner.fetcher.fetch(work_slot.target()).await });
      let result = match fetch.catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
          let message = panic_message(panic.as_ref());
          error!(key = %work_key, url = %work_slot.target(), panic = %message, "fetch panicked");
          Err(TransportError::request(
            work_slot.target(),
            format!("fetch panicked: {message}"),
          ))
        }
      };
      inner.complete(&work_key, &work_slot, result);
    };

    match self.inner.runner.spawn(PendingFetch::new(target, key), work) {
      Ok(_) => FetchOutcome::Scheduled,
      Err(e) => {
        self
          .inner
          .complete(key, &slot, Err(TransportError::request(target, e)));
        FetchOutcome::Rejected
      }
    }
  }

  /// The fetched value for `key`, if its fetch has succeeded.
  ///
  /// Pending, failed and never-fetched keys all read as `None`; use
  /// [`Storage::status`] to tell them apart.
  pub fn get(&self, key: &str) -> Option<String> {
    self
      .inner
      .store
      .slot(key)
      .and_then(|slot| slot.value().map(str::to_string))
  }

  /// Status of `key`, or `None` if it was never fetched.
  pub fn status(&self, key: &str) -> Option<EntryStatus> {
    self.inner.store.status(key)
  }

  /// Failure message for `key`, if its fetch failed.
  pub fn error(&self, key: &str) -> Option<String> {
    self
      .inner
      .store
      .slot(key)
      .and_then(|slot| slot.error().map(ToString::to_string))
  }

  pub fn snapshot(&self) -> BTreeMap<String, StoreEntry> {
    self.inner.store.snapshot()
  }

  /// Number of fetches whose completion has not been reported yet.
  ///
  /// A fetch stops counting only after its completion reached the notifier.
  /// Abandoned fetches stop counting without reporting.
  pub fn in_flight(&self) -> usize {
    self.inner.outstanding.load(Ordering::SeqCst)
  }

  /// Wait until no fetch is outstanding.
  pub async fn wait_idle(&self) {
    loop {
      let notified = self.inner.idle.notified();
      tokio::pin!(notified);
      notified.as_mut().enable();

      if self.in_flight() == 0 {
        return;
      }
      notified.await;
    }
  }

  pub fn runner(&self) -> &TaskRunner {
    &self.inner.runner
  }
}

impl Inner {
  /// Publish the outcome, then report it. Readers woken by the notification
  /// always see the published entry.
  fn complete(&self, key: &str, slot: &Slot, result: Result<String, TransportError>) {
    let (outcome, status) = match result {
      Ok(body) => {
        debug!(key = %key, bytes = body.len(), "fetch completed");
        (Outcome::Ready(body), EntryStatus::Ready)
      }
      Err(error) => {
        warn!(key = %key, url = %slot.target(), error = %error, "fetch failed");
        (Outcome::Failed(error), EntryStatus::Failed)
      }
    };

    if !slot.publish(outcome) {
      warn!(key = %key, "entry already finalized, dropping duplicate completion");
      return;
    }

    self.notifier.notify(Completion {
      key: key.to_string(),
      status,
    });
  }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
  if let Some(message) = panic.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = panic.downcast_ref::<String>() {
    message.clone()
  } else {
    "unknown panic".to_string()
  }
}

impl fmt::Debug for Storage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Storage")
      .field("entries", &self.inner.store.len())
      .field("in_flight", &self.in_flight())
      .field("runner", &self.inner.runner)
      .finish()
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Mutex, OnceLock};
  use std::time::Duration;

  use easel_host_http::FetchFuture;
  use easel_host_http::testing::ScriptedFetcher;
  use easel_task::ShutdownMode;
  use tokio::sync::mpsc;
  use tokio::sync::mpsc::error::TryRecvError;

  use super::*;
  use crate::notifier::ChannelNotifier;

  const README: &str = "https://example.com/README.md";

  fn storage_with(
    fetcher: Arc<ScriptedFetcher>,
  ) -> (Storage, mpsc::UnboundedReceiver<Completion>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let runner = TaskRunner::current().unwrap();
    let storage = Storage::new(fetcher, runner, ChannelNotifier::new(tx));
    (storage, rx)
  }

  #[tokio::test]
  async fn test_get_never_fetched_is_absent() {
    let (storage, _rx) = storage_with(Arc::new(ScriptedFetcher::new()));

    assert_eq!(storage.get("nothing"), None);
    assert_eq!(storage.status("nothing"), None);
    assert_eq!(storage.error("nothing"), None);
  }

  #[tokio::test]
  async fn test_get_is_absent_right_after_fetch() {
    let fetcher = Arc::new(ScriptedFetcher::new().respond(README, "hello"));
    let (storage, _rx) = storage_with(fetcher);

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::Scheduled);
    assert_eq!(storage.get("read_me"), None);
    assert_eq!(storage.status("read_me"), Some(EntryStatus::Pending));
  }

  #[tokio::test]
  async fn test_value_readable_after_completion() {
    let fetcher = Arc::new(ScriptedFetcher::new().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher);

    storage.fetch(README, "read_me");
    let completion = rx.recv().await.unwrap();

    assert_eq!(
      completion,
      Completion {
        key: "read_me".to_string(),
        status: EntryStatus::Ready,
      }
    );
    assert_eq!(storage.get("read_me").as_deref(), Some("hello"));
    assert_eq!(storage.status("read_me"), Some(EntryStatus::Ready));
  }

  #[tokio::test]
  async fn test_failed_fetch_reports_failed() {
    let fetcher = Arc::new(ScriptedFetcher::new().fail(
      README,
      TransportError::Status {
        target: README.to_string(),
        status: 503,
      },
    ));
    let (storage, mut rx) = storage_with(fetcher);

    storage.fetch(README, "read_me");
    let completion = rx.recv().await.unwrap();

    assert_eq!(completion.status, EntryStatus::Failed);
    assert_eq!(storage.get("read_me"), None);
    assert_eq!(storage.status("read_me"), Some(EntryStatus::Failed));
    assert!(storage.error("read_me").unwrap().contains("503"));
  }

  #[tokio::test]
  async fn test_duplicate_fetch_while_pending_starts_one_retrieval() {
    let fetcher = Arc::new(ScriptedFetcher::gated().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher.clone());

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::Scheduled);
    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::AlreadyPending);
    assert_eq!(storage.in_flight(), 1);

    fetcher.release(README);
    rx.recv().await.unwrap();
    storage.runner().shutdown(ShutdownMode::Drain).await;

    assert_eq!(fetcher.calls(README), 1);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
  }

  #[tokio::test]
  async fn test_refetch_after_completion_is_noop() {
    let fetcher = Arc::new(ScriptedFetcher::new().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher.clone());

    storage.fetch(README, "read_me");
    rx.recv().await.unwrap();

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::AlreadyReady);
    assert_eq!(
      storage.fetch("https://example.com/other", "read_me"),
      FetchOutcome::AlreadyReady
    );
    storage.runner().shutdown(ShutdownMode::Drain).await;

    assert_eq!(fetcher.total_calls(), 1);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
  }

  #[tokio::test]
  async fn test_refetch_after_failure_is_noop() {
    let (storage, mut rx) = storage_with(Arc::new(ScriptedFetcher::new()));

    storage.fetch(README, "read_me");
    rx.recv().await.unwrap();

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::AlreadyFailed);
  }

  #[tokio::test]
  async fn test_distinct_keys_complete_in_any_order() {
    let fetcher = Arc::new(
      ScriptedFetcher::gated()
        .respond("https://a", "alpha")
        .respond("https://b", "beta"),
    );
    let (storage, mut rx) = storage_with(fetcher.clone());

    storage.fetch("https://a", "a");
    storage.fetch("https://b", "b");

    fetcher.release("https://b");
    let first = rx.recv().await.unwrap();
    assert_eq!(first.key, "b");
    assert_eq!(storage.get("b").as_deref(), Some("beta"));
    assert_eq!(storage.status("a"), Some(EntryStatus::Pending));
    assert_eq!(storage.get("a"), None);

    fetcher.release("https://a");
    let second = rx.recv().await.unwrap();
    assert_eq!(second.key, "a");
    assert_eq!(storage.get("a").as_deref(), Some("alpha"));
  }

  /// Reads the store from inside the notification to prove the entry was
  /// published first.
  #[derive(Clone, Default)]
  struct ReadingNotifier {
    storage: Arc<OnceLock<Storage>>,
    seen: Arc<Mutex<Vec<(String, Option<String>, Option<EntryStatus>)>>>,
  }

  impl CompletionNotifier for ReadingNotifier {
    fn notify(&self, completion: Completion) {
      let storage = self.storage.get().unwrap();
      self.seen.lock().unwrap().push((
        completion.key.clone(),
        storage.get(&completion.key),
        storage.status(&completion.key),
      ));
    }
  }

  #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
  async fn test_entry_published_before_notification() {
    let fetcher = Arc::new(
      ScriptedFetcher::new()
        .respond("https://a", "alpha")
        .respond("https://b", "beta"),
    );
    let notifier = ReadingNotifier::default();
    let storage = Storage::new(fetcher, TaskRunner::current().unwrap(), notifier.clone());
    let _ = notifier.storage.set(storage.clone());

    storage.fetch("https://a", "a");
    storage.fetch("https://b", "b");
    storage.fetch("https://missing", "c");
    storage.runner().shutdown(ShutdownMode::Drain).await;

    let mut seen = notifier.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
      seen,
      vec![
        ("a".to_string(), Some("alpha".to_string()), Some(EntryStatus::Ready)),
        ("b".to_string(), Some("beta".to_string()), Some(EntryStatus::Ready)),
        ("c".to_string(), None, Some(EntryStatus::Failed)),
      ]
    );
  }

  #[tokio::test]
  async fn test_fetch_after_shutdown_is_rejected_but_reported() {
    let (storage, mut rx) = storage_with(Arc::new(ScriptedFetcher::new()));
    storage.runner().shutdown(ShutdownMode::Drain).await;

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::Rejected);
    assert_eq!(storage.status("read_me"), Some(EntryStatus::Failed));
    assert_eq!(rx.recv().await.unwrap().status, EntryStatus::Failed);
  }

  #[tokio::test]
  async fn test_abandoned_fetch_stays_pending() {
    let fetcher = Arc::new(ScriptedFetcher::gated().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher);

    storage.fetch(README, "read_me");
    storage.runner().shutdown(ShutdownMode::Abandon).await;

    assert_eq!(storage.status("read_me"), Some(EntryStatus::Pending));
    assert_eq!(storage.get("read_me"), None);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
  }

  #[tokio::test]
  async fn test_snapshot_lists_entries() {
    let fetcher = Arc::new(ScriptedFetcher::new().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher);

    storage.fetch(README, "read_me");
    rx.recv().await.unwrap();

    let snapshot = storage.snapshot();
    let entry = &snapshot["read_me"];
    assert_eq!(entry.target, README);
    assert_eq!(entry.value.as_deref(), Some("hello"));

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["read_me"]["status"], "ready");
  }

  /// Fetcher whose retrieval panics after yielding once.
  struct PanickingFetcher;

  impl Fetcher for PanickingFetcher {
    fn fetch(&self, _target: &str) -> FetchFuture<'_> {
      Box::pin(async {
        tokio::task::yield_now().await;
        panic!("connection pool exploded");
      })
    }
  }

  #[tokio::test]
  async fn test_panicking_fetch_is_recorded_failed_and_reported() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let storage = Storage::new(
      Arc::new(PanickingFetcher),
      TaskRunner::current().unwrap(),
      ChannelNotifier::new(tx),
    );

    assert_eq!(storage.fetch(README, "read_me"), FetchOutcome::Scheduled);
    let completion = tokio::time::timeout(Duration::from_secs(5), rx.recv())
      .await
      .unwrap()
      .unwrap();

    assert_eq!(completion.status, EntryStatus::Failed);
    assert_eq!(storage.status("read_me"), Some(EntryStatus::Failed));
    assert!(storage.error("read_me").unwrap().contains("connection pool exploded"));
    storage.wait_idle().await;
    assert_eq!(storage.in_flight(), 0);
  }

  #[tokio::test]
  async fn test_in_flight_falls_only_after_completion_is_reported() {
    let fetcher = Arc::new(ScriptedFetcher::gated().respond(README, "hello"));
    let (storage, mut rx) = storage_with(fetcher.clone());

    storage.fetch(README, "read_me");
    assert_eq!(storage.in_flight(), 1);

    fetcher.release(README);
    storage.wait_idle().await;

    assert_eq!(storage.in_flight(), 0);
    assert_eq!(rx.try_recv().unwrap().key, "read_me");
  }

  #[tokio::test]
  async fn test_abandoned_fetch_stops_counting() {
    let fetcher = Arc::new(ScriptedFetcher::gated().respond(README, "hello"));
    let (storage, _rx) = storage_with(fetcher);

    storage.fetch(README, "read_me");
    storage.runner().shutdown(ShutdownMode::Abandon).await;

    assert_eq!(storage.in_flight(), 0);
    storage.wait_idle().await;
  }
}
