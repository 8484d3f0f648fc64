// Search-as-you-type: wait for the input to settle before fetching
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::feed::NewsFeed;

pub const DEFAULT_SEARCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Default)]
struct TimerState {
    /// Bumped by every start and cancel; a timer only fires if its
    /// generation is still current
    generation: u64,
    armed: bool,
    running: usize,
}

fn lock_state(state: &Mutex<TimerState>) -> MutexGuard<'_, TimerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Decrements the running count when a fired action ends, even by panic
struct RunningGuard(Arc<Mutex<TimerState>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        lock_state(&self.0).running -= 1;
    }
}

/// One-shot delayed action that can be called off before it fires.
///
/// Firing and cancelling both go through the same lock, so once `cancel`
/// returns the action can no longer start. An action that already started
/// runs as its own task and is never interrupted.
#[derive(Default)]
pub struct CancellableTimer {
    state: Arc<Mutex<TimerState>>,
    handle: Option<JoinHandle<()>>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` after `delay`, cancelling whatever was pending
    pub fn start<F>(&mut self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let generation = {
            let mut state = lock_state(&self.state);
            state.generation += 1;
            state.armed = true;
            state.generation
        };

        let shared = Arc::clone(&self.state);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut state = lock_state(&shared);
            if state.generation != generation || !state.armed {
                return;
            }
            state.armed = false;
            state.running += 1;

            let running = RunningGuard(Arc::clone(&shared));
            tokio::spawn(async move {
                let _running = running;
                action.await;
            });
        }));
    }

    /// Returns true if a pending action was stopped
    pub fn cancel(&mut self) -> bool {
        let was_armed = {
            let mut state = lock_state(&self.state);
            state.generation += 1;
            std::mem::replace(&mut state.armed, false)
        };
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        was_armed
    }

    /// Waiting for the delay to run out
    pub fn is_pending(&self) -> bool {
        lock_state(&self.state).armed
    }

    /// Fired and still running
    pub fn is_running(&self) -> bool {
        lock_state(&self.state).running > 0
    }

    /// Nothing pending and nothing running
    pub fn is_idle(&self) -> bool {
        let state = lock_state(&self.state);
        !state.armed && state.running == 0
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

type SearchAction = dyn Fn(String) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync;

/// Turns a burst of query edits into at most one search.
///
/// Every call restarts the timer. When it runs out, the latest text is
/// searched as a brand-new query, unless it is empty.
pub struct SearchDebouncer {
    delay: Duration,
    timer: Mutex<CancellableTimer>,
    action: Arc<SearchAction>,
}

impl SearchDebouncer {
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            timer: Mutex::new(CancellableTimer::new()),
            action: Arc::new(move |query| -> Pin<Box<dyn Future<Output = ()> + Send>> {
                Box::pin(action(query))
            }),
        }
    }

    /// Debounced searches that feed `NewsFeed::new_search`
    pub fn for_feed(feed: Arc<NewsFeed>, delay: Duration) -> Self {
        Self::new(delay, move |query| {
            let feed = Arc::clone(&feed);
            async move {
                feed.new_search(&query).await;
            }
        })
    }

    pub fn on_query_changed(&self, text: &str) {
        let text = text.to_string();
        let action = Arc::clone(&self.action);
        let mut timer = self.timer.lock().unwrap_or_else(PoisonError::into_inner);

        if timer.cancel() {
            debug!("Superseded pending search");
        }

        timer.start(self.delay, async move {
            if text.is_empty() {
                debug!("Query cleared, nothing to search");
                return;
            }
            debug!("Query settled on \"{}\"", text);
            action(text).await;
        });
    }

    /// Drop any pending search without running it
    pub fn cancel(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel()
    }

    pub fn is_pending(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_pending()
    }

    /// No search waiting and none still running
    pub fn is_idle(&self) -> bool {
        self.timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_idle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityFlag;
    use crate::models::{Article, Page};
    use crate::remote::MockRemoteSource;
    use crate::repository::SyncRepository;
    use crate::store::SqliteLocalStore;
    use tokio::time::{sleep, Instant};

    type Fired = Arc<Mutex<Vec<(String, Duration)>>>;

    fn recording_debouncer(start: Instant) -> (SearchDebouncer, Fired) {
        let fired: Fired = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&fired);
        let debouncer = SearchDebouncer::new(DEFAULT_SEARCH_DELAY, move |query| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push((query, start.elapsed()));
            }
        });
        (debouncer, fired)
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_query_fires() {
        let start = Instant::now();
        let (debouncer, fired) = recording_debouncer(start);

        debouncer.on_query_changed("r");
        sleep(Duration::from_millis(100)).await;
        debouncer.on_query_changed("ru");
        sleep(Duration::from_millis(50)).await;
        debouncer.on_query_changed("rust");

        // t=600: nothing yet, the last edit was at t=150
        sleep(Duration::from_millis(450)).await;
        assert!(fired.lock().unwrap().is_empty());
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(100)).await;
        let fired = fired.lock().unwrap().clone();
        assert_eq!(fired, vec![("rust".to_string(), Duration::from_millis(650))]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_triggers_nothing() {
        let start = Instant::now();
        let (debouncer, fired) = recording_debouncer(start);

        debouncer.on_query_changed("rust");
        sleep(Duration::from_millis(100)).await;
        debouncer.on_query_changed("");

        sleep(Duration::from_secs(2)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_fire() {
        let start = Instant::now();
        let (debouncer, fired) = recording_debouncer(start);

        debouncer.on_query_changed("rust");
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        sleep(Duration::from_secs(2)).await;
        assert!(fired.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_queries_each_fire() {
        let start = Instant::now();
        let (debouncer, fired) = recording_debouncer(start);

        debouncer.on_query_changed("first");
        sleep(Duration::from_millis(600)).await;
        debouncer.on_query_changed("second");
        sleep(Duration::from_millis(600)).await;

        let queries: Vec<String> = fired
            .lock()
            .unwrap()
            .iter()
            .map(|(q, _)| q.clone())
            .collect();
        assert_eq!(queries, vec!["first", "second"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancel_near_deadline_never_lets_action_start() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let stale_runs = Arc::new(AtomicUsize::new(0));
        for _ in 0..1000 {
            let ran = Arc::new(AtomicUsize::new(0));
            let flag = Arc::clone(&ran);

            let mut timer = CancellableTimer::new();
            timer.start(Duration::from_micros(50), async move {
                flag.fetch_add(1, Ordering::SeqCst);
            });
            std::thread::sleep(Duration::from_micros(45));
            let cancelled = timer.cancel();

            if cancelled {
                tokio::time::sleep(Duration::from_millis(2)).await;
                if ran.load(Ordering::SeqCst) > 0 {
                    stale_runs.fetch_add(1, Ordering::SeqCst);
                }
            } else {
                // Too late to cancel: it fired and runs to completion
                while ran.load(Ordering::SeqCst) == 0 {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        }
        assert_eq!(stale_runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_only_after_fired_action_finishes() {
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        let mut timer = CancellableTimer::new();
        assert!(timer.is_idle());

        timer.start(Duration::from_millis(100), async move {
            let _ = wait.await;
        });
        assert!(timer.is_pending());
        assert!(!timer.is_idle());

        sleep(Duration::from_millis(150)).await;
        assert!(!timer.is_pending());
        assert!(timer.is_running());
        assert!(!timer.is_idle());
        // Already running, so there is nothing left to cancel
        assert!(!timer.cancel());

        release.send(()).unwrap();
        sleep(Duration::from_millis(1)).await;
        assert!(timer.is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_gets_one_fresh_search() {
        let mut remote = MockRemoteSource::new();
        remote
            .expect_search()
            .withf(|query, page| query == "rust" && *page == 1)
            .times(1)
            .returning(|_, _| Ok(Page::new(vec![Article::new("https://news.test/r", "R")], 1)));

        let repo = SyncRepository::new(
            Arc::new(remote),
            Arc::new(SqliteLocalStore::in_memory().unwrap()),
            Arc::new(ConnectivityFlag::new(true)),
        );
        let feed = Arc::new(NewsFeed::new(Arc::new(repo), "eg"));
        let mut updates = feed.subscribe_search_news();

        let debouncer = SearchDebouncer::for_feed(Arc::clone(&feed), DEFAULT_SEARCH_DELAY);
        debouncer.on_query_changed("ru");
        debouncer.on_query_changed("rus");
        debouncer.on_query_changed("rust");

        assert!(updates.next().await.unwrap().is_loading());
        let done = updates.next().await.unwrap();
        assert_eq!(done.data().unwrap().articles.len(), 1);
    }
}
