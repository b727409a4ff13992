use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use glossa_config::batch::BatchConfig;
use glossa_translator::{LanguageCode, TranslateError, Translator};
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::queue::{PendingQueue, PendingRequest};
use crate::route::RouteKey;

/// Failure delivered to every caller of a batch that could not be translated.
///
/// Batch failures fan out to all requests that were drained together, so the
/// error is cheap to clone; the backend error itself is shared by `Arc`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BatchError {
    #[error("translation backend failed: {0}")]
    Backend(Arc<TranslateError>),

    #[error("backend returned {got} translations for {expected} texts")]
    LengthMismatch { expected: usize, got: usize },

    #[error("backend call exceeded {0:?}")]
    TimedOut(Duration),

    #[error("aggregator closed before the request completed")]
    Closed,
}

/// Handle on a submitted translation.
///
/// Returned immediately by [`Aggregator::submit`]; the caller suspends only
/// when awaiting [`Pending::wait`]. Dropping the handle abandons the request
/// without disturbing other requests batched together with it.
pub struct Pending {
    rx: oneshot::Receiver<Result<String, BatchError>>,
}

impl Pending {
    fn resolved(text: String) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Ok(text));
        Self { rx }
    }

    /// Wait for the batch carrying this request to settle.
    pub async fn wait(self) -> Result<String, BatchError> {
        self.rx.await.unwrap_or(Err(BatchError::Closed))
    }
}

/// Coalesces concurrent translation requests into size-bounded batches,
/// one backend call per batch, and fans results back out per request.
///
/// Each (source, target) pair gets its own queue and its own flush task,
/// so a slow or failing batch on one route never delays another route.
/// Flush tasks are armed lazily by the first submit that finds a queue
/// unarmed and disarm themselves once a drain comes up empty.
pub struct Aggregator {
    backend: Arc<dyn Translator>,
    config: BatchConfig,
    route: RwLock<RouteKey>,
    lanes: Mutex<HashMap<RouteKey, Arc<PendingQueue>>>,
    cancel: CancellationToken,
}

impl Aggregator {
    /// `backend` must already be authenticated; provisioning failures belong
    /// to the provider constructor, not to the submit path.
    pub fn new(
        backend: Arc<dyn Translator>,
        config: BatchConfig,
        source: impl Into<LanguageCode>,
        target: impl Into<LanguageCode>,
    ) -> Self {
        Self {
            backend,
            config,
            route: RwLock::new(RouteKey::new(source, target)),
            lanes: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Change the source language of the default route.
    pub fn set_source(&self, lang: impl Into<LanguageCode>) {
        self.route.write().unwrap().source = lang.into();
    }

    /// Change the target language of the default route.
    pub fn set_target(&self, lang: impl Into<LanguageCode>) {
        self.route.write().unwrap().target = lang.into();
    }

    pub fn route(&self) -> RouteKey {
        self.route.read().unwrap().clone()
    }

    /// Submit a text on the default route. Returns without suspending.
    pub fn submit(&self, text: impl Into<String>) -> Pending {
        let route = self.route();
        self.submit_to(text, route.source, route.target)
    }

    /// Submit a text on an explicit route.
    ///
    /// Identity routes resolve immediately to the input text; no queue, no
    /// backend call. Must be called from within a tokio runtime.
    pub fn submit_to(
        &self,
        text: impl Into<String>,
        source: impl Into<LanguageCode>,
        target: impl Into<LanguageCode>,
    ) -> Pending {
        let text = text.into();
        let key = RouteKey::new(source, target);

        if key.is_identity() {
            return Pending::resolved(text);
        }

        let (tx, rx) = oneshot::channel();
        let queue = self.lane(&key);
        let arm = queue.push(PendingRequest { text, slot: tx });

        if arm {
            tracing::debug!(route = %key, "arming flush task");
            tokio::spawn(flush_loop(
                queue,
                self.backend.clone(),
                key,
                self.config.clone(),
                self.cancel.child_token(),
            ));
        }

        Pending { rx }
    }

    /// Stop all flush tasks. Every not-yet-dispatched request resolves to
    /// [`BatchError::Closed`].
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    fn lane(&self, key: &RouteKey) -> Arc<PendingQueue> {
        let mut lanes = self.lanes.lock().unwrap();
        lanes
            .entry(key.clone())
            .or_insert_with(|| Arc::new(PendingQueue::new()))
            .clone()
    }
}

/// One flush cycle per tick: drain a budgeted prefix, one backend call for
/// it, deliver per request. Ends itself when a drain finds the queue empty;
/// the next submit arms a fresh task.
async fn flush_loop(
    queue: Arc<PendingQueue>,
    backend: Arc<dyn Translator>,
    key: RouteKey,
    config: BatchConfig,
    cancel: CancellationToken,
) {
    let period = config.flush_interval();
    let mut tick = time::interval_at(time::Instant::now() + period, period);
    // Ticks missed during a slow backend call are dropped, not replayed.
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let pending = queue.drain_all();
                if !pending.is_empty() {
                    tracing::debug!(route = %key, n = pending.len(), "closing pending requests");
                }
                for req in pending {
                    req.deliver(Err(BatchError::Closed));
                }
                return;
            }
            _ = tick.tick() => {}
        }

        let Some(batch) = queue.take_batch(config.max_chars, config.max_texts) else {
            tracing::debug!(route = %key, "queue drained, disarming flush task");
            return;
        };

        let texts: Vec<String> = batch.iter().map(|req| req.text.clone()).collect();
        tracing::debug!(route = %key, n = texts.len(), "dispatching batch");

        let call = backend.translate_batch(&texts, &key.source, &key.target);
        match time::timeout(config.request_timeout(), call).await {
            Ok(Ok(translations)) => {
                if translations.len() != batch.len() {
                    tracing::warn!(
                        route = %key,
                        expected = batch.len(),
                        got = translations.len(),
                        "backend returned a mismatched batch"
                    );
                    let err = BatchError::LengthMismatch {
                        expected: batch.len(),
                        got: translations.len(),
                    };
                    for req in batch {
                        req.deliver(Err(err.clone()));
                    }
                } else {
                    for (req, translation) in batch.into_iter().zip(translations) {
                        req.deliver(Ok(translation));
                    }
                }
            }
            Ok(Err(e)) => {
                tracing::error!(route = %key, error = %e, "batch translation failed");
                let e = Arc::new(e);
                for req in batch {
                    req.deliver(Err(BatchError::Backend(e.clone())));
                }
            }
            Err(_) => {
                tracing::error!(route = %key, "backend call timed out");
                let err = BatchError::TimedOut(config.request_timeout());
                for req in batch {
                    req.deliver(Err(err.clone()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use glossa_translator::ProviderMetadata;
    use tokio::time::{Instant, timeout};

    use super::*;

    fn stub_metadata(name: &str) -> ProviderMetadata {
        ProviderMetadata {
            name: name.to_string(),
            requires_api_key: false,
            free_tier_available: true,
        }
    }

    fn test_config(flush_interval_ms: u64) -> BatchConfig {
        BatchConfig {
            flush_interval_ms,
            ..BatchConfig::default()
        }
    }

    /// Uppercases every text and records each call with its route and time.
    struct Recording {
        calls: StdMutex<Vec<(String, String, Vec<String>)>>,
        call_times: StdMutex<Vec<Instant>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: StdMutex::new(Vec::new()),
                call_times: StdMutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, Vec<String>)> {
            self.calls.lock().unwrap().clone()
        }

        fn call_times(&self) -> Vec<Instant> {
            self.call_times.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Translator for Recording {
        async fn translate_batch(
            &self,
            texts: &[String],
            from: &str,
            to: &str,
        ) -> Result<Vec<String>, TranslateError> {
            self.calls
                .lock()
                .unwrap()
                .push((from.to_string(), to.to_string(), texts.to_vec()));
            self.call_times.lock().unwrap().push(Instant::now());
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }

        fn metadata(&self) -> ProviderMetadata {
            stub_metadata("recording")
        }
    }

    /// Fails batches for one target language, uppercases the rest.
    struct FailFor {
        target: String,
    }

    #[async_trait]
    impl Translator for FailFor {
        async fn translate_batch(
            &self,
            texts: &[String],
            _from: &str,
            to: &str,
        ) -> Result<Vec<String>, TranslateError> {
            if to == self.target {
                return Err(TranslateError::ApiError("quota exhausted".to_string()));
            }
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }

        fn metadata(&self) -> ProviderMetadata {
            stub_metadata("fail-for")
        }
    }

    /// Sleeps before answering batches for one target language.
    struct SlowFor {
        target: String,
        delay: Duration,
    }

    #[async_trait]
    impl Translator for SlowFor {
        async fn translate_batch(
            &self,
            texts: &[String],
            _from: &str,
            to: &str,
        ) -> Result<Vec<String>, TranslateError> {
            if to == self.target {
                time::sleep(self.delay).await;
            }
            Ok(texts.iter().map(|t| t.to_uppercase()).collect())
        }

        fn metadata(&self) -> ProviderMetadata {
            stub_metadata("slow-for")
        }
    }

    /// Always answers with a single translation, whatever was asked.
    struct Mismatched;

    #[async_trait]
    impl Translator for Mismatched {
        async fn translate_batch(
            &self,
            _texts: &[String],
            _from: &str,
            _to: &str,
        ) -> Result<Vec<String>, TranslateError> {
            Ok(vec!["solo".to_string()])
        }

        fn metadata(&self) -> ProviderMetadata {
            stub_metadata("mismatched")
        }
    }

    /// Never answers within any reasonable deadline.
    struct Hanging;

    #[async_trait]
    impl Translator for Hanging {
        async fn translate_batch(
            &self,
            texts: &[String],
            _from: &str,
            _to: &str,
        ) -> Result<Vec<String>, TranslateError> {
            time::sleep(Duration::from_secs(3600)).await;
            Ok(texts.to_vec())
        }

        fn metadata(&self) -> ProviderMetadata {
            stub_metadata("hanging")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identity_route_short_circuits() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(1000), "es", "es");

        let result = agg.submit("hola").wait().await;

        assert_eq!(result.unwrap(), "hola");
        assert!(backend.calls().is_empty(), "identity must not hit the backend");
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_preserves_submission_order() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(1000), "es", "en");

        let a = agg.submit("uno");
        let b = agg.submit("dos");
        let c = agg.submit("tres");

        assert_eq!(a.wait().await.unwrap(), "UNO");
        assert_eq!(b.wait().await.unwrap(), "DOS");
        assert_eq!(c.wait().await.unwrap(), "TRES");

        let calls = backend.calls();
        assert_eq!(calls.len(), 1, "one flush window, one backend call");
        assert_eq!(calls[0].2, vec!["uno", "dos", "tres"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_char_budget_splits_across_flushes() {
        let backend = Recording::new();
        let config = BatchConfig {
            max_chars: 10,
            ..test_config(1000)
        };
        let agg = Aggregator::new(backend.clone(), config, "en", "de");

        let a = agg.submit("aaaa");
        let b = agg.submit("bbbb");
        let c = agg.submit("cccc");

        assert_eq!(a.wait().await.unwrap(), "AAAA");
        assert_eq!(b.wait().await.unwrap(), "BBBB");
        assert_eq!(c.wait().await.unwrap(), "CCCC");

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2, vec!["aaaa", "bbbb"]);
        assert_eq!(calls[1].2, vec!["cccc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_request_still_dispatched() {
        let backend = Recording::new();
        let config = BatchConfig {
            max_chars: 10,
            ..test_config(1000)
        };
        let agg = Aggregator::new(backend.clone(), config, "en", "de");

        let result = agg.submit("far beyond any character budget").wait().await;

        assert_eq!(result.unwrap(), "FAR BEYOND ANY CHARACTER BUDGET");
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_rearms_after_drain() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(1000), "en", "de");

        agg.submit("first").wait().await.unwrap();
        assert_eq!(backend.calls().len(), 1);

        // Queue drained, flush task gone. Nothing may fire while idle.
        time::sleep(Duration::from_secs(3)).await;
        assert_eq!(backend.calls().len(), 1);

        // A fresh submit starts a fresh cycle: the flush comes one full
        // interval after the submit, not immediately.
        let rearmed_at = Instant::now();
        agg.submit("second").wait().await.unwrap();

        let times = backend.call_times();
        assert_eq!(times.len(), 2);
        assert!(times[1] - rearmed_at >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_reaches_every_caller() {
        let backend = Arc::new(FailFor {
            target: "de".to_string(),
        });
        let agg = Aggregator::new(backend, test_config(1000), "en", "de");

        let a = agg.submit("eins");
        let b = agg.submit("zwei");

        assert!(matches!(a.wait().await, Err(BatchError::Backend(_))));
        assert!(matches!(b.wait().await, Err(BatchError::Backend(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_between_routes() {
        let backend = Arc::new(FailFor {
            target: "de".to_string(),
        });
        let agg = Aggregator::new(backend, test_config(1000), "en", "de");

        let failing = agg.submit_to("hello", "en", "de");
        let healthy = agg.submit_to("hello", "en", "fr");

        assert!(matches!(failing.wait().await, Err(BatchError::Backend(_))));
        assert_eq!(healthy.wait().await.unwrap(), "HELLO");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_route_does_not_block_sibling() {
        let backend = Arc::new(SlowFor {
            target: "de".to_string(),
            delay: Duration::from_secs(30),
        });
        let agg = Aggregator::new(backend, test_config(1000), "en", "de");

        let slow = agg.submit_to("langsam", "en", "de");
        let fast = agg.submit_to("vite", "en", "fr");

        let slow_task = tokio::spawn(slow.wait());

        let fast_result = timeout(Duration::from_secs(5), fast.wait())
            .await
            .expect("fast route must not wait on the slow one");
        assert_eq!(fast_result.unwrap(), "VITE");
        assert!(!slow_task.is_finished());

        assert_eq!(slow_task.await.unwrap().unwrap(), "LANGSAM");
    }

    #[tokio::test(start_paused = true)]
    async fn test_length_mismatch_is_a_typed_error() {
        let agg = Aggregator::new(Arc::new(Mismatched), test_config(1000), "en", "de");

        let a = agg.submit("eins");
        let b = agg.submit("zwei");

        assert!(matches!(
            a.wait().await,
            Err(BatchError::LengthMismatch { expected: 2, got: 1 })
        ));
        assert!(matches!(
            b.wait().await,
            Err(BatchError::LengthMismatch { expected: 2, got: 1 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_timeout_fails_the_batch() {
        let config = BatchConfig {
            request_timeout_ms: 100,
            ..test_config(1000)
        };
        let agg = Aggregator::new(Arc::new(Hanging), config, "en", "de");

        let result = agg.submit("hallo").wait().await;

        assert!(matches!(result, Err(BatchError::TimedOut(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_caller_does_not_disturb_batchmates() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(1000), "en", "de");

        let a = agg.submit("eins");
        let abandoned = agg.submit("zwei");
        let c = agg.submit("drei");
        drop(abandoned);

        assert_eq!(a.wait().await.unwrap(), "EINS");
        assert_eq!(c.wait().await.unwrap(), "DREI");
        assert_eq!(backend.calls()[0].2.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_pending_requests() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(60_000), "en", "de");

        let pending = agg.submit("wartend");
        agg.shutdown();

        assert!(matches!(pending.wait().await, Err(BatchError::Closed)));
        assert!(backend.calls().is_empty());

        // Submits after shutdown settle too, instead of hanging.
        let late = agg.submit("zu spät");
        assert!(matches!(late.wait().await, Err(BatchError::Closed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_route_setters() {
        let backend = Recording::new();
        let agg = Aggregator::new(backend.clone(), test_config(1000), "en", "de");

        agg.set_target("fr");
        agg.submit("bonjour").wait().await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls[0].0, "en");
        assert_eq!(calls[0].1, "fr");

        // Driving source onto the target makes the default route identity.
        agg.set_source("fr");
        assert_eq!(agg.submit("déjà vu").wait().await.unwrap(), "déjà vu");
        assert_eq!(backend.calls().len(), 1);
    }
}
