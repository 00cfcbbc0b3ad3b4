//! Text delivery pipeline
//!
//! Finalized text flows filter → transform → format → scheduled injection.
//! The filter and format rules belong to the injector collaborator; the
//! transform stages are the configured hot-word/punctuation sequence.
//!
//! Injection is scheduled after a configured delay (to avoid racing the
//! OS focus state right after the trigger key is released) and is
//! fire-and-forget: the pipeline accepts the next result without awaiting
//! injection, and a scheduled delivery runs to completion even if the
//! controller has since changed phase. Failures are reported back through
//! the failure channel and surface as `last_error` only.

use crate::inject::TextInjector;
use crate::text::TextTransforms;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct DeliveryPipeline {
    injector: Arc<dyn TextInjector>,
    transforms: TextTransforms,
    delay: Duration,
    failure_tx: mpsc::Sender<String>,
}

impl DeliveryPipeline {
    pub fn new(
        injector: Arc<dyn TextInjector>,
        transforms: TextTransforms,
        delay: Duration,
        failure_tx: mpsc::Sender<String>,
    ) -> Self {
        Self {
            injector,
            transforms,
            delay,
            failure_tx,
        }
    }

    /// Filter, transform, format, and schedule injection of one finalized
    /// result. Returns immediately; rejected text is discarded, not queued.
    pub fn deliver(&self, text: String) {
        if !self.injector.should_input(&text) {
            tracing::info!("Delivery filter rejected text: {:?}", text);
            return;
        }

        let staged = self.transforms.apply(&text);
        if staged != text {
            tracing::debug!("After transform stages: {:?}", staged);
        }

        let formatted = self.injector.format(&staged);

        let injector = self.injector.clone();
        let failure_tx = self.failure_tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            if let Err(e) = injector.inject(&formatted).await {
                tracing::error!("Text injection failed: {}", e);
                let _ = failure_tx.send(e.to_string()).await;
            } else {
                tracing::info!("Injected {} chars", formatted.chars().count());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextConfig;
    use crate::error::InjectError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct RecordingInjector {
        injected: Mutex<Vec<String>>,
        allow: AtomicBool,
        fail: AtomicBool,
    }

    impl RecordingInjector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                injected: Mutex::new(Vec::new()),
                allow: AtomicBool::new(true),
                fail: AtomicBool::new(false),
            })
        }

        fn injected(&self) -> Vec<String> {
            self.injected.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TextInjector for RecordingInjector {
        fn should_input(&self, text: &str) -> bool {
            self.allow.load(Ordering::SeqCst) && !text.trim().is_empty()
        }

        fn format(&self, text: &str) -> String {
            text.trim().to_string()
        }

        async fn inject(&self, text: &str) -> Result<(), InjectError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(InjectError::InjectionFailed("mock failure".to_string()));
            }
            self.injected.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn pipeline(
        injector: Arc<RecordingInjector>,
        delay_ms: u64,
    ) -> (DeliveryPipeline, mpsc::Receiver<String>) {
        let (failure_tx, failure_rx) = mpsc::channel(8);
        let pipeline = DeliveryPipeline::new(
            injector,
            TextTransforms::from_config(&TextConfig::default()),
            Duration::from_millis(delay_ms),
            failure_tx,
        );
        (pipeline, failure_rx)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_after_delay() {
        let injector = RecordingInjector::new();
        let (pipeline, _failure_rx) = pipeline(injector.clone(), 500);

        pipeline.deliver("  hello  ".to_string());

        // nothing injected while the clock is frozen short of the delay
        tokio::task::yield_now().await;
        assert!(injector.injected().is_empty());

        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;
        assert_eq!(injector.injected(), vec!["hello".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn filter_rejection_never_injects() {
        let injector = RecordingInjector::new();
        injector.allow.store(false, Ordering::SeqCst);
        let (pipeline, _failure_rx) = pipeline(injector.clone(), 10);

        pipeline.deliver("hello".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(injector.injected().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn blank_text_is_filtered() {
        let injector = RecordingInjector::new();
        let (pipeline, _failure_rx) = pipeline(injector.clone(), 10);

        pipeline.deliver("   ".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(injector.injected().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_reported_not_swallowed() {
        let injector = RecordingInjector::new();
        injector.fail.store(true, Ordering::SeqCst);
        let (pipeline, mut failure_rx) = pipeline(injector.clone(), 10);

        pipeline.deliver("hello".to_string());
        tokio::time::sleep(Duration::from_millis(100)).await;

        let detail = failure_rx.recv().await.expect("failure must be reported");
        assert!(detail.contains("mock failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn deliveries_do_not_block_each_other() {
        let injector = RecordingInjector::new();
        let (pipeline, _failure_rx) = pipeline(injector.clone(), 200);

        pipeline.deliver("first".to_string());
        pipeline.deliver("second".to_string());

        tokio::time::sleep(Duration::from_millis(300)).await;
        tokio::task::yield_now().await;

        let injected = injector.injected();
        assert_eq!(injected.len(), 2);
        assert!(injected.contains(&"first".to_string()));
        assert!(injected.contains(&"second".to_string()));
    }
}
