//! Insight service - guarded, best-effort insight requests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ai::InsightGenerator;
use crate::error::{Error, Result};
use crate::models::{AIInsight, Transaction};

/// Default upper bound on a single generator call
pub const DEFAULT_INSIGHT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of an insight request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightRefresh {
    /// The request ran; never empty
    Completed(Vec<AIInsight>),
    /// Another request was already running; nothing was done
    InProgress,
}

/// Clears the loading flag when a request ends, however it ends
struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Requests insights for one owner, at most one at a time
///
/// Generator failures never reach the caller: a missing generator, a transport
/// error, a malformed or empty reply and a timeout all yield the single
/// generic tip from [`AIInsight::fallback`].
pub struct InsightService {
    generator: Option<Arc<dyn InsightGenerator>>,
    timeout: Duration,
    loading: AtomicBool,
    latest: RwLock<Option<Vec<AIInsight>>>,
}

impl InsightService {
    pub fn new(generator: Option<Arc<dyn InsightGenerator>>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_INSIGHT_TIMEOUT,
            loading: AtomicBool::new(false),
            latest: RwLock::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Whether a request is currently running
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Result of the last completed request
    pub fn latest(&self) -> Option<Vec<AIInsight>> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Request insights for `transactions`
    pub async fn request(&self, transactions: &[Transaction]) -> InsightRefresh {
        if self
            .loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Insight request already in progress");
            return InsightRefresh::InProgress;
        }
        let _guard = LoadingGuard(&self.loading);

        let insights = self.generate(transactions).await;

        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(insights.clone());
        InsightRefresh::Completed(insights)
    }

    async fn generate(&self, transactions: &[Transaction]) -> Vec<AIInsight> {
        if transactions.is_empty() {
            return vec![AIInsight::fallback()];
        }
        let Some(generator) = &self.generator else {
            return vec![AIInsight::fallback()];
        };

        match self.call(generator.as_ref(), transactions).await {
            Ok(insights) if !insights.is_empty() => {
                debug!(
                    model = generator.model(),
                    count = insights.len(),
                    "Insights generated"
                );
                insights
            }
            Ok(_) => {
                warn!(model = generator.model(), "AI returned no insights");
                vec![AIInsight::fallback()]
            }
            Err(e) => {
                warn!(model = generator.model(), error = %e, "Insight generation failed");
                vec![AIInsight::fallback()]
            }
        }
    }

    /// One generator call, bounded by the configured timeout
    async fn call(
        &self,
        generator: &dyn InsightGenerator,
        transactions: &[Transaction],
    ) -> Result<Vec<AIInsight>> {
        tokio::time::timeout(self.timeout, generator.generate_insights(transactions))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "{} gave no insights within {:.1}s",
                    generator.model(),
                    self.timeout.as_secs_f64()
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AIClient, MockBackend};
    use crate::models::InsightType;
    use crate::store::demo_transactions;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    /// Counts calls and blocks until released
    struct GatedGenerator {
        calls: AtomicUsize,
        release: Notify,
        reply: Vec<AIInsight>,
    }

    #[async_trait]
    impl InsightGenerator for GatedGenerator {
        async fn generate_insights(&self, _: &[Transaction]) -> Result<Vec<AIInsight>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(self.reply.clone())
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn model(&self) -> &str {
            "gated"
        }

        fn host(&self) -> &str {
            "test://gated"
        }
    }

    fn gated(reply: Vec<AIInsight>) -> Arc<GatedGenerator> {
        Arc::new(GatedGenerator {
            calls: AtomicUsize::new(0),
            release: Notify::new(),
            reply,
        })
    }

    fn warning() -> AIInsight {
        AIInsight {
            title: "Rent".to_string(),
            message: "Housing is most of your spending.".to_string(),
            kind: InsightType::Warning,
        }
    }

    #[tokio::test]
    async fn test_mock_generator() {
        let service = InsightService::new(Some(Arc::new(AIClient::mock())));
        match service.request(&demo_transactions()).await {
            InsightRefresh::Completed(insights) => assert_eq!(insights.len(), 3),
            InsightRefresh::InProgress => panic!("nothing else was running"),
        }
        assert!(!service.is_loading());
        assert_eq!(service.latest().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_list_skips_generator() {
        let generator = gated(vec![warning()]);
        let service = InsightService::new(Some(generator.clone()));

        let result = service.request(&[]).await;
        assert_eq!(result, InsightRefresh::Completed(vec![AIInsight::fallback()]));
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_yield_single_tip() {
        let unconfigured = InsightService::new(None);
        let failing = InsightService::new(Some(Arc::new(AIClient::Mock(MockBackend::unhealthy()))));
        let empty_reply = gated(vec![]);
        empty_reply.release.notify_one();
        let empty = InsightService::new(Some(empty_reply));

        for service in [unconfigured, failing, empty] {
            let result = service.request(&demo_transactions()).await;
            assert_eq!(result, InsightRefresh::Completed(vec![AIInsight::fallback()]));
            assert!(!service.is_loading());
        }
    }

    #[tokio::test]
    async fn test_timeout_yields_single_tip() {
        // Never released
        let service = InsightService::new(Some(gated(vec![warning()])))
            .with_timeout(Duration::from_millis(50));

        let result = service.request(&demo_transactions()).await;
        assert_eq!(result, InsightRefresh::Completed(vec![AIInsight::fallback()]));
        assert!(!service.is_loading());
    }

    #[tokio::test]
    async fn test_slow_generator_is_a_timeout_error() {
        let generator = gated(vec![warning()]);
        let service = InsightService::new(Some(generator.clone()))
            .with_timeout(Duration::from_millis(20));

        let err = service
            .call(generator.as_ref(), &demo_transactions())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.to_string().contains("gated"));
    }

    #[tokio::test]
    async fn test_concurrent_request_is_rejected() {
        let generator = gated(vec![warning()]);
        let service = Arc::new(InsightService::new(Some(generator.clone())));

        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.request(&demo_transactions()).await })
        };

        while generator.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(service.is_loading());
        assert_eq!(
            service.request(&demo_transactions()).await,
            InsightRefresh::InProgress
        );

        generator.release.notify_one();
        assert_eq!(
            first.await.unwrap(),
            InsightRefresh::Completed(vec![warning()])
        );
        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert!(!service.is_loading());
    }
}
