//! Serialized, rate-limited request queue.
//!
//! # Design
//! - A single consumer drains a FIFO; one job is in flight at a time.
//! - After every dispatched job the consumer waits a fixed delay before the next
//!   one, including after the last, so a restart never violates the gap.
//! - The consumer starts on the first submission while idle and exits once the
//!   queue drains; the next submission starts a fresh one.
//! - Jobs whose caller stopped waiting are dropped without being dispatched and
//!   without consuming a gap.
//! - The queue knows nothing about credentials. It runs arbitrary jobs, so an
//!   authenticated fetch can run inside it and only start its clock once
//!   dispatched.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Request, Response};
use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::transport::Transport;

/// Default gap between two queued requests.
pub const DEFAULT_QUEUE_DELAY: Duration = Duration::from_millis(400);

/// Queued unit of work; resolves to `false` when it was skipped.
type Job = Pin<Box<dyn Future<Output = bool> + Send>>;

/// FIFO admission gate for outbound requests.
#[derive(Clone)]
pub struct RateLimitedQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    transport: Arc<dyn Transport>,
    delay: Duration,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    entries: VecDeque<Job>,
    processing: bool,
}

impl RateLimitedQueue {
    /// Create a queue executing requests on `transport` with `delay` between them.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                transport,
                delay,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    /// Enqueue `request` on the queue's transport and wait until it settles.
    ///
    /// # Errors
    ///
    /// Returns the transport failure of this request, or
    /// [`TransportError::QueueClosed`] if the consumer disappeared first.
    pub async fn submit(&self, request: Request) -> Result<Response, TransportError> {
        let transport = Arc::clone(&self.inner.transport);
        self.run(async move {
            tracing::debug!(
                method = %request.method(),
                path = %request.url().path(),
                "dispatching queued request"
            );
            transport.execute(request).await
        })
        .await?
    }

    /// Enqueue `job` and wait for its output.
    ///
    /// `job` is not polled until the consumer dispatches it. If the caller stops
    /// waiting before that, the job is dropped unpolled.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::QueueClosed`] if the consumer disappeared
    /// before the job settled.
    pub async fn run<F, T>(&self, job: F) -> Result<T, TransportError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (settle, settled) = oneshot::channel();
        let entry: Job = Box::pin(async move {
            if settle.is_closed() {
                return false;
            }
            let output = job.await;
            if settle.send(output).is_err() {
                tracing::debug!("queued job finished after its caller left");
            }
            true
        });
        let start_consumer = {
            let mut state = self.inner.lock();
            state.entries.push_back(entry);
            !std::mem::replace(&mut state.processing, true)
        };
        if start_consumer {
            tokio::spawn(Arc::clone(&self.inner).drain());
        }
        settled.await.map_err(|_| TransportError::QueueClosed)
    }

    /// Number of jobs waiting (excluding the one in flight).
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the consumer is stopped.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        !self.inner.lock().processing
    }

    /// Configured gap between requests.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(self: Arc<Self>) {
        let _reset = ConsumerReset(&self);
        loop {
            let next = {
                let mut state = self.lock();
                let next = state.entries.pop_front();
                if next.is_none() {
                    state.processing = false;
                }
                next
            };
            let Some(job) = next else {
                return;
            };

            if job.await {
                tokio::time::sleep(self.delay).await;
            } else {
                tracing::debug!("skipped queued job abandoned by its caller");
            }
        }
    }
}

/// Releases waiting callers if the consumer unwinds mid-job.
struct ConsumerReset<'a>(&'a QueueInner);

impl Drop for ConsumerReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut state = self.0.lock();
            state.entries.clear();
            state.processing = false;
        }
    }
}

#[async_trait]
impl Transport for RateLimitedQueue {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        self.submit(request).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::{Method, StatusCode, Url};
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingTransport {
        starts: StdMutex<Vec<(String, Instant)>>,
        latency: Duration,
        fail_path: Option<&'static str>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn execute(&self, request: Request) -> Result<Response, TransportError> {
            let path = request.url().path().to_string();
            self.starts
                .lock()
                .unwrap()
                .push((path.clone(), Instant::now()));
            tokio::time::sleep(self.latency).await;
            if self.fail_path == Some(path.as_str()) {
                return Err(TransportError::QueueClosed);
            }
            let response = http::Response::builder()
                .status(StatusCode::OK)
                .body(path)
                .unwrap();
            Ok(Response::from(response))
        }
    }

    fn request(path: &str) -> Request {
        Request::new(
            Method::GET,
            Url::parse(&format!("http://queue.test{path}")).unwrap(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_run_in_order_with_fixed_gap() {
        let transport = Arc::new(RecordingTransport {
            latency: Duration::from_millis(50),
            ..RecordingTransport::default()
        });
        let queue = RateLimitedQueue::new(transport.clone(), DEFAULT_QUEUE_DELAY);

        let settled = Arc::new(StdMutex::new(Vec::new()));
        let mut handles = Vec::new();
        for index in 0..5 {
            let queue = queue.clone();
            let settled = Arc::clone(&settled);
            handles.push(tokio::spawn(async move {
                let response = queue.submit(request(&format!("/{index}"))).await.unwrap();
                let body = response.text().await.unwrap();
                settled.lock().unwrap().push(body);
            }));
            tokio::task::yield_now().await;
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let starts = transport.starts.lock().unwrap().clone();
        let order: Vec<_> = starts.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(order, ["/0", "/1", "/2", "/3", "/4"]);
        for pair in starts.windows(2) {
            assert!(pair[1].1 - pair[0].1 >= DEFAULT_QUEUE_DELAY);
        }
        assert_eq!(*settled.lock().unwrap(), ["/0", "/1", "/2", "/3", "/4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_stops_when_drained_and_restarts() {
        let transport = Arc::new(RecordingTransport::default());
        let queue = RateLimitedQueue::new(transport.clone(), Duration::from_millis(100));
        assert!(queue.is_idle());

        queue.submit(request("/first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(queue.is_idle());
        assert!(queue.is_empty());

        queue.submit(request("/second")).await.unwrap();
        let starts = transport.starts.lock().unwrap().clone();
        assert_eq!(starts.len(), 2);
        assert!(starts[1].1 - starts[0].1 >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn failures_settle_only_their_own_entry() {
        let transport = Arc::new(RecordingTransport {
            fail_path: Some("/bad"),
            ..RecordingTransport::default()
        });
        let queue = RateLimitedQueue::new(transport, Duration::from_millis(10));

        let bad = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.submit(request("/bad")).await })
        };
        tokio::task::yield_now().await;
        let good = queue.submit(request("/good")).await;

        assert!(matches!(
            bad.await.unwrap(),
            Err(TransportError::QueueClosed)
        ));
        assert_eq!(good.unwrap().text().await.unwrap(), "/good");
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_entries_are_never_dispatched() {
        let transport = Arc::new(RecordingTransport {
            latency: Duration::from_millis(100),
            ..RecordingTransport::default()
        });
        let queue = RateLimitedQueue::new(transport.clone(), Duration::from_millis(50));

        let first = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.execute(request("/first")).await })
        };
        tokio::task::yield_now().await;
        let gone = tokio::time::timeout(Duration::from_millis(10), queue.submit(request("/gone")));
        assert!(gone.await.is_err());
        assert_eq!(queue.len(), 1);

        queue.submit(request("/last")).await.unwrap();
        first.await.unwrap().unwrap();

        let starts = transport.starts.lock().unwrap().clone();
        let order: Vec<_> = starts.iter().map(|(path, _)| path.as_str()).collect();
        assert_eq!(order, ["/first", "/last"]);
        assert_eq!(starts[1].1 - starts[0].1, Duration::from_millis(150));
    }

    #[tokio::test(start_paused = true)]
    async fn jobs_start_only_when_dispatched() {
        let transport = Arc::new(RecordingTransport::default());
        let queue = RateLimitedQueue::new(transport, Duration::from_millis(400));
        let started = Instant::now();

        let (a, b) = tokio::join!(
            queue.run(async { Instant::now() }),
            queue.run(async { Instant::now() }),
        );
        assert_eq!(a.unwrap() - started, Duration::ZERO);
        assert_eq!(b.unwrap() - started, Duration::from_millis(400));
    }
}
