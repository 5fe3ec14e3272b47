//! Worker-backed embedding client.
//!
//! The backend lives on a dedicated OS thread and is reached only through
//! message passing:
//!
//! ```text
//! ┌──────────────┐  WorkerRequest{id}  ┌──────────────┐
//! │ async caller │ ──────────────────▶ │ worker thread│
//! │ (oneshot rx) │                     │ (owns model) │
//! └──────▲───────┘                     └──────┬───────┘
//!        │        ┌──────────────┐            │ WorkerMessage{id}
//!        └────────│ router task  │◀───────────┘
//!                 └──────────────┘
//! ```
//!
//! Every request carries a correlation id; the router uses it to hand the
//! response to the caller that is waiting for it, so overlapping queries
//! never receive each other's vectors.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

use corpus_core::{CorpusError, Embedder, Result};

use crate::backend::{EmbedProgress, EmbeddingBackend};

/// Capacity of the progress broadcast channel.
const PROGRESS_CAPACITY: usize = 64;

type EmbedResult = Result<Vec<Vec<f32>>>;
type PendingRequests = Arc<Mutex<HashMap<u64, oneshot::Sender<EmbedResult>>>>;

/// A request sent to the worker thread.
struct WorkerRequest {
    id: u64,
    texts: Vec<String>,
}

/// A message sent from the worker thread back to the router.
enum WorkerMessage {
    Progress(EmbedProgress),
    Completed { id: u64, result: EmbedResult },
}

/// Asynchronous handle to an out-of-thread embedding backend.
///
/// Cheap to share behind an `Arc`; any number of tasks may call
/// [`Embedder::embed`] concurrently. There is no cancellation: dropping the
/// returned future discards the response but the backend still finishes the
/// batch. Callers that need a deadline should wrap calls in
/// `tokio::time::timeout`.
pub struct EmbeddingClient {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    pending: PendingRequests,
    next_id: AtomicU64,
    progress: broadcast::Sender<EmbedProgress>,
    available: Arc<AtomicBool>,
    dimension: Arc<AtomicUsize>,
}

impl EmbeddingClient {
    /// Spawn the worker thread for `backend` and the response router.
    ///
    /// Must be called from within a Tokio runtime. The backend starts
    /// loading immediately; requests queue until it is ready.
    pub fn spawn<B: EmbeddingBackend>(backend: B) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            CorpusError::internal("EmbeddingClient::spawn requires a Tokio runtime")
        })?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (message_tx, message_rx) = mpsc::unbounded_channel();
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);

        let pending: PendingRequests = Arc::new(Mutex::new(HashMap::new()));
        let available = Arc::new(AtomicBool::new(true));
        let dimension = Arc::new(AtomicUsize::new(backend.dimension().unwrap_or(0)));

        let worker_dimension = dimension.clone();
        thread::Builder::new()
            .name("embedding-worker".to_string())
            .spawn(move || run_worker(backend, request_rx, message_tx, worker_dimension))
            .map_err(|e| CorpusError::embedding(format!("Failed to spawn worker: {}", e)))?;

        runtime.spawn(route_messages(
            message_rx,
            pending.clone(),
            progress_tx.clone(),
            available.clone(),
        ));

        info!("Embedding worker started");

        Ok(Self {
            requests: request_tx,
            pending,
            next_id: AtomicU64::new(1),
            progress: progress_tx,
            available,
            dimension,
        })
    }

    /// Subscribe to advisory progress events.
    pub fn subscribe_progress(&self) -> broadcast::Receiver<EmbedProgress> {
        self.progress.subscribe()
    }

    /// True until the worker thread has exited.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn take_pending(&self, id: u64) -> Option<oneshot::Sender<EmbedResult>> {
        self.pending.lock().ok().and_then(|mut p| p.remove(&id))
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if !self.is_available() {
            return Err(CorpusError::embedding("Embedding backend unavailable"));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|e| CorpusError::internal(format!("Pending map poisoned: {}", e)))?
            .insert(id, tx);

        let request = WorkerRequest {
            id,
            texts: texts.to_vec(),
        };
        if self.requests.send(request).is_err() {
            self.take_pending(id);
            return Err(CorpusError::embedding("Embedding backend unavailable"));
        }

        debug!("Submitted embedding request {} ({} texts)", id, texts.len());

        let vectors = rx
            .await
            .map_err(|_| CorpusError::embedding("Embedding worker dropped response"))??;

        validate_batch(texts.len(), &vectors)?;
        Ok(vectors)
    }

    fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::SeqCst) {
            0 => None,
            d => Some(d),
        }
    }
}

/// Check that a backend answered with one equal-length vector per input.
fn validate_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(CorpusError::embedding(format!(
            "Backend returned {} vectors for {} texts",
            vectors.len(),
            expected
        )));
    }

    let dim = vectors.first().map(Vec::len).unwrap_or(0);
    if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
        return Err(CorpusError::embedding(
            "Backend returned empty or ragged vectors",
        ));
    }

    Ok(())
}

/// Worker thread body: load the backend, then serve requests in order.
fn run_worker<B: EmbeddingBackend>(
    mut backend: B,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    messages: mpsc::UnboundedSender<WorkerMessage>,
    dimension: Arc<AtomicUsize>,
) {
    let load_result = {
        let progress_tx = messages.clone();
        let mut report = move |percent: u8, message: &str| {
            let _ = progress_tx.send(WorkerMessage::Progress(EmbedProgress::Loading {
                percent,
                message: message.to_string(),
            }));
        };
        catch_unwind(AssertUnwindSafe(|| backend.load(&mut report)))
    };

    let load_error = match load_result {
        Ok(Ok(())) => {
            let dim = backend.dimension().unwrap_or(0);
            dimension.store(dim, Ordering::SeqCst);
            let _ = messages.send(WorkerMessage::Progress(EmbedProgress::Ready { dimension: dim }));
            None
        }
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("backend panicked while loading".to_string()),
    };

    if let Some(message) = &load_error {
        error!("Embedding backend failed to load: {}", message);
        let _ = messages.send(WorkerMessage::Progress(EmbedProgress::Failed {
            message: message.clone(),
        }));
    }

    while let Some(request) = requests.blocking_recv() {
        if let Some(message) = &load_error {
            let _ = messages.send(WorkerMessage::Completed {
                id: request.id,
                result: Err(CorpusError::embedding(format!(
                    "Embedding backend unavailable: {}",
                    message
                ))),
            });
            continue;
        }

        let _ = messages.send(WorkerMessage::Progress(EmbedProgress::Started {
            request_id: request.id,
            texts: request.texts.len(),
        }));

        match catch_unwind(AssertUnwindSafe(|| backend.embed_batch(&request.texts))) {
            Ok(result) => {
                let _ = messages.send(WorkerMessage::Completed {
                    id: request.id,
                    result,
                });
            }
            Err(_) => {
                // Backend state is unknown after a panic; stop serving.
                error!("Embedding backend crashed during request {}", request.id);
                let _ = messages.send(WorkerMessage::Completed {
                    id: request.id,
                    result: Err(CorpusError::embedding("Embedding backend crashed mid-batch")),
                });
                break;
            }
        }
    }

    // Close the request side before the message side so that a request
    // enqueued after this point fails to send instead of waiting forever.
    drop(requests);
    drop(messages);
    debug!("Embedding worker exiting");
}

/// Router task: deliver worker messages to waiting callers.
async fn route_messages(
    mut messages: mpsc::UnboundedReceiver<WorkerMessage>,
    pending: PendingRequests,
    progress: broadcast::Sender<EmbedProgress>,
    available: Arc<AtomicBool>,
) {
    while let Some(message) = messages.recv().await {
        match message {
            WorkerMessage::Progress(event) => {
                // No subscribers is fine; progress is advisory.
                let _ = progress.send(event);
            }
            WorkerMessage::Completed { id, result } => {
                let waiter = pending.lock().ok().and_then(|mut p| p.remove(&id));
                match waiter {
                    Some(tx) => {
                        // The caller may have stopped waiting.
                        let _ = tx.send(result);
                    }
                    None => warn!("Dropping response for unknown request {}", id),
                }
            }
        }
    }

    // Worker is gone: fail everything still waiting.
    available.store(false, Ordering::SeqCst);
    let drained: Vec<_> = match pending.lock() {
        Ok(mut p) => p.drain().collect(),
        Err(_) => Vec::new(),
    };
    if !drained.is_empty() {
        warn!("Embedding worker exited with {} pending requests", drained.len());
    }
    for (_, tx) in drained {
        let _ = tx.send(Err(CorpusError::embedding("Embedding backend unavailable")));
    }
}
