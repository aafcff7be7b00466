//! Execution context: pending queue, hooks and batch execution
//!
//! ## Lifecycle
//! `Idle` → `Executing` → `Idle` on success (the executed batch is drained)
//! or `Failed` on error (the queue is left exactly as it was). `Failed`
//! behaves like `Idle` for the next `execute_query`.
//!
//! ## Locking
//! The queue and hook lists sit behind `parking_lot::Mutex`es that are
//! never held across an `.await` or while a hook runs, so hooks may enqueue
//! queries or register further hooks.

use std::fmt;
use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;
use restq_domain::{ResourcePath, RestqError, Result, RetrySettings};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::ports::{JsonCodec, PayloadCodec, Transport, TransportRequest, TransportResponse};
use super::query::{Query, QuerySummary};
use super::result::Commit;
use crate::model::{EntityCollection, EntityType};

/// Longest response body excerpt kept in an HTTP error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Where the context is in its execute cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Idle,
    Executing,
    Failed,
}

/// Returned by after-execute hooks: stay registered, or unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    Keep,
    Done,
}

/// What an after-execute hook sees for each completed query
#[derive(Debug)]
pub struct QueryOutcome<'a> {
    pub query: &'a Query,
    pub status: u16,
    /// Decoded response body (`null` when empty)
    pub payload: &'a Value,
}

impl QueryOutcome<'_> {
    pub fn query_id(&self) -> Uuid {
        self.query.id()
    }

    pub fn result_id(&self) -> Option<Uuid> {
        self.query.result_id()
    }
}

type BeforeHook = Box<dyn FnMut(&ClientContext, &mut TransportRequest) + Send>;
type AfterHook = Box<dyn FnMut(&ClientContext, &QueryOutcome<'_>) -> HookStatus + Send>;

#[derive(Default)]
struct Hooks {
    before: Vec<BeforeHook>,
    after: Vec<AfterHook>,
}

struct QueueState {
    pending: Vec<Query>,
    status: ExecutionStatus,
}

/// Session-scoped owner of the pending query queue
pub struct ClientContext {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn PayloadCodec>,
    retry_settings: RetrySettings,
    state: Mutex<QueueState>,
    hooks: Mutex<Hooks>,
}

/// Builder for [`ClientContext`]
pub struct ClientContextBuilder {
    transport: Arc<dyn Transport>,
    codec: Arc<dyn PayloadCodec>,
    retry_settings: RetrySettings,
}

impl ClientContextBuilder {
    pub fn codec(mut self, codec: Arc<dyn PayloadCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Defaults used by [`ClientContext::default_retry_options`].
    pub fn retry_settings(mut self, settings: RetrySettings) -> Self {
        self.retry_settings = settings;
        self
    }

    pub fn build(self) -> Arc<ClientContext> {
        Arc::new(ClientContext {
            transport: self.transport,
            codec: self.codec,
            retry_settings: self.retry_settings,
            state: Mutex::new(QueueState { pending: Vec::new(), status: ExecutionStatus::Idle }),
            hooks: Mutex::new(Hooks::default()),
        })
    }
}

/// Marks the context `Failed` if an execute future is dropped mid-flight.
struct ExecutionGuard<'a> {
    context: &'a ClientContext,
    finished: bool,
}

impl ExecutionGuard<'_> {
    fn finish(mut self, status: ExecutionStatus) {
        self.context.state.lock().status = status;
        self.finished = true;
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.context.state.lock().status = ExecutionStatus::Failed;
        }
    }
}

impl ClientContext {
    pub fn builder(transport: Arc<dyn Transport>) -> ClientContextBuilder {
        ClientContextBuilder {
            transport,
            codec: Arc::new(JsonCodec),
            retry_settings: RetrySettings::default(),
        }
    }

    /// Context with the JSON codec and default retry settings.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        Self::builder(transport).build()
    }

    pub fn with_codec(transport: Arc<dyn Transport>, codec: Arc<dyn PayloadCodec>) -> Arc<Self> {
        Self::builder(transport).codec(codec).build()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn codec(&self) -> &dyn PayloadCodec {
        self.codec.as_ref()
    }

    pub fn retry_settings(&self) -> &RetrySettings {
        &self.retry_settings
    }

    /// Typed entity bound to `path`. Nothing is enqueued.
    pub fn resource<E: EntityType>(self: &Arc<Self>, path: impl Into<ResourcePath>) -> E {
        E::bind(self.clone(), path.into())
    }

    /// Typed collection bound to `path`. Nothing is enqueued.
    pub fn collection<E: EntityType>(
        self: &Arc<Self>,
        path: impl Into<ResourcePath>,
    ) -> EntityCollection<E> {
        EntityCollection::bind(self.clone(), path.into())
    }

    // Queue management
    // -----------------------------------------------------------------

    /// Append a query to the pending queue.
    pub fn add_query(&self, query: Query) {
        debug!(
            query_id = %query.id(),
            kind = %query.kind(),
            target = %query.target(),
            "Query enqueued"
        );
        self.state.lock().pending.push(query);
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    /// Snapshot of the pending queue in execution order.
    pub fn pending_queries(&self) -> Vec<QuerySummary> {
        self.state.lock().pending.iter().map(Query::summary).collect()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.state.lock().status
    }

    /// Discard every pending query.
    ///
    /// Dropping the queries also drops the result handles they hold, which
    /// is how callers release entities after abandoning a failed batch.
    ///
    /// # Errors
    /// Returns `RestqError::InvalidState` while a batch is executing.
    pub fn clear(&self) -> Result<usize> {
        let mut state = self.state.lock();
        if state.status == ExecutionStatus::Executing {
            return Err(RestqError::InvalidState(
                "cannot clear the queue while a batch is executing".to_string(),
            ));
        }
        let discarded = mem::take(&mut state.pending);
        Ok(discarded.len())
    }

    // Hooks
    // -----------------------------------------------------------------

    /// Register a hook run for every outgoing request, before the batch is
    /// sent. Queries it enqueues join the current batch.
    pub fn before_query_execute(
        &self,
        hook: impl FnMut(&ClientContext, &mut TransportRequest) + Send + 'static,
    ) -> &Self {
        self.hooks.lock().before.push(Box::new(hook));
        self
    }

    /// Register a hook run for every completed query, after its sink has
    /// been populated. Queries it enqueues form the next batch. Returning
    /// [`HookStatus::Done`] unregisters the hook.
    pub fn after_query_execute(
        &self,
        hook: impl FnMut(&ClientContext, &QueryOutcome<'_>) -> HookStatus + Send + 'static,
    ) -> &Self {
        self.hooks.lock().after.push(Box::new(hook));
        self
    }

    fn run_before_hooks(&self, request: &mut TransportRequest) {
        let mut hooks = mem::take(&mut self.hooks.lock().before);
        for hook in &mut hooks {
            hook(self, request);
        }
        let mut registry = self.hooks.lock();
        hooks.append(&mut registry.before);
        registry.before = hooks;
    }

    fn run_after_hooks(&self, outcome: &QueryOutcome<'_>) {
        let mut hooks = mem::take(&mut self.hooks.lock().after);
        hooks.retain_mut(|hook| hook(self, outcome) == HookStatus::Keep);
        let mut registry = self.hooks.lock();
        hooks.append(&mut registry.after);
        registry.after = hooks;
    }

    // Execution
    // -----------------------------------------------------------------

    /// Send every pending query as one batch and demultiplex the responses.
    ///
    /// On success the batch is drained, every sink is populated and the
    /// after-hooks have run. On failure nothing is drained and no sink is
    /// modified. An empty queue succeeds without calling the transport.
    ///
    /// # Errors
    /// - `RestqError::InvalidState` if a batch is already executing
    /// - any transport error, `RestqError::Http` for a non-success status,
    ///   `RestqError::Deserialization` for a body that does not fit its sink
    #[instrument(skip(self))]
    pub async fn execute_query(&self) -> Result<()> {
        let guard = self.begin_execution()?;
        match self.execute_batch().await {
            Ok(count) => {
                guard.finish(ExecutionStatus::Idle);
                if count > 0 {
                    info!(count, "Batch executed");
                }
                Ok(())
            }
            Err(err) => {
                guard.finish(ExecutionStatus::Failed);
                warn!(error = %err, category = %err.category(), "Batch execution failed");
                Err(err)
            }
        }
    }

    fn begin_execution(&self) -> Result<ExecutionGuard<'_>> {
        let mut state = self.state.lock();
        if state.status == ExecutionStatus::Executing {
            return Err(RestqError::InvalidState(
                "execute_query called while a batch is already executing".to_string(),
            ));
        }
        state.status = ExecutionStatus::Executing;
        Ok(ExecutionGuard { context: self, finished: false })
    }

    /// Snapshot the queue into requests, running before-hooks until no hook
    /// enqueues anything new.
    fn build_batch(&self) -> Result<(Vec<Query>, Vec<TransportRequest>)> {
        let mut queries: Vec<Query> = Vec::new();
        let mut requests = Vec::new();
        loop {
            let fresh: Vec<Query> = {
                let state = self.state.lock();
                state.pending.get(queries.len()..).map(<[Query]>::to_vec).unwrap_or_default()
            };
            if fresh.is_empty() {
                break;
            }
            for query in fresh {
                let mut request = query.to_request(self.codec())?;
                self.run_before_hooks(&mut request);
                queries.push(query);
                requests.push(request);
            }
        }
        Ok((queries, requests))
    }

    async fn execute_batch(&self) -> Result<usize> {
        let (queries, requests) = self.build_batch()?;
        if requests.is_empty() {
            debug!("No pending queries");
            return Ok(0);
        }

        debug!(count = requests.len(), "Submitting batch");
        let responses = self.transport.submit(&requests).await?;
        if responses.len() != requests.len() {
            return Err(RestqError::Internal(format!(
                "transport returned {} responses for {} requests",
                responses.len(),
                requests.len()
            )));
        }

        // Stage every sink before touching any state
        let mut staged: Vec<(u16, Value, Option<Commit>)> = Vec::with_capacity(queries.len());
        for ((query, request), response) in queries.iter().zip(&requests).zip(responses) {
            if !response.is_success() {
                return Err(http_error(request, &response));
            }
            let payload = self.codec.decode(&response.body)?;
            let commit = query.sink().map(|sink| sink.stage(payload.clone())).transpose()?;
            debug!(query_id = %query.id(), status = response.status, "Response staged");
            staged.push((response.status, payload, commit));
        }

        self.drain_batch(&queries);

        for (query, (status, payload, commit)) in queries.iter().zip(staged) {
            if let Some(commit) = commit {
                commit();
            }
            self.run_after_hooks(&QueryOutcome { query, status, payload: &payload });
        }

        Ok(queries.len())
    }

    fn drain_batch(&self, batch: &[Query]) {
        let mut state = self.state.lock();
        debug_assert!(
            batch.iter().zip(&state.pending).all(|(sent, pending)| sent.id() == pending.id()),
            "pending queue changed under an executing batch"
        );
        let count = batch.len().min(state.pending.len());
        state.pending.drain(..count);
    }
}

fn http_error(request: &TransportRequest, response: &TransportResponse) -> RestqError {
    let body = String::from_utf8_lossy(&response.body);
    let message: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    RestqError::http(response.status, request.address.clone(), message)
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ClientContext")
            .field("status", &state.status)
            .field("pending", &state.pending.len())
            .field("content_type", &self.codec.content_type())
            .finish_non_exhaustive()
    }
}
