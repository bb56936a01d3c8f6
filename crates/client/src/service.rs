use crate::auth::Authenticator;
use crate::error::{LoadError, Result};
use crate::events::PivotEvent;
use crate::session::{QuerySession, SessionState};
use crate::transport::SharedTransport;
use pivot_processor::{ChunkOutcome, ResponseProcessor};
use pivot_protocol::{
    JaqlQuery, MessageBody, MessageEnvelope, OrderCheck, ProtocolError, StreamOrder,
};
use pivot_tree::{CellMetadata, PivotTreeModel, TreeArena};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, oneshot, watch};

/// Snapshot handed to the rendering layer when a query finishes: the three
/// trees, the cell store and the pagination flags.
#[derive(Debug, Clone)]
pub struct QueryResultData {
    pub query_guid: String,
    pub rows: TreeArena,
    pub columns: TreeArena,
    pub corner: TreeArena,
    pub cells: HashMap<String, CellMetadata>,
    pub total_rows: Option<u64>,
    pub is_last_page: bool,
}

/// Snapshot handed to the rendering layer after a pagination request: the
/// grown rows tree, never a replacement.
#[derive(Debug, Clone)]
pub struct AddMoreData {
    pub rows: TreeArena,
    pub is_last_page: bool,
}

/// Owns one logical request's lifecycle: submit, receive ordered chunks,
/// assemble, cancel, replace.
///
/// At most one session is active (`Submitting`/`Streaming`) per service.
/// Submitting while one is in flight cancels the old session first: its
/// promise rejects with [`LoadError::Canceled`] before the new submission
/// begins, so a consumer never sees interleaved chunks of two sessions.
pub struct DataLoadService {
    transport: Arc<SharedTransport>,
    auth: Arc<dyn Authenticator>,
    events: broadcast::Sender<PivotEvent>,
    active: Arc<Mutex<Option<ActiveHandle>>>,
    finished: Arc<Mutex<Option<FinishedQuery>>>,
}

struct ActiveHandle {
    query_guid: String,
    cancel_tx: watch::Sender<bool>,
    state: Arc<Mutex<SessionState>>,
    completion: Completion,
}

/// The most recent finished session, retained so `add_more` can append to
/// its live model. Consumed by pagination; restored on success.
struct FinishedQuery {
    session: QuerySession,
    jaql: JaqlQuery,
    model: PivotTreeModel,
    processor: ResponseProcessor,
}

/// Take-once settlement slot: whichever of the driver and the canceller
/// settles first wins, so the operation resolves or rejects exactly once.
#[derive(Clone)]
struct Completion(Arc<Mutex<Option<oneshot::Sender<Result<QueryResultData>>>>>);

impl Completion {
    fn new(tx: oneshot::Sender<Result<QueryResultData>>) -> Self {
        Self(Arc::new(Mutex::new(Some(tx))))
    }

    fn settle(&self, result: Result<QueryResultData>) {
        let mut slot = lock(&self.0);
        if let Some(tx) = slot.take() {
            let _ = tx.send(result);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn clear_active(active: &Mutex<Option<ActiveHandle>>, query_guid: &str) {
    let mut slot = lock(active);
    if slot
        .as_ref()
        .map(|handle| handle.query_guid == query_guid)
        .unwrap_or(false)
    {
        *slot = None;
    }
}

fn build_submit_payload(jaql: &JaqlQuery, csrf: Option<&str>) -> Value {
    let mut payload = serde_json::json!({ "action": "pivot", "jaql": jaql });
    if let Some(token) = csrf {
        payload["csrf"] = Value::String(token.to_string());
    }
    payload
}

impl DataLoadService {
    pub(crate) fn new(
        transport: Arc<SharedTransport>,
        auth: Arc<dyn Authenticator>,
        events: broadcast::Sender<PivotEvent>,
    ) -> Self {
        Self {
            transport,
            auth,
            events,
            active: Arc::new(Mutex::new(None)),
            finished: Arc::new(Mutex::new(None)),
        }
    }

    /// Submits the query and assembles its chunk stream into a fresh tree
    /// model. Resolves or rejects exactly once.
    pub async fn load_init_data(
        &self,
        jaql: JaqlQuery,
        is_paginated: bool,
        elements_per_page: Option<u64>,
        use_cache: bool,
    ) -> Result<QueryResultData> {
        let mut session = QuerySession::new(
            jaql.query_guid.clone(),
            is_paginated,
            elements_per_page,
            use_cache,
        );
        session.sort_settings = jaql.sort.clone().unwrap_or_default();
        self.start(
            session,
            jaql,
            PivotTreeModel::new(),
            ResponseProcessor::new(),
            false,
        )
        .await
    }

    /// Requests the next page of the finished session's query, appending
    /// new leaf nodes under the existing trees. No-op when the caller
    /// already holds the last page.
    pub async fn add_more(&self, is_last_page: bool) -> Result<Option<AddMoreData>> {
        if is_last_page {
            return Ok(None);
        }
        let finished = lock(&self.finished).take().ok_or(LoadError::NoSession)?;
        let FinishedQuery {
            session: previous,
            mut jaql,
            model,
            processor,
        } = finished;

        if model.is_last_page(previous.is_paginated) {
            *lock(&self.finished) = Some(FinishedQuery {
                session: previous,
                jaql,
                model,
                processor,
            });
            return Ok(None);
        }

        // Same guid, next offset: already-loaded rows are never re-fetched.
        jaql.offset = Some(model.loaded_data_rows());
        jaql.count = previous.elements_per_page;

        let mut session = QuerySession::new(
            previous.query_guid.clone(),
            previous.is_paginated,
            previous.elements_per_page,
            previous.use_cache,
        );
        session.sort_settings = previous.sort_settings.clone();

        let result = self.start(session, jaql, model, processor, true).await?;
        Ok(Some(AddMoreData {
            rows: result.rows.clone(),
            is_last_page: result.is_last_page,
        }))
    }

    /// Cancels any non-terminal session. The pending promise rejects with
    /// [`LoadError::Canceled`] immediately; the driver discards any chunk
    /// that arrives past the next boundary.
    pub fn cancel(&self) {
        let taken = lock(&self.active).take();
        let Some(handle) = taken else { return };

        let _ = handle.cancel_tx.send(true);
        {
            let mut state = handle
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if !state.is_terminal() {
                *state = SessionState::Cancelled;
            }
        }
        handle.completion.settle(Err(LoadError::Canceled));
        let _ = self.events.send(PivotEvent::QueryEnd {
            query_guid: handle.query_guid.clone(),
        });
        log::info!("query session {} cancelled", handle.query_guid);
    }

    pub fn active_state(&self) -> Option<SessionState> {
        lock(&self.active).as_ref().map(|handle| {
            *handle
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
        })
    }

    async fn start(
        &self,
        session: QuerySession,
        jaql: JaqlQuery,
        model: PivotTreeModel,
        processor: ResponseProcessor,
        append: bool,
    ) -> Result<QueryResultData> {
        let (completion_tx, completion_rx) = oneshot::channel();
        let completion = Completion::new(completion_tx);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        // The old session's promise must reject before this submission
        // begins.
        self.cancel();
        *lock(&self.active) = Some(ActiveHandle {
            query_guid: session.query_guid.clone(),
            cancel_tx,
            state: session.state_handle(),
            completion: completion.clone(),
        });

        let driver = SessionDriver {
            transport: Arc::clone(&self.transport),
            events: self.events.clone(),
            active: Arc::clone(&self.active),
            finished: Arc::clone(&self.finished),
            csrf: self.auth.csrf_token(),
            session,
            jaql,
            model,
            processor,
            append,
            cancel_rx,
            completion,
        };
        tokio::spawn(driver.run());

        completion_rx.await.unwrap_or(Err(LoadError::Canceled))
    }
}

enum Read {
    Cancelled,
    Closed,
    Message(Value),
}

/// Consumes one session's chunk stream, strictly in arrival order, until a
/// terminal marker, a fatal violation, cancellation or transport loss.
struct SessionDriver {
    transport: Arc<SharedTransport>,
    events: broadcast::Sender<PivotEvent>,
    active: Arc<Mutex<Option<ActiveHandle>>>,
    finished: Arc<Mutex<Option<FinishedQuery>>>,
    csrf: Option<String>,
    session: QuerySession,
    jaql: JaqlQuery,
    model: PivotTreeModel,
    processor: ResponseProcessor,
    append: bool,
    cancel_rx: watch::Receiver<bool>,
    completion: Completion,
}

impl SessionDriver {
    async fn run(mut self) {
        self.session.advance(SessionState::Submitting);
        let submit = build_submit_payload(&self.jaql, self.csrf.as_deref());
        {
            let mut guard = match self.transport.acquire().await {
                Ok(guard) => guard,
                Err(err) => return self.fail(LoadError::Transport(err.to_string())),
            };
            if self.cancelled() {
                return self.settle_cancelled();
            }
            if let Err(err) = guard.send(submit).await {
                return self.fail(LoadError::Transport(err.to_string()));
            }
        }
        // A completed send on the ordered channel is the acknowledgment.
        self.session.advance(SessionState::Streaming);
        let _ = self.events.send(PivotEvent::QueryStart {
            query_guid: self.session.query_guid.clone(),
        });

        let mut order = StreamOrder::new();
        loop {
            if self.cancelled() {
                return self.settle_cancelled();
            }
            let read = {
                let mut guard = match self.transport.acquire().await {
                    Ok(guard) => guard,
                    Err(err) => return self.fail(LoadError::Transport(err.to_string())),
                };
                tokio::select! {
                    biased;
                    _ = self.cancel_rx.changed() => Read::Cancelled,
                    message = guard.receive() => match message {
                        Some(raw) => Read::Message(raw),
                        None => Read::Closed,
                    },
                }
            };
            let raw = match read {
                Read::Cancelled => return self.settle_cancelled(),
                Read::Closed => {
                    return self.fail(LoadError::Transport("connection closed".into()))
                }
                Read::Message(raw) => raw,
            };

            let envelope: MessageEnvelope = match serde_json::from_value(raw) {
                Ok(envelope) => envelope,
                Err(err) => {
                    log::warn!("dropping undecodable stream message: {err}");
                    continue;
                }
            };
            if envelope.query_guid != self.session.query_guid {
                log::debug!(
                    "discarding chunk for superseded session {}",
                    envelope.query_guid
                );
                continue;
            }

            let kind = envelope.body.kind();
            match order.check(kind) {
                OrderCheck::Accept => {}
                OrderCheck::Drop => {
                    log::warn!("protocol violation: {kind:?} out of order, message dropped");
                    continue;
                }
                OrderCheck::Fatal => {
                    return self.fail(ProtocolError::MissingHeaders { kind }.into())
                }
            }

            match envelope.body {
                MessageBody::Error(payload) => {
                    return self.fail(LoadError::Query {
                        details: payload.details,
                        database: payload.database,
                    });
                }
                MessageBody::Finish => return self.complete(),
                body => match self.processor.apply(&mut self.model, &body) {
                    Ok(outcome) => {
                        match outcome {
                            ChunkOutcome::Headers { settings }
                            | ChunkOutcome::Metadata { settings } => {
                                if !settings.is_empty() {
                                    let _ = self
                                        .events
                                        .send(PivotEvent::SortingSettingsChanged { settings });
                                }
                            }
                            _ => {}
                        }
                        let _ = self.events.send(PivotEvent::ChunkLoaded {
                            query_guid: self.session.query_guid.clone(),
                            kind,
                        });
                    }
                    Err(err) => return self.fail(err.into()),
                },
            }
        }
    }

    fn cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    fn settle_cancelled(&self) {
        // The facade settled the promise when it cancelled; the driver only
        // pins the state and stops mutating the tree.
        self.session.advance(SessionState::Cancelled);
        log::debug!(
            "session {} stopped at a chunk boundary after cancellation",
            self.session.query_guid
        );
    }

    fn fail(&self, err: LoadError) {
        log::warn!("session {} failed: {err}", self.session.query_guid);
        self.session.advance(SessionState::Errored);
        let _ = self.events.send(PivotEvent::QueryEnd {
            query_guid: self.session.query_guid.clone(),
        });
        clear_active(&self.active, &self.session.query_guid);
        self.completion.settle(Err(err));
    }

    fn complete(self) {
        if self.cancelled() {
            // A cancel racing the finish marker wins: a cancelled session
            // must not become resumable.
            return self.settle_cancelled();
        }
        self.session.advance(SessionState::Finished);
        let mut model = self.model;
        let is_last = model.is_last_page(self.session.is_paginated);
        model.mark_rows_last_page(is_last);

        let result = QueryResultData {
            query_guid: self.session.query_guid.clone(),
            rows: model.rows.clone(),
            columns: model.columns.clone(),
            corner: model.corner.clone(),
            cells: model.cells().clone(),
            total_rows: model.total_rows(),
            is_last_page: is_last,
        };

        let event = if self.append {
            PivotEvent::MoreLoaded {
                query_guid: result.query_guid.clone(),
                is_last_page: is_last,
            }
        } else {
            PivotEvent::Initialized {
                query_guid: result.query_guid.clone(),
                is_last_page: is_last,
            }
        };
        let _ = self.events.send(event);
        let _ = self.events.send(PivotEvent::QueryEnd {
            query_guid: result.query_guid.clone(),
        });
        clear_active(&self.active, &result.query_guid);

        *lock(&self.finished) = Some(FinishedQuery {
            session: self.session,
            jaql: self.jaql,
            model,
            processor: self.processor,
        });
        self.completion.settle(Ok(result));
    }
}
