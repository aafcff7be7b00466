//! In-memory transport for engine tests
//!
//! [`ScriptedTransport`] replays a queue of scripted batch replies and
//! records every batch it receives.

// Allow missing error/panic docs for test mocks
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use restq_domain::{RestqError, Result};
use serde_json::Value;

use crate::runtime::{Transport, TransportRequest, TransportResponse};

#[derive(Debug, Clone)]
enum Step {
    Respond(Vec<TransportResponse>),
    Fail(RestqError),
}

/// Scripted [`Transport`] double
///
/// Each `submit` consumes the next scripted step. Once the script runs dry
/// every request gets an empty `200`, or the permanent error set with
/// [`fail_always`](Self::fail_always).
///
/// # Examples
///
/// ```
/// use restq_core::testing::ScriptedTransport;
/// use serde_json::json;
///
/// let transport = ScriptedTransport::new();
/// transport.respond_json(vec![json!({"x": 1})]);
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    permanent_error: Mutex<Option<RestqError>>,
    batches: Mutex<Vec<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch reply, returned as-is.
    pub fn respond(&self, responses: Vec<TransportResponse>) -> &Self {
        self.script.lock().push_back(Step::Respond(responses));
        self
    }

    /// Queue a batch reply of `200`s with the given JSON bodies.
    pub fn respond_json(&self, bodies: Vec<Value>) -> &Self {
        self.respond(bodies.iter().map(TransportResponse::json).collect())
    }

    /// Queue one failing submit.
    pub fn fail(&self, error: RestqError) -> &Self {
        self.script.lock().push_back(Step::Fail(error));
        self
    }

    /// Queue `times` failing submits.
    pub fn fail_times(&self, times: usize, error: RestqError) -> &Self {
        let mut script = self.script.lock();
        script.extend(std::iter::repeat(Step::Fail(error)).take(times));
        drop(script);
        self
    }

    /// Fail every submit once the script is exhausted.
    pub fn fail_always(&self, error: RestqError) -> &Self {
        *self.permanent_error.lock() = Some(error);
        self
    }

    /// Every batch received so far.
    pub fn batches(&self) -> Vec<Vec<TransportRequest>> {
        self.batches.lock().clone()
    }

    pub fn last_batch(&self) -> Option<Vec<TransportRequest>> {
        self.batches.lock().last().cloned()
    }

    /// Number of `submit` calls so far.
    pub fn call_count(&self) -> usize {
        self.batches.lock().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn submit(&self, batch: &[TransportRequest]) -> Result<Vec<TransportResponse>> {
        self.batches.lock().push(batch.to_vec());

        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Respond(responses)) => Ok(responses),
            Some(Step::Fail(error)) => Err(error),
            None => match self.permanent_error.lock().clone() {
                Some(error) => Err(error),
                None => Ok(batch.iter().map(|_| TransportResponse::new(200, Vec::new())).collect()),
            },
        }
    }
}
