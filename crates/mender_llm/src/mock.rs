//! Scripted mocks for tests.
//!
//! The mock chat client returns predefined responses in order and captures
//! every call for verification, so orchestration tests can drive a full
//! team run without a provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::client::{ChatClient, ChatTurn, LlmResponse};
use crate::embedding::Embedder;
use crate::error::{LlmError, LlmResult};

/// Chat client returning scripted responses.
#[derive(Clone)]
pub struct MockChatClient {
    responses: Arc<Mutex<Vec<String>>>,
    response_index: Arc<AtomicUsize>,
    captured_calls: Arc<Mutex<Vec<Vec<ChatTurn>>>>,
    simulate_failure: Arc<Mutex<Option<String>>>,
    model: String,
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            captured_calls: Arc::new(Mutex::new(Vec::new())),
            simulate_failure: Arc::new(Mutex::new(None)),
            model: "mock-model".to_string(),
        }
    }

    /// Queue a response for the next completion.
    pub fn add_response(self, response: impl Into<String>) -> Self {
        self.responses.lock().unwrap().push(response.into());
        self
    }

    /// Replace the full response script.
    pub fn with_responses(self, responses: Vec<String>) -> Self {
        *self.responses.lock().unwrap() = responses;
        self
    }

    /// Fail every completion with the given message.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.lock().unwrap() = Some(message.into());
        self
    }

    /// Number of completions requested so far.
    pub fn call_count(&self) -> usize {
        self.captured_calls.lock().unwrap().len()
    }

    /// Turns of the n-th captured call.
    pub fn captured_call(&self, index: usize) -> Option<Vec<ChatTurn>> {
        self.captured_calls.lock().unwrap().get(index).cloned()
    }

    fn next_response(&self) -> String {
        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return "TASK_FAILED no script".to_string();
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index.min(responses.len() - 1))
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, turns: &[ChatTurn]) -> LlmResult<LlmResponse> {
        self.captured_calls.lock().unwrap().push(turns.to_vec());

        if let Some(msg) = self.simulate_failure.lock().unwrap().clone() {
            return Err(LlmError::Request(msg));
        }

        Ok(LlmResponse {
            content: self.next_response(),
            input_tokens: 10,
            output_tokens: 5,
            model: self.model.clone(),
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

const MOCK_EMBEDDING_DIM: usize = 32;

/// Deterministic embedder hashing words into a fixed-dimension vector.
///
/// Similar texts share words and therefore land close in cosine space,
/// which is all the memory tests need.
#[derive(Clone, Default)]
pub struct MockEmbedder {
    fail: bool,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// Embedder that fails every call, for bridge degradation tests.
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> LlmResult<Vec<f32>> {
        if self.fail {
            return Err(LlmError::Request("simulated embedding failure".to_string()));
        }

        let mut vector = vec![0.0f32; MOCK_EMBEDDING_DIM];
        for word in text.split_whitespace() {
            let mut hash: usize = 5381;
            for byte in word.to_lowercase().bytes() {
                hash = hash.wrapping_mul(33).wrapping_add(byte as usize);
            }
            vector[hash % MOCK_EMBEDDING_DIM] += 1.0;
        }
        Ok(vector)
    }
}
