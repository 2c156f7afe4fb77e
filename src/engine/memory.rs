//! In-process queue transport.
//!
//! Queues are named by the CONSUME source or by the host of a PRODUCE URI
//! (`queue://orders` writes to `orders`). Messages keep FIFO order.

use std::collections::VecDeque;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use url::Url;

use crate::engine::Record;
use crate::engine::transport::{ConsumeRequest, Transport};
use crate::error::ExecutionError;

#[derive(Debug, Default)]
pub struct MemoryQueue {
    queues: DashMap<String, VecDeque<Record>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, queue: &str, record: Record) {
        self.queues.entry(queue.to_lowercase()).or_default().push_back(record);
    }

    pub fn len(&self, queue: &str) -> usize {
        self.queues.get(&queue.to_lowercase()).map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, queue: &str) -> bool {
        self.len(queue) == 0
    }

    /// Copy of a queue's current contents.
    pub fn snapshot(&self, queue: &str) -> Vec<Record> {
        self.queues
            .get(&queue.to_lowercase())
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }
}

fn queue_name(uri: &Url) -> Result<String, ExecutionError> {
    let name = uri
        .host_str()
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .or_else(|| {
            let path = uri.path().trim_matches('/');
            (!path.is_empty()).then(|| path.to_string())
        })
        .ok_or_else(|| ExecutionError::transport(uri.as_str(), "no queue name in URI"))?;
    Ok(name.to_lowercase())
}

#[async_trait]
impl Transport for MemoryQueue {
    async fn consume(&self, uri: &Url, request: ConsumeRequest<'_>) -> Result<Vec<Record>, ExecutionError> {
        let limit = request.limit.map(|n| n as usize).unwrap_or(usize::MAX);
        let Some(mut queue) = self.queues.get_mut(&request.source.to_lowercase()) else {
            return Ok(Vec::new());
        };
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(queue.len());
        while let Some(message) = queue.pop_front() {
            if taken.len() < limit {
                match (request.filter)(&message) {
                    Ok(true) => {
                        taken.push(message);
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        // Leave the queue as it was
                        kept.push_back(message);
                        kept.extend(queue.drain(..));
                        *queue = kept;
                        return Err(e);
                    }
                }
            }
            kept.push_back(message);
        }
        *queue = kept;
        debug!(uri = %uri, source = request.source, taken = taken.len(), "consumed messages");
        Ok(taken)
    }

    async fn produce(&self, uri: &Url, records: Vec<Record>, _options: &Record) -> Result<usize, ExecutionError> {
        let name = queue_name(uri)?;
        let count = records.len();
        self.queues.entry(name.clone()).or_default().extend(records);
        debug!(queue = %name, count, "produced messages");
        Ok(count)
    }

    /// Reading a queue through IMPORT copies it without consuming.
    async fn import(&self, uri: &Url, _options: &Record) -> Result<Vec<Record>, ExecutionError> {
        Ok(self.snapshot(&queue_name(uri)?))
    }
}
