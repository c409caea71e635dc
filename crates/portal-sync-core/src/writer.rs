//! Ordered remote writes
//!
//! Every remote `set` of a context goes through one queue drained by one
//! task, so writes reach the remote store in the order they were made. Two
//! quick writes to the same key never leave the older value remote.
//!
//! The task is started lazily on the runtime of the first write, and again
//! if that runtime has since gone away.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::registry::{Partition, ResourceId};
use crate::remote::{RemoteResult, RemoteStore};

/// One queued remote write
pub(crate) struct RemoteWrite {
    pub resource: ResourceId,
    pub remote_key: &'static str,
    pub partition: Partition,
    pub value: Value,
    pub ack: oneshot::Sender<RemoteResult<()>>,
}

/// Queue in front of a remote store
pub(crate) struct RemoteWriter {
    remote: Arc<dyn RemoteStore>,
    queue: Mutex<Option<mpsc::UnboundedSender<RemoteWrite>>>,
}

impl RemoteWriter {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            remote,
            queue: Mutex::new(None),
        }
    }

    /// Queue a write behind every earlier one
    ///
    /// Fails only when there is no runtime to drain the queue.
    pub fn submit(&self, write: RemoteWrite) -> Result<(), SyncError> {
        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());

        let write = match queue.as_ref() {
            Some(tx) => match tx.send(write) {
                Ok(()) => return Ok(()),
                // Drain task died with its runtime
                Err(mpsc::error::SendError(write)) => write,
            },
            None => write,
        };

        let handle = Handle::try_current().map_err(|_| SyncError::RuntimeUnavailable)?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(drain(self.remote.clone(), rx));
        debug!("Remote write queue started");

        tx.send(write).map_err(|_| SyncError::AckDropped)?;
        *queue = Some(tx);
        Ok(())
    }
}

async fn drain(remote: Arc<dyn RemoteStore>, mut rx: mpsc::UnboundedReceiver<RemoteWrite>) {
    while let Some(write) = rx.recv().await {
        let result = remote
            .set(write.remote_key, &write.partition, write.value)
            .await;
        match &result {
            Ok(()) => debug!(resource = %write.resource, "Remote write acknowledged"),
            Err(e) => warn!(resource = %write.resource, "Remote write lost: {}", e),
        }
        // Nobody waiting is fine
        let _ = write.ack.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SharedResource;
    use crate::remote::MemoryRemote;
    use serde_json::json;

    fn queued(value: Value) -> (RemoteWrite, oneshot::Receiver<RemoteResult<()>>) {
        let (ack, rx) = oneshot::channel();
        let write = RemoteWrite {
            resource: SharedResource::Classes.into(),
            remote_key: "classes",
            partition: Partition::Shared,
            value,
            ack,
        };
        (write, rx)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writes_land_in_submission_order() {
        for round in 0..50 {
            let remote = MemoryRemote::new();
            let writer = RemoteWriter::new(Arc::new(remote.clone()));

            let mut acks = Vec::new();
            for n in 0..5 {
                let (write, rx) = queued(json!([round, n]));
                writer.submit(write).unwrap();
                acks.push(rx);
            }
            for rx in acks {
                rx.await.unwrap().unwrap();
            }

            assert_eq!(
                remote.value("classes", &Partition::Shared),
                Some(json!([round, 4]))
            );
            assert_eq!(remote.write_count(), 5);
        }
    }

    #[test]
    fn test_no_runtime_is_reported() {
        let writer = RemoteWriter::new(Arc::new(MemoryRemote::new()));
        let (write, _rx) = queued(json!([]));
        assert_eq!(writer.submit(write), Err(SyncError::RuntimeUnavailable));
    }

    #[test]
    fn test_queue_restarts_on_a_new_runtime() {
        let remote = MemoryRemote::new();
        let writer = RemoteWriter::new(Arc::new(remote.clone()));

        for n in 0..2 {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let (write, rx) = queued(json!(n));
                writer.submit(write).unwrap();
                rx.await.unwrap().unwrap();
            });
        }

        assert_eq!(remote.value("classes", &Partition::Shared), Some(json!(1)));
    }
}
