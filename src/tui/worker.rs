//! Background thread that executes outbound requests.
//!
//! Requests run one at a time in submission order; completions come back
//! over a channel and are fed into the session by the event loop.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crate::api::{self, ApiError, Outbound, Reply, RequestId, SharedRemote};

/// Result of one request, ready for `Session::complete`
#[derive(Debug)]
pub struct Completion {
    pub id: RequestId,
    pub result: Result<Reply, ApiError>,
}

pub struct Worker {
    requests: Option<mpsc::Sender<Outbound>>,
    completions: mpsc::Receiver<Completion>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(remote: SharedRemote) -> std::io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<Outbound>();
        let (done_tx, done_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("taskdeck-net".into())
            .spawn(move || {
                for out in req_rx {
                    tracing::debug!(request = out.id.0, kind = out.request.kind(), "executing");
                    let result = api::execute(&*remote, &out.request);
                    if done_tx.send(Completion { id: out.id, result }).is_err() {
                        break;
                    }
                }
                tracing::debug!("network worker stopped");
            })?;
        Ok(Worker {
            requests: Some(req_tx),
            completions: done_rx,
            handle: Some(handle),
        })
    }

    /// Queue requests for execution
    pub fn submit(&self, batch: Vec<Outbound>) {
        let Some(tx) = &self.requests else {
            return;
        };
        for out in batch {
            if tx.send(out).is_err() {
                tracing::warn!("network worker is gone; request dropped");
                return;
            }
        }
    }

    /// Non-blocking poll for finished requests
    pub fn poll(&self) -> Vec<Completion> {
        let mut done = Vec::new();
        while let Ok(c) = self.completions.try_recv() {
            done.push(c);
        }
        done
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("network worker panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::api::Request;
    use crate::api::memory::MemoryRemote;

    #[test]
    fn executes_in_order_and_reports_back() {
        let remote = MemoryRemote::new(10);
        let section = remote.seed_section("Inbox");
        let worker = Worker::spawn(Box::new(remote)).unwrap();
        worker.submit(vec![
            Outbound {
                id: RequestId(1),
                request: Request::ListSections { project: 1, page: 1 },
            },
            Outbound {
                id: RequestId(2),
                request: Request::ListTasks {
                    section,
                    page: 1,
                    filter: Default::default(),
                },
            },
        ]);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut done = Vec::new();
        while done.len() < 2 && Instant::now() < deadline {
            done.extend(worker.poll());
            std::thread::sleep(Duration::from_millis(5));
        }
        let ids: Vec<u64> = done.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(matches!(done[0].result, Ok(Reply::Sections(_))));
        assert!(matches!(done[1].result, Ok(Reply::Tasks(_))));
    }
}
