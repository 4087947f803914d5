// src/crawl/queue.rs
// =============================================================================
// The task queue that feeds crawl workers.
//
// How it works:
// 1. A background task (the "actor") owns the list of pending requests and
//    the in-flight counter
// 2. push() and pop() send it messages over a channel, and finishing a request
//    sends it a Finish message
// 3. Because one task handles every message in order, "nothing pending and
//    nothing in flight" is checked in the same step that changes the counter
// 4. Once the counter drops to zero the queue is complete: waiting and future
//    pops return None and pushes are refused
//
// In-flight means accepted by push() and not yet finished. A request popped
// by a worker stays in flight until the worker has queued its children and
// calls finish(), so the count never touches zero mid-crawl.
//
// Rust concepts:
// - mpsc channels: many senders, one receiver
// - oneshot channels: a single reply to a single request
// - tokio::select!: wait on several futures and take the first one ready
// =============================================================================

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::request::Request;
use crate::error::QueueError;

/// Source of work for crawl workers. Implementations must be safe to share
/// between workers.
///
/// pop() returns `Ok(None)` once every pushed request has been finished. That
/// is the normal end of a crawl, not an error.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn push(&self, req: Request) -> Result<(), QueueError>;
    async fn pop(&self) -> Result<Option<Request>, QueueError>;
}

enum Command {
    Push {
        req: Request,
        reply: oneshot::Sender<Result<(), QueueError>>,
    },
    Pop {
        reply: oneshot::Sender<Option<Request>>,
    },
    Finish,
}

/// Queue kept in memory and driven by a background tokio task.
///
/// Cancelling the token stops the background task; pending and future calls
/// return [`QueueError::Cancelled`].
#[derive(Clone)]
pub struct InMemoryQueue {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl InMemoryQueue {
    /// Creates the queue and spawns its background task on the current
    /// tokio runtime.
    pub fn new(cancel: CancellationToken) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let actor = QueueActor {
            receiver,
            pending: VecDeque::new(),
            waiting: VecDeque::new(),
            in_flight: 0,
            completed: false,
        };
        tokio::spawn(actor.run(cancel.clone()));
        Self { commands, cancel }
    }

    fn finish_hook(&self) -> Box<dyn FnOnce() + Send> {
        let commands = self.commands.clone();
        Box::new(move || {
            // The actor is gone only after cancellation, when counting no
            // longer matters.
            let _ = commands.send(Command::Finish);
        })
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn push(&self, mut req: Request) -> Result<(), QueueError> {
        if req.is_finished() {
            return Err(QueueError::AlreadyFinished {
                url: req.url().to_string(),
            });
        }
        if req.has_hook() {
            return Err(QueueError::AlreadyQueued {
                url: req.url().to_string(),
            });
        }
        if self.cancel.is_cancelled() {
            return Err(QueueError::Cancelled);
        }

        // From here on the request counts as in flight until it is finished
        req.set_hook(self.finish_hook());
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Push { req, reply })
            .map_err(|_| QueueError::Cancelled)?;

        tokio::select! {
            res = response => res.unwrap_or(Err(QueueError::Cancelled)),
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled),
        }
    }

    async fn pop(&self) -> Result<Option<Request>, QueueError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Pop { reply })
            .map_err(|_| QueueError::Cancelled)?;

        tokio::select! {
            res = response => res.map_err(|_| QueueError::Cancelled),
            _ = self.cancel.cancelled() => Err(QueueError::Cancelled),
        }
    }
}

struct QueueActor {
    receiver: mpsc::UnboundedReceiver<Command>,
    pending: VecDeque<Request>,
    waiting: VecDeque<oneshot::Sender<Option<Request>>>,
    in_flight: usize,
    completed: bool,
}

impl QueueActor {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let command = tokio::select! {
                command = self.receiver.recv() => command,
                _ = cancel.cancelled() => {
                    debug!(pending = self.pending.len(), "queue cancelled");
                    break;
                }
            };
            match command {
                Some(Command::Push { req, reply }) => self.push(req, reply),
                Some(Command::Pop { reply }) => self.pop(reply),
                Some(Command::Finish) => self.finish(),
                None => break,
            }
        }
        self.shutdown();
    }

    // Accepts a request into the queue
    //
    // Parameters:
    //   req: the request, already carrying its finish hook
    //   reply: where to report whether the push was accepted
    //
    // A push after completion is refused with QueueError::Closed
    fn push(&mut self, mut req: Request, reply: oneshot::Sender<Result<(), QueueError>>) {
        if self.completed {
            let url = req.url().to_string();
            // Never counted, so dropping it must not report a finish.
            let _ = req.take_hook();
            let _ = reply.send(Err(QueueError::Closed { url }));
            return;
        }

        self.in_flight += 1;
        trace!(url = %req.url(), in_flight = self.in_flight, "queued");

        // Hand the request straight to a parked pop if one is still listening.
        while let Some(waiter) = self.waiting.pop_front() {
            match waiter.send(Some(req)) {
                Err(Some(back)) => req = back,
                Ok(()) | Err(None) => {
                    let _ = reply.send(Ok(()));
                    return;
                }
            }
        }
        self.pending.push_back(req);
        let _ = reply.send(Ok(()));
    }

    // Answers a pop: the oldest pending request, None once the crawl is
    // complete, or nothing yet (the caller is parked until work arrives)
    fn pop(&mut self, reply: oneshot::Sender<Option<Request>>) {
        if let Some(req) = self.pending.pop_front() {
            // If the caller stopped waiting, keep the request at the front.
            if let Err(Some(req)) = reply.send(Some(req)) {
                self.pending.push_front(req);
            }
            return;
        }
        if self.completed {
            let _ = reply.send(None);
            return;
        }
        // Nothing to hand out yet, but work is still in flight
        self.waiting.push_back(reply);
    }

    // Runs when a request's finish hook fires
    //
    // The last finish with nothing pending completes the queue and wakes
    // every parked pop with None
    fn finish(&mut self) {
        if self.in_flight == 0 {
            warn!("finish reported with no request in flight");
            return;
        }
        self.in_flight -= 1;
        trace!(in_flight = self.in_flight, "finished");

        if self.in_flight == 0 && self.pending.is_empty() {
            debug!("queue drained, crawl complete");
            self.completed = true;
            for waiter in self.waiting.drain(..) {
                let _ = waiter.send(None);
            }
        }
    }

    fn shutdown(&mut self) {
        // Pending requests were never handed out; their hooks would only
        // message a queue that is already gone.
        for mut req in self.pending.drain(..) {
            let _ = req.take_hook();
        }
        self.waiting.clear();
    }
}

// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. Why an actor instead of a Mutex<VecDeque>?
//    - One task owns all the state and handles one message at a time
//    - Pushing, popping and the in-flight count never need a lock
//    - The "is the crawl done?" check can't race with a push
//
// 2. What are mpsc and oneshot channels?
//    - mpsc: many senders, one receiver (every queue handle -> the actor)
//    - oneshot: exactly one message, used here as the actor's reply
//    - A parked pop is just a oneshot sender kept until work arrives
//
// 3. Why does send() hand the value back on error?
//    - oneshot::Sender::send returns Err(value) if the receiver is gone
//    - The actor uses that to keep a request that nobody picked up
//
// 4. What is #[async_trait]?
//    - Traits can't easily have async methods used through `dyn Trait`
//    - The macro rewrites them to return boxed futures, so the worker can
//      take `&dyn Queue` and tests can pass in their own queue
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn req(uri: &str) -> Request {
        Request::new(uri).unwrap()
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        queue.push(req("https://example.com/1")).await.unwrap();
        queue.push(req("https://example.com/2")).await.unwrap();
        queue.push(req("https://example.com/3")).await.unwrap();

        let mut popped = Vec::new();
        for _ in 0..3 {
            let mut r = queue.pop().await.unwrap().unwrap();
            popped.push(r.url().path().to_string());
            r.finish();
        }

        assert_eq!(popped, vec!["/1", "/2", "/3"]);
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completes_only_when_all_finished() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        queue.push(req("https://example.com/")).await.unwrap();

        let mut first = queue.pop().await.unwrap().unwrap();

        // Still in flight: pop must block rather than report completion
        let blocked = timeout(Duration::from_millis(50), queue.pop()).await;
        assert!(blocked.is_err());

        // Children are queued before the parent finishes
        queue.push(first.follow_link("https://example.com/child").unwrap()).await.unwrap();
        first.finish();

        let mut child = queue.pop().await.unwrap().unwrap();
        assert_eq!(child.url().path(), "/child");
        child.finish();

        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parked_pop_receives_push() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        queue.push(req("https://example.com/")).await.unwrap();
        let mut first = queue.pop().await.unwrap().unwrap();

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.push(req("https://example.com/late")).await.unwrap();
        first.finish();

        let mut late = consumer.await.unwrap().unwrap().unwrap();
        assert_eq!(late.url().path(), "/late");
        late.finish();
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_after_completion_is_rejected() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        queue.push(req("https://example.com/")).await.unwrap();
        let mut r = queue.pop().await.unwrap().unwrap();
        r.finish();
        assert!(queue.pop().await.unwrap().is_none());

        let err = queue.push(req("https://example.com/again")).await.unwrap_err();
        assert!(matches!(err, QueueError::Closed { .. }));
        // Completion is still reported after the rejected push
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_push_finished_request_is_rejected() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        let mut r = req("https://example.com/");
        r.finish();

        let err = queue.push(r).await.unwrap_err();
        assert!(matches!(err, QueueError::AlreadyFinished { .. }));
    }

    #[tokio::test]
    async fn test_push_in_flight_request_is_rejected() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        queue.push(req("https://example.com/")).await.unwrap();
        let popped = queue.pop().await.unwrap().unwrap();

        let err = queue.push(popped).await.unwrap_err();
        assert!(matches!(err, QueueError::AlreadyQueued { .. }));
        // The rejected request was dropped, which finished it
        assert!(queue.pop().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pop() {
        let cancel = CancellationToken::new();
        let queue = InMemoryQueue::new(cancel.clone());
        queue.push(req("https://example.com/")).await.unwrap();
        let _held = queue.pop().await.unwrap().unwrap();

        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let res = timeout(Duration::from_secs(1), consumer).await.unwrap().unwrap();
        assert!(matches!(res, Err(QueueError::Cancelled)));
        assert!(matches!(
            queue.push(req("https://example.com/x")).await,
            Err(QueueError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_consumers() {
        let queue = InMemoryQueue::new(CancellationToken::new());
        for i in 0..20 {
            queue
                .push(req(&format!("https://example.com/{}", i)))
                .await
                .unwrap();
        }

        let consumers = (0..4).map(|_| {
            let queue = queue.clone();
            async move {
                let mut seen = Vec::new();
                while let Some(mut r) = queue.pop().await.unwrap() {
                    seen.push(r.url().path().to_string());
                    tokio::task::yield_now().await;
                    r.finish();
                }
                seen
            }
        });

        let mut all: Vec<String> = futures::future::join_all(consumers)
            .await
            .into_iter()
            .flatten()
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 20);
    }

    // Consumers on several threads push children before finishing, so pushes
    // race with other consumers bringing the in-flight count down.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_consumers_pushing_children_terminate() {
        const DEPTH: usize = 6;

        for _ in 0..10 {
            let queue = InMemoryQueue::new(CancellationToken::new());
            queue.push(req("https://example.com/node/0")).await.unwrap();

            let consumers: Vec<_> = (0..4)
                .map(|_| {
                    let queue = queue.clone();
                    tokio::spawn(async move {
                        let mut seen = Vec::new();
                        while let Some(mut r) = queue.pop().await.unwrap() {
                            let id: usize = r.url().path().trim_start_matches("/node/").parse().unwrap();
                            if r.depth() < DEPTH {
                                for child in [2 * id + 1, 2 * id + 2] {
                                    let next = r.follow_link(&format!("https://example.com/node/{}", child)).unwrap();
                                    queue.push(next).await.unwrap();
                                }
                            }
                            seen.push(id);
                            tokio::task::yield_now().await;
                            r.finish();
                        }
                        seen
                    })
                })
                .collect();

            let results = timeout(Duration::from_secs(5), futures::future::join_all(consumers))
                .await
                .expect("crawl did not terminate");
            let mut all: Vec<usize> = results.into_iter().flat_map(|seen| seen.unwrap()).collect();
            all.sort_unstable();

            // A full binary tree of depth 6, each node popped exactly once
            assert_eq!(all, (0..127).collect::<Vec<_>>());
        }
    }
}
