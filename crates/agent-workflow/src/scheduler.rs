//! Node dispatch and cooperative cancellation
//!
//! [`dispatch`] runs a set of independent nodes either one after another or
//! with bounded concurrency. Node outcomes are reported through a single
//! event callback, so the caller mutates its state from one place no matter
//! how many nodes are in flight.

use futures::stream::{self, StreamExt};
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// How independent nodes are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One node at a time, in the order given
    Sequential,
    /// Up to `max_workers` nodes in flight
    Concurrent { max_workers: usize },
}

impl ExecutionMode {
    /// Concurrent when more than one worker is allowed, sequential otherwise
    pub fn from_concurrency(max_workers: usize) -> Self {
        if max_workers > 1 {
            Self::Concurrent { max_workers }
        } else {
            Self::Sequential
        }
    }

    /// Number of nodes allowed in flight
    pub fn limit(self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Concurrent { max_workers } => max_workers.max(1),
        }
    }

    pub fn is_concurrent(self) -> bool {
        matches!(self, Self::Concurrent { .. })
    }
}

/// Requests cancellation of a run
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Observes cancellation of a run
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    /// A signal that is never raised
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested
    ///
    /// Pends forever when every [`CancelHandle`] has been dropped without
    /// cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let raised = rx.wait_for(|cancelled| *cancelled).await.map(|_| ());
        if raised.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked cancel handle and signal
pub fn cancellation() -> (CancelHandle, CancellationSignal) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx: Arc::new(tx) },
        CancellationSignal { rx },
    )
}

/// Progress reported by [`dispatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent<K, T> {
    Started(K),
    Finished(K, T),
}

/// Run `nodes` according to `mode`, reporting progress to `on_event`
///
/// Returns `true` when the signal was raised before every node finished.
/// In-flight nodes are dropped at their next await point on cancellation, so
/// a node may report `Started` without a matching `Finished`.
pub async fn dispatch<K, T, F, Fut, E>(
    nodes: Vec<K>,
    mode: ExecutionMode,
    signal: &CancellationSignal,
    run: F,
    mut on_event: E,
) -> bool
where
    K: Clone + Debug,
    F: Fn(K) -> Fut,
    Fut: Future<Output = T>,
    E: FnMut(NodeEvent<K, T>),
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let limit = mode.limit();
    let run = &run;

    debug!("Dispatching {} nodes ({:?})", nodes.len(), mode);

    let producer = async move {
        let work = stream::iter(nodes).for_each_concurrent(limit, |node| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(NodeEvent::Started(node.clone()));
                let output = run(node.clone()).await;
                let _ = tx.send(NodeEvent::Finished(node, output));
            }
        });

        tokio::select! {
            biased;
            () = signal.cancelled() => true,
            () = work => false,
        }
    };

    let consumer = async {
        while let Some(event) = rx.recv().await {
            on_event(event);
        }
    };

    let (cancelled, ()) = tokio::join!(producer, consumer);
    if cancelled {
        debug!("Dispatch cancelled");
    }
    cancelled
}
