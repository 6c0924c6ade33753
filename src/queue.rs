use std::{
    collections::HashSet,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::mpsc;
use tracing::{debug, warn};

type Waiting<T> = Arc<Mutex<HashSet<T>>>;

fn lock<T>(waiting: &Mutex<HashSet<T>>) -> MutexGuard<'_, HashSet<T>> {
    waiting.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Creates an unbounded hand-off channel that holds each item at most once.
///
/// Items come out in the order they were first enqueued. Enqueueing an item
/// that is still waiting is a no-op.
pub fn work_queue<T>(name: &'static str) -> (QueueProducer<T>, QueueConsumer<T>)
where
    T: Debug + Copy + Eq + Hash + Send + 'static,
{
    let (sender, receiver) = mpsc::unbounded_channel();
    let waiting = Waiting::<T>::default();
    (
        QueueProducer {
            name,
            sender,
            waiting: Arc::clone(&waiting),
        },
        QueueConsumer {
            name,
            receiver: Arc::new(Mutex::new(receiver)),
            waiting,
        },
    )
}

#[derive(Debug)]
pub struct QueueProducer<T> {
    name: &'static str,
    sender: mpsc::UnboundedSender<T>,
    waiting: Waiting<T>,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
            waiting: Arc::clone(&self.waiting),
        }
    }
}

impl<T> QueueProducer<T>
where
    T: Debug + Copy + Eq + Hash + Send + 'static,
{
    /// Never waits. Returns `false` when the item was already waiting or the
    /// queue is closed.
    pub fn enqueue(&self, item: T) -> bool {
        let mut waiting = lock(&self.waiting);
        if !waiting.insert(item) {
            debug!(queue = self.name, ?item, "Item already queued");
            return false;
        }
        // sent under the lock so the set and the channel agree
        if self.sender.send(item).is_err() {
            waiting.remove(&item);
            warn!(queue = self.name, ?item, "Queue closed, item dropped");
            return false;
        }
        true
    }
}

/// Receiving half, shared by all the attempts of a dispatch tick.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    name: &'static str,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<T>>>,
    waiting: Waiting<T>,
}

impl<T> Clone for QueueConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            receiver: Arc::clone(&self.receiver),
            waiting: Arc::clone(&self.waiting),
        }
    }
}

impl<T> QueueConsumer<T>
where
    T: Copy + Eq + Hash,
{
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Takes one item if one is ready right now.
    ///
    /// Once taken, the item may be enqueued again.
    pub fn try_take(&self) -> Option<T> {
        let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let item = receiver.try_recv().ok()?;
        lock(&self.waiting).remove(&item);
        Some(item)
    }

    /// Number of items waiting in the channel.
    pub fn backlog(&self) -> usize {
        lock(&self.waiting).len()
    }
}
