use super::message::Message;

/// Bounded multi-producer/multi-consumer FIFO of messages: the one queue
/// primitive every pipeline edge is made of. A send blocks when full, a
/// receive blocks when empty; dropping every clone of the sender half closes
/// the queue and pending receives drain what remains before observing
/// end-of-stream, which is exactly `flume::bounded`'s contract.
#[derive(Clone)]
pub struct Queue {
    tx: flume::Sender<Message>,
    rx: flume::Receiver<Message>,
    capacity: usize,
}

impl Queue {
    pub fn bounded(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be > 0");
        let (tx, rx) = flume::bounded(capacity);
        Self { tx, rx, capacity }
    }

    pub fn sender(&self) -> flume::Sender<Message> {
        self.tx.clone()
    }

    pub fn receiver(&self) -> flume::Receiver<Message> {
        self.rx.clone()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
