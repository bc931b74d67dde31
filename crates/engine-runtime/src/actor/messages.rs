/// Messages for the import worker actor.
#[derive(Debug)]
pub enum WorkerMsg {
    /// Process persisted batches until the queue is empty or the time limit hits.
    Process,
}
