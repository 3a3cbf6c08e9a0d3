use rustc_hash::FxHashSet;

use crate::instance::InstanceId;

/// Defers instance rebuilds to the next frame.
///
/// Scheduling an instance that is already queued does nothing, so a burst of requests
/// in one frame ends in a single rebuild.
#[derive(Default)]
pub struct FrameScheduler {
    queue: Vec<InstanceId>,
    queued: FxHashSet<InstanceId>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a rebuild. Returns false if one was already queued.
    pub fn schedule(&mut self, instance: InstanceId) -> bool {
        if !self.queued.insert(instance) {
            return false;
        }
        self.queue.push(instance);
        true
    }

    pub fn cancel(&mut self, instance: InstanceId) {
        if self.queued.remove(&instance) {
            self.queue.retain(|&i| i != instance);
        }
    }

    /// Take everything queued before this frame. Requests made while handling them wait a frame.
    pub fn take_due(&mut self) -> Vec<InstanceId> {
        self.queued.clear();
        std::mem::take(&mut self.queue)
    }

    pub fn is_scheduled(&self, instance: InstanceId) -> bool {
        self.queued.contains(&instance)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
