//! Explicit, cancellable animation-frame requests.
//!
//! The UI loop ticks at the configured frame rate; a visualizer only does
//! frame work on a tick when it holds a pending request. Each frame step
//! consumes the request with [`AnimationTask::take`] and asks for the next one
//! only while it is still playing, so a paused or destroyed visualizer never
//! gets called again.

/// At most one outstanding frame request.
#[derive(Debug, Default, Clone)]
pub struct AnimationTask {
    pending: Option<u64>,
    issued: u64,
}

impl AnimationTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the next frame and returns its request id.
    ///
    /// Requesting while a frame is already pending returns the pending id
    /// instead of stacking a second request.
    pub fn request(&mut self) -> u64 {
        if let Some(id) = self.pending {
            return id;
        }
        self.issued += 1;
        self.pending = Some(self.issued);
        self.issued
    }

    /// Drops any pending request. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Consumes the pending request, if any, for the frame being run.
    pub fn take(&mut self) -> Option<u64> {
        self.pending.take()
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Total number of distinct requests issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_is_not_stacked() {
        let mut task = AnimationTask::new();
        let first = task.request();
        let second = task.request();
        assert_eq!(first, second);
        assert_eq!(task.issued(), 1);
        assert!(task.is_scheduled());
    }

    #[test]
    fn test_take_consumes_request() {
        let mut task = AnimationTask::new();
        let id = task.request();
        assert_eq!(task.take(), Some(id));
        assert_eq!(task.take(), None);
        assert!(!task.is_scheduled());

        let next = task.request();
        assert!(next > id);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut task = AnimationTask::new();
        assert!(!task.cancel());
        task.request();
        assert!(task.cancel());
        assert!(!task.cancel());
        assert!(task.take().is_none());
    }
}
