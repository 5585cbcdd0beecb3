use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

/// Shared handle for reporting how far a job has gotten and for asking it to
/// stop early.
#[derive(Clone)]
pub struct Progress(Arc<ProgressInner>);

struct ProgressInner {
    complete: AtomicU64,
    total: AtomicU64,
    cancelled: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self(Arc::new(ProgressInner {
            complete: AtomicU64::new(0),
            total: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        }))
    }

    pub fn progress(&self) -> f32 {
        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }

        self.0.complete.load(Ordering::Relaxed) as f32 / total as f32
    }

    pub fn complete(&self) -> bool {
        let total = self.0.total.load(Ordering::Relaxed);
        if total == 0 {
            return false;
        }

        self.0.complete.load(Ordering::Relaxed) >= total
    }

    pub fn completed(&self) -> u64 {
        self.0.complete.load(Ordering::Relaxed)
    }

    /// Starts a new job of `total` units, clearing the completed count.
    pub fn set_total(&self, total: u64) {
        self.0.total.store(total, Ordering::Relaxed);
        self.0.complete.store(0, Ordering::Relaxed);
    }

    pub fn add_complete(&self, count: u64) {
        self.0.complete.fetch_add(count, Ordering::Relaxed);
    }

    pub fn set_finished(&self) {
        let total = self.0.total.load(Ordering::Relaxed);
        self.0.complete.store(total, Ordering::Relaxed);
    }

    /// Asks every job observing this handle to stop at its next poll.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Relaxed)
    }

    pub fn reset_cancel(&self) {
        self.0.cancelled.store(false, Ordering::Relaxed);
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::Progress;

    #[test]
    fn counts_across_threads() {
        let progress = Progress::new();
        progress.set_total(8);
        assert_eq!(progress.progress(), 0.0);

        let handles = (0..8)
            .map(|_| {
                let progress = progress.clone();
                thread::spawn(move || progress.add_complete(1))
            })
            .collect::<Vec<_>>();
        handles.into_iter().for_each(|x| x.join().unwrap());

        assert_eq!(progress.completed(), 8);
        assert!(progress.complete());
        assert_eq!(progress.progress(), 1.0);
    }

    #[test]
    fn cancel_is_shared() {
        let progress = Progress::new();
        let observer = progress.clone();
        assert!(!observer.is_cancelled());

        progress.cancel();
        assert!(observer.is_cancelled());

        observer.reset_cancel();
        assert!(!progress.is_cancelled());
    }
}
