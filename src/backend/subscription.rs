/// Handle for a live subscription.
///
/// The owning component must close it exactly once when its scope ends
/// (conversation deselected, session ended); `close` is a safe no-op on a
/// second call, and dropping an open handle closes it.
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Handle that never had anything to dispose.
    pub fn inert() -> Self {
        Self { disposer: None }
    }

    pub fn close(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.disposer.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn close_runs_the_disposer_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut subscription = Subscription::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        subscription.close();
        subscription.close();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(subscription.is_closed());
    }

    #[test]
    fn drop_closes_an_open_subscription() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);

        drop(Subscription::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_after_close_does_not_dispose_again() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut subscription = Subscription::new(move || {
            counted.fetch_add(1, Ordering::SeqCst);
        });

        subscription.close();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inert_subscription_is_closed_from_the_start() {
        let subscription = Subscription::inert();

        assert!(subscription.is_closed());
    }
}
