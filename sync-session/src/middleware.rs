//! Event middleware.
//!
//! Every event dispatched to a session passes through an ordered chain of
//! middleware before it reaches the state machine. Each middleware sees the
//! event and a `next` continuation:
//!
//! - call `next(event)` to pass it on (possibly transformed)
//! - return `None` without calling `next` to drop it
//!
//! Middleware run inside the session's dispatch loop, one event at a time,
//! so they must not block.

use cloudsync_core::SyncEvent;

/// Continuation handed to a middleware. Runs the rest of the chain.
pub type Next<'a> = &'a dyn Fn(SyncEvent) -> Option<SyncEvent>;

/// An interceptor in the event pipeline.
pub trait Middleware: Send + Sync {
    /// Handle `event`, returning what should reach the state machine.
    fn run(&self, event: SyncEvent, next: Next<'_>) -> Option<SyncEvent>;
}

/// Ordered middleware chain.
#[derive(Default)]
pub struct Pipeline {
    middleware: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. Earlier middleware run first.
    pub fn push(&mut self, middleware: Box<dyn Middleware>) {
        self.middleware.push(middleware);
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Check if the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run `event` through the chain.
    ///
    /// Returns the event that should reach the state machine, or `None` if
    /// a middleware dropped it.
    pub fn run(&self, event: SyncEvent) -> Option<SyncEvent> {
        self.run_from(0, event)
    }

    fn run_from(&self, index: usize, event: SyncEvent) -> Option<SyncEvent> {
        match self.middleware.get(index) {
            Some(middleware) => {
                let next = |event| self.run_from(index + 1, event);
                middleware.run(event, &next)
            }
            None => Some(event),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("len", &self.middleware.len())
            .finish()
    }
}

/// Middleware built from a closure. See [`from_fn`].
pub struct FnMiddleware<F>(F);

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(SyncEvent, Next<'_>) -> Option<SyncEvent> + Send + Sync,
{
    fn run(&self, event: SyncEvent, next: Next<'_>) -> Option<SyncEvent> {
        (self.0)(event, next)
    }
}

/// Wrap a closure as middleware.
///
/// ```ignore
/// let drop_fetches = from_fn(|event, next| match event {
///     SyncEvent::FetchRequested => None,
///     other => next(other),
/// });
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(SyncEvent, Next<'_>) -> Option<SyncEvent> + Send + Sync,
{
    FnMiddleware(f)
}

/// Logs every event at debug level, then passes it on.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

impl Middleware for LoggingMiddleware {
    fn run(&self, event: SyncEvent, next: Next<'_>) -> Option<SyncEvent> {
        tracing::debug!("Sync event: {}", event.description());
        next(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudsync_core::AccountStatus;
    use std::sync::{Arc, Mutex};

    fn recorder(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Box<dyn Middleware> {
        Box::new(from_fn(move |event, next| {
            log.lock().unwrap().push(format!("{} before", name));
            let out = next(event);
            log.lock().unwrap().push(format!("{} after", name));
            out
        }))
    }

    #[test]
    fn empty_pipeline_passes_event_through() {
        let pipeline = Pipeline::new();
        assert!(pipeline.is_empty());
        assert_eq!(
            pipeline.run(SyncEvent::FetchRequested),
            Some(SyncEvent::FetchRequested)
        );
    }

    #[test]
    fn middleware_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(recorder("outer", log.clone()));
        pipeline.push(recorder("inner", log.clone()));

        let out = pipeline.run(SyncEvent::FetchRequested);

        assert_eq!(out, Some(SyncEvent::FetchRequested));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer before", "inner before", "inner after", "outer after"]
        );
    }

    #[test]
    fn middleware_can_drop_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(from_fn(|event, next| match event {
            SyncEvent::FetchRequested => None,
            other => next(other),
        })));
        pipeline.push(recorder("inner", log.clone()));

        assert_eq!(pipeline.run(SyncEvent::FetchRequested), None);
        // Later middleware never saw the dropped event
        assert!(log.lock().unwrap().is_empty());

        let status = SyncEvent::AccountStatusChanged(AccountStatus::Available);
        assert_eq!(pipeline.run(status.clone()), Some(status));
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn middleware_can_transform_events() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(from_fn(|event, next| match event {
            SyncEvent::AccountStatusChanged(AccountStatus::Other) => {
                next(SyncEvent::AccountStatusChanged(AccountStatus::Unavailable))
            }
            other => next(other),
        })));

        assert_eq!(
            pipeline.run(SyncEvent::AccountStatusChanged(AccountStatus::Other)),
            Some(SyncEvent::AccountStatusChanged(AccountStatus::Unavailable))
        );
    }

    #[test]
    fn logging_middleware_passes_event_on() {
        let mut pipeline = Pipeline::new();
        pipeline.push(Box::new(LoggingMiddleware));
        assert_eq!(pipeline.len(), 1);
        assert_eq!(
            pipeline.run(SyncEvent::FetchRequested),
            Some(SyncEvent::FetchRequested)
        );
    }
}
