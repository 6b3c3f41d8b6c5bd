use std::sync::Arc;

use crate::executor::dispatch_queue::DispatchQueue;
use crate::models::error::SessionError;
use crate::traits::callback_context::CallbackContext;

/// Single-worker executor for every hardware configuration and start/stop
/// operation.
///
/// Operations run one at a time in submission order on a dedicated thread,
/// never on the caller-facing context. Each result is posted back to the
/// caller-facing context before the completion sees it.
pub struct SerialExecutor {
    queue: DispatchQueue,
    callback_context: Arc<dyn CallbackContext>,
}

impl SerialExecutor {
    pub fn new(
        label: impl Into<String>,
        callback_context: Arc<dyn CallbackContext>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            queue: DispatchQueue::new(label)?,
            callback_context,
        })
    }

    /// Run `op` on the worker, then hand its result to `completion` on the
    /// caller-facing context.
    pub fn submit<T, Op, Done>(&self, op: Op, completion: Done)
    where
        T: Send + 'static,
        Op: FnOnce() -> T + Send + 'static,
        Done: FnOnce(T) + Send + 'static,
    {
        let callback_context = Arc::clone(&self.callback_context);
        self.queue.enqueue(Box::new(move || {
            let result = op();
            callback_context.dispatch(Box::new(move || completion(result)));
        }));
    }

    /// Run `op` on the worker with no completion.
    pub fn execute(&self, op: impl FnOnce() + Send + 'static) {
        self.queue.enqueue(Box::new(op));
    }

    /// Post `value` to `completion` on the caller-facing context without
    /// touching the worker.
    pub fn deliver<T, Done>(&self, value: T, completion: Done)
    where
        T: Send + 'static,
        Done: FnOnce(T) + Send + 'static,
    {
        self.callback_context
            .dispatch(Box::new(move || completion(value)));
    }

    pub fn is_current(&self) -> bool {
        self.queue.is_current()
    }

    pub fn label(&self) -> &str {
        self.queue.label()
    }

    pub fn callback_context(&self) -> &Arc<dyn CallbackContext> {
        &self.callback_context
    }
}
