/// A unit of work posted to an execution context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// An execution context that runs posted jobs in submission order.
///
/// The host application supplies the caller-facing context (its UI loop,
/// a [`RunLoop`](crate::executor::run_loop::RunLoop), or a
/// [`DispatchQueue`](crate::executor::dispatch_queue::DispatchQueue)); every
/// completion and observer call is delivered through it.
pub trait CallbackContext: Send + Sync {
    /// Queue `job` to run on this context. Must not run it inline.
    fn dispatch(&self, job: Job);
}
