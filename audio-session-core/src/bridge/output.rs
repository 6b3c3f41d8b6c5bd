use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::audio_models::SampleBuffer;
use crate::traits::callback_context::CallbackContext;
use crate::traits::channel_observer::SampleBufferConsumer;

#[derive(Clone)]
struct OutputDelegate {
    consumer: Arc<dyn SampleBufferConsumer>,
    queue: Arc<dyn CallbackContext>,
}

struct OutputInner {
    id: Uuid,
    delegate: Mutex<Option<OutputDelegate>>,
}

/// The session's audio data output.
///
/// Engines hand every captured buffer to [`emit`](Self::emit); the output
/// hops onto its delivery queue and calls the registered consumer there.
/// Clones share the same output.
#[derive(Clone)]
pub struct AudioDataOutput {
    inner: Arc<OutputInner>,
}

impl AudioDataOutput {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(OutputInner {
                id: Uuid::new_v4(),
                delegate: Mutex::new(None),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Register the buffer consumer and the queue it is called on.
    pub fn set_sample_buffer_consumer(
        &self,
        consumer: Arc<dyn SampleBufferConsumer>,
        queue: Arc<dyn CallbackContext>,
    ) {
        *self.inner.delegate.lock() = Some(OutputDelegate { consumer, queue });
    }

    pub fn has_consumer(&self) -> bool {
        self.inner.delegate.lock().is_some()
    }

    /// Deliver a captured buffer. Dropped when no consumer is registered.
    pub fn emit(&self, buffer: SampleBuffer) {
        let delegate = self.inner.delegate.lock().clone();
        match delegate {
            Some(OutputDelegate { consumer, queue }) => {
                queue.dispatch(Box::new(move || consumer.did_output(&buffer)));
            }
            None => log::trace!("Audio output {} has no consumer; buffer dropped", self.inner.id),
        }
    }

    /// Whether `other` is a handle to this same output.
    pub fn same_output(&self, other: &AudioDataOutput) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for AudioDataOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AudioDataOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioDataOutput")
            .field("id", &self.inner.id)
            .field("has_consumer", &self.has_consumer())
            .finish()
    }
}
