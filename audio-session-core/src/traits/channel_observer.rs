use crate::models::audio_models::SampleBuffer;

/// Receives the live channel count of the active input.
///
/// Called on the caller-facing context, once per captured buffer (or once per
/// coalesced batch under [`DeliveryPolicy::Coalesce`](crate::DeliveryPolicy)).
pub trait ChannelCountObserver: Send + Sync {
    fn on_channel_count_changed(&self, count: u32);
}

impl<F> ChannelCountObserver for F
where
    F: Fn(u32) + Send + Sync,
{
    fn on_channel_count_changed(&self, count: u32) {
        self(count)
    }
}

/// Consumer of raw buffers from an audio data output.
///
/// Called on the output's delivery context. Implementations must not call
/// back into session configuration synchronously.
pub trait SampleBufferConsumer: Send + Sync {
    fn did_output(&self, buffer: &SampleBuffer);
}
