use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{AudioBufferList, SampleBuffer, SessionDiagnostics};
use crate::models::config::DeliveryPolicy;
use crate::traits::callback_context::CallbackContext;
use crate::traits::channel_observer::{ChannelCountObserver, SampleBufferConsumer};

/// Channel count of the first buffer in `list`, if it has any buffers.
pub fn first_channel_count(list: &AudioBufferList) -> Option<u32> {
    list.first().map(|buffer| buffer.number_channels)
}

struct BridgeShared {
    observer: Mutex<Option<Arc<dyn ChannelCountObserver>>>,
    // Latest undelivered count under `DeliveryPolicy::Coalesce`.
    pending: Mutex<Option<u32>>,
    diagnostics: Arc<Mutex<SessionDiagnostics>>,
}

impl BridgeShared {
    fn notify(&self, count: u32) {
        let observer = self.observer.lock().clone();
        let Some(observer) = observer else {
            log::trace!("No channel count observer; dropped count {}", count);
            return;
        };

        {
            let mut d = self.diagnostics.lock();
            d.channel_counts_delivered += 1;
            d.last_channel_count = Some(count);
        }
        observer.on_channel_count_changed(count);
    }
}

/// Buffer consumer that turns captured buffers into channel counts for the
/// registered observer.
///
/// Runs on the delivery context and forwards each count to the
/// caller-facing context. Never touches session configuration.
pub struct SampleDeliveryBridge {
    shared: Arc<BridgeShared>,
    callback_context: Arc<dyn CallbackContext>,
    policy: DeliveryPolicy,
}

impl SampleDeliveryBridge {
    pub fn new(
        callback_context: Arc<dyn CallbackContext>,
        policy: DeliveryPolicy,
        diagnostics: Arc<Mutex<SessionDiagnostics>>,
    ) -> Self {
        Self {
            shared: Arc::new(BridgeShared {
                observer: Mutex::new(None),
                pending: Mutex::new(None),
                diagnostics,
            }),
            callback_context,
            policy,
        }
    }

    pub fn set_observer(&self, observer: Arc<dyn ChannelCountObserver>) {
        *self.shared.observer.lock() = Some(observer);
    }

    pub fn clear_observer(&self) {
        self.shared.observer.lock().take();
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    fn forward(&self, count: u32) {
        let shared = Arc::clone(&self.shared);
        self.callback_context
            .dispatch(Box::new(move || shared.notify(count)));
    }

    fn forward_coalesced(&self, count: u32) {
        {
            let mut pending = self.shared.pending.lock();
            if pending.replace(count).is_some() {
                self.shared.diagnostics.lock().channel_counts_coalesced += 1;
                return;
            }
        }

        let shared = Arc::clone(&self.shared);
        self.callback_context.dispatch(Box::new(move || {
            let latest = shared.pending.lock().take();
            if let Some(count) = latest {
                shared.notify(count);
            }
        }));
    }
}

impl SampleBufferConsumer for SampleDeliveryBridge {
    fn did_output(&self, buffer: &SampleBuffer) {
        self.shared.diagnostics.lock().buffers_received += 1;

        let Some(count) = first_channel_count(&buffer.buffer_list) else {
            log::trace!("Captured buffer carried no buffer descriptions");
            return;
        };

        match self.policy {
            DeliveryPolicy::Unbounded => self.forward(count),
            DeliveryPolicy::Coalesce => self.forward_coalesced(count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::run_loop::RunLoop;
    use crate::models::audio_models::AudioBuffer;

    fn buffer(channels: u32) -> SampleBuffer {
        SampleBuffer::new(AudioBufferList::interleaved(channels, channels * 4 * 256), 256, 48000.0)
    }

    fn bridge(run_loop: &RunLoop, policy: DeliveryPolicy) -> (SampleDeliveryBridge, Arc<Mutex<Vec<u32>>>, Arc<Mutex<SessionDiagnostics>>) {
        let diagnostics = Arc::new(Mutex::new(SessionDiagnostics::default()));
        let bridge = SampleDeliveryBridge::new(Arc::new(run_loop.handle()), policy, Arc::clone(&diagnostics));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        bridge.set_observer(Arc::new(move |count: u32| sink.lock().push(count)));
        (bridge, seen, diagnostics)
    }

    #[test]
    fn reads_first_buffer_only() {
        let list = AudioBufferList {
            buffers: vec![
                AudioBuffer { number_channels: 1, data_byte_size: 1024 },
                AudioBuffer { number_channels: 1, data_byte_size: 1024 },
            ],
        };
        assert_eq!(first_channel_count(&list), Some(1));
        assert_eq!(first_channel_count(&AudioBufferList::interleaved(6, 0)), Some(6));
        assert_eq!(first_channel_count(&AudioBufferList::default()), None);
    }

    #[test]
    fn one_notification_per_buffer() {
        let run_loop = RunLoop::new();
        let (bridge, seen, diagnostics) = bridge(&run_loop, DeliveryPolicy::Unbounded);

        for channels in [2, 2, 1, 8] {
            bridge.did_output(&buffer(channels));
        }
        assert!(seen.lock().is_empty(), "observer must run on the caller context");

        assert_eq!(run_loop.run_pending(), 4);
        assert_eq!(*seen.lock(), vec![2, 2, 1, 8]);

        let d = diagnostics.lock().clone();
        assert_eq!(d.buffers_received, 4);
        assert_eq!(d.channel_counts_delivered, 4);
        assert_eq!(d.last_channel_count, Some(8));
    }

    #[test]
    fn empty_buffer_list_is_skipped() {
        let run_loop = RunLoop::new();
        let (bridge, seen, diagnostics) = bridge(&run_loop, DeliveryPolicy::Unbounded);

        bridge.did_output(&SampleBuffer::new(AudioBufferList::default(), 0, 48000.0));
        assert_eq!(run_loop.run_pending(), 0);
        assert!(seen.lock().is_empty());
        assert_eq!(diagnostics.lock().buffers_received, 1);
    }

    #[test]
    fn coalesce_keeps_newest_pending_count() {
        let run_loop = RunLoop::new();
        let (bridge, seen, diagnostics) = bridge(&run_loop, DeliveryPolicy::Coalesce);

        bridge.did_output(&buffer(2));
        bridge.did_output(&buffer(4));
        bridge.did_output(&buffer(1));
        assert_eq!(run_loop.pending(), 1);

        run_loop.run_pending();
        assert_eq!(*seen.lock(), vec![1]);
        assert_eq!(diagnostics.lock().channel_counts_coalesced, 2);

        bridge.did_output(&buffer(2));
        run_loop.run_pending();
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn cleared_observer_receives_nothing() {
        let run_loop = RunLoop::new();
        let (bridge, seen, diagnostics) = bridge(&run_loop, DeliveryPolicy::Unbounded);

        bridge.clear_observer();
        bridge.did_output(&buffer(2));
        run_loop.run_pending();

        assert!(seen.lock().is_empty());
        assert_eq!(diagnostics.lock().channel_counts_delivered, 0);
    }
}
