use serde::{Deserialize, Serialize};

/// Description of one buffer in a captured [`AudioBufferList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioBuffer {
    /// Interleaved channels carried by this buffer.
    pub number_channels: u32,
    pub data_byte_size: u32,
}

/// Buffer descriptions for one delivered capture buffer.
///
/// Interleaved formats carry a single buffer; non-interleaved formats carry
/// one buffer per channel, each with `number_channels == 1`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioBufferList {
    pub buffers: Vec<AudioBuffer>,
}

impl AudioBufferList {
    pub fn interleaved(number_channels: u32, data_byte_size: u32) -> Self {
        Self {
            buffers: vec![AudioBuffer {
                number_channels,
                data_byte_size,
            }],
        }
    }

    pub fn first(&self) -> Option<&AudioBuffer> {
        self.buffers.first()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// A captured buffer as handed to the audio data output by an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    pub buffer_list: AudioBufferList,
    pub frame_count: usize,
    pub sample_rate: f64,
}

impl SampleBuffer {
    pub fn new(buffer_list: AudioBufferList, frame_count: usize, sample_rate: f64) -> Self {
        Self {
            buffer_list,
            frame_count,
            sample_rate,
        }
    }
}

/// Counters for debugging a capture session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDiagnostics {
    pub configuration_transactions: u64,
    pub input_swaps: u64,
    pub buffers_received: u64,
    pub channel_counts_delivered: u64,
    pub channel_counts_coalesced: u64,
    pub last_channel_count: Option<u32>,
}
