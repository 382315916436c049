use embedded_hal_async::delay::DelayNs;

use crate::config::{MAX_BATCH_SIZE, PAYLOAD_CAPACITY, SAMPLE_MAX};

/// A sensor that yields one unsigned sample per read.
#[allow(async_fn_in_trait)]
pub trait SampleSource {
    /// One-time hardware setup. Called before the first read.
    async fn configure(&mut self);

    async fn read(&mut self) -> u16;

    /// Largest value `read` may return.
    fn max_value(&self) -> u16 {
        SAMPLE_MAX
    }
}

/// One batch of samples, two little-endian bytes per sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SamplePayload {
    bytes: heapless::Vec<u8, PAYLOAD_CAPACITY>,
}

impl SamplePayload {
    pub const fn new() -> Self {
        Self { bytes: heapless::Vec::new() }
    }

    /// Build a payload from samples, or `None` if they do not fit.
    pub fn from_samples(samples: &[u16]) -> Option<Self> {
        let mut payload = Self::new();
        for &sample in samples {
            payload.push(sample).ok()?;
        }
        Some(payload)
    }

    /// Append a sample, handing it back when the payload is full.
    pub fn push(&mut self, sample: u16) -> Result<(), u16> {
        self.bytes
            .extend_from_slice(&sample.to_le_bytes())
            .map_err(|_| sample)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn sample_count(&self) -> usize {
        self.bytes.len() / 2
    }

    /// Decode the samples back in order.
    pub fn samples(&self) -> impl Iterator<Item = u16> + '_ {
        self.bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }
}

/// Collects batches from a [`SampleSource`] at a fixed pace.
pub struct SampleBatcher<S, D> {
    source: S,
    delay: D,
    interval_ms: u32,
    configured: bool,
}

impl<S: SampleSource, D: DelayNs> SampleBatcher<S, D> {
    pub fn new(source: S, delay: D, interval_ms: u32) -> Self {
        Self { source, delay, interval_ms, configured: false }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Acquire `n` samples, waiting the sample interval after each one.
    ///
    /// The source is configured on the first call only. Values above the
    /// source's maximum are clamped. `n` is capped at [`MAX_BATCH_SIZE`],
    /// so the payload is always `2 * n` bytes for `n` in range.
    pub async fn acquire_batch(&mut self, n: usize) -> SamplePayload {
        if !self.configured {
            self.source.configure().await;
            self.configured = true;
            debug!("sample source configured");
        }

        if n > MAX_BATCH_SIZE {
            warn!("batch of {} capped to {}", n, MAX_BATCH_SIZE);
        }
        let n = n.min(MAX_BATCH_SIZE);
        let max = self.source.max_value();

        let mut payload = SamplePayload::new();
        for _ in 0..n {
            let sample = self.source.read().await.min(max);
            if payload.push(sample).is_err() {
                break;
            }
            self.delay.delay_ms(self.interval_ms).await;
        }
        trace!("acquired {} samples", payload.sample_count());
        payload
    }
}
