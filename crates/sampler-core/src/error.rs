use crate::bootstrap::{BootstrapState, BootstrapStep};
use crate::stack::GattStatus;

/// Reasons a [`PeripheralConfig`](crate::PeripheralConfig) is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    EmptyDeviceName,
    /// Device name is longer than the GAP layer accepts.
    DeviceNameTooLong(usize),
    /// Batch size is zero or does not fit in one notification.
    InvalidBatchSize(usize),
    /// Sampling needs a non-zero pause between samples.
    ZeroSampleInterval,
    InvalidAdvertisingInterval { min: u16, max: u16 },
    /// The service handle budget cannot hold every attribute.
    TooFewHandles { available: u16, required: u16 },
}

/// Errors raised while building the GATT table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootstrapError<E> {
    /// The stack acknowledged a step with a failure status.
    Rejected { step: BootstrapStep, status: GattStatus },
    /// The stack refused the request for a step.
    Stack { step: BootstrapStep, error: E },
    /// An acknowledgement arrived before the state it depends on.
    OutOfOrder { step: BootstrapStep, state: BootstrapState },
    /// Bootstrap stopped after an earlier failure.
    Halted,
}

impl<E> BootstrapError<E> {
    /// Whether the error stops bootstrap. Out-of-order events are dropped
    /// and bootstrap carries on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::OutOfOrder { .. })
    }
}

/// Errors raised by connection transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionError {
    /// A second central tried to connect while one is already connected.
    AlreadyConnected { active: u16, rejected: u16 },
    /// The stack reported that advertising did not start.
    AdvertisingFailed(GattStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// Another coordinator already streams on this context.
    AlreadyStreaming,
}
