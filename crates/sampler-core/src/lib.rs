#![no_std]
//! Connection lifecycle and sample streaming for a single-central BLE
//! sensor peripheral.
//!
//! The crate is independent of any radio stack. Stack requests go through
//! the [`BleStack`] trait and stack acknowledgements come back as
//! [`StackEvent`]s, which the [`Peripheral`] turns into bootstrap and
//! connection transitions. While a central is connected the
//! [`StreamCoordinator`] acquires sample batches and notifies them, polling
//! the shared [`ConnectionContext`] so that it stops on its own once the
//! link goes away.

// This must go first so the logging macros are visible to every module.
pub(crate) mod fmt;

mod advertising;
mod batcher;
mod bootstrap;
pub mod config;
mod connection;
mod context;
mod error;
mod event;
mod peripheral;
mod stack;
mod streamer;

pub use advertising::{
    AdFlags, AddressType, AdvPayload, AdvertisingData, AdvertisingKind,
    AdvertisingParams, ChannelMap, FilterPolicy,
};
pub use batcher::{SampleBatcher, SamplePayload, SampleSource};
pub use bootstrap::{BootstrapSequencer, BootstrapState, BootstrapStep, GattHandles};
pub use config::{PeripheralConfig, Variant};
pub use connection::{ConnectionStateMachine, LinkState};
pub use context::{ConnectionContext, StreamClaim, StreamReport, StreamTarget};
pub use error::{BootstrapError, ConfigError, ConnectionError, StreamError};
pub use event::{GapEvent, GattsEvent, StackEvent, WriteValue};
pub use peripheral::Peripheral;
pub use stack::{
    BleStack, CharacteristicHandle, DescriptorHandle, GattStatus, Permissions,
    Properties, ServiceHandle, StackError, Uuid16,
};
pub use streamer::StreamCoordinator;
