#![no_std]

mod util;
pub mod tasks;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use sampler_core::{ConnectionContext, PeripheralConfig, StackEvent, Variant};
use static_cell::StaticCell;

pub const FW_VERSION: &str = env!("FW_VERSION");
/// `notify` or `read`, fixed at build time by the `read-variant` feature.
pub const VARIANT_NAME: &str = env!("SAMPLER_VARIANT");

/// Connection state shared by the peripheral and stream tasks.
pub static CONTEXT: ConnectionContext<CriticalSectionRawMutex> =
    ConnectionContext::new();

/// Configuration the firmware runs with.
pub const fn peripheral_config() -> PeripheralConfig {
    if cfg!(feature = "read-variant") {
        PeripheralConfig::DEFAULT.with_variant(Variant::Read)
    } else {
        PeripheralConfig::DEFAULT
    }
}

const EVENT_CAPACITY: usize = 16;
pub type EventMutexType = CriticalSectionRawMutex;
pub type EventChannel = Channel<EventMutexType, StackEvent, EVENT_CAPACITY>;
pub type EventSender =
    Sender<'static, EventMutexType, StackEvent, EVENT_CAPACITY>;
pub type EventReceiver =
    Receiver<'static, EventMutexType, StackEvent, EVENT_CAPACITY>;
static EVENT_CHANNEL: StaticCell<EventChannel> = StaticCell::new();

/// Create the channel that carries stack events to the peripheral task.
/// Must be called once.
pub fn init_event_channel() -> (EventSender, EventReceiver) {
    let channel = EVENT_CHANNEL.init(Channel::new());
    (channel.sender(), channel.receiver())
}

pub mod prelude {
    pub use super::{
        init_event_channel, peripheral_config, tasks::*, EventReceiver,
        EventSender, CONTEXT, FW_VERSION, VARIANT_NAME,
    };
    pub use crate::{debug, error, info, trace, warn};
    pub use embassy_executor::Spawner;
    pub use embassy_nrf::interrupt;
    pub use embassy_nrf::interrupt::{InterruptExt, Priority};
    pub use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    pub use embassy_time::{Duration, Timer};
    pub use sampler_core::{
        GapEvent, GattStatus, GattsEvent, PeripheralConfig, StackEvent,
        Variant,
    };
}
