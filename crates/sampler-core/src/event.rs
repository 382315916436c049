use derive_more::From;

use crate::stack::GattStatus;

/// Longest attribute write the peripheral accepts.
pub const MAX_WRITE_LEN: usize = 20;

pub type WriteValue = heapless::Vec<u8, MAX_WRITE_LEN>;

/// Everything the stack reports back to the peripheral.
#[derive(Debug, Clone, PartialEq, Eq, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StackEvent {
    Gap(GapEvent),
    Gatts(GattsEvent),
}

/// Advertising acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GapEvent {
    AdvDataSet { status: GattStatus },
    AdvStartComplete { status: GattStatus },
}

/// GATT server acknowledgements and connection traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattsEvent {
    Registered { app_id: u16, status: GattStatus },
    ServiceCreated { handle: u16, status: GattStatus },
    CharacteristicAdded { handle: u16, status: GattStatus },
    DescriptorAdded { handle: u16, status: GattStatus },
    Connected { conn_id: u16 },
    Disconnected { conn_id: u16, reason: u8 },
    ReadRequest { conn_id: u16, trans_id: u32, handle: u16 },
    WriteRequest {
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        value: WriteValue,
        need_rsp: bool,
    },
}
