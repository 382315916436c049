use bitflags::bitflags;

use crate::advertising::{AdvPayload, AdvertisingParams};

/// Bound for errors returned by a [`BleStack`]. With `defmt` enabled the
/// error must also be loggable.
#[cfg(feature = "defmt")]
pub trait StackError: core::fmt::Debug + defmt::Format {}
#[cfg(feature = "defmt")]
impl<T: core::fmt::Debug + defmt::Format> StackError for T {}

/// Bound for errors returned by a [`BleStack`].
#[cfg(not(feature = "defmt"))]
pub trait StackError: core::fmt::Debug {}
#[cfg(not(feature = "defmt"))]
impl<T: core::fmt::Debug> StackError for T {}

/// 16-bit Bluetooth SIG style UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Uuid16(pub u16);

/// Handle of the service declaration, assigned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceHandle(pub u16);

/// Handle of a characteristic value attribute, assigned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CharacteristicHandle(pub u16);

/// Handle of a descriptor attribute, assigned by the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorHandle(pub u16);

bitflags! {
    /// Characteristic properties, as carried in the characteristic declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Properties: u8 {
        const BROADCAST              = 0b0000_0001;
        const READ                   = 0b0000_0010;
        const WRITE_WITHOUT_RESPONSE = 0b0000_0100;
        const WRITE                  = 0b0000_1000;
        const NOTIFY                 = 0b0001_0000;
        const INDICATE               = 0b0010_0000;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Properties {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Properties({=u8:#04x})", self.bits())
    }
}

bitflags! {
    /// Attribute access permissions. Encrypted access levels are not
    /// modelled since the peripheral never bonds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        const READ  = 0b0000_0001;
        const WRITE = 0b0001_0000;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Permissions {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Permissions({=u8:#04x})", self.bits())
    }
}

/// Outcome carried by stack acknowledgements and by responses to the
/// central.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GattStatus {
    Success,
    InvalidHandle,
    ReadNotPermitted,
    WriteNotPermitted,
    InvalidAttributeLength,
    /// Any other stack specific failure code.
    Error(u16),
}

impl GattStatus {
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// ATT protocol error code for this status.
    pub const fn code(self) -> u16 {
        match self {
            Self::Success => 0x00,
            Self::InvalidHandle => 0x01,
            Self::ReadNotPermitted => 0x02,
            Self::WriteNotPermitted => 0x03,
            Self::InvalidAttributeLength => 0x0D,
            Self::Error(code) => code,
        }
    }

    pub const fn from_code(code: u16) -> Self {
        match code {
            0x00 => Self::Success,
            0x01 => Self::InvalidHandle,
            0x02 => Self::ReadNotPermitted,
            0x03 => Self::WriteNotPermitted,
            0x0D => Self::InvalidAttributeLength,
            other => Self::Error(other),
        }
    }
}

/// Requests the peripheral makes of the underlying BLE stack.
///
/// Every request is fire-and-forget: `Ok` only means the stack accepted it.
/// Requests that complete asynchronously report back through a
/// [`StackEvent`](crate::StackEvent) (noted on each method). An `Err` means
/// the request was refused outright and no acknowledgement will follow.
///
/// Methods take `&self` because the event loop and the stream coordinator
/// share one stack instance.
pub trait BleStack {
    type Error: StackError;

    /// Acknowledged by `GattsEvent::Registered`.
    fn register_application(&self, app_id: u16) -> Result<(), Self::Error>;

    fn set_device_name(&self, name: &str) -> Result<(), Self::Error>;

    /// Acknowledged by `GapEvent::AdvDataSet`.
    fn configure_advertising(
        &self,
        payload: &AdvPayload,
    ) -> Result<(), Self::Error>;

    /// Acknowledged by `GapEvent::AdvStartComplete`.
    fn start_advertising(
        &self,
        params: &AdvertisingParams,
    ) -> Result<(), Self::Error>;

    /// Acknowledged by `GattsEvent::ServiceCreated`.
    fn create_service(
        &self,
        uuid: Uuid16,
        is_primary: bool,
        num_handles: u16,
    ) -> Result<(), Self::Error>;

    fn start_service(&self, service: ServiceHandle) -> Result<(), Self::Error>;

    /// Acknowledged by `GattsEvent::CharacteristicAdded`.
    fn add_characteristic(
        &self,
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
        properties: Properties,
    ) -> Result<(), Self::Error>;

    /// Acknowledged by `GattsEvent::DescriptorAdded`.
    fn add_descriptor(
        &self,
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
    ) -> Result<(), Self::Error>;

    /// Replace the value the stack stores for an attribute.
    fn set_attribute_value(
        &self,
        handle: u16,
        value: &[u8],
    ) -> Result<(), Self::Error>;

    fn send_notify(
        &self,
        conn_id: u16,
        handle: CharacteristicHandle,
        payload: &[u8],
        need_confirm: bool,
    ) -> Result<(), Self::Error>;

    fn send_read_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
        value: &[u8],
    ) -> Result<(), Self::Error>;

    fn send_write_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), Self::Error>;
}
