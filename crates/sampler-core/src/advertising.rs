use bitflags::bitflags;

/// Maximum size of a legacy advertising payload.
pub const ADV_PAYLOAD_LEN: usize = 31;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// Encoded advertising payload, a sequence of AD structures.
pub type AdvPayload = heapless::Vec<u8, ADV_PAYLOAD_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingKind {
    ConnectableUndirected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressType {
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FilterPolicy {
    /// Accept scan and connect requests from any device.
    AllowAny,
}

bitflags! {
    /// Primary advertising channels to use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ChannelMap: u8 {
        const CH37 = 0b001;
        const CH38 = 0b010;
        const CH39 = 0b100;
        const ALL = Self::CH37.bits() | Self::CH38.bits() | Self::CH39.bits();
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChannelMap {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ChannelMap({=u8:#05b})", self.bits())
    }
}

bitflags! {
    /// Contents of the Flags AD structure.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdFlags: u8 {
        const LE_LIMITED_DISCOVERABLE = 0b0000_0001;
        const LE_GENERAL_DISCOVERABLE = 0b0000_0010;
        const BR_EDR_NOT_SUPPORTED    = 0b0000_0100;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AdFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "AdFlags({=u8:#04x})", self.bits())
    }
}

/// Advertising parameters. Intervals are in units of 0.625 ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingParams {
    pub interval_min: u16,
    pub interval_max: u16,
    pub kind: AdvertisingKind,
    pub own_address: AddressType,
    pub channels: ChannelMap,
    pub filter_policy: FilterPolicy,
}

impl AdvertisingParams {
    /// Smallest interval allowed for connectable advertising.
    pub const INTERVAL_MIN: u16 = 0x0020;
    pub const INTERVAL_MAX: u16 = 0x4000;

    pub const DEFAULT: Self = Self {
        interval_min: 0x20,
        interval_max: 0x40,
        kind: AdvertisingKind::ConnectableUndirected,
        own_address: AddressType::Public,
        channels: ChannelMap::ALL,
        filter_policy: FilterPolicy::AllowAny,
    };

    /// Interval bounds in microseconds.
    pub const fn interval_range_us(&self) -> (u32, u32) {
        (self.interval_min as u32 * 625, self.interval_max as u32 * 625)
    }

    /// Interval for stacks that advertise at one fixed rate. The lower
    /// bound keeps discovery fastest.
    pub const fn fixed_interval(&self) -> u16 {
        self.interval_min
    }

    pub const fn is_valid(&self) -> bool {
        self.interval_min >= Self::INTERVAL_MIN
            && self.interval_min <= self.interval_max
            && self.interval_max <= Self::INTERVAL_MAX
            && !self.channels.is_empty()
    }
}

impl Default for AdvertisingParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// What goes into the advertising payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdvertisingData {
    pub flags: AdFlags,
    pub include_name: bool,
}

impl AdvertisingData {
    pub const DEFAULT: Self = Self {
        flags: AdFlags::LE_GENERAL_DISCOVERABLE
            .union(AdFlags::BR_EDR_NOT_SUPPORTED),
        include_name: true,
    };

    /// Encode into a legacy advertising payload.
    ///
    /// The name is sent as a Complete Local Name when it fits in the space
    /// left after the flags, otherwise it is cut to fit and sent as a
    /// Shortened Local Name.
    pub fn encode(&self, name: &str) -> AdvPayload {
        let mut payload = AdvPayload::new();

        if !self.flags.is_empty() {
            push_structure(&mut payload, AD_TYPE_FLAGS, &[self.flags.bits()]);
        }

        if self.include_name && !name.is_empty() {
            let room = ADV_PAYLOAD_LEN.saturating_sub(payload.len() + 2);
            let name = name.as_bytes();
            if name.len() <= room {
                push_structure(&mut payload, AD_TYPE_COMPLETE_LOCAL_NAME, name);
            } else {
                push_structure(
                    &mut payload,
                    AD_TYPE_SHORTENED_LOCAL_NAME,
                    &name[..room],
                );
            }
        }

        payload
    }
}

impl Default for AdvertisingData {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Append one AD structure. Returns false, leaving the payload untouched,
/// when it does not fit.
fn push_structure(payload: &mut AdvPayload, ad_type: u8, data: &[u8]) -> bool {
    if payload.len() + 2 + data.len() > ADV_PAYLOAD_LEN {
        return false;
    }
    // The length byte counts the type byte.
    payload.push(data.len() as u8 + 1).is_ok()
        && payload.push(ad_type).is_ok()
        && payload.extend_from_slice(data).is_ok()
}
