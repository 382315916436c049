//! Build-time constants and the peripheral configuration.

use crate::advertising::{AdvertisingData, AdvertisingParams};
use crate::error::ConfigError;
use crate::stack::Uuid16;

pub const DEVICE_NAME: &str = "BLE_Sampler";
/// Longest device name the GAP layer accepts.
pub const MAX_DEVICE_NAME_LEN: usize = 248;
pub const APP_ID: u16 = 0;

pub const SERVICE_UUID: Uuid16 = Uuid16(0x00FF);
pub const STREAM_CHAR_UUID: Uuid16 = Uuid16(0xFF01);
/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID: Uuid16 = Uuid16(0x2902);
/// Service declaration, characteristic declaration, value and CCCD.
pub const SERVICE_NUM_HANDLES: u16 = 4;

pub const BATCH_SIZE: usize = 10;
pub const SAMPLE_INTERVAL_MS: u32 = 100;
/// Largest value a 12-bit conversion produces.
pub const SAMPLE_MAX: u16 = 4095;
/// Value served by the read variant.
pub const READ_VALUE: u8 = 2;

/// Largest batch whose payload fits in one notification at a 247 byte ATT MTU.
pub const MAX_BATCH_SIZE: usize = 120;
pub const PAYLOAD_CAPACITY: usize = 2 * MAX_BATCH_SIZE;

/// How the stream characteristic exposes data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Variant {
    /// Sample batches are pushed with notifications.
    Notify,
    /// A single static value is served on read.
    Read,
}

impl Variant {
    /// Attribute handles the service needs for this variant.
    pub const fn required_handles(self) -> u16 {
        match self {
            Self::Notify => 4,
            Self::Read => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralConfig {
    pub device_name: &'static str,
    pub app_id: u16,
    pub service_uuid: Uuid16,
    pub characteristic_uuid: Uuid16,
    pub num_handles: u16,
    pub variant: Variant,
    pub batch_size: usize,
    pub sample_interval_ms: u32,
    pub read_value: u8,
    pub advertising: AdvertisingParams,
    pub advertising_data: AdvertisingData,
}

impl PeripheralConfig {
    pub const DEFAULT: Self = Self {
        device_name: DEVICE_NAME,
        app_id: APP_ID,
        service_uuid: SERVICE_UUID,
        characteristic_uuid: STREAM_CHAR_UUID,
        num_handles: SERVICE_NUM_HANDLES,
        variant: Variant::Notify,
        batch_size: BATCH_SIZE,
        sample_interval_ms: SAMPLE_INTERVAL_MS,
        read_value: READ_VALUE,
        advertising: AdvertisingParams::DEFAULT,
        advertising_data: AdvertisingData::DEFAULT,
    };

    pub const fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub const fn with_sample_interval_ms(mut self, interval_ms: u32) -> Self {
        self.sample_interval_ms = interval_ms;
        self
    }

    pub const fn with_device_name(mut self, name: &'static str) -> Self {
        self.device_name = name;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_name.is_empty() {
            return Err(ConfigError::EmptyDeviceName);
        }
        if self.device_name.len() > MAX_DEVICE_NAME_LEN {
            return Err(ConfigError::DeviceNameTooLong(self.device_name.len()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if self.sample_interval_ms == 0 {
            return Err(ConfigError::ZeroSampleInterval);
        }
        if !self.advertising.is_valid() {
            return Err(ConfigError::InvalidAdvertisingInterval {
                min: self.advertising.interval_min,
                max: self.advertising.interval_max,
            });
        }
        let required = self.variant.required_handles();
        if self.num_handles < required {
            return Err(ConfigError::TooFewHandles {
                available: self.num_handles,
                required,
            });
        }
        Ok(())
    }
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
