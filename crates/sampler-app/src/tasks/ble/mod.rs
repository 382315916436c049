pub mod advertiser;
pub mod link;

pub use advertiser::*;
pub use link::*;

use derive_more::From;
use nrf_softdevice::ble::gatt_server::{
    IndicateValueError, NotifyValueError, SetValueError,
};
use nrf_softdevice::{raw, RawError, Softdevice};
use sampler_core::Peripheral;

use crate::prelude::*;

/// Fits a full batch plus the 3-byte notification header.
pub const ATT_MTU: usize = 247;

/// Failures of the SoftDevice behind [`SoftdeviceLink`].
#[derive(Debug, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkError {
    /// No connection matches the requested connection id.
    NotConnected,
    DeviceNameTooLong,

    #[from]
    Raw(RawError),
    #[from]
    SetValue(SetValueError),
    #[from]
    Notify(NotifyValueError),
    #[from]
    Indicate(IndicateValueError),
}

pub fn enable_softdevice(name: &'static str) -> &'static mut Softdevice {
    let config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: ATT_MTU as u16 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: 2048,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: Default::default(),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: name.as_ptr() as *const u8 as _,
            current_len: name.len() as u16,
            max_len: sampler_core::config::MAX_DEVICE_NAME_LEN as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    info!("Enabling softdevice");
    Softdevice::enable(&config)
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

/// Drives bootstrap and the connection lifecycle from stack events.
#[embassy_executor::task]
pub async fn peripheral_task(
    link: &'static SoftdeviceLink,
    events: EventReceiver,
    config: PeripheralConfig,
) -> ! {
    let mut peripheral = Peripheral::new(link, &CONTEXT, config);
    if peripheral.start().is_err() {
        error!("could not register the GATT application");
    }
    peripheral.run(events).await
}
