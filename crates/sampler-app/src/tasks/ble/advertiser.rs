use core::pin::pin;

use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use nrf_softdevice::ble::peripheral::{self, AdvertiseError};
use nrf_softdevice::ble::{gatt_server, Connection};
use nrf_softdevice::raw;
use sampler_core::{AdvertisingParams, ChannelMap, FilterPolicy};

use super::SoftdeviceLink;
use crate::prelude::*;

/// Delay before advertising is retried after the SoftDevice refused it.
const RETRY_DELAY_SECS: u64 = 1;

/// Advertises whenever the link asks for it and serves the GATT server for
/// the connection that follows. A failed start is retried with the same
/// parameters until it succeeds or newer parameters arrive.
#[embassy_executor::task]
pub async fn advertiser_task(link: &'static SoftdeviceLink) -> ! {
    let mut params = link.wait_advertise().await;
    loop {
        match advertise(link, &params).await {
            Ok(conn) => {
                serve(link, conn).await;
                params = link.wait_advertise().await;
            }
            Err(e) => {
                error!("advertising error: {:?}", e);
                link.send(
                    GapEvent::AdvStartComplete { status: advertise_status(&e) }
                        .into(),
                )
                .await;
                Timer::after_secs(RETRY_DELAY_SECS).await;
                if let Some(newer) = link.take_advertise() {
                    params = newer;
                }
            }
        }
    }
}

/// The SoftDevice advertises at a single interval. Channels and address
/// are left at the SoftDevice defaults: all three primary channels and the
/// device's own address.
fn advertising_config(params: &AdvertisingParams) -> peripheral::Config {
    if params.channels != ChannelMap::ALL {
        warn!("channel map {:?} ignored, advertising on all channels", params.channels);
    }
    let filter_policy = match params.filter_policy {
        FilterPolicy::AllowAny => peripheral::FilterPolicy::Any,
    };
    peripheral::Config {
        interval: u32::from(params.fixed_interval()),
        filter_policy,
        ..Default::default()
    }
}

/// Start advertising and wait for a central.
///
/// Success is reported once the SoftDevice has accepted the start, which
/// happens on the first poll of `advertise_connectable`.
async fn advertise(
    link: &SoftdeviceLink,
    params: &AdvertisingParams,
) -> Result<Connection, AdvertiseError> {
    let adv_data = link.advertising_data();
    let config = advertising_config(params);
    let adv = peripheral::ConnectableAdvertisement::ScannableUndirected {
        adv_data: &adv_data,
        scan_data: &[],
    };

    let mut advertising =
        pin!(peripheral::advertise_connectable(link.softdevice(), adv, &config));
    if let Either::First(result) = select(advertising.as_mut(), yield_now()).await {
        return result;
    }

    link.send(GapEvent::AdvStartComplete { status: GattStatus::Success }.into())
        .await;
    advertising.await
}

/// Run the GATT server until the central disconnects.
async fn serve(link: &'static SoftdeviceLink, conn: Connection) {
    let conn_id = conn.handle().unwrap_or(raw::BLE_CONN_HANDLE_INVALID as u16);
    link.attach(conn.clone());
    link.send(GattsEvent::Connected { conn_id }.into()).await;

    let e = gatt_server::run(&conn, link, |event| link.emit(event)).await;
    debug!("gatt server on {} finished: {:?}", conn_id, e);

    link.detach();
    // The disconnect reason is not exposed by the SoftDevice wrapper.
    link.send(GattsEvent::Disconnected { conn_id, reason: 0 }.into()).await;
}

fn advertise_status(e: &AdvertiseError) -> GattStatus {
    match e {
        AdvertiseError::Raw(raw) => GattStatus::Error(*raw as u16),
        _ => GattStatus::Error(0xFFFF),
    }
}
