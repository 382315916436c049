#![no_std]
#![no_main]

use embassy_nrf::saadc::Input as _;
use static_cell::StaticCell;

#[cfg(feature = "defmt")]
use defmt_rtt as _;
#[cfg(feature = "defmt")]
use panic_probe as _;
#[cfg(not(feature = "defmt"))]
use panic_reset as _;

use sampler_app::prelude::*;

static LINK: StaticCell<SoftdeviceLink> = StaticCell::new();

// Application main entry point. The spawner can be used to start async tasks.
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("sampler {} ({} variant)", FW_VERSION, VARIANT_NAME);

    // Interrupt priorities 0, 1 and 4 belong to the SoftDevice.
    let mut config = embassy_nrf::config::Config::default();
    config.gpiote_interrupt_priority = Priority::P2;
    config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(config);

    let peripheral_config = peripheral_config();
    if let Err(e) = peripheral_config.validate() {
        error!("invalid configuration: {:?}", e);
        return;
    }

    let sd = enable_softdevice(peripheral_config.device_name);
    let (sender, receiver) = init_event_channel();
    let link: &'static SoftdeviceLink = LINK.init(SoftdeviceLink::new(sd, sender));

    spawner.must_spawn(softdevice_task(link.softdevice()));
    spawner.must_spawn(advertiser_task(link));
    spawner.must_spawn(peripheral_task(link, receiver, peripheral_config));

    if peripheral_config.variant == Variant::Notify {
        // AIN0
        let source = SaadcSource::new(p.SAADC, p.P0_02.degrade_saadc());
        spawner.must_spawn(stream_task(link, source, peripheral_config));
    }
}
