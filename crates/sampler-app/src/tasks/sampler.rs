use embassy_nrf::peripherals::SAADC;
use embassy_nrf::saadc::{
    self, AnyInput, ChannelConfig, Config, Gain, Reference, Resolution, Saadc,
};
use embassy_nrf::{bind_interrupts, Peri};
use embassy_time::Delay;
use sampler_core::config::SAMPLE_MAX;
use sampler_core::{SampleBatcher, SampleSource, StreamCoordinator};

use super::SoftdeviceLink;
use crate::prelude::*;

bind_interrupts!(struct SaadcIrqs {
    SAADC => saadc::InterruptHandler;
});

/// Single-ended 12-bit conversions of one analog input against the
/// internal reference.
///
/// The converter is only brought up by `configure`, the first time a
/// batch is acquired.
pub struct SaadcSource {
    pins: Option<(Peri<'static, SAADC>, AnyInput<'static>)>,
    saadc: Option<Saadc<'static, 1>>,
}

impl SaadcSource {
    pub fn new(adc: Peri<'static, SAADC>, input: AnyInput<'static>) -> Self {
        Self { pins: Some((adc, input)), saadc: None }
    }
}

impl SampleSource for SaadcSource {
    async fn configure(&mut self) {
        let Some((adc, input)) = self.pins.take() else {
            return;
        };

        let mut config = Config::default();
        config.resolution = Resolution::_12BIT;
        let mut channel = ChannelConfig::single_ended(input);
        channel.gain = Gain::GAIN1_6;
        channel.reference = Reference::INTERNAL;

        interrupt::SAADC.set_priority(Priority::P3);
        let mut saadc = Saadc::new(adc, SaadcIrqs, config, [channel]);
        saadc.calibrate().await;
        info!("SAADC ready");
        self.saadc = Some(saadc);
    }

    async fn read(&mut self) -> u16 {
        let Some(saadc) = self.saadc.as_mut() else {
            return 0;
        };
        let mut buf = [0i16; 1];
        saadc.sample(&mut buf).await;
        // Single-ended results can dip slightly below zero.
        buf[0].clamp(0, SAMPLE_MAX as i16) as u16
    }
}

/// Streams batches to whichever central the peripheral task connects.
#[embassy_executor::task]
pub async fn stream_task(
    link: &'static SoftdeviceLink,
    source: SaadcSource,
    config: PeripheralConfig,
) -> ! {
    let batcher = SampleBatcher::new(source, Delay, config.sample_interval_ms);
    let mut coordinator =
        StreamCoordinator::new(&CONTEXT, link, batcher, config.batch_size);
    coordinator.run().await
}
