use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Receiver;

use crate::bootstrap::BootstrapSequencer;
use crate::config::PeripheralConfig;
use crate::connection::ConnectionStateMachine;
use crate::context::ConnectionContext;
use crate::error::BootstrapError;
use crate::event::{GapEvent, GattsEvent, StackEvent};
use crate::stack::{BleStack, StackError};

/// The event-driven half of the peripheral: feeds stack events to the
/// bootstrap sequencer and the connection state machine.
pub struct Peripheral<'a, M: RawMutex, S: BleStack> {
    stack: &'a S,
    bootstrap: BootstrapSequencer,
    link: ConnectionStateMachine<'a, M>,
}

impl<'a, M: RawMutex, S: BleStack> Peripheral<'a, M, S> {
    pub fn new(
        stack: &'a S,
        ctx: &'a ConnectionContext<M>,
        config: PeripheralConfig,
    ) -> Self {
        Self {
            stack,
            link: ConnectionStateMachine::new(ctx, &config),
            bootstrap: BootstrapSequencer::new(config),
        }
    }

    pub fn bootstrap(&self) -> &BootstrapSequencer {
        &self.bootstrap
    }

    pub fn link(&self) -> &ConnectionStateMachine<'a, M> {
        &self.link
    }

    /// Kick off bootstrap by registering the application.
    pub fn start(&mut self) -> Result<(), BootstrapError<S::Error>> {
        let result = self.bootstrap.start(self.stack);
        log_bootstrap(&result);
        result
    }

    /// Apply one stack event. Failures are logged, never propagated: the
    /// event flow must keep running.
    pub fn handle_event(&mut self, event: StackEvent) {
        trace!("stack event {:?}", event);
        let stack = self.stack;

        match event {
            StackEvent::Gap(GapEvent::AdvDataSet { status }) => {
                log_bootstrap(&self.bootstrap.on_adv_data_set(stack, status));
            }
            StackEvent::Gap(GapEvent::AdvStartComplete { status }) => {
                if let Err(e) = self.link.on_advertising_started(status) {
                    error!("advertising did not start: {:?}", e);
                }
            }
            StackEvent::Gatts(GattsEvent::Registered { app_id, status }) => {
                log_bootstrap(
                    &self.bootstrap.on_registered(stack, app_id, status),
                );
            }
            StackEvent::Gatts(GattsEvent::ServiceCreated { handle, status }) => {
                log_bootstrap(
                    &self.bootstrap.on_service_created(stack, handle, status),
                );
            }
            StackEvent::Gatts(GattsEvent::CharacteristicAdded {
                handle,
                status,
            }) => {
                log_bootstrap(
                    &self.bootstrap.on_characteristic_added(stack, handle, status),
                );
                if let Some(c) = self.bootstrap.handles().characteristic {
                    self.link.on_characteristic_ready(c);
                }
            }
            StackEvent::Gatts(GattsEvent::DescriptorAdded { handle, status }) => {
                log_bootstrap(
                    &self
                        .bootstrap
                        .on_descriptor_added::<S::Error>(handle, status),
                );
            }
            StackEvent::Gatts(GattsEvent::Connected { conn_id }) => {
                let characteristic = self.bootstrap.handles().characteristic;
                if let Err(e) = self.link.on_connect(conn_id, characteristic) {
                    warn!("refused connection {}: {:?}", conn_id, e);
                }
            }
            StackEvent::Gatts(GattsEvent::Disconnected { conn_id, reason }) => {
                if let Err(e) = self.link.on_disconnect(stack, conn_id, reason) {
                    error!("could not restart advertising: {:?}", e);
                }
            }
            StackEvent::Gatts(GattsEvent::ReadRequest {
                conn_id,
                trans_id,
                handle,
            }) => {
                let handles = self.bootstrap.handles();
                if let Err(e) = self
                    .link
                    .on_read_request(stack, handles, conn_id, trans_id, handle)
                {
                    warn!("read response for {} failed: {:?}", handle, e);
                }
            }
            StackEvent::Gatts(GattsEvent::WriteRequest {
                conn_id,
                trans_id,
                handle,
                value,
                need_rsp,
            }) => {
                let handles = self.bootstrap.handles();
                if let Err(e) = self.link.on_write_request(
                    stack, handles, conn_id, trans_id, handle, &value, need_rsp,
                ) {
                    warn!("write response for {} failed: {:?}", handle, e);
                }
            }
        }
    }

    /// Drain `events` forever.
    pub async fn run<R: RawMutex, const N: usize>(
        &mut self,
        events: Receiver<'_, R, StackEvent, N>,
    ) -> ! {
        loop {
            let event = events.receive().await;
            self.handle_event(event);
        }
    }
}

fn log_bootstrap<E: StackError>(result: &Result<(), BootstrapError<E>>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_fatal() => error!("GATT bootstrap halted: {:?}", e),
        Err(e) => warn!("ignored bootstrap event: {:?}", e),
    }
}
