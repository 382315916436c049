use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::advertising::AdvertisingParams;
use crate::bootstrap::GattHandles;
use crate::config::{PeripheralConfig, Variant};
use crate::context::{ConnectionContext, StreamTarget};
use crate::error::ConnectionError;
use crate::stack::{BleStack, CharacteristicHandle, GattStatus};

/// Link lifecycle. Cycles through `Advertising`, `Connected` and
/// `Disconnected` once bootstrap is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    Idle,
    Advertising,
    Connected { conn_id: u16 },
    Disconnected,
}

/// Tracks the single central and publishes it to the [`ConnectionContext`].
pub struct ConnectionStateMachine<'a, M: RawMutex> {
    ctx: &'a ConnectionContext<M>,
    variant: Variant,
    read_value: u8,
    advertising: AdvertisingParams,
    state: LinkState,
    /// The connected central is waiting for the stream characteristic.
    stream_pending: bool,
}

impl<'a, M: RawMutex> ConnectionStateMachine<'a, M> {
    pub fn new(ctx: &'a ConnectionContext<M>, config: &PeripheralConfig) -> Self {
        Self {
            ctx,
            variant: config.variant,
            read_value: config.read_value,
            advertising: config.advertising,
            state: LinkState::Idle,
            stream_pending: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn context(&self) -> &'a ConnectionContext<M> {
        self.ctx
    }

    pub fn on_advertising_started(
        &mut self,
        status: GattStatus,
    ) -> Result<(), ConnectionError> {
        match self.state {
            LinkState::Connected { conn_id } => {
                debug!("advertising ack while {} is connected", conn_id);
            }
            _ if status.is_success() => {
                self.state = LinkState::Advertising;
                info!("advertising");
            }
            _ => self.state = LinkState::Idle,
        }

        if status.is_success() {
            Ok(())
        } else {
            Err(ConnectionError::AdvertisingFailed(status))
        }
    }

    /// A central connected. Publishes the connection and, for the notify
    /// variant, asks the coordinator to stream to it.
    ///
    /// A second connect while one central is connected is refused and
    /// leaves the active connection untouched.
    pub fn on_connect(
        &mut self,
        conn_id: u16,
        characteristic: Option<CharacteristicHandle>,
    ) -> Result<Option<StreamTarget>, ConnectionError> {
        if let LinkState::Connected { conn_id: active } = self.state {
            return Err(ConnectionError::AlreadyConnected {
                active,
                rejected: conn_id,
            });
        }

        let generation = self.ctx.activate(conn_id);
        self.state = LinkState::Connected { conn_id };
        info!("central connected on {}", conn_id);

        if self.variant != Variant::Notify {
            return Ok(None);
        }
        let Some(characteristic) = characteristic else {
            warn!("connected before the stream characteristic exists");
            self.stream_pending = true;
            return Ok(None);
        };
        let target = StreamTarget { conn_id, characteristic, generation };
        self.ctx.request_stream(target);
        Ok(Some(target))
    }

    /// The stream characteristic now exists. Streams to a central that
    /// connected before it did.
    pub fn on_characteristic_ready(
        &mut self,
        characteristic: CharacteristicHandle,
    ) -> Option<StreamTarget> {
        let LinkState::Connected { conn_id } = self.state else {
            return None;
        };
        if !core::mem::take(&mut self.stream_pending) {
            return None;
        }

        let target = StreamTarget {
            conn_id,
            characteristic,
            generation: self.ctx.generation(),
        };
        info!("stream characteristic ready for {}", conn_id);
        self.ctx.request_stream(target);
        Some(target)
    }

    /// A central disconnected. Invalidates the connection, then requests
    /// advertising again whatever the reason or connection id.
    ///
    /// Returns whether `conn_id` was the active connection.
    pub fn on_disconnect<S: BleStack>(
        &mut self,
        stack: &S,
        conn_id: u16,
        reason: u8,
    ) -> Result<bool, S::Error> {
        let matched = self.ctx.deactivate(conn_id);
        if matched {
            self.state = LinkState::Disconnected;
            self.stream_pending = false;
            info!("central on {} disconnected, reason {}", conn_id, reason);
        } else {
            warn!("disconnect of {} which is not the active connection", conn_id);
        }

        stack.start_advertising(&self.advertising)?;
        Ok(matched)
    }

    /// Answer a read. The stream characteristic of the read variant serves
    /// the static value to any connection.
    pub fn on_read_request<S: BleStack>(
        &mut self,
        stack: &S,
        handles: &GattHandles,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
    ) -> Result<GattStatus, S::Error> {
        let read_value = [self.read_value];
        let cccd = self.cccd_value();

        let (status, value): (GattStatus, &[u8]) =
            if handles.characteristic.map(|c| c.0) == Some(handle) {
                match self.variant {
                    Variant::Read => (GattStatus::Success, &read_value),
                    Variant::Notify => (GattStatus::Success, &[]),
                }
            } else if handles.descriptor.map(|d| d.0) == Some(handle) {
                (GattStatus::Success, &cccd)
            } else {
                (GattStatus::InvalidHandle, &[])
            };

        trace!("read of {} by {}: {:?}", handle, conn_id, status);
        stack.send_read_response(conn_id, trans_id, handle, status, value)?;
        Ok(status)
    }

    /// Answer a write. Only the CCCD is writable.
    #[allow(clippy::too_many_arguments)]
    pub fn on_write_request<S: BleStack>(
        &mut self,
        stack: &S,
        handles: &GattHandles,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        value: &[u8],
        need_rsp: bool,
    ) -> Result<GattStatus, S::Error> {
        let status = if handles.descriptor.map(|d| d.0) == Some(handle) {
            match value {
                [flags, _] => {
                    let enabled = flags & 0x01 != 0;
                    self.ctx.set_notifications(enabled);
                    info!("notifications enabled: {}", enabled);
                    GattStatus::Success
                }
                _ => GattStatus::InvalidAttributeLength,
            }
        } else if handles.characteristic.map(|c| c.0) == Some(handle) {
            GattStatus::WriteNotPermitted
        } else {
            GattStatus::InvalidHandle
        };

        if need_rsp {
            stack.send_write_response(conn_id, trans_id, handle, status)?;
        }
        Ok(status)
    }

    fn cccd_value(&self) -> [u8; 2] {
        [self.ctx.notifications_enabled() as u8, 0]
    }
}
