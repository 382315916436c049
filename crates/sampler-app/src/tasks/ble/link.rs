//! [`BleStack`] on top of the S140 SoftDevice.
//!
//! The SoftDevice answers most requests synchronously, so every request
//! that the peripheral expects an acknowledgement for queues the matching
//! [`StackEvent`] on the event channel. Advertising and connections are
//! handled by the advertiser task, which waits for [`SoftdeviceLink`] to
//! ask for advertising.

use core::cell::{Cell, RefCell};
use core::{mem, ptr};

use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use nrf_softdevice::ble::gatt_server::{self, WriteOp};
use nrf_softdevice::ble::Connection;
use nrf_softdevice::{raw, RawError, Softdevice};
use sampler_core::config::{CCCD_UUID, PAYLOAD_CAPACITY};
use sampler_core::{
    AdvPayload, AdvertisingParams, BleStack, CharacteristicHandle,
    Permissions, Properties, ServiceHandle, Uuid16, WriteValue,
};

use super::LinkError;
use crate::prelude::*;

type CsMutex<T> = BlockingMutex<CriticalSectionRawMutex, T>;

pub struct SoftdeviceLink {
    sd: &'static Softdevice,
    events: EventSender,
    adv_data: CsMutex<RefCell<AdvPayload>>,
    /// CCCD the SoftDevice created with the last notifying characteristic.
    cccd: CsMutex<Cell<Option<u16>>>,
    connection: CsMutex<RefCell<Option<Connection>>>,
    advertise: Signal<CriticalSectionRawMutex, AdvertisingParams>,
}

impl SoftdeviceLink {
    pub fn new(sd: &'static Softdevice, events: EventSender) -> Self {
        Self {
            sd,
            events,
            adv_data: BlockingMutex::new(RefCell::new(AdvPayload::new())),
            cccd: BlockingMutex::new(Cell::new(None)),
            connection: BlockingMutex::new(RefCell::new(None)),
            advertise: Signal::new(),
        }
    }

    pub fn softdevice(&self) -> &'static Softdevice {
        self.sd
    }

    /// Queue an event for the peripheral task. Events that do not fit are
    /// dropped.
    ///
    /// Only for callers that cannot wait: the peripheral task itself and
    /// the GATT server callback. Link lifecycle events go through
    /// [`Self::send`].
    pub fn emit(&self, event: StackEvent) {
        if self.events.try_send(event).is_err() {
            warn!("stack event queue full, event dropped");
        }
    }

    /// Queue an event, waiting for room in the queue.
    pub async fn send(&self, event: StackEvent) {
        self.events.send(event).await;
    }

    /// Wait until advertising is requested.
    pub async fn wait_advertise(&self) -> AdvertisingParams {
        self.advertise.wait().await
    }

    /// Advertising request that arrived since the last wait, if any.
    pub fn take_advertise(&self) -> Option<AdvertisingParams> {
        self.advertise.try_take()
    }

    /// Advertising payload last set through `configure_advertising`.
    pub fn advertising_data(&self) -> AdvPayload {
        self.adv_data.lock(|data| data.borrow().clone())
    }

    /// Make `conn` the connection notifications go to.
    pub fn attach(&self, conn: Connection) {
        self.connection.lock(|c| *c.borrow_mut() = Some(conn));
    }

    pub fn detach(&self) {
        self.connection.lock(|c| c.borrow_mut().take());
    }

    fn connection_for(&self, conn_id: u16) -> Option<Connection> {
        self.connection.lock(|c| {
            c.borrow().as_ref().filter(|conn| conn.handle() == Some(conn_id)).cloned()
        })
    }
}

fn sec_mode(open: bool) -> raw::ble_gap_conn_sec_mode_t {
    let mut mode: raw::ble_gap_conn_sec_mode_t = unsafe { mem::zeroed() };
    if open {
        mode.set_sm(1);
        mode.set_lv(1);
    }
    mode
}

fn ble_uuid(uuid: Uuid16) -> raw::ble_uuid_t {
    raw::ble_uuid_t { uuid: uuid.0, type_: raw::BLE_UUID_TYPE_BLE as u8 }
}

fn attr_md(permissions: Permissions) -> raw::ble_gatts_attr_md_t {
    let mut md: raw::ble_gatts_attr_md_t = unsafe { mem::zeroed() };
    md.read_perm = sec_mode(permissions.contains(Permissions::READ));
    md.write_perm = sec_mode(permissions.contains(Permissions::WRITE));
    md.set_vloc(raw::BLE_GATTS_VLOC_STACK as u8);
    md
}

impl BleStack for SoftdeviceLink {
    type Error = LinkError;

    fn register_application(&self, app_id: u16) -> Result<(), LinkError> {
        // The SoftDevice has a single application; registration always
        // succeeds.
        self.emit(
            GattsEvent::Registered { app_id, status: GattStatus::Success }.into(),
        );
        Ok(())
    }

    fn set_device_name(&self, name: &str) -> Result<(), LinkError> {
        let len =
            u16::try_from(name.len()).map_err(|_| LinkError::DeviceNameTooLong)?;
        let mode = sec_mode(false);
        let ret =
            unsafe { raw::sd_ble_gap_device_name_set(&mode, name.as_ptr(), len) };
        RawError::convert(ret)?;
        Ok(())
    }

    fn configure_advertising(&self, payload: &AdvPayload) -> Result<(), LinkError> {
        self.adv_data.lock(|data| *data.borrow_mut() = payload.clone());
        self.emit(GapEvent::AdvDataSet { status: GattStatus::Success }.into());
        Ok(())
    }

    fn start_advertising(&self, params: &AdvertisingParams) -> Result<(), LinkError> {
        self.advertise.signal(*params);
        Ok(())
    }

    fn create_service(
        &self,
        uuid: Uuid16,
        is_primary: bool,
        num_handles: u16,
    ) -> Result<(), LinkError> {
        let uuid = ble_uuid(uuid);
        let kind = if is_primary {
            raw::BLE_GATTS_SRVC_TYPE_PRIMARY
        } else {
            raw::BLE_GATTS_SRVC_TYPE_SECONDARY
        };
        let mut handle = 0u16;
        let ret = unsafe {
            raw::sd_ble_gatts_service_add(kind as u8, &uuid, &mut handle)
        };
        RawError::convert(ret)?;

        // The attribute table grows as attributes are added.
        debug!("service {} created, {} handles reserved", handle, num_handles);
        self.emit(
            GattsEvent::ServiceCreated { handle, status: GattStatus::Success }
                .into(),
        );
        Ok(())
    }

    fn start_service(&self, service: ServiceHandle) -> Result<(), LinkError> {
        // Services are live as soon as they are added.
        trace!("service {} started", service.0);
        Ok(())
    }

    fn add_characteristic(
        &self,
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
        properties: Properties,
    ) -> Result<(), LinkError> {
        let mut char_md: raw::ble_gatts_char_md_t = unsafe { mem::zeroed() };
        let props = &mut char_md.char_props;
        props.set_broadcast(properties.contains(Properties::BROADCAST) as u8);
        props.set_read(properties.contains(Properties::READ) as u8);
        props.set_write_wo_resp(
            properties.contains(Properties::WRITE_WITHOUT_RESPONSE) as u8,
        );
        props.set_write(properties.contains(Properties::WRITE) as u8);
        props.set_notify(properties.contains(Properties::NOTIFY) as u8);
        props.set_indicate(properties.contains(Properties::INDICATE) as u8);

        let uuid = ble_uuid(uuid);
        let mut md = attr_md(permissions);
        md.set_vlen(1);
        let attr = raw::ble_gatts_attr_t {
            p_uuid: &uuid,
            p_attr_md: &md,
            init_len: 0,
            init_offs: 0,
            max_len: PAYLOAD_CAPACITY as u16,
            p_value: ptr::null_mut(),
        };

        let mut handles: raw::ble_gatts_char_handles_t = unsafe { mem::zeroed() };
        let ret = unsafe {
            raw::sd_ble_gatts_characteristic_add(
                service.0,
                &char_md,
                &attr,
                &mut handles,
            )
        };
        RawError::convert(ret)?;

        let cccd = (handles.cccd_handle != raw::BLE_GATT_HANDLE_INVALID as u16)
            .then_some(handles.cccd_handle);
        self.cccd.lock(|c| c.set(cccd));
        self.emit(
            GattsEvent::CharacteristicAdded {
                handle: handles.value_handle,
                status: GattStatus::Success,
            }
            .into(),
        );
        Ok(())
    }

    fn add_descriptor(
        &self,
        _service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
    ) -> Result<(), LinkError> {
        // The SoftDevice creates the CCCD together with a notifying
        // characteristic and refuses to add another one.
        if uuid == CCCD_UUID {
            if let Some(handle) = self.cccd.lock(|c| c.take()) {
                self.emit(
                    GattsEvent::DescriptorAdded {
                        handle,
                        status: GattStatus::Success,
                    }
                    .into(),
                );
                return Ok(());
            }
        }

        let uuid = ble_uuid(uuid);
        let md = attr_md(permissions);
        let attr = raw::ble_gatts_attr_t {
            p_uuid: &uuid,
            p_attr_md: &md,
            init_len: 0,
            init_offs: 0,
            max_len: 2,
            p_value: ptr::null_mut(),
        };
        let mut handle = 0u16;
        let ret = unsafe {
            raw::sd_ble_gatts_descriptor_add(
                raw::BLE_GATT_HANDLE_INVALID as u16,
                &attr,
                &mut handle,
            )
        };
        RawError::convert(ret)?;
        self.emit(
            GattsEvent::DescriptorAdded { handle, status: GattStatus::Success }
                .into(),
        );
        Ok(())
    }

    fn set_attribute_value(&self, handle: u16, value: &[u8]) -> Result<(), LinkError> {
        gatt_server::set_value(self.sd, handle, value)?;
        Ok(())
    }

    fn send_notify(
        &self,
        conn_id: u16,
        handle: CharacteristicHandle,
        payload: &[u8],
        need_confirm: bool,
    ) -> Result<(), LinkError> {
        let conn = self.connection_for(conn_id).ok_or(LinkError::NotConnected)?;
        if need_confirm {
            gatt_server::indicate_value(&conn, handle.0, payload)?;
        } else {
            gatt_server::notify_value(&conn, handle.0, payload)?;
        }
        Ok(())
    }

    fn send_read_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
        _value: &[u8],
    ) -> Result<(), LinkError> {
        // Attribute values live in the SoftDevice, which answers reads on
        // its own.
        trace!("read {} of {} on {}: {:?}", trans_id, handle, conn_id, status);
        Ok(())
    }

    fn send_write_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), LinkError> {
        trace!("write {} of {} on {}: {:?}", trans_id, handle, conn_id, status);
        Ok(())
    }
}

impl gatt_server::Server for SoftdeviceLink {
    type Event = StackEvent;

    fn on_write(
        &self,
        conn: &Connection,
        handle: u16,
        _op: WriteOp,
        _offset: usize,
        data: &[u8],
    ) -> Option<StackEvent> {
        let conn_id = conn.handle()?;
        let Ok(value) = WriteValue::from_slice(data) else {
            warn!("{} byte write to {} dropped", data.len(), handle);
            return None;
        };
        Some(
            GattsEvent::WriteRequest {
                conn_id,
                trans_id: 0,
                handle,
                value,
                need_rsp: false,
            }
            .into(),
        )
    }
}
