#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal_async::delay::DelayNs;
use sampler_core::{
    AdvertisingParams, BleStack, CharacteristicHandle, ConnectionContext,
    GapEvent, GattStatus, GattsEvent, LinkState, Peripheral, PeripheralConfig,
    Permissions, Properties, SampleSource, ServiceHandle, StackEvent, Uuid16,
    Variant,
};

// ---------------------------------------------------------------------------
// Simulated stack
// ---------------------------------------------------------------------------

/// One request made of the stack, recorded in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RegisterApplication(u16),
    SetDeviceName(String),
    ConfigureAdvertising(Vec<u8>),
    StartAdvertising(AdvertisingParams),
    CreateService { uuid: Uuid16, primary: bool, num_handles: u16 },
    StartService(ServiceHandle),
    AddCharacteristic {
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
        properties: Properties,
    },
    AddDescriptor { service: ServiceHandle, uuid: Uuid16, permissions: Permissions },
    SetAttributeValue { handle: u16, value: Vec<u8> },
    Notify {
        conn_id: u16,
        handle: CharacteristicHandle,
        payload: Vec<u8>,
        need_confirm: bool,
    },
    ReadResponse {
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
        value: Vec<u8>,
    },
    WriteResponse { conn_id: u16, trans_id: u32, handle: u16, status: GattStatus },
}

/// Which request kind a fault is injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    RegisterApplication,
    SetDeviceName,
    ConfigureAdvertising,
    StartAdvertising,
    CreateService,
    StartService,
    AddCharacteristic,
    AddDescriptor,
    SetAttributeValue,
    Notify,
    ReadResponse,
    WriteResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(pub Op);

/// Records every request and refuses the ones marked as failing.
#[derive(Default)]
pub struct SimStack {
    calls: RefCell<Vec<Call>>,
    failing: RefCell<Vec<Op>>,
    /// Connection the simulated link currently serves. Notifies addressed
    /// to anything else are recorded as stale.
    link: Cell<Option<u16>>,
    stale_notifies: Cell<usize>,
}

impl SimStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, op: Op) {
        self.failing.borrow_mut().push(op);
    }

    pub fn recover(&self, op: Op) {
        self.failing.borrow_mut().retain(|o| *o != op);
    }

    pub fn set_link(&self, conn_id: Option<u16>) {
        self.link.set(conn_id);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn notifies(&self) -> Vec<Call> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::Notify { .. }))
            .cloned()
            .collect()
    }

    pub fn notify_count(&self) -> usize {
        self.notifies().len()
    }

    pub fn advertising_starts(&self) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::StartAdvertising(_)))
            .count()
    }

    pub fn stale_notifies(&self) -> usize {
        self.stale_notifies.get()
    }

    fn record(&self, op: Op, call: Call) -> Result<(), SimError> {
        self.calls.borrow_mut().push(call);
        if self.failing.borrow().contains(&op) {
            Err(SimError(op))
        } else {
            Ok(())
        }
    }
}

impl BleStack for SimStack {
    type Error = SimError;

    fn register_application(&self, app_id: u16) -> Result<(), SimError> {
        self.record(Op::RegisterApplication, Call::RegisterApplication(app_id))
    }

    fn set_device_name(&self, name: &str) -> Result<(), SimError> {
        self.record(Op::SetDeviceName, Call::SetDeviceName(name.to_owned()))
    }

    fn configure_advertising(
        &self,
        payload: &sampler_core::AdvPayload,
    ) -> Result<(), SimError> {
        self.record(
            Op::ConfigureAdvertising,
            Call::ConfigureAdvertising(payload.to_vec()),
        )
    }

    fn start_advertising(
        &self,
        params: &AdvertisingParams,
    ) -> Result<(), SimError> {
        self.record(Op::StartAdvertising, Call::StartAdvertising(*params))
    }

    fn create_service(
        &self,
        uuid: Uuid16,
        is_primary: bool,
        num_handles: u16,
    ) -> Result<(), SimError> {
        self.record(
            Op::CreateService,
            Call::CreateService { uuid, primary: is_primary, num_handles },
        )
    }

    fn start_service(&self, service: ServiceHandle) -> Result<(), SimError> {
        self.record(Op::StartService, Call::StartService(service))
    }

    fn add_characteristic(
        &self,
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
        properties: Properties,
    ) -> Result<(), SimError> {
        self.record(
            Op::AddCharacteristic,
            Call::AddCharacteristic { service, uuid, permissions, properties },
        )
    }

    fn add_descriptor(
        &self,
        service: ServiceHandle,
        uuid: Uuid16,
        permissions: Permissions,
    ) -> Result<(), SimError> {
        self.record(
            Op::AddDescriptor,
            Call::AddDescriptor { service, uuid, permissions },
        )
    }

    fn set_attribute_value(
        &self,
        handle: u16,
        value: &[u8],
    ) -> Result<(), SimError> {
        self.record(
            Op::SetAttributeValue,
            Call::SetAttributeValue { handle, value: value.to_vec() },
        )
    }

    fn send_notify(
        &self,
        conn_id: u16,
        handle: CharacteristicHandle,
        payload: &[u8],
        need_confirm: bool,
    ) -> Result<(), SimError> {
        if self.link.get() != Some(conn_id) {
            self.stale_notifies.set(self.stale_notifies.get() + 1);
        }
        self.record(
            Op::Notify,
            Call::Notify { conn_id, handle, payload: payload.to_vec(), need_confirm },
        )
    }

    fn send_read_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
        value: &[u8],
    ) -> Result<(), SimError> {
        self.record(
            Op::ReadResponse,
            Call::ReadResponse { conn_id, trans_id, handle, status, value: value.to_vec() },
        )
    }

    fn send_write_response(
        &self,
        conn_id: u16,
        trans_id: u32,
        handle: u16,
        status: GattStatus,
    ) -> Result<(), SimError> {
        self.record(
            Op::WriteResponse,
            Call::WriteResponse { conn_id, trans_id, handle, status },
        )
    }
}

// ---------------------------------------------------------------------------
// Sample source
// ---------------------------------------------------------------------------

/// Counters shared between a test and its [`ScriptedSource`].
#[derive(Clone, Default)]
pub struct SourceCounters {
    pub configures: Arc<AtomicUsize>,
    pub reads: Arc<AtomicUsize>,
}

impl SourceCounters {
    pub fn configures(&self) -> usize {
        self.configures.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Returns scripted samples in order, then repeats the last one.
pub struct ScriptedSource {
    script: VecDeque<u16>,
    last: u16,
    counters: SourceCounters,
    /// Reads made before `configure` are flagged here.
    read_before_configure: Arc<AtomicBool>,
    configured: bool,
}

impl ScriptedSource {
    pub fn new(script: &[u16]) -> (Self, SourceCounters) {
        let counters = SourceCounters::default();
        let source = Self {
            script: script.iter().copied().collect(),
            last: 0,
            counters: counters.clone(),
            read_before_configure: Arc::new(AtomicBool::new(false)),
            configured: false,
        };
        (source, counters)
    }

    pub fn read_before_configure(&self) -> bool {
        self.read_before_configure.load(Ordering::SeqCst)
    }
}

impl SampleSource for ScriptedSource {
    async fn configure(&mut self) {
        self.configured = true;
        self.counters.configures.fetch_add(1, Ordering::SeqCst);
    }

    async fn read(&mut self) -> u16 {
        if !self.configured {
            self.read_before_configure.store(true, Ordering::SeqCst);
        }
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.script.pop_front() {
            self.last = next;
        }
        self.last
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

/// Records requested delays and yields once per delay so that other
/// futures joined with the caller get to run.
#[derive(Clone, Default)]
pub struct TickDelay {
    pub delays_ms: Arc<std::sync::Mutex<Vec<u32>>>,
}

impl TickDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays_ms.lock().unwrap().clone()
    }
}

impl DelayNs for TickDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        embassy_futures::yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.lock().unwrap().push(ms);
        embassy_futures::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Bootstrapped peripheral
// ---------------------------------------------------------------------------

pub const SERVICE: u16 = 40;
pub const CHAR: u16 = 42;
pub const CCCD: u16 = 43;

pub type Ctx = ConnectionContext<NoopRawMutex>;

/// Acknowledgements of a successful bootstrap, in the order a stack
/// typically delivers them.
pub fn bootstrap_events(variant: Variant) -> Vec<StackEvent> {
    let ok = GattStatus::Success;
    let mut events: Vec<StackEvent> = vec![
        GattsEvent::Registered { app_id: 0, status: ok }.into(),
        GapEvent::AdvDataSet { status: ok }.into(),
        GattsEvent::ServiceCreated { handle: SERVICE, status: ok }.into(),
        GapEvent::AdvStartComplete { status: ok }.into(),
        GattsEvent::CharacteristicAdded { handle: CHAR, status: ok }.into(),
    ];
    if variant == Variant::Notify {
        events.push(GattsEvent::DescriptorAdded { handle: CCCD, status: ok }.into());
    }
    events
}

/// A peripheral that finished bootstrap and is advertising. The stack's
/// call log is cleared.
pub fn bootstrapped<'a>(
    stack: &'a SimStack,
    ctx: &'a Ctx,
    config: PeripheralConfig,
) -> Peripheral<'a, NoopRawMutex, SimStack> {
    let mut peripheral = Peripheral::new(stack, ctx, config);
    peripheral.start().unwrap();
    for event in bootstrap_events(config.variant) {
        peripheral.handle_event(event);
    }
    assert!(peripheral.bootstrap().is_complete());
    assert_eq!(peripheral.link().state(), LinkState::Advertising);
    stack.clear();
    peripheral
}

pub fn connected(conn_id: u16) -> StackEvent {
    GattsEvent::Connected { conn_id }.into()
}

pub fn disconnected(conn_id: u16) -> StackEvent {
    // 0x13: remote user terminated connection.
    GattsEvent::Disconnected { conn_id, reason: 0x13 }.into()
}

/// Yield until `cond` holds.
pub async fn until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        embassy_futures::yield_now().await;
    }
}
