mod common;

use common::{
    bootstrap_events, bootstrapped, connected, disconnected, until, Call, Ctx,
    Op, SimStack, CCCD, CHAR,
};
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use sampler_core::{
    BootstrapError, BootstrapState, BootstrapStep, CharacteristicHandle,
    GapEvent, GattStatus, GattsEvent, LinkState, Peripheral, PeripheralConfig,
    StackEvent, Variant, WriteValue,
};

fn enable_notifications(conn_id: u16) -> StackEvent {
    GattsEvent::WriteRequest {
        conn_id,
        trans_id: 0,
        handle: CCCD,
        value: WriteValue::from_slice(&[1, 0]).unwrap(),
        need_rsp: false,
    }
    .into()
}

fn advertising_started(status: GattStatus) -> StackEvent {
    GapEvent::AdvStartComplete { status }.into()
}

#[futures_test::test]
async fn channel_driven_bootstrap_reaches_advertising() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let events: Channel<NoopRawMutex, StackEvent, 8> = Channel::new();
    let mut peripheral = Peripheral::new(&stack, &ctx, PeripheralConfig::DEFAULT);

    peripheral.start().unwrap();
    for event in bootstrap_events(Variant::Notify) {
        events.send(event).await;
    }

    let drained = async {
        until(|| events.is_empty()).await;
    };
    match select(peripheral.run(events.receiver()), drained).await {
        Either::First(_) => unreachable!(),
        Either::Second(()) => {}
    }

    assert!(peripheral.bootstrap().is_complete());
    assert_eq!(peripheral.link().state(), LinkState::Advertising);
    assert_eq!(stack.advertising_starts(), 1);
    assert_eq!(stack.calls()[0], Call::RegisterApplication(0));
}

#[futures_test::test]
async fn connection_events_flow_through_the_channel() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let events: Channel<NoopRawMutex, StackEvent, 16> = Channel::new();
    let mut peripheral = Peripheral::new(&stack, &ctx, PeripheralConfig::DEFAULT);
    peripheral.start().unwrap();

    let feed = async {
        for event in bootstrap_events(Variant::Notify) {
            events.send(event).await;
        }
        events.send(connected(1)).await;
        until(|| ctx.is_active()).await;
        let target = ctx.take_stream_request();
        events.send(disconnected(1)).await;
        until(|| !ctx.is_active()).await;
        target
    };

    let target = match select(peripheral.run(events.receiver()), feed).await {
        Either::First(_) => unreachable!(),
        Either::Second(target) => target,
    };

    let target = target.unwrap();
    assert_eq!(target.conn_id, 1);
    assert_eq!(target.characteristic.0, CHAR);
    assert_eq!(peripheral.link().state(), LinkState::Disconnected);
    // Once after bootstrap, once after the disconnect.
    assert_eq!(stack.advertising_starts(), 2);
}

#[test]
fn refused_registration_is_returned_from_start() {
    let stack = SimStack::new();
    stack.fail(Op::RegisterApplication);
    let ctx = Ctx::new();
    let mut peripheral = Peripheral::new(&stack, &ctx, PeripheralConfig::DEFAULT);

    let result = peripheral.start();

    assert!(matches!(
        result,
        Err(BootstrapError::Stack { step: BootstrapStep::Register, .. })
    ));
    assert!(peripheral.bootstrap().is_halted());
}

#[test]
fn rejected_acknowledgement_does_not_stop_event_handling() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let mut peripheral = Peripheral::new(&stack, &ctx, PeripheralConfig::DEFAULT);
    peripheral.start().unwrap();

    peripheral.handle_event(
        GattsEvent::Registered { app_id: 0, status: GattStatus::Error(0x85) }.into(),
    );
    peripheral.handle_event(connected(1));

    assert_eq!(peripheral.bootstrap().state(), BootstrapState::Unregistered);
    assert!(peripheral.bootstrap().is_halted());
    // No characteristic yet, so the connection is tracked but not streamed.
    assert_eq!(peripheral.link().state(), LinkState::Connected { conn_id: 1 });
    assert_eq!(ctx.take_stream_request(), None);
}

#[test]
fn read_variant_bootstrap_preloads_the_value() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let config = PeripheralConfig::DEFAULT.with_variant(Variant::Read);
    let mut peripheral = Peripheral::new(&stack, &ctx, config);
    peripheral.start().unwrap();

    for event in bootstrap_events(Variant::Read) {
        peripheral.handle_event(event);
    }

    assert!(peripheral.bootstrap().is_complete());
    assert!(stack
        .calls()
        .contains(&Call::SetAttributeValue { handle: CHAR, value: vec![2] }));
}

#[futures_test::test]
async fn disconnect_queued_behind_a_write_burst_restarts_advertising() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let mut peripheral = bootstrapped(&stack, &ctx, PeripheralConfig::DEFAULT);
    peripheral.handle_event(connected(1));

    let events: Channel<NoopRawMutex, StackEvent, 4> = Channel::new();
    while !events.is_full() {
        events.try_send(enable_notifications(1)).unwrap();
    }

    // The disconnect waits for room instead of being dropped.
    let lifecycle = async {
        events.send(disconnected(1)).await;
        until(|| !ctx.is_active()).await;
    };
    match select(peripheral.run(events.receiver()), lifecycle).await {
        Either::First(_) => unreachable!(),
        Either::Second(()) => {}
    }

    assert!(ctx.notifications_enabled());
    assert_eq!(peripheral.link().state(), LinkState::Disconnected);
    assert_eq!(stack.advertising_starts(), 1);
}

#[test]
fn advertising_failure_after_success_leaves_link_idle() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let mut peripheral = bootstrapped(&stack, &ctx, PeripheralConfig::DEFAULT);
    peripheral.handle_event(connected(1));
    peripheral.handle_event(disconnected(1));

    peripheral.handle_event(advertising_started(GattStatus::Success));
    assert_eq!(peripheral.link().state(), LinkState::Advertising);

    peripheral.handle_event(advertising_started(GattStatus::Error(0x0C)));
    assert_eq!(peripheral.link().state(), LinkState::Idle);

    // A later successful start brings the link back.
    peripheral.handle_event(advertising_started(GattStatus::Success));
    assert_eq!(peripheral.link().state(), LinkState::Advertising);
    peripheral.handle_event(connected(2));
    assert_eq!(peripheral.link().state(), LinkState::Connected { conn_id: 2 });
}

#[test]
fn central_connected_during_bootstrap_streams_once_the_characteristic_exists() {
    let stack = SimStack::new();
    let ctx = Ctx::new();
    let mut peripheral = Peripheral::new(&stack, &ctx, PeripheralConfig::DEFAULT);
    peripheral.start().unwrap();

    for event in bootstrap_events(Variant::Notify) {
        if matches!(event, StackEvent::Gatts(GattsEvent::CharacteristicAdded { .. })) {
            peripheral.handle_event(connected(1));
            assert_eq!(ctx.take_stream_request(), None);
        }
        peripheral.handle_event(event);
    }

    assert!(peripheral.bootstrap().is_complete());
    let target = ctx.take_stream_request().unwrap();
    assert_eq!(target.conn_id, 1);
    assert_eq!(target.characteristic, CharacteristicHandle(CHAR));
    assert!(ctx.is_current(&target));
}
