//! End-to-end scenarios driven over the fake UART/timer harness: a
//! controller port and a responder port linked back to back, with a
//! background thread servicing the responder while the test thread plays
//! orchestrator for BREAK/MAB/byte-delivery timing.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use common::{FakeLink, FakeTimer, FakeUart, HostPlatform, Orchestrator, TimerHandle};
use rdm_engine::codec::{self, CommandClass, NackReason, RdmHeader, SUB_DEVICE_ROOT};
use rdm_engine::pd::{PID_DMX_START_ADDRESS, PID_IDENTIFY_DEVICE};
use rdm_engine::{ControllerReply, DispatchOutcome, DmxConfig, Port, Uid};

type TestPort = Port<FakeUart, FakeTimer, HostPlatform>;

fn make_pair(uid_a: Uid, uid_b: Uid) -> (FakeLink, Arc<TestPort>, Arc<TestPort>, TimerHandle, TimerHandle) {
    let link = FakeLink::new();
    let (timer_a, handle_a) = FakeTimer::new(link.clock.clone());
    let (timer_b, handle_b) = FakeTimer::new(link.clock.clone());
    let port_a = TestPort::install(link.station_a(), timer_a, DmxConfig { root_uid: uid_a, ..Default::default() }).unwrap();
    let port_b = TestPort::install(link.station_b(), timer_b, DmxConfig { root_uid: uid_b, ..Default::default() }).unwrap();
    (link, Arc::new(port_a), Arc::new(port_b), handle_a, handle_b)
}

/// Runs `call` against `port_a` on a background thread, services `port_b`
/// from a second background thread, and drives both ports' interrupt entry
/// points from the calling thread until `call` returns.
fn drive<F, R>(
    link: &FakeLink,
    timer_a: &TimerHandle,
    timer_b: &TimerHandle,
    port_a: &Arc<TestPort>,
    port_b: &Arc<TestPort>,
    call: F,
) -> R
where
    F: FnOnce(&TestPort) -> R + Send + 'static,
    R: Send + 'static,
{
    let stop = Arc::new(AtomicBool::new(false));
    let responder_stop = stop.clone();
    let port_b_responder = port_b.clone();
    let responder = thread::spawn(move || {
        while !responder_stop.load(Ordering::Relaxed) {
            let _ = port_b_responder.service_once(20_000);
        }
    });

    let port_a_ctrl = port_a.clone();
    let controller = thread::spawn(move || call(&port_a_ctrl));

    let oa = port_a.clone();
    let ob = port_b.clone();
    let ota = port_a.clone();
    let otb = port_b.clone();
    let orchestrator = Orchestrator {
        clock: link.clock.clone(),
        a_to_b: link.a_to_b.clone(),
        b_to_a: link.b_to_a.clone(),
        timer_a: timer_a.clone(),
        timer_b: timer_b.clone(),
        on_uart_a: Box::new(move || oa.on_uart_interrupt()),
        on_uart_b: Box::new(move || ob.on_uart_interrupt()),
        on_timer_a: Box::new(move || ota.on_timer_interrupt()),
        on_timer_b: Box::new(move || otb.on_timer_interrupt()),
    };
    orchestrator.run(|| controller.is_finished());

    let result = controller.join().expect("controller thread panicked");
    stop.store(true, Ordering::Relaxed);
    responder.join().expect("responder thread panicked");
    result
}

fn header(src: Uid, dest: Uid, cc: CommandClass, pid: u16) -> RdmHeader {
    RdmHeader {
        message_len: 0,
        dest_uid: dest,
        src_uid: src,
        transaction_num: 0,
        port_or_response: 1,
        message_count: 0,
        sub_device: SUB_DEVICE_ROOT,
        cc,
        pid,
    }
}

#[test]
fn identify_round_trip() {
    let (link, port_a, port_b, timer_a, timer_b) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));
    let (src, dest) = (port_a.uid(), port_b.uid());

    let set_header = header(src, dest, CommandClass::SetCommand, PID_IDENTIFY_DEVICE);
    let set_reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(set_header, &[1]).unwrap());
    assert_eq!(set_reply, ControllerReply::Ack { pd: Vec::new() });

    let get_header = header(src, dest, CommandClass::GetCommand, PID_IDENTIFY_DEVICE);
    let get_reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(get_header, &[]).unwrap());
    assert_eq!(get_reply, ControllerReply::Ack { pd: vec![1] });
}

#[test]
fn unknown_pid_is_nacked() {
    let (link, port_a, port_b, timer_a, timer_b) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));
    let req = header(port_a.uid(), port_b.uid(), CommandClass::GetCommand, 0x9999);

    let reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(req, &[]).unwrap());
    assert_eq!(reply, ControllerReply::Nack(NackReason::UnknownPid));
}

#[test]
fn discovers_the_single_responder_on_the_bus() {
    let (link, port_a, port_b, timer_a, timer_b) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x5253, 0x0000_1234));
    let responder_uid = port_b.uid();

    let found = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.discover().unwrap());
    assert_eq!(found, vec![responder_uid]);
}

#[test]
fn checksum_corruption_is_dropped_with_no_reply() {
    let (_, _port_a, port_b, _, _) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));
    let req = header(Uid::new(0x7a70, 1), port_b.uid(), CommandClass::GetCommand, PID_IDENTIFY_DEVICE);

    let mut wire = [0u8; 64];
    let n = codec::encode_standard(&req, &[], &mut wire).unwrap();
    wire[10] ^= 0xff; // corrupt a header byte covered by the checksum

    assert!(matches!(port_b.dispatch(&wire, n), DispatchOutcome::NoReply));

    // The responder must still be fully usable afterwards: corruption isn't
    // sticky state.
    let mut good_wire = [0u8; 64];
    let good_n = codec::encode_standard(&req, &[], &mut good_wire).unwrap();
    assert!(matches!(port_b.dispatch(&good_wire, good_n), DispatchOutcome::StandardReply));
}

#[test]
fn broadcast_enforces_inter_packet_spacing() {
    let (link, port_a, port_b, timer_a, timer_b) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));
    let req = header(port_a.uid(), Uid::BROADCAST_ALL, CommandClass::SetCommand, PID_IDENTIFY_DEVICE);
    let cfg = port_a.config();

    let before = link.clock.now();
    let reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(req, &[1]).unwrap());
    let elapsed = link.clock.now() - before;

    assert_eq!(reply, ControllerReply::NoResponse);
    let minimum = (cfg.break_len_us + cfg.mab_len_us) as u64 + rdm_engine::driver::timing::BROADCAST_PACKET_SPACING_US as u64;
    assert!(elapsed >= minimum, "expected at least {minimum}us of BREAK+MAB+spacing, saw {elapsed}us");
}

#[test]
fn broadcast_set_is_applied_even_though_it_is_never_acked() {
    let (link, port_a, port_b, timer_a, timer_b) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));
    let (src, dest) = (port_a.uid(), port_b.uid());

    let broadcast = header(src, Uid::BROADCAST_ALL, CommandClass::SetCommand, PID_DMX_START_ADDRESS);
    let broadcast_reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(broadcast, &[0x01, 0x23]).unwrap());
    assert_eq!(broadcast_reply, ControllerReply::NoResponse);

    let get = header(src, dest, CommandClass::GetCommand, PID_DMX_START_ADDRESS);
    let get_reply = drive(&link, &timer_a, &timer_b, &port_a, &port_b, move |p| p.request(get, &[]).unwrap());
    assert_eq!(get_reply, ControllerReply::Ack { pd: vec![0x01, 0x23] });
}

#[test]
fn raw_write_then_read_round_trips_the_frame() {
    let (_, port_a, _port_b, _, _) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));

    let mut slots = [0u8; 512];
    slots[0] = 0xff;
    slots[511] = 0x42;
    let written = port_a.write(&slots);
    assert_eq!(written, 512);

    let mut dest = [0u8; 513];
    let n = port_a.read(&mut dest);
    assert_eq!(n, 513);
    assert_eq!(dest[0], 0, "slot 0 is the start code, untouched by write()");
    assert_eq!(dest[1], 0xff);
    assert_eq!(dest[512], 0x42);
}

#[test]
fn raw_write_offset_and_read_offset_address_individual_slots() {
    let (_, port_a, _port_b, _, _) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));

    let n = port_a.write_offset(10, &[1, 2, 3]);
    assert_eq!(n, 3);

    let mut dest = [0u8; 3];
    let n = port_a.read_offset(10, &mut dest);
    assert_eq!(n, 3);
    assert_eq!(dest, [1, 2, 3]);

    assert_eq!(port_a.read_slot(10), Some(1));
    assert_eq!(port_a.read_slot(11), Some(2));
}

#[test]
fn raw_offset_accessors_reject_slot_zero_and_out_of_range_offsets() {
    let (_, port_a, _port_b, _, _) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));

    assert_eq!(port_a.write_offset(0, &[1]), 0);
    assert_eq!(port_a.write_offset(513, &[1]), 0);
    assert_eq!(port_a.read_offset(0, &mut [0u8]), 0);
    assert_eq!(port_a.read_slot(0), None);
    assert_eq!(port_a.read_slot(513), None);
    assert!(port_a.write_slot(0, 1).is_err());
}

#[test]
fn raw_write_slot_sets_a_single_slot() {
    let (_, port_a, _port_b, _, _) = make_pair(Uid::new(0x7a70, 1), Uid::new(0x7a70, 2));

    port_a.write_slot(5, 0x99).unwrap();
    assert_eq!(port_a.read_slot(5), Some(0x99));
}
