mod common;

use lt8912::timing::Blanking;
use lt8912::{Bank, Bridge, BridgeConfig, BridgeState, Cancellation, Error, IoFault, LvdsTiming,
             OutputMode, Reg};

use common::{find, log, writes, Bus, Delay, Event, Log, ResetPin};

type TestBridge = Bridge<Bus, ResetPin, Delay>;

fn bridge(log: &Log, config: BridgeConfig) -> TestBridge {
    Bridge::new(Bus::new(log), ResetPin::new(log), Delay::new(log), config).unwrap()
}

fn a(addr: u8, value: u8) -> Event {
    Event::Write(Bank::A, addr, value)
}

fn b(addr: u8, value: u8) -> Event {
    Event::Write(Bank::B, addr, value)
}

fn panel_1280x800() -> LvdsTiming {
    LvdsTiming {
        h: Blanking { active: 1280, front_porch: 48, sync_width: 32, back_porch: 80 },
        v: Blanking { active: 800, front_porch: 3, sync_width: 6, back_porch: 14 },
        pixel_clock_khz: 71_100,
    }
}

fn awake(log: &Log, config: BridgeConfig) -> TestBridge {
    let bridge = bridge(log, config);
    bridge.wake().unwrap();
    log.borrow_mut().clear();
    bridge
}

#[test]
fn wake_resets_then_powers_up_in_order() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    assert_eq!(bridge.state(), BridgeState::Reset);
    bridge.wake().unwrap();
    assert_eq!(*log.borrow(), vec![
        Event::Reset(true), Event::Delay(100), Event::Reset(false), Event::Delay(100),
        a(0x08, 0xff), a(0x41, 0x3c),
        a(0x05, 0xfb), a(0x05, 0xff),
        a(0x03, 0x7f), Event::Delay(10), a(0x03, 0xff),
        a(0x32, 0xa1), a(0x33, 0x03),
    ]);
    assert_eq!(bridge.state(), BridgeState::Awake);
}

#[test]
fn default_lvds_bypass_initialization() {
    let log = log();
    let bridge = awake(&log, BridgeConfig::default());
    bridge.initialize().unwrap();
    assert_eq!(bridge.state(), BridgeState::Initialized);

    let w = writes(&log);
    assert_eq!(w.len(), 142);
    assert_eq!(&w[..6], &[
        (Bank::A, 0x08, 0xff), (Bank::A, 0x09, 0xff), (Bank::A, 0x0a, 0xff),
        (Bank::A, 0x0b, 0x7c), (Bank::A, 0x0c, 0xff), (Bank::A, 0x51, 0x15),
    ]);

    // four lanes are encoded as 0
    let lanes = find(&log, 0, b(0x13, 0x00));
    let timing = find(&log, lanes, b(0x18, 44));
    let dds = find(&log, timing, b(0x4e, 0x52));
    let sink = find(&log, dds, a(0xb2, 0x01));
    let avi = find(&log, sink, Event::Write(Bank::C, 0x43, 0x25));
    let mipi_reset = find(&log, avi, a(0x03, 0x7f));
    assert_eq!(log.borrow()[mipi_reset + 1], Event::Delay(10));
    let latch = find(&log, mipi_reset, b(0x51, 0x80));
    assert_eq!(log.borrow()[latch + 1..latch + 3], [Event::Delay(10), b(0x51, 0x00)]);

    // 148.5 MHz through the core PLL
    let core_pll = find(&log, latch, a(0x52, 0x14));
    assert_eq!(log.borrow()[core_pll + 1..core_pll + 5], [
        a(0x69, 41), a(0x69, 41 | 0x80), a(0x6c, 165), a(0x6b, 30),
    ]);
    let bypass = find(&log, core_pll, a(0x51, 0x2d));
    let settle = find(&log, bypass, Event::Delay(100));
    assert_eq!(log.borrow()[settle - 1], a(0xa8, 0x13));
    assert_eq!(*log.borrow().last().unwrap(), a(0x44, 0x30));

    assert_eq!(bridge.mirror(Reg::b(0x1c)), Some(0x80));
    bridge.activate().unwrap();
    assert_eq!(bridge.state(), BridgeState::Active);
}

#[test]
fn sleep_straight_after_initialize_asserts_reset() {
    let log = log();
    let bridge = awake(&log, BridgeConfig::default());
    bridge.initialize().unwrap();
    log.borrow_mut().clear();

    bridge.sleep().unwrap();
    assert_eq!(*log.borrow(), vec![
        a(0x32, 0xa0), a(0x33, 0x00), a(0x41, 0x3d), a(0x08, 0x00), Event::Reset(true),
    ]);
    assert_eq!(bridge.state(), BridgeState::Asleep);

    log.borrow_mut().clear();
    bridge.sleep().unwrap();
    assert!(log.borrow().is_empty());
    assert!(matches!(bridge.activate(), Err(Error::InvalidState { state: BridgeState::Asleep, .. })));
}

#[test]
fn sleep_from_reset_does_nothing() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    bridge.sleep().unwrap();
    assert!(log.borrow().is_empty());
    assert_eq!(bridge.state(), BridgeState::Reset);
}

#[test]
fn degenerate_scaler_input_is_rejected_without_writes() {
    let log = log();
    let bridge = awake(&log, BridgeConfig { scaler: true, ..BridgeConfig::default() });
    let mut timing = *lt8912::timing::builtin_mode(0);
    timing.hactive = 1;
    bridge.set_mode(timing, Some(panel_1280x800())).unwrap();

    assert!(matches!(bridge.initialize(), Err(Error::InvalidTiming(_))));
    assert!(log.borrow().is_empty());
    assert_eq!(bridge.state(), BridgeState::Awake);
}

#[test]
fn scaler_needs_a_panel_timing() {
    let log = log();
    let bridge = awake(&log, BridgeConfig { scaler: true, ..BridgeConfig::default() });
    assert!(matches!(bridge.initialize(), Err(Error::InvalidTiming(_))));
    assert!(log.borrow().is_empty());
}

#[test]
fn scaler_downscales_onto_the_panel() {
    let log = log();
    let bridge = awake(&log, BridgeConfig { scaler: true, ..BridgeConfig::default() });
    bridge.set_mode(*lt8912::timing::builtin_mode(0), Some(panel_1280x800())).unwrap();
    bridge.initialize().unwrap();

    // core PLL runs at the panel clock
    let core_pll = find(&log, 0, a(0x52, 0x14));
    assert_eq!(log.borrow()[core_pll + 1], a(0x69, 19));
    let ratio = find(&log, core_pll, a(0x8f, 0x02));
    assert_eq!(log.borrow()[ratio + 1..ratio + 4], [a(0x90, 0x18), a(0x91, 0x9b), a(0x92, 0x15)]);
    let settle = find(&log, ratio, Event::Delay(300));
    assert_eq!(log.borrow()[settle + 1..], [a(0x44, 0x30)]);
    assert!(!writes(&log).contains(&(Bank::A, 0x51, 0x2d)));
}

#[test]
fn out_of_bounds_mode_is_refused() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    let mut timing = *lt8912::timing::builtin_mode(0);
    timing.pixel_clock_khz = 165_000;
    assert!(matches!(bridge.set_mode(timing, None), Err(Error::InvalidTiming(_))));
}

#[test]
fn second_owner_is_refused_until_shutdown() {
    let log = log();
    let bus = Bus::new(&log);
    let mut clash = Bus::new(&log);
    clash.address = bus.address;

    let owner = Bridge::new(bus, ResetPin::new(&log), Delay::new(&log), BridgeConfig::default())
        .unwrap();
    assert!(matches!(Bridge::new(clash, ResetPin::new(&log), Delay::new(&log),
                                 BridgeConfig::default()),
                     Err(Error::AlreadyOwned)));

    let (bus, _, _) = owner.shutdown().unwrap();
    assert!(Bridge::new(bus, ResetPin::new(&log), Delay::new(&log), BridgeConfig::default())
        .is_ok());
}

#[test]
fn bank_c_out_of_range_is_refused() {
    let log = log();
    for &address in [0x7e, 0x88].iter() {
        let mut bus = Bus::new(&log);
        bus.address = address;
        assert!(matches!(Bridge::new(bus, ResetPin::new(&log), Delay::new(&log),
                                     BridgeConfig::default()),
                         Err(Error::UnsupportedConfiguration(_))));
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn transitions_out_of_order_are_refused() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    assert_eq!(bridge.initialize(),
               Err(Error::InvalidState { state: BridgeState::Reset, operation: "initialize" }));
    bridge.wake().unwrap();
    assert_eq!(bridge.activate(),
               Err(Error::InvalidState { state: BridgeState::Awake, operation: "activate" }));
    bridge.initialize().unwrap();
    assert_eq!(bridge.initialize(),
               Err(Error::InvalidState { state: BridgeState::Initialized, operation: "initialize" }));
}

#[test]
fn bus_failure_mid_sequence_needs_a_fresh_wake() {
    let log = log();
    let bus = Bus::new(&log);
    let fail_at = bus.fail_at.clone();
    let bridge = Bridge::new(bus, ResetPin::new(&log), Delay::new(&log), BridgeConfig::default())
        .unwrap();
    bridge.wake().unwrap();

    *fail_at.borrow_mut() = Some((Bank::B, 0x3e));
    assert_eq!(bridge.initialize(), Err(Error::Io(IoFault::Bus { bank: Bank::B, addr: 0x3e })));
    assert_eq!(bridge.state(), BridgeState::Initialized);
    assert!(matches!(bridge.activate(), Err(Error::InvalidState { .. })));
    // nothing after the failed write went out
    assert_eq!(*log.borrow().last().unwrap(), b(0x3d, 0x00));

    *fail_at.borrow_mut() = None;
    assert!(bridge.initialize().is_err());
    bridge.wake().unwrap();
    bridge.initialize().unwrap();
    bridge.activate().unwrap();
}

#[test]
fn broken_reset_line_fails_the_wake() {
    let log = log();
    let mut reset = ResetPin::new(&log);
    reset.broken = true;
    let bridge = Bridge::new(Bus::new(&log), reset, Delay::new(&log), BridgeConfig::default())
        .unwrap();
    assert_eq!(bridge.wake(), Err(Error::Io(IoFault::ResetLine)));
    assert!(log.borrow().is_empty());
}

#[test]
fn bring_up_runs_to_active() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    bridge.bring_up(&Cancellation::new()).unwrap();
    assert_eq!(bridge.state(), BridgeState::Active);
}

#[test]
fn cancelled_bring_up_ends_asleep() {
    let log = log();
    let bridge = bridge(&log, BridgeConfig::default());
    let cancel = Cancellation::new();
    cancel.request();
    assert_eq!(bridge.bring_up(&cancel), Err(Error::Cancelled));
    assert_eq!(bridge.state(), BridgeState::Asleep);
    // woke fully, never started the configuration pass
    assert!(!writes(&log).contains(&(Bank::A, 0x09, 0xff)));
    assert_eq!(*log.borrow().last().unwrap(), Event::Reset(true));
}

#[test]
fn hdmi_output_from_a_loaded_config() {
    let source = [
        ("output_mode", "hdmi"),
        ("dsi_lanes", "3"),
        ("hdmi_mode", "1"),
        ("vic", "4"),
        ("audio_mode", "spdif"),
        ("audio_sample_rate", "44100"),
    ];
    let config = BridgeConfig::load(&source[..]).unwrap();
    assert_eq!(config.output_mode, OutputMode::Hdmi);

    let log = log();
    let bridge = awake(&log, config);
    bridge.initialize().unwrap();

    let w = writes(&log);
    assert!(w.contains(&(Bank::B, 0x13, 0x03)));
    // 720p60: 1280 active, 1650 total
    assert!(w.contains(&(Bank::B, 0x1c, 0x00)) && w.contains(&(Bank::B, 0x1d, 0x05)));
    assert_eq!(bridge.mirror(Reg::b(0x34)), Some(0x72));
    assert_eq!(bridge.mirror(Reg::b(0x35)), Some(0x06));
    let c = |addr| bridge.mirror(Reg::c(addr));
    assert_eq!(c(0x06), Some(0x0e));
    assert_eq!(c(0x0f), Some(0x0b));
    assert_eq!((c(0x37), c(0x36), c(0x35)), (Some(0x00), Some(0x18), Some(0x80)));
    assert_eq!(c(0x43), Some(0x6f - 0x10 - 0x2a - 0x04));
    assert_eq!(c(0x47), Some(0x04));
    assert_eq!(bridge.mirror(Reg::a(0x44)), Some(0x31));
}
