//! Enginemon - Engine Monitor Firmware
//!
//! Main firmware binary for RP2040-based engine room monitors. Counts the
//! tachometer pulse train, reads the DS18B20 chain, converts to SI units,
//! publishes everything as telemetry and sounds the exchanger alarm.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::gpio::{Input, Level, Output, OutputOpenDrain, Pull};
use embassy_rp::interrupt;
use embassy_rp::interrupt::{InterruptExt, Priority};
use embassy_time::{Delay, Duration, Instant, Ticker};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use enginemon_core::prelude::*;
use enginemon_core::scheduler::InterruptFlag;
use enginemon_core::sensors::{
    BusController, BusEndpoint, DigitalInputChange, DigitalInputState, PulseCounter,
    PulseInputConfig, PulseSource,
};
use enginemon_core::sinks::{DigitalOutput, Metadata, Telemetry, TelemetryOutput};
use enginemon_core::transforms::{Frequency, Linear, Threshold};
use enginemon_core::{Context, Millis, SetupError};
use enginemon_drivers::ds18b20::{Ds18b20Bus, Resolution};
use enginemon_drivers::onewire::BitBangOneWire;
use enginemon_drivers::store::MemoryStore;
use enginemon_hal::{ConfigStore, Edge};
use portable_atomic::AtomicBool;

use crate::board::{BoardInput, BoardOutput, LatchedLevel};
use crate::telemetry::DefmtTelemetry;

mod board;
mod tasks;
mod telemetry;

/// Scheduler tick period
const TICK_MS: u64 = 10;

/// Kelvin offset applied to every DS18B20 reading
const CELSIUS_TO_KELVIN: f32 = 273.15;

/// Exchanger alarm trips above 95 °C
const EXCHANGER_ALARM_K: f32 = CELSIUS_TO_KELVIN + 95.0;

/// Telemetry is stale after 15 minutes without an update
const TEMPERATURE_TIMEOUT_MS: u32 = 15 * 60 * 1000;

const RPM_INPUT: PulseInputConfig = PulseInputConfig::new(board::RPM_GPIO, 503)
    .edge(Edge::Rising)
    .pull(enginemon_hal::Pull::Down)
    .debounce(15);

const ONEWIRE_READ_MS: u32 = 2003;
const OIL_SWITCH_READ_MS: u32 = 500;

const EXCHANGER_META: Metadata = Metadata::new()
    .units("K")
    .display_name("Heat Exchanger Temperature")
    .short_name("Exchanger Temp")
    .description("Main engine heat exchanger temperature")
    .timeout_ms(TEMPERATURE_TIMEOUT_MS);

const ENGINE_ROOM_META: Metadata = Metadata::new()
    .units("K")
    .display_name("Engine Room Temperature")
    .short_name("Engine Room")
    .description("Air temperature in the engine room")
    .timeout_ms(TEMPERATURE_TIMEOUT_MS);

type OneWire = Ds18b20Bus<BitBangOneWire<OutputOpenDrain<'static>, Delay>>;
type Sink<T> = TelemetryOutput<'static, T, DefmtTelemetry>;

// Written only by the edge tasks, drained by the scheduler loop
static RPM_COUNTER: PulseCounter = PulseCounter::new();
static LPG_FLAG: InterruptFlag = InterruptFlag::new();
static LPG_LEVEL: AtomicBool = AtomicBool::new(false);

// Edge tasks run here so they preempt a blocking one-wire read in the tick loop
static EDGE_EXECUTOR: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn SWI_IRQ_1() {
    unsafe { EDGE_EXECUTOR.on_interrupt() }
}

// The graph is wired with 'static references and never torn down
static TELEMETRY: StaticCell<Telemetry<DefmtTelemetry>> = StaticCell::new();
static GRAPH: StaticCell<Graph> = StaticCell::new();

/// Every node of the engine monitor
struct Graph {
    // Sinks
    rpm_out: Sink<f32>,
    exchanger_out: Sink<f32>,
    engine_room_out: Sink<f32>,
    oil_out: Sink<bool>,
    lpg_out: Sink<bool>,
    alarm: DigitalOutput<BoardOutput>,

    // Transforms
    rpm_hz: Frequency<'static>,
    exchanger_k: Linear<'static>,
    engine_room_k: Linear<'static>,
    exchanger_hot: Threshold<'static>,

    // Sources
    rpm: PulseSource<'static>,
    onewire: BusController<'static, OneWire>,
    exchanger: BusEndpoint<'static>,
    engine_room: BusEndpoint<'static>,
    oil: DigitalInputState<'static, BoardInput>,
    lpg: DigitalInputChange<'static, LatchedLevel>,
}

impl Graph {
    fn new(
        telemetry: &'static Telemetry<DefmtTelemetry>,
        onewire: OneWire,
        oil: BoardInput,
        alarm: BoardOutput,
    ) -> Result<Self, SetupError> {
        let rpm = PulseSource::new(&RPM_COUNTER, RPM_INPUT);
        Ok(Self {
            rpm_out: TelemetryOutput::new(telemetry, "propulsion.main.revolutions")
                .with_config_key("/sensors/engine_rpm/sk"),
            exchanger_out: TelemetryOutput::new(
                telemetry,
                "propulsion.main.heatExchangerTemperature",
            )
            .with_metadata(EXCHANGER_META)
            .with_config_key("/sensors/exchanger_temp/sk"),
            engine_room_out: TelemetryOutput::new(
                telemetry,
                "environment.inside.engineRoom.temperature",
            )
            .with_metadata(ENGINE_ROOM_META)
            .with_config_key("/sensors/engine_room_temp/sk"),
            oil_out: TelemetryOutput::new(telemetry, "notifications.oilPressureAlarm"),
            lpg_out: TelemetryOutput::new(telemetry, "notifications.LPGAlarm"),
            alarm: DigitalOutput::new(board::ALARM_GPIO, alarm),

            rpm_hz: Frequency::for_source(&rpm, 1.0)
                .with_config_key("/sensors/engine_rpm/calibrate"),
            exchanger_k: Linear::new(1.0, CELSIUS_TO_KELVIN)
                .with_config_key("/sensors/exchanger_temp/linear"),
            engine_room_k: Linear::new(1.0, CELSIUS_TO_KELVIN)
                .with_config_key("/sensors/engine_room_temp/linear"),
            exchanger_hot: Threshold::new(0.0, EXCHANGER_ALARM_K, false)
                .with_config_key("/threshold/heatExchangerTemp"),

            rpm,
            onewire: BusController::new(board::ONEWIRE_GPIO, onewire, ONEWIRE_READ_MS)?,
            exchanger: BusEndpoint::new(),
            engine_room: BusEndpoint::new(),
            oil: DigitalInputState::new(board::OIL_SWITCH_GPIO, oil, OIL_SWITCH_READ_MS),
            lpg: DigitalInputChange::new(board::LPG_GPIO, LatchedLevel(&LPG_LEVEL), &LPG_FLAG),
        })
    }

    /// Attach every node to `ctx` and connect the edges
    fn wire<S: ConfigStore>(
        &'static self,
        ctx: &mut Context<'static, DefmtTelemetry>,
        store: &mut S,
    ) -> Result<(), SetupError> {
        // Engine speed
        self.rpm.attach(ctx)?;
        self.rpm
            .connect_to(&self.rpm_hz)?
            .connect_to(&self.rpm_out)?;

        // Temperatures; endpoints bind in discovery order
        self.onewire.register(&self.exchanger)?;
        self.onewire.register(&self.engine_room)?;
        match self.onewire.discover() {
            Ok(bound) => info!("one-wire: {} sensors bound", bound),
            Err(e) => warn!("one-wire discovery failed: {}", e),
        }
        self.onewire.attach(ctx)?;
        self.exchanger
            .connect_to(&self.exchanger_k)?
            .connect_to(&self.exchanger_out)?;
        self.exchanger_k
            .connect_to(&self.exchanger_hot)?
            .connect_to(&self.alarm)?;
        self.engine_room
            .connect_to(&self.engine_room_k)?
            .connect_to(&self.engine_room_out)?;
        self.alarm.attach(ctx)?;

        // Switches
        self.oil.attach(ctx)?;
        self.oil.connect_to(&self.oil_out)?;
        self.lpg.attach(ctx)?;
        self.lpg.connect_to(&self.lpg_out)?;

        let configurables: [&'static dyn Configurable; 7] = [
            &self.rpm_hz,
            &self.rpm_out,
            &self.exchanger_k,
            &self.exchanger_out,
            &self.engine_room_k,
            &self.engine_room_out,
            &self.exchanger_hot,
        ];
        for node in configurables {
            ctx.register_config(node, store)?;
        }
        Ok(())
    }
}

fn now() -> Millis {
    Instant::now().as_millis() as Millis
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Enginemon firmware starting...");

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());

    let telemetry: &'static Telemetry<DefmtTelemetry> =
        TELEMETRY.init(Telemetry::new(DefmtTelemetry::new()));

    // DS18B20 chain on an open-drain pin with the external pull-up
    let link = BitBangOneWire::new(OutputOpenDrain::new(p.PIN_3, Level::High), Delay);
    let onewire = Ds18b20Bus::new(link, Resolution::Bits12);

    let oil = BoardInput(Input::new(p.PIN_16, Pull::Up));
    let alarm = BoardOutput(Output::new(p.PIN_7, Level::Low));

    let graph: &'static Graph = match Graph::new(telemetry, onewire, oil, alarm) {
        Ok(graph) => GRAPH.init(graph),
        Err(e) => defmt::panic!("graph construction failed: {}", e),
    };

    // No persistent medium yet: overrides live until reset
    let mut store: MemoryStore<8> = MemoryStore::new();
    let mut ctx = Context::new(telemetry);
    if let Err(e) = graph.wire(&mut ctx, &mut store) {
        defmt::panic!("graph wiring failed: {}", e);
    }

    // Edge tasks, above thread mode priority
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let spawner = EDGE_EXECUTOR.start(interrupt::SWI_IRQ_1);
    let rpm_pin = Input::new(p.PIN_5, board::pull(RPM_INPUT.pull));
    spawner
        .spawn(tasks::pulse_edge_task(rpm_pin, RPM_INPUT.edge, &RPM_COUNTER))
        .unwrap();
    let lpg_pin = Input::new(p.PIN_18, Pull::Up);
    spawner
        .spawn(tasks::switch_edge_task(lpg_pin, &LPG_LEVEL, &LPG_FLAG))
        .unwrap();

    if let Err(e) = ctx.start(now()) {
        defmt::panic!("start failed: {}", e);
    }
    info!("Enginemon running, tick {} ms", TICK_MS);

    let mut ticker = Ticker::every(Duration::from_millis(TICK_MS));
    loop {
        ticker.next().await;
        ctx.tick(now());
    }
}
