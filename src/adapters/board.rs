//! Board adapter: bridges real peripherals to the domain port traits.
//!
//! Composes the chip ADC driver, the level-probe input pin, the output
//! bank and the hardware watchdog into one value that satisfies every
//! port [`AppService::tick`](crate::app::service::AppService::tick)
//! needs. This is the only module that touches pins.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::app::ports::{ActuatorPort, AdcPort, LevelInputPort, WatchdogPort};
use crate::drivers::outputs::{GpioOutputBank, Output};
use crate::error::{ActuatorError, SensorFault};
use crate::sensors::SensorChannel;

/// Level-probe comparator on a plain input pin.
pub struct GpioLevelProbe<L> {
    pin: L,
}

impl<L: InputPin> GpioLevelProbe<L> {
    pub fn new(pin: L) -> Self {
        Self { pin }
    }
}

impl<L: InputPin> LevelInputPort for GpioLevelProbe<L> {
    fn level_probe_high(&mut self) -> Result<bool, SensorFault> {
        self.pin.is_high().map_err(|_| SensorFault::GpioReadFailed)
    }
}

/// Concrete adapter that combines all hardware behind port traits.
pub struct BoardAdapter<A, L, P, W> {
    adc: A,
    level: GpioLevelProbe<L>,
    outputs: GpioOutputBank<P>,
    watchdog: W,
}

impl<A, L, P, W> BoardAdapter<A, L, P, W>
where
    A: AdcPort,
    L: InputPin,
    P: OutputPin,
    W: WatchdogPort,
{
    pub fn new(adc: A, level_pin: L, output_pins: [P; Output::COUNT], watchdog: W) -> Self {
        Self {
            adc,
            level: GpioLevelProbe::new(level_pin),
            outputs: GpioOutputBank::new(output_pins),
            watchdog,
        }
    }

    pub fn outputs(&self) -> &GpioOutputBank<P> {
        &self.outputs
    }
}

// ── Sensor ports ──────────────────────────────────────────────

impl<A: AdcPort, L, P, W> AdcPort for BoardAdapter<A, L, P, W> {
    fn read_raw(&mut self, channel: SensorChannel) -> Result<u16, SensorFault> {
        self.adc.read_raw(channel)
    }
}

impl<A, L: InputPin, P, W> LevelInputPort for BoardAdapter<A, L, P, W> {
    fn level_probe_high(&mut self) -> Result<bool, SensorFault> {
        self.level.level_probe_high()
    }
}

// ── Actuator / watchdog ports ─────────────────────────────────

impl<A, L, P: OutputPin, W> ActuatorPort for BoardAdapter<A, L, P, W> {
    fn set_output(&mut self, output: Output, on: bool) -> Result<(), ActuatorError> {
        self.outputs.set_output(output, on)
    }
}

impl<A, L, P, W: WatchdogPort> WatchdogPort for BoardAdapter<A, L, P, W> {
    fn feed(&mut self) {
        self.watchdog.feed();
    }
}
