//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements          | Connects to                  |
//! |----------------|---------------------|------------------------------|
//! | `board`        | AdcPort             | chip ADC driver              |
//! |                | LevelInputPort      | level-probe GPIO             |
//! |                | ActuatorPort        | relay / SSR / LED GPIOs      |
//! |                | WatchdogPort        | hardware watchdog            |
//! | `flash_store`  | ConfigPort          | in-memory key-value store    |
//! |                | StoragePort         |                              |
//! | `log_sink`     | EventSink           | Serial log output            |
//! | `sim`          | all hardware ports  | simulated ECM board          |

pub mod board;
pub mod flash_store;
pub mod log_sink;
pub mod sim;
