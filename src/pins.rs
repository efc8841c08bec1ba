//! GPIO / peripheral pin assignments for the BrewOS ECM v1 board.
//!
//! Single source of truth. Every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Analog inputs (buffered, 3.0 V reference)
// ---------------------------------------------------------------------------

/// Brew boiler NTC divider. GPIO26 = ADC0.
pub const BREW_NTC_GPIO: u8 = 26;
/// Steam boiler NTC divider. GPIO27 = ADC1.
pub const STEAM_NTC_GPIO: u8 = 27;
/// Pressure transducer through the 10k/15.6k divider. GPIO28 = ADC2.
pub const PRESSURE_GPIO: u8 = 28;

/// First GPIO wired to the ADC mux; ADC input = GPIO − this.
pub const ADC_GPIO_BASE: u8 = 26;

// ---------------------------------------------------------------------------
// Digital inputs
// ---------------------------------------------------------------------------

/// Steam boiler level probe comparator output.
/// HIGH = water below probe (also what a broken wire reads), LOW = covered.
pub const LEVEL_PROBE_GPIO: u8 = 4;

// ---------------------------------------------------------------------------
// Relays (K1–K4) and SSR drive
// ---------------------------------------------------------------------------

pub const RELAY_WATER_LED_GPIO: u8 = 10;
pub const RELAY_PUMP_GPIO: u8 = 11;
pub const RELAY_BREW_SOLENOID_GPIO: u8 = 12;
pub const RELAY_SPARE_GPIO: u8 = 20;

/// Brew boiler SSR trigger (active HIGH).
pub const SSR_BREW_GPIO: u8 = 13;
/// Steam boiler SSR trigger (active HIGH).
pub const SSR_STEAM_GPIO: u8 = 14;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

pub const STATUS_LED_GPIO: u8 = 15;
pub const BUZZER_GPIO: u8 = 19;

// ---------------------------------------------------------------------------
// UART links (opaque to the sensor core)
// ---------------------------------------------------------------------------

/// UART0 to the companion display/network module.
pub const UART_COMPANION_TX_GPIO: u8 = 0;
pub const UART_COMPANION_RX_GPIO: u8 = 1;
/// UART1 to the RS485 power meter transceiver.
pub const UART_METER_TX_GPIO: u8 = 6;
pub const UART_METER_RX_GPIO: u8 = 7;

/// RP2354 hardware watchdog timeout.
pub const WATCHDOG_TIMEOUT_MS: u32 = 8_000;

/// Every assigned pin, for the duplicate check below.
pub const ASSIGNED: [u8; 16] = [
    BREW_NTC_GPIO,
    STEAM_NTC_GPIO,
    PRESSURE_GPIO,
    LEVEL_PROBE_GPIO,
    RELAY_WATER_LED_GPIO,
    RELAY_PUMP_GPIO,
    RELAY_BREW_SOLENOID_GPIO,
    RELAY_SPARE_GPIO,
    SSR_BREW_GPIO,
    SSR_STEAM_GPIO,
    STATUS_LED_GPIO,
    BUZZER_GPIO,
    UART_COMPANION_TX_GPIO,
    UART_COMPANION_RX_GPIO,
    UART_METER_TX_GPIO,
    UART_METER_RX_GPIO,
];

/// True if no GPIO is assigned twice and every pin exists on the RP2354.
pub const fn assignments_valid() -> bool {
    let mut i = 0;
    while i < ASSIGNED.len() {
        if ASSIGNED[i] > 29 {
            return false;
        }
        let mut j = i + 1;
        while j < ASSIGNED.len() {
            if ASSIGNED[i] == ASSIGNED[j] {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(assignments_valid(), "duplicate GPIO assignment");
