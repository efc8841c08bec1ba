//! Per-channel calibration offsets.
//!
//! The RP2354 ADC has a known input-leakage erratum that biases readings on
//! high-impedance sources, so every analog channel supports an additive
//! offset found by a single-point comparison against a reference
//! instrument. Offsets are bounded, persisted, and published atomically:
//! the poll loop reads the whole table in one critical section and never
//! sees a half-written update.
//!
//! ## Flash record
//!
//! ```text
//! postcard(CalibrationRecord { magic: "BCAL", version: 1, offsets }) ‖ crc32_le
//! ```
//!
//! The CRC covers the postcard bytes. A record that fails any check is
//! treated as absent.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::error::CalibrationError;
use crate::sensors::SensorChannel;

pub const CALIBRATION_NAMESPACE: &str = "brewos";
pub const CALIBRATION_KEY: &str = "cal";
pub const CALIBRATION_MAGIC: [u8; 4] = *b"BCAL";
pub const CALIBRATION_VERSION: u8 = 1;

/// Largest accepted NTC offset, °C.
pub const MAX_TEMPERATURE_OFFSET_C: f32 = 5.0;
/// Largest accepted pressure offset, bar.
pub const MAX_PRESSURE_OFFSET_BAR: f32 = 0.5;

const RECORD_BUF_LEN: usize = 64;

/// Offset bound for a channel, in the channel's unit.
pub const fn offset_bound(channel: SensorChannel) -> f32 {
    if channel.is_temperature() {
        MAX_TEMPERATURE_OFFSET_C
    } else {
        MAX_PRESSURE_OFFSET_BAR
    }
}

/// Single-point procedure: the offset that makes `measured` read `reference`.
pub fn offset_from_reference(
    channel: SensorChannel,
    reference: f32,
    measured: f32,
) -> Result<f32, CalibrationError> {
    if !reference.is_finite() || !measured.is_finite() {
        return Err(CalibrationError::NotFinite);
    }
    let offset = reference - measured;
    check_offset(channel, offset)?;
    Ok(offset)
}

fn check_offset(channel: SensorChannel, offset: f32) -> Result<(), CalibrationError> {
    if !offset.is_finite() {
        return Err(CalibrationError::NotFinite);
    }
    let bound = offset_bound(channel);
    if offset.abs() > bound {
        return Err(CalibrationError::OutOfBounds { bound });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Offset table
// ---------------------------------------------------------------------------

/// One optional offset per channel, indexed by [`SensorChannel::index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OffsetTable {
    offsets: [Option<f32>; 3],
}

impl OffsetTable {
    pub const EMPTY: Self = Self { offsets: [None; 3] };

    pub fn get(&self, channel: SensorChannel) -> Option<f32> {
        self.offsets[channel.index()]
    }

    pub fn apply(&self, channel: SensorChannel, raw: f32) -> f32 {
        raw + self.get(channel).unwrap_or(0.0)
    }

    fn with(mut self, channel: SensorChannel, offset: Option<f32>) -> Self {
        self.offsets[channel.index()] = offset;
        self
    }
}

#[derive(Serialize, Deserialize)]
struct CalibrationRecord {
    magic: [u8; 4],
    version: u8,
    offsets: [Option<f32>; 3],
}

/// Encode a table into its flash representation.
pub fn encode_record(table: &OffsetTable) -> Result<Vec<u8>, CalibrationError> {
    let record = CalibrationRecord {
        magic: CALIBRATION_MAGIC,
        version: CALIBRATION_VERSION,
        offsets: table.offsets,
    };
    let mut bytes = postcard::to_allocvec(&record).map_err(|_| CalibrationError::Corrupted)?;
    let crc = crc32(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());
    Ok(bytes)
}

/// Decode and verify a flash record.
pub fn decode_record(bytes: &[u8]) -> Result<OffsetTable, CalibrationError> {
    if bytes.len() < 4 {
        return Err(CalibrationError::Corrupted);
    }
    let (body, crc_bytes) = bytes.split_at(bytes.len() - 4);
    let stored = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    if crc32(body) != stored {
        return Err(CalibrationError::Corrupted);
    }
    let record: CalibrationRecord =
        postcard::from_bytes(body).map_err(|_| CalibrationError::Corrupted)?;
    if record.magic != CALIBRATION_MAGIC || record.version != CALIBRATION_VERSION {
        return Err(CalibrationError::Corrupted);
    }
    let table = OffsetTable {
        offsets: record.offsets,
    };
    // A record written by a build with looser bounds is still rejected.
    for ch in SensorChannel::ALL {
        if let Some(offset) = table.get(ch) {
            check_offset(ch, offset).map_err(|_| CalibrationError::Corrupted)?;
        }
    }
    Ok(table)
}

/// IEEE 802.3 CRC-32, bitwise.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Shared offset table. `const`-constructible so the board can keep it in a
/// `static` and read it from any context.
pub struct CalibrationStore {
    table: Mutex<CriticalSectionRawMutex, Cell<OffsetTable>>,
}

impl CalibrationStore {
    pub const fn new() -> Self {
        Self {
            table: Mutex::new(Cell::new(OffsetTable::EMPTY)),
        }
    }

    /// Consistent copy of every offset.
    pub fn table(&self) -> OffsetTable {
        self.table.lock(Cell::get)
    }

    pub fn offset(&self, channel: SensorChannel) -> Option<f32> {
        self.table().get(channel)
    }

    pub fn is_calibrated(&self, channel: SensorChannel) -> bool {
        self.offset(channel).is_some()
    }

    pub fn apply_offset(&self, channel: SensorChannel, raw: f32) -> f32 {
        self.table().apply(channel, raw)
    }

    /// Load the persisted table. A missing record leaves every channel
    /// uncalibrated; a corrupt one does too, and is reported.
    pub fn load(&self, storage: &impl StoragePort) -> Result<(), CalibrationError> {
        let mut buf = [0u8; RECORD_BUF_LEN];
        let len = match storage.read(CALIBRATION_NAMESPACE, CALIBRATION_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => {
                self.publish(OffsetTable::EMPTY);
                return Ok(());
            }
            Err(e) => {
                self.publish(OffsetTable::EMPTY);
                return Err(CalibrationError::Storage(e));
            }
        };
        match buf.get(..len).ok_or(CalibrationError::Corrupted).and_then(decode_record) {
            Ok(table) => {
                self.publish(table);
                info!("Calibration loaded: {:?}", table);
                Ok(())
            }
            Err(e) => {
                self.publish(OffsetTable::EMPTY);
                warn!("Calibration record rejected ({e}); running uncalibrated");
                Err(e)
            }
        }
    }

    /// Validate, persist, then publish. On any error the live table is
    /// unchanged.
    pub fn set_offset(
        &self,
        storage: &mut impl StoragePort,
        channel: SensorChannel,
        offset: f32,
    ) -> Result<(), CalibrationError> {
        check_offset(channel, offset)?;
        let next = self.table().with(channel, Some(offset));
        self.persist(storage, &next)?;
        self.publish(next);
        info!("Calibration {channel}: offset {offset:+.3}");
        Ok(())
    }

    pub fn clear_offset(
        &self,
        storage: &mut impl StoragePort,
        channel: SensorChannel,
    ) -> Result<(), CalibrationError> {
        let next = self.table().with(channel, None);
        self.persist(storage, &next)?;
        self.publish(next);
        info!("Calibration {channel}: cleared");
        Ok(())
    }

    fn persist(
        &self,
        storage: &mut impl StoragePort,
        table: &OffsetTable,
    ) -> Result<(), CalibrationError> {
        let bytes = encode_record(table)?;
        storage
            .write(CALIBRATION_NAMESPACE, CALIBRATION_KEY, &bytes)
            .map_err(CalibrationError::Storage)
    }

    fn publish(&self, table: OffsetTable) {
        self.table.lock(|cell| cell.set(table));
    }
}

impl Default for CalibrationStore {
    fn default() -> Self {
        Self::new()
    }
}
