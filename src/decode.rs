//! Decoders for the controller's response formats.
//!
//! Everything here is pure: raw bytes in, `BatteryData` fields out. The
//! protocol engine does the bus work and hands the buffers over.

use crate::constants::*;
use crate::types::{BatteryData, LockStatus};

/// Length of the static response: ROM identifier followed by the static block.
pub const STATIC_RESPONSE_LEN: usize = ROM_ID_LEN + STATIC_BLOCK_LEN;

/// Exchange the high and low nibble of a byte.
///
/// Several numeric fields in the static block are stored this way.
#[inline]
pub fn nibble_swap(b: u8) -> u8 {
    b.rotate_left(4)
}

/// Rebuild the 12-bit charge cycle counter from its two nibble-swapped bytes.
pub fn charge_cycles(low: u8, high: u8) -> u16 {
    let low = nibble_swap(low) as u16;
    let high = nibble_swap(high) as u16;
    ((high << 8) | low) & 0x0FFF
}

/// Decode the static response (ROM identifier + static block).
///
/// Touches identity, capacity, status and lock fields, the charge cycle
/// count and the two counters stored in the static block.
pub fn decode_static(raw: &[u8; STATIC_RESPONSE_LEN], data: &mut BatteryData) {
    data.prod_date = format!("{:02}/{:02}/20{:02}", raw[2], raw[1], raw[0]);

    data.capacity = format!("{:.1}Ah", nibble_swap(raw[24]) as f32 / 10.0);
    data.battery_type = format!("{}V", nibble_swap(raw[19]));

    data.status_code_raw = raw[27] as u16;
    data.status_code_hex = format!("{:02X}", raw[27]);
    data.lock_status = LockStatus::from_code(raw[28]);

    data.charge_cycles = charge_cycles(raw[35], raw[36]);

    data.over_discharge = raw[37];
    data.over_load = raw[38];

    data.rom_id = hex::encode_upper(&raw[..ROM_ID_LEN]);
    data.serial = format!("{}{}", SERIAL_PREFIX, &data.rom_id[data.rom_id.len() - 6..]);
}

/// Decode the model probe response. Returns `None` when the controller
/// carries no model string.
pub fn decode_model(resp: &[u8]) -> Option<String> {
    match resp.first() {
        None | Some(&0x00) | Some(&REGISTER_ABSENT) => return None,
        _ => {}
    }
    let chars = &resp[..resp.len().min(MODEL_LEN)];
    let end = chars.iter().position(|&b| b == 0).unwrap_or(chars.len());
    Some(String::from_utf8_lossy(&chars[..end]).into_owned())
}

/// Build a model label from the F0513 probe bytes, `None` if absent.
pub fn f0513_model(resp: [u8; 2]) -> Option<String> {
    if resp[0] == REGISTER_ABSENT {
        return None;
    }
    Some(format!("BL{:02X}{:02X}", resp[1], resp[0]))
}

fn le_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

/// Spread between the highest and lowest plausible cell voltage.
///
/// Taps reading at or below [`MIN_PLAUSIBLE_CELL_V`] are skipped so an
/// unpopulated cell doesn't drag the minimum down.
pub fn cell_spread(cells: &[f32]) -> f32 {
    let plausible = cells.iter().copied().filter(|&v| v > MIN_PLAUSIBLE_CELL_V);
    let (min, max) = plausible.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max > min {
        max - min
    } else {
        0.0
    }
}

/// Decode the dynamic response. Touches voltages and temperatures 1 and 2.
pub fn decode_dynamic(raw: &[u8; DYNAMIC_RESPONSE_LEN], data: &mut BatteryData) {
    data.pack_voltage = le_u16(raw, 0) as f32 / 1000.0;
    for (i, cell) in data.cell_voltages.iter_mut().enumerate() {
        *cell = le_u16(raw, 2 + i * 2) as f32 / 1000.0;
    }
    data.cell_diff = cell_spread(&data.cell_voltages);
    data.temp1 = le_u16(raw, 14) as f32 / 100.0;
    data.temp2 = le_u16(raw, 16) as f32 / 100.0;
}

/// Hidden tree register readings. `None` marks an absent register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticRegisters {
    pub over_discharge: Option<u8>,
    pub over_load: Option<u8>,
    pub err_cnt_04: Option<u8>,
    pub err_cnt_05: Option<u8>,
    pub err_cnt_06: Option<u8>,
    pub err_cnt_07: Option<u8>,
    pub fuse: Option<u8>,
    pub fw_version: Option<u8>,
    pub temp3: Option<u8>,
}

/// Map a raw register byte to `None` when it is the absent sentinel.
#[inline]
pub fn register_value(raw: u8) -> Option<u8> {
    (raw != REGISTER_ABSENT).then_some(raw)
}

/// Whether the fuse marker indicates a blown software fuse.
///
/// Packs reporting status 0x60 set the marker while healthy, so that status
/// overrides it.
pub fn fuse_blown(marker: Option<u8>, status_code_raw: u16) -> bool {
    matches!(marker, Some(m) if m != 0) && status_code_raw != FUSE_ESCAPE_STATUS
}

/// Apply hidden tree readings. Touches the error counters, firmware version,
/// fuse flag and temperature 3; temperature 3 is kept when absent.
pub fn apply_diagnostics(regs: &DiagnosticRegisters, data: &mut BatteryData) {
    data.over_discharge = regs.over_discharge.unwrap_or(0);
    data.over_load = regs.over_load.unwrap_or(0);
    data.err_cnt_04 = regs.err_cnt_04.unwrap_or(0);
    data.err_cnt_05 = regs.err_cnt_05.unwrap_or(0);
    data.err_cnt_06 = regs.err_cnt_06.unwrap_or(0);
    data.err_cnt_07 = regs.err_cnt_07.unwrap_or(0);
    data.fw_ver = regs.fw_version.unwrap_or(0);
    if let Some(raw) = regs.temp3 {
        data.temp3 = raw as f32 - TEMP3_OFFSET;
    }
    data.fuse_blown = fuse_blown(regs.fuse, data.status_code_raw);
}
