use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lock classification of the pack, decoded from the low nibble of the
/// lock byte in the static block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStatus {
    #[default]
    Normal,
    PermanentFuseLock,
    OverTemperatureLock,
    OverDischargeLock,
}

impl LockStatus {
    /// Classify a lock code. Only the low nibble is significant; codes the
    /// firmware is not known to emit are reported as a permanent lock.
    pub fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0x00 => LockStatus::Normal,
            0x01 => LockStatus::OverDischargeLock,
            0x02 => LockStatus::OverTemperatureLock,
            _ => LockStatus::PermanentFuseLock,
        }
    }

    pub fn is_locked(self) -> bool {
        self != LockStatus::Normal
    }
}

/// Battery controller family, discovered during identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControllerVariant {
    Standard,
    F0513,
}

/// Commands the identified controller accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFeatures {
    pub read_dynamic: bool,
    pub led_test: bool,
    pub clear_errors: bool,
}

/// Decoded snapshot of one battery pack.
///
/// One long-lived instance is owned by the caller and passed into each read.
/// Every read overwrites only its own fields:
///
/// - static read: identity, capacity, status, lock, charge cycles and the
///   over-discharge/over-load counters recorded in the static block
/// - dynamic read: pack and cell voltages, cell spread, temperatures 1 and 2
/// - diagnostics: counters, firmware version, fuse flag and temperature 3
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatteryData {
    pub model: String,
    pub serial: String,
    pub rom_id: String,
    pub prod_date: String,
    pub capacity: String,
    pub battery_type: String,
    pub fw_ver: u8,

    pub pack_voltage: f32,
    pub cell_voltages: [f32; 5],
    pub cell_diff: f32,
    pub temp1: f32,
    pub temp2: f32,
    pub temp3: f32,

    pub charge_cycles: u16,

    pub status_code_raw: u16,
    pub status_code_hex: String,
    pub lock_status: LockStatus,

    pub over_discharge: u8,
    pub over_load: u8,
    pub err_cnt_04: u8,
    pub err_cnt_05: u8,
    pub err_cnt_06: u8,
    pub err_cnt_07: u8,
    pub fuse_blown: bool,
}

impl Default for BatteryData {
    fn default() -> Self {
        BatteryData {
            model: "N/A".to_string(),
            serial: "N/A".to_string(),
            rom_id: String::new(),
            prod_date: "N/A".to_string(),
            capacity: "N/A".to_string(),
            battery_type: "LXT".to_string(),
            fw_ver: 0,
            pack_voltage: 0.0,
            cell_voltages: [0.0; 5],
            cell_diff: 0.0,
            temp1: 0.0,
            temp2: 0.0,
            temp3: 0.0,
            charge_cycles: 0,
            status_code_raw: 0,
            status_code_hex: "00".to_string(),
            lock_status: LockStatus::Normal,
            over_discharge: 0,
            over_load: 0,
            err_cnt_04: 0,
            err_cnt_05: 0,
            err_cnt_06: 0,
            err_cnt_07: 0,
            fuse_blown: false,
        }
    }
}

impl BatteryData {
    /// Production date as a calendar date, if the static read produced one.
    pub fn production_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.prod_date, "%d/%m/%Y").ok()
    }

    /// One-line summary of the dynamic and diagnostic state.
    pub fn summary(&self) -> String {
        format!(
            "V1={:.2}V, T1={:.1}C, T2={:.1}C, T3={:.1}C, OD={}, OL={}, Err=[{},{},{},{}], Fuse={}",
            self.cell_voltages[0],
            self.temp1,
            self.temp2,
            self.temp3,
            self.over_discharge,
            self.over_load,
            self.err_cnt_04,
            self.err_cnt_05,
            self.err_cnt_06,
            self.err_cnt_07,
            if self.fuse_blown { "YES" } else { "NO" },
        )
    }
}
