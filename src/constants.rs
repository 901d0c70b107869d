//! Protocol constants for Makita battery communication.
//!
//! This module defines the addressing bytes, command bytes, register
//! addresses and timing parameters used on the single-wire bus.

/// Broadcast addressing byte (targets whichever controller is on the bus)
pub const BROADCAST_ADDR: u8 = 0xCC;

/// ROM-read addressing byte (controller answers with its 8-byte ROM first)
pub const ROM_READ_ADDR: u8 = 0x33;

/// Length of the ROM identifier returned under ROM-read addressing
pub const ROM_ID_LEN: usize = 8;

/// Static block read command, sent under ROM-read addressing
pub const STATIC_CMD: [u8; 2] = [0xAA, 0x00];

/// Length of the static block following the ROM identifier
pub const STATIC_BLOCK_LEN: usize = 32;

/// Model string probe command
pub const MODEL_CMD: [u8; 2] = [0xDC, 0x0C];

/// Bytes returned by the model probe
pub const MODEL_RESPONSE_LEN: usize = 16;

/// Characters of the model string carried in the model response
pub const MODEL_LEN: usize = 7;

/// Dynamic data command
pub const DYNAMIC_CMD: [u8; 4] = [0xD7, 0x00, 0x00, 0xFF];

/// Bytes returned by the dynamic data command
pub const DYNAMIC_RESPONSE_LEN: usize = 29;

/// Enters the hidden register tree
pub const ENTER_HIDDEN_TREE: [u8; 1] = [0x99];

/// Leaves the hidden register tree
pub const EXIT_HIDDEN_TREE: [u8; 2] = [0xF0, 0x00];

/// F0513 model probe, issued inside the hidden tree
pub const F0513_MODEL_CMD: u8 = 0x31;

/// Unlock sequence preceding LED test and clear errors
pub const UNLOCK_CMD: [u8; 3] = [0xD9, 0x96, 0xA5];

/// Action command prefix
pub const ACTION_CMD: u8 = 0xDA;

/// Action byte: LEDs on
pub const ACTION_LED_ON: u8 = 0x31;

/// Action byte: LEDs off
pub const ACTION_LED_OFF: u8 = 0x34;

/// Action byte: clear error counters
pub const ACTION_CLEAR_ERRORS: u8 = 0x04;

/// Bytes clocked out (and discarded) after unlock and action commands
pub const ACTION_DUMMY_LEN: usize = 9;

/// Sentinel returned by an absent register or a missed read
pub const REGISTER_ABSENT: u8 = 0xFF;

/// Raw status code of healthy packs that still set the fuse marker
pub const FUSE_ESCAPE_STATUS: u16 = 0x60;

/// Offset the controller adds to the third temperature sensor
pub const TEMP3_OFFSET: f32 = 100.0;

/// Cells below this voltage are treated as unpopulated taps
pub const MIN_PLAUSIBLE_CELL_V: f32 = 0.5;

/// Prefix of the serial number synthesized from the ROM identifier
pub const SERIAL_PREFIX: &str = "ID-";

/// Model reported when no probe produced one
pub const GENERIC_MODEL: &str = "GENERIC_MAKITA";

/// Hidden tree register addresses
pub mod reg {
    pub const ERR_CNT_04: u8 = 0x04;
    pub const ERR_CNT_05: u8 = 0x05;
    pub const ERR_CNT_06: u8 = 0x06;
    pub const ERR_CNT_07: u8 = 0x07;
    pub const OVER_DISCHARGE: u8 = 0x08;
    pub const OVER_LOAD: u8 = 0x09;
    pub const TEMP3: u8 = 0x0A;
    pub const FUSE: u8 = 0x0C;
    pub const FW_VERSION: u8 = 0x32;
}

/// Polls of the idle line before a reset gives up
pub const RESET_IDLE_RETRIES: u8 = 125;

/// Interval between idle-line polls
pub const RESET_IDLE_POLL_US: u32 = 2;

/// Reset pulse duration
pub const RESET_PULSE_US: u32 = 750;

/// Delay from releasing the reset pulse to sampling presence
pub const PRESENCE_SAMPLE_US: u32 = 70;

/// Remainder of the reset time slot after sampling presence
pub const RESET_SLOT_REMAINDER_US: u32 = 410;

/// Low time when writing a 1 bit
pub const WRITE_ONE_LOW_US: u32 = 12;

/// Slot remainder after writing a 1 bit
pub const WRITE_ONE_RELEASE_US: u32 = 120;

/// Low time when writing a 0 bit
pub const WRITE_ZERO_LOW_US: u32 = 100;

/// Slot remainder after writing a 0 bit
pub const WRITE_ZERO_RELEASE_US: u32 = 30;

/// Low time opening a read slot
pub const READ_LOW_US: u32 = 10;

/// Delay from releasing the line to sampling a read bit
pub const READ_SAMPLE_US: u32 = 10;

/// Slot remainder after sampling a read bit
pub const READ_RELEASE_US: u32 = 53;

/// Wake-up delay between reset and the addressing byte
pub const WAKE_DELAY_US: u32 = 400;

/// Gap between consecutive command or response bytes
pub const INTER_BYTE_US: u32 = 90;

/// Regulator settling time after driving the enable line
pub const POWER_SETTLE_MS: u32 = 400;

/// Settling time after entering the hidden tree for the model probe
pub const HIDDEN_TREE_PROBE_SETTLE_MS: u32 = 100;

/// Settling time after entering the hidden tree for diagnostics
pub const HIDDEN_TREE_DIAG_SETTLE_MS: u32 = 150;
