//! Simulated battery pack for tests.
//!
//! Models the open-drain line at nanosecond resolution: the fake delay
//! advances a shared clock, the fake pin records the host's edges, and a
//! small controller state machine decodes write slots, answers read slots
//! and emits presence pulses the way a pack does.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::bus::{BidiPin, BusLink, EdgeGuard};
use crate::config::BmsConfig;
use crate::constants::*;
use crate::protocol::MakitaBms;

const US: u64 = 1_000;
const MS: u64 = 1_000_000;

/// Low pulses at least this long reset the controller
const RESET_MIN: u64 = 480 * US;
/// Write slots released before this are ones
const WRITE_ONE_MAX: u64 = 50 * US;
/// How long the controller holds the line when sending a zero
const TX_ZERO_HOLD: u64 = 45 * US;
const PRESENCE_DELAY: u64 = 15 * US;
const PRESENCE_LEN: u64 = 120 * US;

pub type SimBus = BusLink<SimPin, SimDelay, SimGuard>;
pub type SimBms = MakitaBms<SimPin, SimEnable, SimDelay, SimGuard>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Address,
    Command,
}

struct Pack {
    now: u64,
    host_low: bool,
    low_since: u64,
    slot_is_tx: bool,
    device_low_until: u64,
    presence: (u64, u64),

    connected: bool,
    stuck_low: bool,
    power_gated: bool,
    powered: bool,
    powered_at: u64,
    power_history: Vec<bool>,
    early_traffic: bool,

    phase: Phase,
    rx_byte: u8,
    rx_bits: u8,
    tx: VecDeque<u8>,
    tx_bit: u8,
    pending: Vec<u8>,
    received: Vec<u8>,
    resets: usize,
    hidden: bool,
    hidden_probe_seen: bool,
    unlocked: bool,
    actions: Vec<u8>,

    rom: [u8; ROM_ID_LEN],
    static_block: [u8; STATIC_BLOCK_LEN],
    model: Option<[u8; MODEL_RESPONSE_LEN]>,
    f0513: Option<[u8; 2]>,
    dynamic: [u8; DYNAMIC_RESPONSE_LEN],
    registers: HashMap<u8, Vec<u8>>,
    register_reads: HashMap<u8, usize>,

    critical_depth: u32,
    critical_since: u64,
    critical_sections: usize,
    longest_critical: u64,
}

impl Pack {
    fn responding(&self) -> bool {
        self.connected && (!self.power_gated || self.powered)
    }

    fn line_high(&self) -> bool {
        if self.stuck_low || self.host_low {
            return false;
        }
        if self.now < self.device_low_until {
            return false;
        }
        !(self.presence.0 <= self.now && self.now < self.presence.1)
    }

    fn host_low(&mut self) {
        if self.host_low {
            return;
        }
        self.host_low = true;
        self.low_since = self.now;
        self.slot_is_tx = false;
        if !self.responding() || self.tx.is_empty() {
            return;
        }
        self.slot_is_tx = true;
        let bit = (self.tx[0] >> self.tx_bit) & 1;
        if bit == 0 {
            self.device_low_until = self.now + TX_ZERO_HOLD;
        }
        self.tx_bit += 1;
        if self.tx_bit == 8 {
            self.tx_bit = 0;
            self.tx.pop_front();
        }
    }

    fn host_release(&mut self) {
        if !self.host_low {
            return;
        }
        self.host_low = false;
        if !self.responding() {
            return;
        }
        let held = self.now - self.low_since;
        if held >= RESET_MIN {
            self.reset();
        } else if !self.slot_is_tx {
            self.receive_bit(held < WRITE_ONE_MAX);
        }
    }

    fn reset(&mut self) {
        self.resets += 1;
        if self.power_gated && self.now - self.powered_at < u64::from(POWER_SETTLE_MS) * MS {
            self.early_traffic = true;
        }
        self.phase = Phase::Address;
        self.rx_byte = 0;
        self.rx_bits = 0;
        self.tx.clear();
        self.tx_bit = 0;
        self.pending.clear();
        self.presence = (self.now + PRESENCE_DELAY, self.now + PRESENCE_DELAY + PRESENCE_LEN);
    }

    fn receive_bit(&mut self, one: bool) {
        if one {
            self.rx_byte |= 1 << self.rx_bits;
        }
        self.rx_bits += 1;
        if self.rx_bits == 8 {
            let byte = self.rx_byte;
            self.rx_byte = 0;
            self.rx_bits = 0;
            self.receive_byte(byte);
        }
    }

    fn receive_byte(&mut self, byte: u8) {
        match self.phase {
            Phase::Idle => {}
            Phase::Address => {
                self.received.push(byte);
                self.phase = match byte {
                    BROADCAST_ADDR => Phase::Command,
                    ROM_READ_ADDR => {
                        self.tx.extend(self.rom);
                        Phase::Command
                    }
                    _ => Phase::Idle,
                };
            }
            Phase::Command => {
                self.received.push(byte);
                self.pending.push(byte);
                self.command();
            }
        }
    }

    fn command(&mut self) {
        let done = match (self.pending[0], self.pending.len()) {
            (0xAA, 2) => {
                self.tx.extend(self.static_block);
                true
            }
            (0xDC, 2) => {
                self.tx.extend(self.model.unwrap_or([0x00; MODEL_RESPONSE_LEN]));
                true
            }
            (0xD7, 4) => {
                self.tx.extend(self.dynamic);
                true
            }
            (0x99, 1) => {
                self.hidden = true;
                true
            }
            (0xF0, 2) => {
                self.hidden = false;
                true
            }
            (0xD9, 3) => {
                self.unlocked = self.pending[..] == UNLOCK_CMD;
                true
            }
            (0xDA, 2) => {
                if self.unlocked {
                    self.actions.push(self.pending[1]);
                }
                self.unlocked = false;
                true
            }
            // multi-byte commands still waiting for arguments
            (0xAA | 0xDC | 0xD7 | 0xF0 | 0xD9 | 0xDA, _) => false,
            (F0513_MODEL_CMD, 1) if self.hidden => {
                self.hidden_probe_seen = true;
                if let Some(label) = self.f0513 {
                    self.tx.extend(label);
                }
                true
            }
            (address, 1) if self.hidden => {
                if let Some(values) = self.registers.get(&address) {
                    let count = self.register_reads.entry(address).or_insert(0);
                    self.tx.push_back(values[*count % values.len()]);
                    *count += 1;
                }
                true
            }
            _ => true,
        };
        if done {
            self.phase = Phase::Idle;
        }
    }
}

/// Handle to a simulated pack. Clones share the same pack.
#[derive(Clone)]
pub struct SimPack {
    inner: Rc<RefCell<Pack>>,
}

impl SimPack {
    /// A healthy standard pack with model "BL1850B" and no hidden registers.
    pub fn new() -> Self {
        let mut model = [0u8; MODEL_RESPONSE_LEN];
        model[..7].copy_from_slice(b"BL1850B");
        let pack = Pack {
            now: 0,
            host_low: false,
            low_since: 0,
            slot_is_tx: false,
            device_low_until: 0,
            presence: (0, 0),
            connected: true,
            stuck_low: false,
            power_gated: false,
            powered: false,
            powered_at: 0,
            power_history: Vec::new(),
            early_traffic: false,
            phase: Phase::Idle,
            rx_byte: 0,
            rx_bits: 0,
            tx: VecDeque::new(),
            tx_bit: 0,
            pending: Vec::new(),
            received: Vec::new(),
            resets: 0,
            hidden: false,
            hidden_probe_seen: false,
            unlocked: false,
            actions: Vec::new(),
            rom: [0x13, 0x06, 0x1B, 0x00, 0xA1, 0xB2, 0xC3, 0xD4],
            static_block: [0u8; STATIC_BLOCK_LEN],
            model: Some(model),
            f0513: None,
            dynamic: [0u8; DYNAMIC_RESPONSE_LEN],
            registers: HashMap::new(),
            register_reads: HashMap::new(),
            critical_depth: 0,
            critical_since: 0,
            critical_sections: 0,
            longest_critical: 0,
        };
        Self {
            inner: Rc::new(RefCell::new(pack)),
        }
    }

    /// Bus attached to this pack's data line.
    pub fn bus(&self) -> SimBus {
        BusLink::new(self.data_pin(), self.delay(), self.guard())
    }

    /// Engine with default configuration, wired to this pack.
    pub fn bms(&self) -> SimBms {
        MakitaBms::new(
            BmsConfig::default(),
            self.data_pin(),
            self.enable_pin(),
            self.delay(),
            self.guard(),
        )
    }

    pub fn data_pin(&self) -> SimPin {
        SimPin { pack: self.clone() }
    }

    /// Enable pin; once created the pack only answers while powered.
    pub fn enable_pin(&self) -> SimEnable {
        self.inner.borrow_mut().power_gated = true;
        SimEnable { pack: self.clone() }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay { pack: self.clone() }
    }

    pub fn guard(&self) -> SimGuard {
        SimGuard { pack: self.clone() }
    }

    pub fn set_rom(&self, rom: [u8; ROM_ID_LEN]) {
        self.inner.borrow_mut().rom = rom;
    }

    pub fn set_static_block(&self, block: [u8; STATIC_BLOCK_LEN]) {
        self.inner.borrow_mut().static_block = block;
    }

    /// Model string answered to the model probe; `None` answers zeros.
    pub fn set_model(&self, model: Option<&str>) {
        self.inner.borrow_mut().model = model.map(|m| {
            let mut resp = [0u8; MODEL_RESPONSE_LEN];
            resp[..m.len()].copy_from_slice(m.as_bytes());
            resp
        });
    }

    pub fn set_f0513_model(&self, label: Option<[u8; 2]>) {
        self.inner.borrow_mut().f0513 = label;
    }

    pub fn set_dynamic(&self, raw: [u8; DYNAMIC_RESPONSE_LEN]) {
        self.inner.borrow_mut().dynamic = raw;
    }

    pub fn set_register(&self, address: u8, value: u8) {
        self.set_register_sequence(address, &[value]);
    }

    /// Register answering the given values in turn.
    pub fn set_register_sequence(&self, address: u8, values: &[u8]) {
        self.inner
            .borrow_mut()
            .registers
            .insert(address, values.to_vec());
    }

    pub fn disconnect(&self) {
        self.inner.borrow_mut().connected = false;
    }

    pub fn hold_line_low(&self) {
        self.inner.borrow_mut().stuck_low = true;
    }

    pub fn now_us(&self) -> u64 {
        self.inner.borrow().now / US
    }

    pub fn resets(&self) -> usize {
        self.inner.borrow().resets
    }

    /// Bytes the controller received while addressed.
    pub fn received(&self) -> Vec<u8> {
        self.inner.borrow().received.clone()
    }

    pub fn actions(&self) -> Vec<u8> {
        self.inner.borrow().actions.clone()
    }

    pub fn powered(&self) -> bool {
        self.inner.borrow().powered
    }

    pub fn power_history(&self) -> Vec<bool> {
        self.inner.borrow().power_history.clone()
    }

    /// No reset arrived before the regulator had settled.
    pub fn settled_before_traffic(&self) -> bool {
        !self.inner.borrow().early_traffic
    }

    pub fn in_hidden_tree(&self) -> bool {
        self.inner.borrow().hidden
    }

    pub fn hidden_probe_seen(&self) -> bool {
        self.inner.borrow().hidden_probe_seen
    }

    pub fn critical_sections(&self) -> usize {
        self.inner.borrow().critical_sections
    }

    pub fn longest_critical_us(&self) -> u64 {
        self.inner.borrow().longest_critical / US
    }
}

pub struct SimPin {
    pack: SimPack,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.pack.inner.borrow_mut().host_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.pack.inner.borrow_mut().host_release();
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pack.inner.borrow().line_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.pack.inner.borrow().line_high())
    }
}

impl BidiPin for SimPin {
    fn set_to_input(&mut self) {
        self.pack.inner.borrow_mut().host_release();
    }

    fn set_to_output(&mut self) {}
}

pub struct SimEnable {
    pack: SimPack,
}

impl ErrorType for SimEnable {
    type Error = Infallible;
}

impl OutputPin for SimEnable {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        let mut pack = self.pack.inner.borrow_mut();
        if !pack.powered {
            pack.powered_at = pack.now;
        }
        pack.powered = true;
        pack.power_history.push(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        let mut pack = self.pack.inner.borrow_mut();
        pack.powered = false;
        pack.hidden = false;
        pack.power_history.push(false);
        Ok(())
    }
}

pub struct SimDelay {
    pack: SimPack,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.pack.inner.borrow_mut().now += u64::from(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.pack.inner.borrow_mut().now += u64::from(us) * US;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.pack.inner.borrow_mut().now += u64::from(ms) * MS;
    }
}

/// Guard that measures how long each critical section lasts.
pub struct SimGuard {
    pack: SimPack,
}

impl EdgeGuard for SimGuard {
    fn critical<R>(&mut self, f: impl FnOnce() -> R) -> R {
        {
            let mut pack = self.pack.inner.borrow_mut();
            if pack.critical_depth == 0 {
                pack.critical_since = pack.now;
            }
            pack.critical_depth += 1;
        }
        let result = f();
        let mut pack = self.pack.inner.borrow_mut();
        pack.critical_depth -= 1;
        if pack.critical_depth == 0 {
            let held = pack.now - pack.critical_since;
            pack.critical_sections += 1;
            pack.longest_critical = pack.longest_critical.max(held);
        }
        result
    }
}
