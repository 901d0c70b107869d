//! Command framing on top of the byte transport.
//!
//! Two addressing conventions exist: broadcast (`0xCC`) reaches whatever
//! controller is on the bus, ROM-read (`0x33`) makes the controller send
//! its 8-byte ROM identifier before it accepts a command.

use embedded_hal::delay::DelayNs;

use crate::bus::{BidiPin, BusLink, EdgeGuard};
use crate::constants::*;
use crate::error::{BmsError, Result};

impl<P, D, G> BusLink<P, D, G>
where
    P: BidiPin,
    D: DelayNs,
    G: EdgeGuard,
{
    fn reset_and_wake(&mut self) -> Result<()> {
        if !self.reset() {
            return Err(BmsError::BusTimeout);
        }
        self.delay_us(WAKE_DELAY_US);
        Ok(())
    }

    fn write_spaced(&mut self, cmd: &[u8]) {
        for &b in cmd {
            self.write(b);
            self.delay_us(INTER_BYTE_US);
        }
    }

    fn read_spaced(&mut self, rsp: &mut [u8]) {
        for b in rsp.iter_mut() {
            *b = self.read();
            self.delay_us(INTER_BYTE_US);
        }
    }

    /// Broadcast-addressed exchange: write `cmd`, then fill `rsp`.
    pub fn broadcast_exchange(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<()> {
        self.reset_and_wake()?;
        self.write(BROADCAST_ADDR);
        self.write_spaced(cmd);
        self.read_spaced(rsp);
        Ok(())
    }

    /// ROM-read-addressed exchange. The ROM identifier is always read and
    /// returned, then `cmd` is written and `rsp` filled.
    pub fn rom_exchange(&mut self, cmd: &[u8], rsp: &mut [u8]) -> Result<[u8; ROM_ID_LEN]> {
        self.reset_and_wake()?;
        self.write(ROM_READ_ADDR);
        let mut rom = [0u8; ROM_ID_LEN];
        self.read_spaced(&mut rom);
        self.write_spaced(cmd);
        self.read_spaced(rsp);
        Ok(rom)
    }

    /// Single-register probe: broadcast address and register address
    /// written back to back, one byte read. `0xFF` means the register is
    /// absent or the read was missed; a missing presence pulse reads the same.
    pub fn probe_register(&mut self, address: u8) -> u8 {
        if !self.reset() {
            return REGISTER_ABSENT;
        }
        self.write(BROADCAST_ADDR);
        self.write(address);
        self.read()
    }
}
