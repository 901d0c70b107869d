//! Bit-banged single-wire bus.
//!
//! The data line is open-drain with an external pull-up: driving the pin
//! high releases the line, driving it low pulls it down. Bytes travel
//! least-significant bit first. Each write slot lasts ~132µs whatever the
//! bit value, each read slot ~73µs.
//!
//! Only the few microseconds around a signal edge run inside the
//! [`EdgeGuard`]; the rest of every slot is spent outside it so the rest of
//! the system keeps running while a long exchange is in progress.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::constants::*;

/// A GPIO line that can be sampled and switched between input and
/// open-drain output.
pub trait BidiPin: OutputPin + InputPin {
    /// Switch the pin to input mode.
    fn set_to_input(&mut self);
    /// Switch the pin back to open-drain output.
    fn set_to_output(&mut self);
}

/// Scoped critical section around timing-sensitive signal edges.
///
/// Implementations typically mask interrupts (or take a spinlock shared
/// with the interrupt handlers) for the duration of `f`.
pub trait EdgeGuard {
    fn critical<R>(&mut self, f: impl FnOnce() -> R) -> R;
}

/// Guard for hosts where nothing preempts the bus driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unguarded;

impl EdgeGuard for Unguarded {
    #[inline]
    fn critical<R>(&mut self, f: impl FnOnce() -> R) -> R {
        f()
    }
}

/// Byte-level transport over one open-drain pin.
///
/// pin operations do return Result, but a desynchronised or disconnected
/// bus can't be detected at this level anyway, so errors are dropped and
/// show up as garbage bits instead.
pub struct BusLink<P, D, G> {
    pin: P,
    delay: D,
    guard: G,
}

impl<P, D, G> BusLink<P, D, G>
where
    P: BidiPin,
    D: DelayNs,
    G: EdgeGuard,
{
    /// Take ownership of the pin and leave the line released.
    pub fn new(mut pin: P, delay: D, guard: G) -> Self {
        pin.set_to_output();
        let _ = pin.set_high();
        Self { pin, delay, guard }
    }

    /// Return the owned peripherals.
    pub fn free(self) -> (P, D, G) {
        (self.pin, self.delay, self.guard)
    }

    /// Reset the bus and report whether a device answered with a presence
    /// pulse. Returns false as well when the line never goes idle.
    pub fn reset(&mut self) -> bool {
        let _ = self.pin.set_high();
        self.pin.set_to_input();
        let mut retries = RESET_IDLE_RETRIES;
        loop {
            retries -= 1;
            if retries == 0 {
                self.pin.set_to_output();
                return false;
            }
            self.delay.delay_us(RESET_IDLE_POLL_US);
            if self.pin.is_high().unwrap_or(false) {
                break;
            }
        }
        self.pin.set_to_output();

        let pin = &mut self.pin;
        self.guard.critical(|| {
            let _ = pin.set_low();
        });
        self.delay.delay_us(RESET_PULSE_US);

        let (pin, delay) = (&mut self.pin, &mut self.delay);
        let present = self.guard.critical(|| {
            let _ = pin.set_high();
            delay.delay_us(PRESENCE_SAMPLE_US);
            pin.is_low().unwrap_or(false)
        });

        self.delay.delay_us(RESET_SLOT_REMAINDER_US);
        present
    }

    /// Write one byte, LSB first.
    pub fn write(&mut self, value: u8) {
        for bit in 0..8 {
            let one = value & (1 << bit) != 0;
            let (low_us, release_us) = if one {
                (WRITE_ONE_LOW_US, WRITE_ONE_RELEASE_US)
            } else {
                (WRITE_ZERO_LOW_US, WRITE_ZERO_RELEASE_US)
            };

            let (pin, delay) = (&mut self.pin, &mut self.delay);
            self.guard.critical(|| {
                let _ = pin.set_low();
                delay.delay_us(low_us);
                let _ = pin.set_high();
            });
            self.delay.delay_us(release_us);
        }
    }

    /// Read one byte, LSB first.
    pub fn read(&mut self) -> u8 {
        let mut value = 0u8;
        for bit in 0..8 {
            let (pin, delay) = (&mut self.pin, &mut self.delay);
            let high = self.guard.critical(|| {
                let _ = pin.set_low();
                delay.delay_us(READ_LOW_US);
                let _ = pin.set_high();
                delay.delay_us(READ_SAMPLE_US);
                pin.is_high().unwrap_or(false)
            });
            if high {
                value |= 1 << bit;
            }
            self.delay.delay_us(READ_RELEASE_US);
        }
        value
    }

    pub fn delay_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }

    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
