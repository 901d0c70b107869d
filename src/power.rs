//! Pack power bracket.
//!
//! The pack's regulator is switched through an NPN stage on the enable pin:
//! driving the pin low powers the pack, high cuts it. The pack stays powered
//! exactly as long as a [`PowerSession`] is alive.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bus::{BidiPin, BusLink, EdgeGuard};
use crate::constants::POWER_SETTLE_MS;

/// Keeps the pack powered; dropping it powers the pack down again.
pub struct PowerSession<'a, EN: OutputPin> {
    enable: &'a mut EN,
}

impl<'a, EN: OutputPin> PowerSession<'a, EN> {
    /// Power the pack and wait for the regulator to settle.
    pub fn acquire<P, D, G>(enable: &'a mut EN, bus: &mut BusLink<P, D, G>) -> Self
    where
        P: BidiPin,
        D: DelayNs,
        G: EdgeGuard,
    {
        let _ = enable.set_low();
        bus.delay_ms(POWER_SETTLE_MS);
        Self { enable }
    }
}

impl<EN: OutputPin> Drop for PowerSession<'_, EN> {
    fn drop(&mut self) {
        let _ = self.enable.set_high();
    }
}

/// Drive the enable pin to its inactive level.
pub fn power_off<EN: OutputPin>(enable: &mut EN) {
    let _ = enable.set_high();
}
