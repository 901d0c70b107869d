use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::bus::{BidiPin, BusLink, EdgeGuard};
use crate::config::BmsConfig;
use crate::constants::*;
use crate::decode::*;
use crate::error::{BmsError, Result};
use crate::logger::{LogCallback, LogLevel, Logger};
use crate::power::{power_off, PowerSession};
use crate::types::*;
use crate::variant::{DynamicLayout, Identity};

/// Main Makita battery interface
///
/// Owns the data pin (through the bus), the pack power-enable pin and the
/// identification state. Every operation runs to completion inside its own
/// power bracket; operations other than [`is_present`](Self::is_present),
/// [`read_static_data`](Self::read_static_data) and
/// [`identify`](Self::identify) are refused until the controller has been
/// identified.
pub struct MakitaBms<P, EN, D, G> {
    bus: BusLink<P, D, G>,
    enable: EN,
    config: BmsConfig,
    identity: Option<Identity>,
    logger: Logger,
    verify_reads: bool,
}

impl<P, EN, D, G> MakitaBms<P, EN, D, G>
where
    P: BidiPin,
    EN: OutputPin,
    D: DelayNs,
    G: EdgeGuard,
{
    /// Create a new interface. The pack is left unpowered.
    pub fn new(config: BmsConfig, data_pin: P, mut enable_pin: EN, delay: D, guard: G) -> Self {
        power_off(&mut enable_pin);
        let mut logger = Logger::new(config.log_level);
        logger.debug(&format!(
            "Battery interface on data pin {}, enable pin {}",
            config.onewire_pin, config.enable_pin
        ));
        Self {
            bus: BusLink::new(data_pin, delay, guard),
            enable: enable_pin,
            verify_reads: config.verify_reads,
            config,
            identity: None,
            logger,
        }
    }

    /// Return the owned peripherals.
    pub fn release(self) -> (P, EN, D, G) {
        let (pin, delay, guard) = self.bus.free();
        (pin, self.enable, delay, guard)
    }

    pub fn config(&self) -> &BmsConfig {
        &self.config
    }

    pub fn set_log_callback(&mut self, callback: LogCallback) {
        self.logger.set_callback(callback);
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.logger.set_level(level);
    }

    /// Enable/disable double reads of hidden registers
    pub fn set_verify_reads(&mut self, on: bool) {
        self.verify_reads = on;
        self.logger.info(&format!("Verified reads {}", if on { "on" } else { "off" }));
    }

    /// Controller family, once identified
    pub fn variant(&self) -> Option<ControllerVariant> {
        self.identity.as_ref().map(|id| id.variant)
    }

    /// Features of the identified controller; all off before identification
    pub fn features(&self) -> SupportedFeatures {
        self.identity
            .as_ref()
            .map(|id| id.features)
            .unwrap_or_default()
    }

    fn session(&self) -> Result<(ControllerVariant, SupportedFeatures)> {
        self.identity
            .as_ref()
            .map(|id| (id.variant, id.features))
            .ok_or(BmsError::Unidentified)
    }

    /// Check whether a pack answers a bus reset
    pub fn is_present(&mut self) -> bool {
        let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);
        let present = self.bus.reset();
        self.logger
            .debug(if present { "Presence pulse detected" } else { "No presence pulse" });
        present
    }

    /// Read identity, capacity and status, then identify the controller.
    ///
    /// Starts a new session: any previous identification is discarded
    /// first, so a failed read leaves the interface unidentified.
    pub fn read_static_data(&mut self, data: &mut BatteryData) -> Result<SupportedFeatures> {
        self.logger.info("--- Starting static data sync ---");
        self.identity = None;
        let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);

        let mut raw = [0u8; STATIC_RESPONSE_LEN];
        let rom = match self.bus.rom_exchange(&STATIC_CMD, &mut raw[ROM_ID_LEN..]) {
            Ok(rom) => rom,
            Err(e) => {
                self.logger.error("Reset failed");
                return Err(e);
            }
        };
        raw[..ROM_ID_LEN].copy_from_slice(&rom);
        self.logger.hex("RAW_STATIC: ", &raw);

        decode_static(&raw, data);

        let identity = identify_controller(&mut self.bus, &mut self.logger)?;
        data.model = identity.model.clone();
        let features = identity.features;
        self.logger.info(&format!(
            "Battery identified: {} ({})",
            identity.model,
            identity.variant.name()
        ));
        self.identity = Some(identity);
        Ok(features)
    }

    /// Identify the controller without reading the static block.
    ///
    /// Once identified, further calls return the cached identity without
    /// touching the bus.
    pub fn identify(&mut self, data: &mut BatteryData) -> Result<SupportedFeatures> {
        if let Some(identity) = &self.identity {
            data.model = identity.model.clone();
            return Ok(identity.features);
        }
        let identity = {
            let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);
            identify_controller(&mut self.bus, &mut self.logger)?
        };
        data.model = identity.model.clone();
        let features = identity.features;
        self.identity = Some(identity);
        Ok(features)
    }

    /// Read pack and cell voltages and temperatures 1 and 2
    pub fn read_dynamic_data(&mut self, data: &mut BatteryData) -> Result<()> {
        let (variant, features) = self.session()?;
        if !features.read_dynamic {
            return Err(BmsError::UnsupportedOperation {
                operation: "read_dynamic_data",
            });
        }
        let profile = variant.profile();
        let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);

        let mut raw = [0u8; DYNAMIC_RESPONSE_LEN];
        self.bus.broadcast_exchange(&profile.dynamic_cmd, &mut raw)?;
        self.logger
            .hex(&format!("RAW_DYN_{}: ", profile.trace_tag), &raw);

        match profile.dynamic_layout {
            DynamicLayout::Lxt => decode_dynamic(&raw, data),
        }
        Ok(())
    }

    /// Read the hidden register tree: error counters, firmware version,
    /// third temperature and the software fuse.
    ///
    /// Relies on `data.status_code_raw` from a previous static read to
    /// rule out healthy packs that set the fuse marker.
    pub fn read_advanced_diagnostics(&mut self, data: &mut BatteryData) -> Result<()> {
        let (variant, _) = self.session()?;
        let profile = variant.profile();
        let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);

        self.bus.broadcast_exchange(&ENTER_HIDDEN_TREE, &mut [])?;
        self.bus.delay_ms(profile.diag_settle_ms);

        let map = &profile.diagnostics;
        let verify = self.verify_reads;
        let (bus, logger) = (&mut self.bus, &mut self.logger);
        let mut read = |address| read_register(bus, logger, address, verify);
        let regs = DiagnosticRegisters {
            over_discharge: read(map.over_discharge),
            over_load: read(map.over_load),
            err_cnt_04: read(map.err_cnt_04),
            err_cnt_05: read(map.err_cnt_05),
            err_cnt_06: read(map.err_cnt_06),
            err_cnt_07: read(map.err_cnt_07),
            fuse: read(map.fuse),
            fw_version: read(map.fw_version),
            temp3: read(map.temp3),
        };

        apply_diagnostics(&regs, data);

        if let Some(fw) = regs.fw_version {
            self.logger.info(&format!(
                "[{}] Advanced diagnostic - FW: {:02X}, FuseRaw: {:02X}, Status: {:02X}",
                profile.trace_tag,
                fw,
                regs.fuse.unwrap_or(REGISTER_ABSENT),
                data.status_code_raw
            ));
        }

        self.bus.broadcast_exchange(&EXIT_HIDDEN_TREE, &mut [])?;
        Ok(())
    }

    /// Turn the pack's fuel gauge LEDs on or off
    pub fn led_test(&mut self, on: bool) -> Result<()> {
        let action = if on { ACTION_LED_ON } else { ACTION_LED_OFF };
        self.unlocked_action("led_test", |f| f.led_test, action)
    }

    /// Clear the pack's error counters
    pub fn clear_errors(&mut self) -> Result<()> {
        self.unlocked_action("clear_errors", |f| f.clear_errors, ACTION_CLEAR_ERRORS)
    }

    fn unlocked_action(
        &mut self,
        operation: &'static str,
        allowed: impl Fn(&SupportedFeatures) -> bool,
        action: u8,
    ) -> Result<()> {
        let (variant, features) = self.session()?;
        if !allowed(&features) {
            return Err(BmsError::UnsupportedOperation { operation });
        }
        let profile = variant.profile();
        let _power = PowerSession::acquire(&mut self.enable, &mut self.bus);

        let mut dummy = [0u8; ACTION_DUMMY_LEN];
        self.bus.rom_exchange(&profile.unlock_cmd, &mut dummy)?;
        self.bus
            .rom_exchange(&[profile.action_cmd, action], &mut dummy)?;
        self.logger
            .debug(&format!("{} sent (action 0x{:02X})", operation, action));
        Ok(())
    }
}

/// Probe the model string, then the F0513 label, then fall back to a
/// generic read-only identity.
fn identify_controller<P, D, G>(bus: &mut BusLink<P, D, G>, logger: &mut Logger) -> Result<Identity>
where
    P: BidiPin,
    D: DelayNs,
    G: EdgeGuard,
{
    let mut resp = [0u8; MODEL_RESPONSE_LEN];
    bus.broadcast_exchange(&MODEL_CMD, &mut resp)?;
    logger.hex("RAW_MODEL: ", &resp);
    if let Some(model) = decode_model(&resp) {
        return Ok(Identity::standard(model));
    }

    logger.debug("No standard model string, probing F0513");
    bus.broadcast_exchange(&ENTER_HIDDEN_TREE, &mut [])?;
    bus.delay_ms(HIDDEN_TREE_PROBE_SETTLE_MS);
    let mut label = [0u8; 2];
    bus.rom_exchange(&[F0513_MODEL_CMD], &mut label)?;
    bus.broadcast_exchange(&EXIT_HIDDEN_TREE, &mut [])?;
    if let Some(model) = f0513_model(label) {
        return Ok(Identity::f0513(model));
    }

    logger.warn("Unknown model string, forcing STANDARD mode");
    Ok(Identity::fallback())
}

/// Read one hidden register, twice when verifying. Disagreeing readings
/// are treated like an absent register.
fn read_register<P, D, G>(
    bus: &mut BusLink<P, D, G>,
    logger: &mut Logger,
    address: u8,
    verify: bool,
) -> Option<u8>
where
    P: BidiPin,
    D: DelayNs,
    G: EdgeGuard,
{
    let first = bus.probe_register(address);
    if verify {
        let second = bus.probe_register(address);
        if first != second {
            logger.warn(&format!(
                "Register 0x{:02X} unstable: {:02X} != {:02X}",
                address, first, second
            ));
            return None;
        }
    }
    register_value(first)
}
