//! Per-variant command and decode profiles.
//!
//! Both known controller families currently speak the same dialect for
//! everything after identification. The table still exists so a future
//! family can diverge by getting its own profile instead of a copy of the
//! engine code paths.

use crate::constants::*;
use crate::types::{ControllerVariant, SupportedFeatures};

/// Layout of the dynamic response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicLayout {
    /// Pack voltage, five cells, two temperatures, all little-endian
    Lxt,
}

/// Hidden tree register addresses probed during diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagnosticMap {
    pub over_discharge: u8,
    pub over_load: u8,
    pub err_cnt_04: u8,
    pub err_cnt_05: u8,
    pub err_cnt_06: u8,
    pub err_cnt_07: u8,
    pub fuse: u8,
    pub fw_version: u8,
    pub temp3: u8,
}

/// Commands and decode rules used once a controller is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantProfile {
    pub dynamic_cmd: [u8; 4],
    pub dynamic_layout: DynamicLayout,
    pub diagnostics: DiagnosticMap,
    pub diag_settle_ms: u32,
    pub unlock_cmd: [u8; 3],
    pub action_cmd: u8,
    /// Tag used in raw hex dumps
    pub trace_tag: &'static str,
}

const LXT_DIAGNOSTICS: DiagnosticMap = DiagnosticMap {
    over_discharge: reg::OVER_DISCHARGE,
    over_load: reg::OVER_LOAD,
    err_cnt_04: reg::ERR_CNT_04,
    err_cnt_05: reg::ERR_CNT_05,
    err_cnt_06: reg::ERR_CNT_06,
    err_cnt_07: reg::ERR_CNT_07,
    fuse: reg::FUSE,
    fw_version: reg::FW_VERSION,
    temp3: reg::TEMP3,
};

const STANDARD: VariantProfile = VariantProfile {
    dynamic_cmd: DYNAMIC_CMD,
    dynamic_layout: DynamicLayout::Lxt,
    diagnostics: LXT_DIAGNOSTICS,
    diag_settle_ms: HIDDEN_TREE_DIAG_SETTLE_MS,
    unlock_cmd: UNLOCK_CMD,
    action_cmd: ACTION_CMD,
    trace_tag: "STD",
};

const F0513: VariantProfile = VariantProfile {
    trace_tag: "F0513",
    ..STANDARD
};

impl ControllerVariant {
    pub fn profile(self) -> &'static VariantProfile {
        match self {
            ControllerVariant::Standard => &STANDARD,
            ControllerVariant::F0513 => &F0513,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControllerVariant::Standard => "STANDARD",
            ControllerVariant::F0513 => "F0513",
        }
    }
}

/// Outcome of controller identification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub variant: ControllerVariant,
    pub model: String,
    pub features: SupportedFeatures,
}

impl Identity {
    /// Controller answered the standard model probe.
    pub fn standard(model: String) -> Self {
        Self {
            variant: ControllerVariant::Standard,
            model,
            features: SupportedFeatures {
                read_dynamic: true,
                led_test: true,
                clear_errors: true,
            },
        }
    }

    /// Controller answered the F0513 probe in the hidden tree.
    pub fn f0513(model: String) -> Self {
        Self {
            variant: ControllerVariant::F0513,
            model,
            features: SupportedFeatures {
                read_dynamic: true,
                led_test: false,
                clear_errors: false,
            },
        }
    }

    /// Neither probe answered: talk to it as a standard controller but only
    /// allow reads.
    pub fn fallback() -> Self {
        Self {
            variant: ControllerVariant::Standard,
            model: GENERIC_MODEL.to_string(),
            features: SupportedFeatures {
                read_dynamic: true,
                led_test: false,
                clear_errors: false,
            },
        }
    }
}
