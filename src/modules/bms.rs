//! SimpBMS battery monitor and charge safety gate.
//!
//! Cell voltage and temperature extremes arrive on `0x373`, the BMS charge
//! current limit on `0x351`. Every telemetry frame re-arms a freshness
//! countdown; once it runs out charging is refused and the published
//! values drop to zero so nothing downstream acts on stale extremes.

use super::{Module, ModuleContext};
use crate::frame::Frame;
use crate::params::{ParamId, ParamStore};
use core::any::Any;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const TELEMETRY_ID: u32 = 0x373;
pub const CHARGE_LIMIT_ID: u32 = 0x351;

/// Freshness ticks per configured timeout second (100 ms ticks).
const TICKS_PER_SECOND: i32 = 10;
const KELVIN_OFFSET: i32 = 273;

/// Charge limit below which charging is refused, compared against the raw
/// milliamp field.
pub const MIN_CHARGE_CURRENT_MA: u16 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatteryTelemetry {
    pub min_cell_voltage_v: f32,
    pub max_cell_voltage_v: f32,
    pub min_temp_c: f32,
    pub max_temp_c: f32,
    pub charge_current_limit_ma: u16,
    pub freshness_ticks: i32,
}

#[derive(Debug, Default)]
pub struct BatteryMonitor {
    telemetry: BatteryTelemetry,
    was_valid: bool,
}

impl BatteryMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn telemetry(&self) -> &BatteryTelemetry {
        &self.telemetry
    }

    pub fn freshness_ticks(&self) -> i32 {
        self.telemetry.freshness_ticks
    }

    pub fn is_data_valid(&self) -> bool {
        self.telemetry.freshness_ticks > 0
    }

    /// Limits are read from the parameter store on every call.
    pub fn is_charge_allowed(&self, params: &dyn ParamStore) -> bool {
        let t = &self.telemetry;
        self.is_data_valid()
            && t.max_cell_voltage_v <= params.get_float(ParamId::BmsVmaxLimit)
            && t.min_cell_voltage_v >= params.get_float(ParamId::BmsVminLimit)
            && t.max_temp_c <= params.get_float(ParamId::BmsTmaxLimit)
            && t.min_temp_c >= params.get_float(ParamId::BmsTminLimit)
            && t.charge_current_limit_ma >= MIN_CHARGE_CURRENT_MA
    }

    /// Allowed charge current in amps, 0 when charging is refused.
    pub fn max_charge_current_a(&self, params: &dyn ParamStore) -> f32 {
        if !self.is_charge_allowed(params) {
            return 0.0;
        }
        f32::from(self.telemetry.charge_current_limit_ma) / 1000.0
    }

    fn decode_telemetry(&mut self, frame: &Frame, params: &dyn ParamStore) {
        let (Some(min_cell), Some(max_cell), Some(min_temp), Some(max_temp)) = (
            frame.u16_le(0),
            frame.u16_le(2),
            frame.u16_le(4),
            frame.u16_le(6),
        ) else {
            debug!(len = frame.len(), "short BMS telemetry frame ignored");
            return;
        };

        let t = &mut self.telemetry;
        t.min_cell_voltage_v = f32::from(min_cell) / 1000.0;
        t.max_cell_voltage_v = f32::from(max_cell) / 1000.0;
        t.min_temp_c = (i32::from(min_temp) - KELVIN_OFFSET) as f32;
        t.max_temp_c = (i32::from(max_temp) - KELVIN_OFFSET) as f32;
        t.freshness_ticks = params
            .get_int(ParamId::BmsTimeout)
            .saturating_mul(TICKS_PER_SECOND)
            .max(0);

        debug!(
            min_v = t.min_cell_voltage_v,
            max_v = t.max_cell_voltage_v,
            min_c = t.min_temp_c,
            max_c = t.max_temp_c,
            "BMS telemetry"
        );
    }
}

impl Module for BatteryMonitor {
    fn name(&self) -> &'static str {
        "simp-bms"
    }

    fn subscriptions(&self) -> &'static [u32] {
        &[TELEMETRY_ID, CHARGE_LIMIT_ID]
    }

    fn decode(&mut self, frame: &Frame, ctx: &mut ModuleContext<'_>) {
        match frame.id() {
            TELEMETRY_ID => self.decode_telemetry(frame, &*ctx.params),
            CHARGE_LIMIT_ID => match frame.u16_le(2) {
                Some(limit) => self.telemetry.charge_current_limit_ma = limit,
                None => debug!(len = frame.len(), "short charge limit frame ignored"),
            },
            _ => {}
        }
    }

    fn task_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        if self.telemetry.freshness_ticks > 0 {
            self.telemetry.freshness_ticks -= 1;
        }

        let charge_limit = self.max_charge_current_a(&*ctx.params);
        ctx.params.set_float(ParamId::BmsChargeLim, charge_limit);

        let valid = self.is_data_valid();
        let t = if valid {
            self.telemetry
        } else {
            BatteryTelemetry::default()
        };
        ctx.params.set_float(ParamId::BmsVmin, t.min_cell_voltage_v);
        ctx.params.set_float(ParamId::BmsVmax, t.max_cell_voltage_v);
        ctx.params.set_float(ParamId::BmsTmin, t.min_temp_c);
        ctx.params.set_float(ParamId::BmsTmax, t.max_temp_c);

        if valid != self.was_valid {
            if valid {
                info!("BMS data valid");
            } else {
                warn!("BMS data timed out, charging disabled");
            }
            self.was_valid = valid;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
