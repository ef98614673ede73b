use crate::error::VcuResult;
use crate::modules::{
    BatteryMonitor, ChargerLink, GearShifter, InstrumentCluster, ModuleRegistry, OpenInverter,
};
use crate::params::{OpMode, ParamId, ParamStore};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_VMAX_LIMIT: f32 = 4.2;
const DEFAULT_VMIN_LIMIT: f32 = 3.0;
const DEFAULT_TMAX_LIMIT: f32 = 50.0;
const DEFAULT_TMIN_LIMIT: f32 = 5.0;
const DEFAULT_BMS_TIMEOUT_S: i32 = 10;

/// Charge safety limits for the battery monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryLimits {
    pub max_cell_voltage_v: f32,
    pub min_cell_voltage_v: f32,
    pub max_temp_c: f32,
    pub min_temp_c: f32,
    pub timeout_s: i32,
}

impl Default for BatteryLimits {
    fn default() -> Self {
        Self {
            max_cell_voltage_v: DEFAULT_VMAX_LIMIT,
            min_cell_voltage_v: DEFAULT_VMIN_LIMIT,
            max_temp_c: DEFAULT_TMAX_LIMIT,
            min_temp_c: DEFAULT_TMIN_LIMIT,
            timeout_s: DEFAULT_BMS_TIMEOUT_S,
        }
    }
}

/// Which emulated modules are installed on this vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSelection {
    pub shifter: bool,
    pub bms: bool,
    pub cluster: bool,
    pub inverter: bool,
    pub charger: bool,
}

impl Default for ModuleSelection {
    fn default() -> Self {
        Self {
            shifter: true,
            bms: true,
            cluster: false,
            inverter: true,
            charger: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VcuConfig {
    pub op_mode: OpMode,
    pub transmission: bool,
    pub battery: BatteryLimits,
    pub modules: ModuleSelection,
}

impl Default for VcuConfig {
    fn default() -> Self {
        Self {
            op_mode: OpMode::Off,
            transmission: false,
            battery: BatteryLimits::default(),
            modules: ModuleSelection::default(),
        }
    }
}

impl VcuConfig {
    pub fn from_json_str(json: &str) -> VcuResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> VcuResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Seeds the parameter store with the configured values.
    pub fn apply(&self, params: &mut dyn ParamStore) {
        params.set_int(ParamId::OpMode, self.op_mode as i32);
        params.set_bool(ParamId::Transmission, self.transmission);
        params.set_float(ParamId::BmsVmaxLimit, self.battery.max_cell_voltage_v);
        params.set_float(ParamId::BmsVminLimit, self.battery.min_cell_voltage_v);
        params.set_float(ParamId::BmsTmaxLimit, self.battery.max_temp_c);
        params.set_float(ParamId::BmsTminLimit, self.battery.min_temp_c);
        params.set_int(ParamId::BmsTimeout, self.battery.timeout_s);
    }

    pub fn build_registry(&self) -> VcuResult<ModuleRegistry> {
        let mut registry = ModuleRegistry::new();
        let m = &self.modules;
        if m.shifter {
            registry.add(Box::new(GearShifter::new()))?;
        }
        if m.bms {
            registry.add(Box::new(BatteryMonitor::new()))?;
        }
        if m.cluster {
            registry.add(Box::new(InstrumentCluster::new()))?;
        }
        if m.inverter {
            registry.add(Box::new(OpenInverter::new()))?;
        }
        if m.charger {
            registry.add(Box::new(ChargerLink::new()))?;
        }
        Ok(registry)
    }
}
