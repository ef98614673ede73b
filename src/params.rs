//! Parameter store seam.
//!
//! Modules interoperate with the rest of the control system only through
//! named scalar parameters. Last write wins; there is no ordering between
//! writers within a tick.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl ParamValue {
    pub fn as_int(self) -> i32 {
        match self {
            ParamValue::Int(v) => v,
            ParamValue::Float(v) => v as i32,
            ParamValue::Bool(v) => i32::from(v),
        }
    }

    pub fn as_float(self) -> f32 {
        match self {
            ParamValue::Int(v) => v as f32,
            ParamValue::Float(v) => v,
            ParamValue::Bool(v) => f32::from(u8::from(v)),
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            ParamValue::Int(v) => v != 0,
            ParamValue::Float(v) => v != 0.0,
            ParamValue::Bool(v) => v,
        }
    }
}

/// System-wide operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpMode {
    Off = 0,
    Run = 1,
    Precharge = 2,
    PrechargeFail = 3,
    Charge = 4,
}

impl OpMode {
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(OpMode::Off),
            1 => Some(OpMode::Run),
            2 => Some(OpMode::Precharge),
            3 => Some(OpMode::PrechargeFail),
            4 => Some(OpMode::Charge),
            _ => None,
        }
    }
}

/// Charger input type published by the charge control logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargeType {
    Off = 0,
    Ac = 1,
    Dcfc = 2,
}

macro_rules! param_ids {
    ($($name:ident => $default:expr,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ParamId {
            $($name,)*
        }

        impl ParamId {
            pub const ALL: &'static [ParamId] = &[$(ParamId::$name,)*];
            pub const COUNT: usize = Self::ALL.len();

            pub fn default_value(self) -> ParamValue {
                match self {
                    $(ParamId::$name => $default,)*
                }
            }
        }
    };
}

param_ids! {
    // System state
    OpMode => ParamValue::Int(OpMode::Off as i32),
    Dir => ParamValue::Int(0),
    T15Stat => ParamValue::Bool(false),
    Transmission => ParamValue::Bool(false),
    Udc => ParamValue::Int(0),
    VehSpeed => ParamValue::Float(0.0),

    // Driver inputs
    DinForward => ParamValue::Bool(false),
    DinReverse => ParamValue::Bool(false),
    DinBrake => ParamValue::Bool(false),
    Pot => ParamValue::Int(0),
    Pot2 => ParamValue::Int(0),
    CanCtr => ParamValue::Int(0),
    CruiseSpeed => ParamValue::Int(0),
    Torque => ParamValue::Int(0),

    // Charging
    ChargeType => ParamValue::Int(ChargeType::Off as i32),
    VoltSetpoint => ParamValue::Int(0),
    PwrSetpoint => ParamValue::Int(0),

    // Battery limits (inputs)
    BmsVmaxLimit => ParamValue::Float(4.2),
    BmsVminLimit => ParamValue::Float(3.0),
    BmsTmaxLimit => ParamValue::Float(50.0),
    BmsTminLimit => ParamValue::Float(5.0),
    BmsTimeout => ParamValue::Int(10),

    // Battery telemetry (outputs)
    BmsVmin => ParamValue::Float(0.0),
    BmsVmax => ParamValue::Float(0.0),
    BmsTmin => ParamValue::Float(0.0),
    BmsTmax => ParamValue::Float(0.0),
    BmsChargeLim => ParamValue::Float(0.0),
}

pub trait ParamStore {
    fn get(&self, id: ParamId) -> ParamValue;
    fn set(&mut self, id: ParamId, value: ParamValue);

    fn get_int(&self, id: ParamId) -> i32 {
        self.get(id).as_int()
    }

    fn get_float(&self, id: ParamId) -> f32 {
        self.get(id).as_float()
    }

    fn get_bool(&self, id: ParamId) -> bool {
        self.get(id).as_bool()
    }

    fn set_int(&mut self, id: ParamId, value: i32) {
        self.set(id, ParamValue::Int(value));
    }

    fn set_float(&mut self, id: ParamId, value: f32) {
        self.set(id, ParamValue::Float(value));
    }

    fn set_bool(&mut self, id: ParamId, value: bool) {
        self.set(id, ParamValue::Bool(value));
    }

    /// Unknown raw modes read as `Off`.
    fn op_mode(&self) -> OpMode {
        OpMode::from_raw(self.get_int(ParamId::OpMode)).unwrap_or(OpMode::Off)
    }
}

/// Fixed-size in-memory parameter table.
#[derive(Debug, Clone)]
pub struct ParamTable {
    values: [ParamValue; ParamId::COUNT],
}

impl ParamTable {
    pub fn new() -> Self {
        let mut values = [ParamValue::Int(0); ParamId::COUNT];
        for id in ParamId::ALL {
            values[*id as usize] = id.default_value();
        }
        Self { values }
    }

    pub fn set_op_mode(&mut self, mode: OpMode) {
        self.set_int(ParamId::OpMode, mode as i32);
    }

    pub fn snapshot(&self) -> alloc::vec::Vec<(ParamId, ParamValue)> {
        ParamId::ALL
            .iter()
            .map(|id| (*id, self.values[*id as usize]))
            .collect()
    }
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore for ParamTable {
    fn get(&self, id: ParamId) -> ParamValue {
        self.values[id as usize]
    }

    fn set(&mut self, id: ParamId, value: ParamValue) {
        self.values[id as usize] = value;
    }
}
