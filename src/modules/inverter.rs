//! OpenInverter CAN interface (protocol V2.02).
//!
//! Status comes back on four fixed identifiers; the throttle/torque
//! request goes out on `0x3F` protected by the STM32 hardware CRC, which
//! the inverter firmware checks before accepting the frame.

use super::{Module, ModuleContext};
use crate::frame::Frame;
use crate::params::{OpMode, ParamId, ParamStore};
use core::any::Any;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const SPEED_ID: u32 = 0x190;
pub const TEMPERATURE_ID: u32 = 0x19A;
pub const VOLTAGE_ID: u32 = 0x1A4;
pub const OPMODE_ID: u32 = 0x1AE;
pub const COMMAND_ID: u32 = 0x3F;

/// 100 ms is the torque request rate, so 300 requests hold start for ~3 s.
const START_HOLD_TICKS: u16 = 300;

const IO_START: u32 = 2;
const IO_BRAKE: u32 = 4;
const IO_FORWARD: u32 = 8;
const IO_REVERSE: u32 = 16;

const CRC32_POLY: u32 = 0x04C1_1DB7;

/// CRC-32 as computed by the STM32 CRC peripheral: MSB first over whole
/// 32-bit words, init `0xFFFFFFFF`, no reflection, no final XOR.
pub fn stm32_crc32(words: &[u32]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for word in words {
        crc ^= word;
        for _ in 0..32 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InverterStatus {
    pub voltage: u16,
    pub speed: i16,
    pub inverter_temp: i16,
    pub motor_temp: i16,
    pub inverter_opmode: u8,
    pub torque_request: i16,
}

#[derive(Debug)]
pub struct OpenInverter {
    status: InverterStatus,
    running: bool,
    op_mode: OpMode,
    start_hold: u16,
}

impl OpenInverter {
    pub fn new() -> Self {
        Self {
            status: InverterStatus::default(),
            running: false,
            op_mode: OpMode::Off,
            start_hold: 0,
        }
    }

    pub fn status(&self) -> InverterStatus {
        self.status
    }

    pub fn voltage(&self) -> u16 {
        self.status.voltage
    }

    pub fn speed(&self) -> i16 {
        self.status.speed
    }

    /// Run flag as last reported by the inverter, forced off while the
    /// cached operating mode is off.
    pub fn inverter_state(&mut self) -> bool {
        match self.status.inverter_opmode {
            0 => self.running = false,
            1 => self.running = true,
            _ => {}
        }
        if self.op_mode == OpMode::Off {
            self.running = false;
        }
        self.running
    }

    /// Sends the `0x3F` command frame for the given torque request.
    pub fn set_torque(&mut self, torque_percent: f32, ctx: &mut ModuleContext<'_>) {
        let request = (torque_percent * 10.0) as i16;
        self.status.torque_request = request;
        ctx.params.set_int(ParamId::Torque, i32::from(request));

        let mode = ctx.params.op_mode();
        let run = mode == OpMode::Run;

        let mut io = 0u32;
        if run && ctx.params.get_bool(ParamId::DinForward) {
            io += IO_FORWARD;
        }
        if run && ctx.params.get_bool(ParamId::DinReverse) {
            io += IO_REVERSE;
        }
        if ctx.params.get_bool(ParamId::DinBrake) {
            io += IO_BRAKE;
        }
        if run && self.start_hold != 0 {
            self.start_hold -= 1;
            io += IO_START;
        }
        if mode == OpMode::Off {
            self.start_hold = START_HOLD_TICKS;
        }

        let frame = encode_command(&*ctx.params, io);
        debug!(%frame, "inverter command");
        ctx.bus.send(&frame);
    }
}

fn encode_command(params: &dyn ParamStore, io: u32) -> Frame {
    let pot = params.get_int(ParamId::Pot) as u32 & 0xFFF;
    let pot2 = params.get_int(ParamId::Pot2) as u32 & 0xFFF;
    let canio = io & 0x3F;
    let ctr = params.get_int(ParamId::CanCtr) as u32 & 0x3;
    let cruise = params.get_int(ParamId::CruiseSpeed) as u32 & 0x3FFF;
    let regen = 0u32;

    let word0 = pot | (pot2 << 12) | (canio << 24) | (ctr << 30);
    let mut word1 = cruise | (ctr << 14) | (regen << 16);
    let crc = stm32_crc32(&[word0, word1]) & 0xFF;
    word1 |= crc << 24;

    let lo = word0.to_le_bytes();
    let hi = word1.to_le_bytes();
    Frame::from_array(
        COMMAND_ID,
        [lo[0], lo[1], lo[2], lo[3], hi[0], hi[1], hi[2], hi[3]],
    )
}

impl Default for OpenInverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for OpenInverter {
    fn name(&self) -> &'static str {
        "openinverter"
    }

    fn subscriptions(&self) -> &'static [u32] {
        &[SPEED_ID, TEMPERATURE_ID, VOLTAGE_ID, OPMODE_ID]
    }

    fn decode(&mut self, frame: &Frame, _ctx: &mut ModuleContext<'_>) {
        match frame.id() {
            VOLTAGE_ID => {
                if let Some(raw) = frame.u16_le(0) {
                    self.status.voltage = raw / 10;
                }
            }
            SPEED_ID => {
                if let Some(raw) = frame.u16_le(0) {
                    self.status.speed = raw as i16;
                }
            }
            TEMPERATURE_ID => {
                if let Some(raw) = frame.u16_le(0) {
                    self.status.inverter_temp = (raw / 10) as i16;
                    self.status.motor_temp = 0;
                }
            }
            // 0 off, 1 run, 2 manual run, 3 boost, 4 buck, 5 sine, 6 AC heat
            OPMODE_ID => {
                if let Some(mode) = frame.byte(0) {
                    if mode != self.status.inverter_opmode {
                        info!(mode, "inverter opmode");
                    }
                    self.status.inverter_opmode = mode;
                }
            }
            _ => {}
        }
    }

    fn task_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        self.op_mode = ctx.params.op_mode();
        if self.op_mode == OpMode::Off {
            // Cleared so the next start shows live values.
            self.status = InverterStatus::default();
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stm32_crc_reference_word() {
        assert_eq!(stm32_crc32(&[0x1234_5678]), 0xDF8A_8A2B);
    }

    #[test]
    fn test_crc_of_empty_block_is_init() {
        assert_eq!(stm32_crc32(&[]), 0xFFFF_FFFF);
    }
}
