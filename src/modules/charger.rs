//! On-board charger handshake.
//!
//! The charger asks for high voltage on `0x108` and expects a status frame
//! on `0x109` every 100 ms with a 4-bit message counter in byte 7.

use super::{Module, ModuleContext};
use crate::frame::Frame;
use crate::params::{ChargeType, ParamId};
use core::any::Any;
use tracing::info;

pub const HV_REQUEST_ID: u32 = 0x108;
pub const STATUS_ID: u32 = 0x109;

const HV_REQUEST_ON: u8 = 0xAA;
const HV_REQUEST_OFF: u8 = 0xCC;

const STATUS_RUNNING_AC: u8 = 0xA;
const STATUS_STOPPED: u8 = 0xC;
const COUNTER_LIMIT: u8 = 0x0F;

#[derive(Debug, Default)]
pub struct ChargerLink {
    hv_request: bool,
    running: bool,
    counter: u8,
}

impl ChargerLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// High voltage requested by the charger.
    pub fn hv_request(&self) -> bool {
        self.hv_request
    }

    /// Set by the charge control logic when the charger should run.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn counter(&self) -> u8 {
        self.counter
    }

    fn status_nibble(&self, charge_type: i32) -> u8 {
        match (self.running, charge_type == ChargeType::Ac as i32) {
            (true, true) => STATUS_RUNNING_AC,
            (false, _) => STATUS_STOPPED,
            (true, false) => 0,
        }
    }
}

impl Module for ChargerLink {
    fn name(&self) -> &'static str {
        "charger"
    }

    fn subscriptions(&self) -> &'static [u32] {
        &[HV_REQUEST_ID]
    }

    // Byte 7 carries a message counter that is not checked.
    fn decode(&mut self, frame: &Frame, _ctx: &mut ModuleContext<'_>) {
        if frame.id() != HV_REQUEST_ID {
            return;
        }
        let request = match frame.byte(0) {
            Some(HV_REQUEST_ON) => true,
            Some(HV_REQUEST_OFF) => false,
            _ => return,
        };
        if request != self.hv_request {
            info!(request, "charger HV request");
        }
        self.hv_request = request;
    }

    fn task_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        let udc = (ctx.params.get_int(ParamId::Udc) as u16).to_le_bytes();
        let setpoint = (ctx.params.get_int(ParamId::VoltSetpoint) as u16).to_le_bytes();
        let power = (ctx.params.get_int(ParamId::PwrSetpoint) as u16).to_le_bytes();
        let nibble = self.status_nibble(ctx.params.get_int(ParamId::ChargeType));

        let frame = Frame::from_array(
            STATUS_ID,
            [
                ctx.params.get_int(ParamId::OpMode) as u8,
                udc[0],
                udc[1],
                setpoint[0],
                setpoint[1],
                power[0],
                power[1],
                (nibble << 4) | self.counter,
            ],
        );
        ctx.bus.send(&frame);

        self.counter += 1;
        if self.counter >= COUNTER_LIMIT {
            self.counter = 0;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
