//! JLR Gen 1 rotary gear selector emulation.
//!
//! The selector broadcasts the lever position on `0x312`; the factory
//! transmission controller answers on `0x3F3` with a gear status frame
//! carrying a rolling counter and a per-position check byte. The gateway
//! rejects the lever unless the status stream looks exactly like the OEM
//! one, so the frame layout and the counter quirks below are reproduced
//! byte for byte.

use super::{Module, ModuleContext};
use crate::frame::Frame;
use crate::params::OpMode;
use core::any::Any;
use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use tracing::{debug, info, warn};

pub const LEVER_STATUS_ID: u32 = 0x312;
pub const GEAR_STATUS_ID: u32 = 0x3F3;

const LEVER_CODE_BYTE: usize = 3;
const LEVER_SEQUENCE_BYTE: usize = 7;

/// Status is sent on every second 10 ms tick.
const TRANSMIT_DIVIDER: u8 = 2;
/// 100 ms ticks outside run mode before the status stream goes silent.
pub const SHUTDOWN_TICKS: u8 = 20;

const ROLLING_COUNTER_LIMIT: u8 = 0x0F;
const ROLLING_CODE_LEN: usize = 16;

const BYTE0_PARKED: u8 = 0x5C;
const BYTE0_NOT_PARKED: u8 = 0x7C;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GearState {
    Park,
    Reverse,
    Neutral,
    Drive,
    Sport,
}

impl GearState {
    /// Maps the 4-bit lever code from `0x312`. Unused codes map to `None`.
    pub fn from_lever_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(GearState::Park),
            1 => Some(GearState::Reverse),
            2 => Some(GearState::Neutral),
            3 => Some(GearState::Drive),
            7 => Some(GearState::Sport),
            _ => None,
        }
    }

    pub fn lever_code(self) -> u8 {
        match self {
            GearState::Park => 0,
            GearState::Reverse => 1,
            GearState::Neutral => 2,
            GearState::Drive => 3,
            GearState::Sport => 7,
        }
    }

    fn template(self) -> &'static GearTemplate {
        match self {
            GearState::Park => &PARK_TEMPLATE,
            GearState::Reverse => &REVERSE_TEMPLATE,
            GearState::Neutral => &NEUTRAL_TEMPLATE,
            GearState::Drive => &DRIVE_TEMPLATE,
            GearState::Sport => &SPORT_TEMPLATE,
        }
    }
}

/// Fixed bytes of one position's status frame plus its check-byte row.
struct GearTemplate {
    byte1: u8,
    tail: [u8; 4],
    check: [u8; ROLLING_CODE_LEN],
}

// Check bytes (byte 3) indexed by rolling counter, captured from the OEM
// transmission controller.
const PARK_CHECK: [u8; ROLLING_CODE_LEN] = [
    0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
    0x8A, 0x8B, 0x8C, 0x8D, 0x8E, 0x8F, 0x90, 0x91,
];
const REVERSE_CHECK: [u8; ROLLING_CODE_LEN] = [
    0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A,
    0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12,
];
const NEUTRAL_CHECK: [u8; ROLLING_CODE_LEN] = [
    0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13,
];
const DRIVE_CHECK: [u8; ROLLING_CODE_LEN] = [
    0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D,
    0x0E, 0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15,
];
const SPORT_CHECK: [u8; ROLLING_CODE_LEN] = [
    0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10, 0x11,
    0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19,
];

const PARK_TEMPLATE: GearTemplate = GearTemplate {
    byte1: 0x66,
    tail: [0xFF, 0x7F, 0x00, 0x80],
    check: PARK_CHECK,
};
const REVERSE_TEMPLATE: GearTemplate = GearTemplate {
    byte1: 0x24,
    tail: [0xFE, 0xFF, 0x01, 0x00],
    check: REVERSE_CHECK,
};
const NEUTRAL_TEMPLATE: GearTemplate = GearTemplate {
    byte1: 0x25,
    tail: [0xFD, 0xFF, 0x02, 0x00],
    check: NEUTRAL_CHECK,
};
const DRIVE_TEMPLATE: GearTemplate = GearTemplate {
    byte1: 0x24,
    tail: [0xFB, 0xFF, 0x04, 0x00],
    check: DRIVE_CHECK,
};
const SPORT_TEMPLATE: GearTemplate = GearTemplate {
    byte1: 0x24,
    tail: [0xF7, 0xFF, 0x08, 0x00],
    check: SPORT_CHECK,
};

const_assert_eq!(PARK_CHECK[0], 0x82);
const_assert_eq!(SPORT_CHECK[ROLLING_CODE_LEN - 1], 0x19);

/// Rolling counter embedded in byte 2 of the status frame.
///
/// Increments once per transmitted frame and wraps to 0 on reaching 15.
/// While the lever is in park the value 2 is replaced by 4.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollingCounter(u8);

impl RollingCounter {
    pub fn value(self) -> u8 {
        self.0
    }

    pub fn advance(&mut self, parked: bool) {
        self.0 += 1;
        if parked && self.0 == 0x02 {
            self.0 = 0x04;
        }
        if self.0 == ROLLING_COUNTER_LIMIT {
            self.0 = 0;
        }
    }
}

/// Builds the `0x3F3` status frame for a position and counter value.
pub fn encode_gear_status(position: GearState, counter: RollingCounter) -> Frame {
    let template = position.template();
    let index = counter.value() as usize % ROLLING_CODE_LEN;
    let byte0 = if position == GearState::Park {
        BYTE0_PARKED
    } else {
        BYTE0_NOT_PARKED
    };

    Frame::from_array(
        GEAR_STATUS_ID,
        [
            byte0,
            template.byte1,
            counter.value(),
            template.check[index],
            template.tail[0],
            template.tail[1],
            template.tail[2],
            template.tail[3],
        ],
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShifterState {
    pub requested: GearState,
    pub gear: GearState,
    pub rolling_counter: u8,
    pub lever_sequence: u8,
    pub shutdown_count: u8,
    pub transmitting: bool,
}

#[derive(Debug)]
pub struct GearShifter {
    requested: GearState,
    gear: GearState,
    counter: RollingCounter,
    lever_sequence: u8,
    tick_divider: u8,
    shutdown_count: u8,
}

impl GearShifter {
    pub fn new() -> Self {
        Self {
            requested: GearState::Park,
            gear: GearState::Park,
            counter: RollingCounter::default(),
            lever_sequence: 0,
            tick_divider: 0,
            shutdown_count: 0,
        }
    }

    /// Last gear confirmed on the status stream.
    pub fn get_gear(&self) -> GearState {
        self.gear
    }

    pub fn requested(&self) -> GearState {
        self.requested
    }

    pub fn rolling_counter(&self) -> RollingCounter {
        self.counter
    }

    pub fn is_transmitting(&self) -> bool {
        self.shutdown_count < SHUTDOWN_TICKS
    }

    pub fn get_state(&self) -> ShifterState {
        ShifterState {
            requested: self.requested,
            gear: self.gear,
            rolling_counter: self.counter.value(),
            lever_sequence: self.lever_sequence,
            shutdown_count: self.shutdown_count,
            transmitting: self.is_transmitting(),
        }
    }

    fn transmit(&mut self, ctx: &mut ModuleContext<'_>) {
        // The forced park sticks until the lever reports again.
        if ctx.params.op_mode() != OpMode::Run {
            self.requested = GearState::Park;
        }

        let frame = encode_gear_status(self.requested, self.counter);
        ctx.bus.send(&frame);

        // Sport is encoded on the wire but never reported as the gear.
        if self.requested != GearState::Sport && self.gear != self.requested {
            info!(from = ?self.gear, to = ?self.requested, "gear changed");
            self.gear = self.requested;
        }

        self.counter.advance(self.requested == GearState::Park);
    }
}

impl Default for GearShifter {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for GearShifter {
    fn name(&self) -> &'static str {
        "jlr-g1-shifter"
    }

    fn subscriptions(&self) -> &'static [u32] {
        &[LEVER_STATUS_ID]
    }

    fn decode(&mut self, frame: &Frame, _ctx: &mut ModuleContext<'_>) {
        if frame.id() != LEVER_STATUS_ID {
            return;
        }
        let (Some(lever), Some(sequence)) =
            (frame.byte(LEVER_CODE_BYTE), frame.byte(LEVER_SEQUENCE_BYTE))
        else {
            debug!(len = frame.len(), "short lever frame ignored");
            return;
        };

        self.lever_sequence = sequence & 0x0F;
        let code = lever >> 4;
        match GearState::from_lever_code(code) {
            Some(position) => self.requested = position,
            None => debug!(code, "unknown lever code ignored"),
        }
    }

    fn task_10ms(&mut self, ctx: &mut ModuleContext<'_>) {
        if !self.is_transmitting() {
            return;
        }

        self.tick_divider += 1;
        if self.tick_divider == TRANSMIT_DIVIDER {
            self.transmit(ctx);
            self.tick_divider = 0;
        }
    }

    fn task_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        let mode = ctx.params.op_mode();
        if mode == OpMode::Off {
            self.gear = GearState::Neutral;
        }

        if mode == OpMode::Run {
            self.shutdown_count = 0;
        } else if self.shutdown_count < SHUTDOWN_TICKS {
            self.shutdown_count += 1;
            if self.shutdown_count == SHUTDOWN_TICKS {
                warn!("gear status transmission suspended outside run mode");
            }
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
    fn test_counter_wraps_before_fifteen() {
        let mut counter = RollingCounter::default();
        let mut seen = alloc::vec::Vec::new();
        for _ in 0..16 {
            seen.push(counter.value());
            counter.advance(false);
        }
        assert_eq!(seen, (0..15).chain(0..1).collect::<alloc::vec::Vec<u8>>());
    }

    #[test]
    fn test_counter_skips_two_when_parked() {
        let mut counter = RollingCounter::default();
        counter.advance(true);
        assert_eq!(counter.value(), 1);
        counter.advance(true);
        assert_eq!(counter.value(), 4);
    }

    #[test]
    fn test_park_frame_layout() {
        let frame = encode_gear_status(GearState::Park, RollingCounter::default());
        assert_eq!(frame.id(), GEAR_STATUS_ID);
        assert_eq!(frame.payload(), &[0x5C, 0x66, 0x00, 0x82, 0xFF, 0x7F, 0x00, 0x80]);
    }

    #[test]
    fn test_lever_code_round_trip() {
        for gear in [
            GearState::Park,
            GearState::Reverse,
            GearState::Neutral,
            GearState::Drive,
            GearState::Sport,
        ] {
            assert_eq!(GearState::from_lever_code(gear.lever_code()), Some(gear));
        }
        assert_eq!(GearState::from_lever_code(5), None);
    }
}
