//! BMW E31 instrument cluster relay.
//!
//! Feeds the cluster the EGS transmission messages it expects, relays road
//! speed from the ASC1 frame and drives the tachometer pulse output.
//! Tachometer reference points: 1000 rpm = 70 Hz, 2000 = 140 Hz,
//! 5000 = 345 Hz, 6000 = 413 Hz.

use super::{Module, ModuleContext};
use crate::frame::Frame;
use crate::params::{ParamId, ParamStore};
use core::any::Any;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ASC1_ID: u32 = 0x153;
pub const EGS_KEEPALIVE_ID: u32 = 0x43B;
pub const EGS_GEAR_ID: u32 = 0x43F;

const ROAD_SPEED_OFFSET: i32 = 0x160;
const ROAD_SPEED_SCALE: f32 = 0.0625;

pub const MIN_TACH_RPM: u16 = 750;
pub const MAX_TACH_RPM: u16 = 7500;
// TODO: calibrate against the cluster; 750 rpm currently shows ~52 Hz.
const TACH_TIMER_CLOCK: u32 = 30_000_000;

/// Pulse output driving the tachometer needle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TachOutput {
    pub running: bool,
    pub period: u32,
    pub compare: u32,
}

#[derive(Debug, Default)]
pub struct InstrumentCluster {
    tach: TachOutput,
}

impl InstrumentCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tach(&self) -> TachOutput {
        self.tach
    }

    /// Ignition on.
    pub fn ready(&self, params: &dyn ParamStore) -> bool {
        params.get_bool(ParamId::T15Stat)
    }

    /// Out-of-range requests are clamped to the gauge span.
    pub fn set_rev_counter(&mut self, rpm: i32) {
        let rpm = rpm.clamp(i32::from(MIN_TACH_RPM), i32::from(MAX_TACH_RPM)) as u32;
        self.tach.period = TACH_TIMER_CLOCK / rpm;
        self.tach.compare = self.tach.period / 2;
    }

    fn send_keepalive(ctx: &mut ModuleContext<'_>) {
        let frame = Frame::from_array(EGS_KEEPALIVE_ID, [0x46, 0x00, 0x00]);
        ctx.bus.send(&frame);
    }

    fn send_gear(ctx: &mut ModuleContext<'_>, dir: i32) {
        let gear = match dir {
            -1 => 0x07,
            0 => 0x06,
            1 => 0x05,
            _ => 0x08,
        };
        let frame = Frame::from_array(
            EGS_GEAR_ID,
            [0x81, gear, 0xFF, 0xFF, 0x00, 0x80, 0xFF, 0xFF],
        );
        ctx.bus.send(&frame);
    }
}

impl Module for InstrumentCluster {
    fn name(&self) -> &'static str {
        "bmw-e31-cluster"
    }

    fn subscriptions(&self) -> &'static [u32] {
        &[ASC1_ID]
    }

    fn decode(&mut self, frame: &Frame, ctx: &mut ModuleContext<'_>) {
        if frame.id() != ASC1_ID {
            return;
        }
        let Some(raw) = frame.u16_le(1) else {
            debug!(len = frame.len(), "short ASC1 frame ignored");
            return;
        };
        let speed = ROAD_SPEED_SCALE * (i32::from(raw) - ROAD_SPEED_OFFSET) as f32;
        ctx.params.set_float(ParamId::VehSpeed, speed);
    }

    fn task_10ms(&mut self, ctx: &mut ModuleContext<'_>) {
        if !ctx.params.get_bool(ParamId::T15Stat) {
            return;
        }
        Self::send_keepalive(ctx);
        if ctx.params.get_bool(ParamId::Transmission) {
            let dir = ctx.params.get_int(ParamId::Dir);
            Self::send_gear(ctx, dir);
        }
    }

    fn task_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        let ignition = ctx.params.get_bool(ParamId::T15Stat);
        if ignition != self.tach.running {
            self.tach.running = ignition;
            info!(running = ignition, "tachometer output");
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
