//! Bus transport seam.
//!
//! The emulated modules only ever see `BusTransport`; the hardware driver
//! (or a test double) lives behind it. `FrameRecorder` is the in-memory
//! implementation used by the simulator and the test suite.

use crate::error::{VcuError, VcuResult};
use crate::frame::Frame;
use heapless::Vec;

pub const MAX_SUBSCRIPTIONS: usize = 32;
const MAX_RECORDED_FRAMES: usize = 4096;

pub trait BusTransport {
    /// Ask the transport to deliver frames with this identifier.
    fn register(&mut self, id: u32) -> VcuResult<()>;

    fn send(&mut self, frame: &Frame);
}

#[derive(Debug, Default)]
pub struct FrameRecorder {
    subscriptions: Vec<u32, MAX_SUBSCRIPTIONS>,
    sent: alloc::vec::Vec<Frame>,
    dropped: u32,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, id: u32) -> bool {
        self.subscriptions.contains(&id)
    }

    pub fn subscriptions(&self) -> &[u32] {
        &self.subscriptions
    }

    pub fn sent(&self) -> &[Frame] {
        &self.sent
    }

    pub fn sent_with_id(&self, id: u32) -> impl Iterator<Item = &Frame> {
        self.sent.iter().filter(move |f| f.id() == id)
    }

    pub fn take_sent(&mut self) -> alloc::vec::Vec<Frame> {
        core::mem::take(&mut self.sent)
    }

    /// Frames discarded because the log was full.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl BusTransport for FrameRecorder {
    fn register(&mut self, id: u32) -> VcuResult<()> {
        if self.subscriptions.contains(&id) {
            return Ok(());
        }
        self.subscriptions
            .push(id)
            .map_err(|_| VcuError::SubscriptionsFull { id })
    }

    fn send(&mut self, frame: &Frame) {
        if self.sent.len() >= MAX_RECORDED_FRAMES {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        self.sent.push(*frame);
    }
}
