use crate::bus::BusTransport;
use crate::error::{VcuError, VcuResult};
use crate::frame::Frame;
use crate::modules::{Module, ModuleContext, ModuleRegistry};
use crate::params::ParamTable;
use crate::scheduler::{SchedulerStats, TickScheduler};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    pub running: bool,
    pub uptime_ms: u64,
    pub frames_received: u32,
    pub frames_dispatched: u32,
    pub frames_unclaimed: u32,
}

/// Owns the transport, parameter table and modules, and serialises frame
/// delivery with the periodic ticks so no module sees overlapping calls.
pub struct VcuHost<B: BusTransport> {
    bus: B,
    params: ParamTable,
    registry: ModuleRegistry,
    scheduler: TickScheduler,
    state: HostState,
}

impl<B: BusTransport> VcuHost<B> {
    pub fn new(bus: B, params: ParamTable, registry: ModuleRegistry) -> Self {
        Self {
            bus,
            params,
            registry,
            scheduler: TickScheduler::new(),
            state: HostState::default(),
        }
    }

    pub fn add_module(&mut self, module: Box<dyn Module>) -> VcuResult<()> {
        if self.state.running {
            return Err(VcuError::AlreadyStarted);
        }
        self.registry.add(module)
    }

    /// Binds every module to the transport. Must be called exactly once.
    pub fn start(&mut self) -> VcuResult<()> {
        if self.state.running {
            return Err(VcuError::AlreadyStarted);
        }
        self.registry.bind_all(&mut self.bus)?;
        self.state.running = true;

        let names: alloc::vec::Vec<_> = self.registry.names().collect();
        info!(modules = ?names, "VCU host started");
        Ok(())
    }

    pub fn stop(&mut self) {
        self.state.running = false;
        info!(uptime_ms = self.state.uptime_ms, "VCU host stopped");
    }

    /// Synchronously delivers an inbound frame. Dropped while stopped.
    pub fn receive(&mut self, frame: &Frame) {
        if !self.state.running {
            return;
        }
        self.state.frames_received = self.state.frames_received.wrapping_add(1);

        let mut ctx = ModuleContext::new(&mut self.bus, &mut self.params);
        let delivered = self.registry.dispatch(frame, &mut ctx);
        if delivered == 0 {
            self.state.frames_unclaimed = self.state.frames_unclaimed.wrapping_add(1);
            debug!(%frame, "no module subscribed");
        } else {
            self.state.frames_dispatched = self.state.frames_dispatched.wrapping_add(1);
        }
    }

    /// Runs `ms` milliseconds worth of tick callbacks.
    pub fn advance(&mut self, ms: u64) {
        if !self.state.running {
            return;
        }
        for _ in 0..ms {
            let due = self.scheduler.step();
            let mut ctx = ModuleContext::new(&mut self.bus, &mut self.params);
            if due.tick_1ms {
                self.registry.run_1ms(&mut ctx);
            }
            if due.tick_10ms {
                self.registry.run_10ms(&mut ctx);
            }
            if due.tick_100ms {
                self.registry.run_100ms(&mut ctx);
            }
        }
        self.state.uptime_ms = self.scheduler.elapsed_ms();
    }

    /// Runs `f` against a concrete module with a live context, e.g. to
    /// issue an inverter torque request from the control loop.
    pub fn with_module<T, R>(&mut self, f: impl FnOnce(&mut T, &mut ModuleContext<'_>) -> R) -> Option<R>
    where
        T: Module + 'static,
    {
        let module = self.registry.find_mut::<T>()?;
        let mut ctx = ModuleContext::new(&mut self.bus, &mut self.params);
        Some(f(module, &mut ctx))
    }

    pub fn module<T: Module + 'static>(&self) -> Option<&T> {
        self.registry.find::<T>()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut ParamTable {
        &mut self.params
    }

    pub fn get_state(&self) -> &HostState {
        &self.state
    }

    pub fn scheduler_stats(&self) -> &SchedulerStats {
        self.scheduler.get_stats()
    }
}
