pub mod bms;
pub mod charger;
pub mod cluster;
pub mod inverter;
pub mod shifter;

pub use bms::BatteryMonitor;
pub use charger::ChargerLink;
pub use cluster::InstrumentCluster;
pub use inverter::OpenInverter;
pub use shifter::{GearShifter, GearState};

use crate::bus::BusTransport;
use crate::error::{VcuError, VcuResult};
use crate::frame::Frame;
use crate::params::ParamStore;
use core::any::Any;
use heapless::Vec;

pub const MAX_MODULES: usize = 8;

/// Collaborators handed to a module for the duration of one callback.
pub struct ModuleContext<'a> {
    pub bus: &'a mut dyn BusTransport,
    pub params: &'a mut dyn ParamStore,
}

impl<'a> ModuleContext<'a> {
    pub fn new(bus: &'a mut dyn BusTransport, params: &'a mut dyn ParamStore) -> Self {
        Self { bus, params }
    }
}

/// Contract implemented by every emulated OEM module.
///
/// The host guarantees that `decode` and the tick callbacks of one module
/// never overlap, so implementations mutate their state without locking.
/// None of the callbacks may block.
pub trait Module {
    fn name(&self) -> &'static str;

    /// Identifiers this module wants delivered to `decode`.
    fn subscriptions(&self) -> &'static [u32];

    /// Called once before any other callback.
    fn bind(&mut self, bus: &mut dyn BusTransport) -> VcuResult<()> {
        for id in self.subscriptions() {
            bus.register(*id)?;
        }
        Ok(())
    }

    /// Unrecognised identifiers and frames too short for the layout are ignored.
    fn decode(&mut self, frame: &Frame, ctx: &mut ModuleContext<'_>);

    fn task_1ms(&mut self, _ctx: &mut ModuleContext<'_>) {}

    fn task_10ms(&mut self, _ctx: &mut ModuleContext<'_>) {}

    fn task_100ms(&mut self, _ctx: &mut ModuleContext<'_>) {}

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Holds the active modules and fans callbacks out to all of them.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Box<dyn Module>, MAX_MODULES>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: Box<dyn Module>) -> VcuResult<()> {
        self.modules
            .push(module)
            .map_err(|_| VcuError::RegistryFull { capacity: MAX_MODULES })
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modules.iter().map(|m| m.name())
    }

    pub fn bind_all(&mut self, bus: &mut dyn BusTransport) -> VcuResult<()> {
        for module in self.modules.iter_mut() {
            module.bind(bus)?;
            tracing::debug!(module = module.name(), ids = ?module.subscriptions(), "module bound");
        }
        Ok(())
    }

    /// Deliver a frame to every module subscribed to its identifier.
    /// Returns how many modules received it.
    pub fn dispatch(&mut self, frame: &Frame, ctx: &mut ModuleContext<'_>) -> usize {
        let mut delivered = 0;
        for module in self.modules.iter_mut() {
            if module.subscriptions().contains(&frame.id()) {
                module.decode(frame, ctx);
                delivered += 1;
            }
        }
        delivered
    }

    pub fn run_1ms(&mut self, ctx: &mut ModuleContext<'_>) {
        for module in self.modules.iter_mut() {
            module.task_1ms(ctx);
        }
    }

    pub fn run_10ms(&mut self, ctx: &mut ModuleContext<'_>) {
        for module in self.modules.iter_mut() {
            module.task_10ms(ctx);
        }
    }

    pub fn run_100ms(&mut self, ctx: &mut ModuleContext<'_>) {
        for module in self.modules.iter_mut() {
            module.task_100ms(ctx);
        }
    }

    pub fn find<T: Module + 'static>(&self) -> Option<&T> {
        self.modules
            .iter()
            .find_map(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn find_mut<T: Module + 'static>(&mut self) -> Option<&mut T> {
        self.modules
            .iter_mut()
            .find_map(|m| m.as_any_mut().downcast_mut::<T>())
    }
}

impl core::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FrameRecorder;
    use crate::params::ParamTable;

    #[derive(Default)]
    struct Probe {
        decoded: u32,
        ticks: [u32; 3],
    }

    impl Module for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }

        fn subscriptions(&self) -> &'static [u32] {
            &[0x100, 0x101]
        }

        fn decode(&mut self, _frame: &Frame, _ctx: &mut ModuleContext<'_>) {
            self.decoded += 1;
        }

        fn task_1ms(&mut self, _ctx: &mut ModuleContext<'_>) {
            self.ticks[0] += 1;
        }

        fn task_10ms(&mut self, _ctx: &mut ModuleContext<'_>) {
            self.ticks[1] += 1;
        }

        fn task_100ms(&mut self, _ctx: &mut ModuleContext<'_>) {
            self.ticks[2] += 1;
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn test_bind_registers_subscriptions() {
        let mut registry = ModuleRegistry::new();
        registry.add(Box::new(Probe::default())).unwrap();
        let mut bus = FrameRecorder::new();
        registry.bind_all(&mut bus).unwrap();
        assert!(bus.is_subscribed(0x100));
        assert!(bus.is_subscribed(0x101));
    }

    #[test]
    fn test_dispatch_only_to_subscribers() {
        let mut registry = ModuleRegistry::new();
        registry.add(Box::new(Probe::default())).unwrap();
        let mut bus = FrameRecorder::new();
        let mut params = ParamTable::new();
        let mut ctx = ModuleContext::new(&mut bus, &mut params);

        let hit = Frame::new(0x101, &[0]).unwrap();
        let miss = Frame::new(0x200, &[0]).unwrap();
        assert_eq!(registry.dispatch(&hit, &mut ctx), 1);
        assert_eq!(registry.dispatch(&miss, &mut ctx), 0);
        assert_eq!(registry.find::<Probe>().unwrap().decoded, 1);
    }

    #[test]
    fn test_tick_fan_out() {
        let mut registry = ModuleRegistry::new();
        registry.add(Box::new(Probe::default())).unwrap();
        let mut bus = FrameRecorder::new();
        let mut params = ParamTable::new();
        let mut ctx = ModuleContext::new(&mut bus, &mut params);

        registry.run_1ms(&mut ctx);
        registry.run_10ms(&mut ctx);
        registry.run_100ms(&mut ctx);
        assert_eq!(registry.find::<Probe>().unwrap().ticks, [1, 1, 1]);
    }

    #[test]
    fn test_registry_capacity() {
        let mut registry = ModuleRegistry::new();
        for _ in 0..MAX_MODULES {
            registry.add(Box::new(Probe::default())).unwrap();
        }
        let err = registry.add(Box::new(Probe::default())).unwrap_err();
        assert!(matches!(err, VcuError::RegistryFull { .. }));
    }
}
