pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod map;
pub mod perception;

pub use crate::common::Pose;
pub use crate::config::MclConfig;
pub use crate::control::MotionCommand;
pub use crate::error::{LocalizationError, Result};
pub use crate::perception::localization::{Localizer, Particle, TickReport};
pub use crate::perception::PerceptionStack;

use crate::lifecycle::LifecycleNode;

/// Component registry for the localization core
pub struct MclCore {
    components: Vec<Box<dyn LifecycleNode>>,
}

impl Default for MclCore {
    fn default() -> Self {
        Self::new()
    }
}

impl MclCore {
    /// Create a new instance of MclCore
    pub fn new() -> Self {
        MclCore {
            components: Vec::new(),
        }
    }

    /// Register a component with the core
    pub fn register<T: LifecycleNode + 'static>(&mut self, component: T) {
        self.components.push(Box::new(component));
    }

    /// Configure and activate all registered components
    pub fn init(&mut self) -> Result<()> {
        for component in &mut self.components {
            component.on_configure()?;
            component.on_activate()?;
        }
        Ok(())
    }

    /// Deactivate and clean up all registered components
    pub fn shutdown(&mut self) -> Result<()> {
        for component in &mut self.components {
            component.on_deactivate()?;
            component.on_cleanup()?;
        }
        Ok(())
    }

    /// Get a reference to the perception stack
    pub fn perception_stack_mut(&mut self) -> Option<&mut PerceptionStack> {
        self.components
            .iter_mut()
            .find_map(|component| component.as_any_mut().downcast_mut::<PerceptionStack>())
    }
}
