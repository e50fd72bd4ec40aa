//! # Controller registry.
//!
//! Ordered list of the controllers the runner will start. Filled during setup
//! (`&mut self`) and only read once the run loop starts.

use std::sync::Arc;

use crate::controller::Controller;
use crate::error::SetupError;

/// Controllers to run, in the order they were added.
#[derive(Default)]
pub struct ControllerRegistry {
    controllers: Vec<Arc<Controller>>,
}

impl ControllerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `controller`.
    ///
    /// # Errors
    /// [`SetupError::DuplicateController`] if this same instance was already added.
    /// Distinct controllers may share a name.
    pub fn add_controller(&mut self, controller: Arc<Controller>) -> Result<(), SetupError> {
        if self.controllers.iter().any(|c| Arc::ptr_eq(c, &controller)) {
            return Err(SetupError::DuplicateController {
                controller: controller.name().to_string(),
            });
        }
        self.controllers.push(controller);
        Ok(())
    }

    /// Iterates over registered controllers, in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Controller>> + '_ {
        self.controllers.iter()
    }

    /// Number of registered controllers.
    pub fn len(&self) -> usize {
        self.controllers.len()
    }

    /// True if no controller is registered.
    pub fn is_empty(&self) -> bool {
        self.controllers.is_empty()
    }
}
