//! Configuration/runtime split for catalog entries.
//!
//! Every action and condition stores its authored settings and its derived
//! per-entity state in separate halves of a [`Capability`]. There is no
//! `Clone` impl: the only way to copy one is [`Capability::cold_clone`],
//! which copies the configuration and starts the runtime half from its
//! default.

/// An authored configuration paired with per-instance runtime state.
#[derive(Debug, Default)]
pub struct Capability<C, R> {
    config: C,
    runtime: R,
}

impl<C, R: Default> Capability<C, R> {
    /// Creates a cold instance from a configuration.
    pub fn new(config: C) -> Self {
        Self {
            config,
            runtime: R::default(),
        }
    }

    /// Drops any derived state.
    pub fn reset_runtime(&mut self) {
        self.runtime = R::default();
    }
}

impl<C: Clone, R: Default> Capability<C, R> {
    /// Copies the configuration into a fresh instance with default runtime.
    #[must_use]
    pub fn cold_clone(&self) -> Self {
        Self::new(self.config.clone())
    }
}

impl<C, R> Capability<C, R> {
    /// Authored configuration.
    pub const fn config(&self) -> &C {
        &self.config
    }

    /// Runtime state.
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Runtime state, mutably.
    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    /// Both halves at once: configuration read-only, runtime mutable.
    pub fn parts_mut(&mut self) -> (&C, &mut R) {
        (&self.config, &mut self.runtime)
    }
}
