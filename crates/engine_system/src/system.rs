//! The [`System`] trait and closure-backed systems.
//!
//! A system is a named unit of per-tick logic. It declares the components it
//! touches as a [`QueryDescriptor`] and, when executed, issues one or more
//! [`Exec`](engine_world::Exec) queries against the tracker.

use anyhow::Result;
use engine_component::{Context, QueryDescriptor};
use engine_world::Tracker;

/// Per-tick logic run by the [`SystemManager`](crate::SystemManager).
pub trait System: Send {
    /// Human-readable name used in logs and timing dumps.
    fn name(&self) -> &str;

    /// The components this system reads and writes.
    fn query(&self) -> QueryDescriptor {
        QueryDescriptor::new()
    }

    /// One-time setup before the first [`execute`](Self::execute), typically
    /// registering columns and lifecycle hooks.
    ///
    /// # Errors
    ///
    /// An error aborts initialisation of the whole manager.
    fn init(&mut self, _ctx: &mut Context, _tracker: &Tracker) -> Result<()> {
        Ok(())
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// An error aborts the current tick.
    fn execute(&mut self, ctx: &mut Context, tracker: &Tracker, dt: f64) -> Result<()>;
}

type InitFn = dyn FnMut(&mut Context, &Tracker) -> Result<()> + Send;
type ExecuteFn = dyn FnMut(&mut Context, &Tracker, f64) -> Result<()> + Send;

/// A [`System`] built from closures.
///
/// ```rust
/// use engine_component::QueryDescriptor;
/// use engine_system::FnSystem;
///
/// let system = FnSystem::new("noop", QueryDescriptor::new(), |_, _, _| Ok(()))
///     .with_init(|_, tracker| {
///         tracing::debug!(entities = tracker.entity_count(), "noop ready");
///         Ok(())
///     });
/// ```
pub struct FnSystem {
    name: String,
    query: QueryDescriptor,
    init: Option<Box<InitFn>>,
    execute: Box<ExecuteFn>,
}

impl FnSystem {
    /// A system running `execute` every tick.
    pub fn new<F>(name: impl Into<String>, query: QueryDescriptor, execute: F) -> Self
    where
        F: FnMut(&mut Context, &Tracker, f64) -> Result<()> + Send + 'static,
    {
        Self {
            name: name.into(),
            query,
            init: None,
            execute: Box::new(execute),
        }
    }

    /// Run `init` once before the first tick.
    #[must_use]
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: FnMut(&mut Context, &Tracker) -> Result<()> + Send + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }
}

impl System for FnSystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self) -> QueryDescriptor {
        self.query.clone()
    }

    fn init(&mut self, ctx: &mut Context, tracker: &Tracker) -> Result<()> {
        match &mut self.init {
            Some(init) => init(ctx, tracker),
            None => Ok(()),
        }
    }

    fn execute(&mut self, ctx: &mut Context, tracker: &Tracker, dt: f64) -> Result<()> {
        (self.execute)(ctx, tracker, dt)
    }
}

impl std::fmt::Debug for FnSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSystem")
            .field("name", &self.name)
            .field("query", &self.query)
            .field("has_init", &self.init.is_some())
            .finish()
    }
}
