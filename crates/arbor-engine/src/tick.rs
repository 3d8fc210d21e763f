//! Fixed-timestep tick loop.
//!
//! The [`TickLoop`] drives a scene forward. Each tick:
//!
//! 1. All registered systems run in registration order, each with mutable
//!    access to the [`World`]. Systems write local transforms, reparent
//!    entities, add components, and so on.
//! 2. The [`TransformSystem`] drains the scene's change lists once and
//!    recomputes every affected world matrix.
//! 3. The tick counter advances.
//!
//! World matrices are therefore only guaranteed current *between* ticks;
//! a system reading a world transform sees the value from the previous tick.
//!
//! # Example
//!
//! ```
//! use arbor_engine::config::EngineConfig;
//! use arbor_engine::tick::TickLoop;
//! use arbor_ecs::prelude::*;
//!
//! let mut tick_loop = TickLoop::new(World::new(), &EngineConfig::default()).unwrap();
//! tick_loop.add_system("input", |_world| {});
//! tick_loop.add_system_after("animation", &["input"], |_world| {});
//!
//! for _ in 0..10 {
//!     tick_loop.tick();
//! }
//! assert_eq!(tick_loop.tick_count(), 10);
//! ```

use std::time::{Duration, Instant};

use arbor_ecs::transform::{PropagationStats, TransformSystem};
use arbor_ecs::world::World;

use crate::config::EngineConfig;
use crate::EngineError;

// ---------------------------------------------------------------------------
// TickDiagnostics
// ---------------------------------------------------------------------------

/// Timing diagnostics for the last tick.
#[derive(Debug, Clone, Default)]
pub struct TickDiagnostics {
    /// Wall-clock time per system (in order of execution).
    pub system_times: Vec<(String, Duration)>,
    /// Time spent in the transform pass.
    pub propagation_time: Duration,
    /// Counters from the transform pass.
    pub propagation: PropagationStats,
    /// Total time for the tick (systems + propagation).
    pub total_time: Duration,
}

// ---------------------------------------------------------------------------
// SystemFn
// ---------------------------------------------------------------------------

/// A system function that operates on the world each tick.
pub type SystemFn = fn(&mut World);

/// A named system in the registry.
#[derive(Debug)]
struct RegisteredSystem {
    name: String,
    func: SystemFn,
    /// Names of systems that must execute before this one.
    after: Vec<String>,
}

// ---------------------------------------------------------------------------
// TickLoop
// ---------------------------------------------------------------------------

/// The fixed-timestep tick loop.
pub struct TickLoop {
    world: World,
    transforms: TransformSystem,
    systems: Vec<RegisteredSystem>,
    tick_counter: u64,
    /// Fixed time step in seconds per tick.
    fixed_dt: f64,
    last_diagnostics: TickDiagnostics,
}

impl TickLoop {
    /// Create a tick loop around `world`.
    ///
    /// Fails if `config` does not validate.
    pub fn new(world: World, config: &EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            world,
            transforms: TransformSystem::with_capacity(
                config.transform.stack_capacity,
                config.transform.work_list_capacity,
            ),
            systems: Vec::new(),
            tick_counter: 0,
            fixed_dt: config.fixed_dt,
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    /// Register a system to be run each tick, after every system registered
    /// before it.
    ///
    /// # Panics
    ///
    /// Panics if a system with the same name is already registered.
    pub fn add_system(&mut self, name: &str, func: SystemFn) {
        self.add_system_after(name, &[], func);
    }

    /// Register a system with explicit execution dependencies.
    ///
    /// `after` lists system names that must execute before this system.
    ///
    /// # Panics
    ///
    /// - If any system in `after` is not already registered.
    /// - If a system with this name already exists.
    /// - If adding this system would create a dependency cycle.
    pub fn add_system_after(&mut self, name: &str, after: &[&str], func: SystemFn) {
        for dep in after {
            assert!(
                self.systems.iter().any(|s| s.name == *dep),
                "system '{name}' declares dependency on '{dep}', but '{dep}' is not registered"
            );
        }

        assert!(
            !self.systems.iter().any(|s| s.name == name),
            "duplicate system name: {name:?}"
        );

        self.systems.push(RegisteredSystem {
            name: name.to_owned(),
            func,
            after: after.iter().map(|s| s.to_string()).collect(),
        });

        self.validate_system_order();
        tracing::debug!(system = name, ?after, "registered system");
    }

    /// Depth-first search for back edges in the dependency graph.
    ///
    /// # Panics
    ///
    /// Panics if a cycle is detected.
    fn validate_system_order(&self) {
        let mut visited = vec![false; self.systems.len()];
        let mut in_stack = vec![false; self.systems.len()];

        fn dfs(
            systems: &[RegisteredSystem],
            idx: usize,
            visited: &mut [bool],
            in_stack: &mut [bool],
        ) -> bool {
            if in_stack[idx] {
                return false;
            }
            if visited[idx] {
                return true;
            }
            visited[idx] = true;
            in_stack[idx] = true;
            for dep_name in &systems[idx].after {
                if let Some(dep_idx) = systems.iter().position(|s| s.name == *dep_name) {
                    if !dfs(systems, dep_idx, visited, in_stack) {
                        return false;
                    }
                }
            }
            in_stack[idx] = false;
            true
        }

        for i in 0..self.systems.len() {
            assert!(
                dfs(&self.systems, i, &mut visited, &mut in_stack),
                "cycle detected in system dependencies"
            );
        }
    }

    /// Execute one tick: systems, then one transform pass.
    pub fn tick(&mut self) -> PropagationStats {
        let tick_start = Instant::now();
        let mut system_times = Vec::with_capacity(self.systems.len());

        for system in &self.systems {
            let sys_start = Instant::now();
            (system.func)(&mut self.world);
            system_times.push((system.name.clone(), sys_start.elapsed()));
        }

        let propagation_start = Instant::now();
        let propagation = self.transforms.process(&mut self.world);
        let propagation_time = propagation_start.elapsed();

        self.tick_counter += 1;

        self.last_diagnostics = TickDiagnostics {
            system_times,
            propagation_time,
            propagation,
            total_time: tick_start.elapsed(),
        };
        tracing::trace!(
            tick = self.tick_counter,
            recomputed = propagation.recomputed,
            "tick complete"
        );

        propagation
    }

    /// Run `count` ticks. Returns the number of entities recomputed across
    /// all of them.
    pub fn run_ticks(&mut self, count: u64) -> u64 {
        (0..count).map(|_| self.tick().recomputed as u64).sum()
    }

    // -- accessors ----------------------------------------------------------

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Computed as `tick_count * fixed_dt` to avoid drift from repeated
    /// addition.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.fixed_dt
    }

    pub fn fixed_dt(&self) -> f64 {
        self.fixed_dt
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Mutable access for setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Give the world back, e.g. to hand it to another loop.
    pub fn into_world(self) -> World {
        self.world
    }

    pub fn transform_system(&self) -> &TransformSystem {
        &self.transforms
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Names in execution order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn last_diagnostics(&self) -> &TickDiagnostics {
        &self.last_diagnostics
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
