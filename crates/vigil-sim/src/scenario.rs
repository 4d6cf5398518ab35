//! Seeded population setup and the run loop.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use vigil_common::{EntityId, Vec2};
use vigil_gameplay::prelude::*;

use crate::config::{EventLog, SimConfig};

/// Outcome of a run, written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Seed the population was placed with
    pub seed: u64,
    /// Ticks run
    pub ticks: u64,
    /// Simulated seconds
    pub duration: f64,
    /// Entities spawned per archetype
    pub spawned: BTreeMap<String, u32>,
    /// Entities that died
    pub deaths: usize,
    /// Status effects applied by the harness
    pub statuses_applied: usize,
    /// Event counts by kind
    pub events: BTreeMap<&'static str, u64>,
    /// State of the survivors after the last tick
    pub survivors: TelemetryFrame,
}

/// A populated simulation ready to run.
#[derive(Debug)]
pub struct Scenario {
    config: SimConfig,
    sim: Simulation,
    rng: fastrand::Rng,
    seed: u64,
    spawned: BTreeMap<String, u32>,
}

impl Scenario {
    /// Loads archetypes and spawns the configured population.
    pub fn build(config: SimConfig) -> Result<Self> {
        let catalog = CapabilityCatalog::with_defaults();
        let mut library = ArchetypeLibrary::builtin(&catalog).context("loading built-in archetypes")?;
        if let Some(path) = &config.archetype_file {
            let rejected = library
                .load_file(path, &catalog)
                .with_context(|| format!("loading archetypes from {}", path.display()))?;
            for error in &rejected {
                warn!("Rejected archetype: {error}");
            }
        }

        let seed = config.seed.unwrap_or_else(|| fastrand::u64(..));
        let mut scenario = Self {
            sim: Simulation::new(catalog, library),
            rng: fastrand::Rng::with_seed(seed),
            seed,
            spawned: BTreeMap::new(),
            config,
        };
        scenario.populate()?;
        Ok(scenario)
    }

    fn populate(&mut self) -> Result<()> {
        let extent = self.config.arena_half_extent;
        for (name, count) in &self.config.spawns {
            if !self.sim.library().contains(name) {
                warn!(archetype = %name, "unknown archetype in spawn list, skipping");
                continue;
            }
            for _ in 0..*count {
                let position = Vec2::new(
                    (self.rng.f32() * 2.0 - 1.0) * extent,
                    (self.rng.f32() * 2.0 - 1.0) * extent,
                );
                self.sim
                    .spawn(name, position)
                    .with_context(|| format!("spawning {name}"))?;
                *self.spawned.entry(name.clone()).or_default() += 1;
            }
        }
        info!(population = self.sim.len(), seed = self.seed, "population spawned");
        Ok(())
    }

    /// The simulation being driven.
    pub const fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Seed used for placement and status rolls.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs every configured tick.
    pub fn run(&mut self) -> RunSummary {
        let dt = self.config.dt();
        let mut events: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut deaths = 0;
        let mut statuses_applied = 0;

        // Spawn events were published during setup
        self.record_events(&mut events);

        for tick in 1..=self.config.ticks {
            if self.config.status_interval > 0 && tick % self.config.status_interval == 0 && self.apply_random_status() {
                statuses_applied += 1;
            }

            let summary = self.sim.step(dt);
            deaths += summary.deaths.len();
            debug!(
                tick = summary.tick,
                requests = summary.requests_applied,
                events = summary.events_published,
                "tick complete"
            );
            self.record_events(&mut events);

            if self.sim.is_empty() {
                info!(tick, "no entities left, stopping early");
                break;
            }
        }

        let survivors = self.sim.telemetry().snapshot();
        info!(
            ticks = self.sim.tick_count(),
            survivors = survivors.entities.len(),
            deaths,
            "run complete"
        );

        RunSummary {
            seed: self.seed,
            ticks: self.sim.tick_count(),
            duration: self.sim.time(),
            spawned: self.spawned.clone(),
            deaths,
            statuses_applied,
            events,
            survivors,
        }
    }

    fn apply_random_status(&mut self) -> bool {
        let ids = self.sim.arena().ids();
        if ids.is_empty() {
            return false;
        }
        let target = ids[self.rng.usize(..ids.len())];
        let kind = [StatusKind::Charm, StatusKind::Confuse, StatusKind::Stun][self.rng.usize(..3)];

        match self.sim.apply_status(target, kind, self.config.status_duration) {
            Ok(outcome) => {
                debug!(entity = %target, %kind, ?outcome, "status rolled");
                true
            },
            Err(e) => {
                warn!(entity = %target, "Failed to apply status: {e}");
                false
            },
        }
    }

    fn record_events(&self, counts: &mut BTreeMap<&'static str, u64>) {
        for event in self.sim.events().drain() {
            *counts.entry(event_name(&event)).or_default() += 1;
            log_event(self.config.event_log, &event);
        }
    }
}

/// Short name of an event kind.
pub fn event_name(event: &GameEvent) -> &'static str {
    match event {
        GameEvent::EntitySpawned { .. } => "entity_spawned",
        GameEvent::EntityDestroyed { .. } => "entity_destroyed",
        GameEvent::HealthChanged { .. } => "health_changed",
        GameEvent::Died { .. } => "died",
        GameEvent::StateChanged { .. } => "state_changed",
        GameEvent::StatusApplied { .. } => "status_applied",
        GameEvent::StatusExpired { .. } => "status_expired",
    }
}

fn log_event(level: EventLog, event: &GameEvent) {
    let entity: EntityId = event.entity_id();
    match level {
        EventLog::Off => {},
        EventLog::Lifecycle if !event.is_lifecycle() => {},
        EventLog::Lifecycle | EventLog::All => info!(%entity, kind = event_name(event), "{event:?}"),
    }
}

/// Writes the summary as pretty JSON.
pub fn write_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("serializing run summary")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json).with_context(|| format!("writing summary to {}", path.display()))?;
    info!("Wrote summary to {}", path.display());
    Ok(())
}
