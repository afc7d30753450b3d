// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fleet simulator: truck movement and organic demand.
//!
//! Two periodic processes run while the simulation is enabled:
//!
//! - **movement**: every truck takes one bounded random step per tick;
//! - **demand**: each tick spawns a material near the city center with a
//!   fixed probability and posts an info notification about it.
//!
//! Each process owns a [`CancellationToken`]. Disabling cancels both tokens
//! and aborts the tasks; enabling spawns fresh ones whose first tick lands a
//! full period later, so missed ticks are never replayed. Ticks run behind
//! the control lock, which makes `set_enabled(false)` a hard barrier: once it
//! returns, no tick is mid-flight and none will mutate state again.

use crate::model::{
    default_roster, Actor, Material, Position, MATERIAL_TYPES, SIMULATED_SOURCE_ID, WEIGHT_LABELS,
};
use crate::notify::{NotificationChannel, Severity};
use crate::registry::MaterialRegistry;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reflow_app_core::config::ConfigStore;
use reflow_app_core::prefs::SimulationPrefs;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

const EVENT_CAPACITY: usize = 256;
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// What the simulator announces to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// One movement tick finished; carries the whole roster after the step.
    ActorsMoved(Vec<Actor>),
    /// The demand process created a material.
    MaterialSpawned(Material),
    /// The enabled flag changed.
    Toggled {
        /// New value of the flag.
        enabled: bool,
    },
}

/// Shared handle to the fleet simulation. Clones drive the same simulation;
/// dropping the last one cancels every timer.
pub struct Simulator<S> {
    shared: Arc<SimShared<S>>,
}

impl<S> Clone for Simulator<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct SimShared<S> {
    registry: MaterialRegistry<S>,
    notifications: NotificationChannel,
    prefs: SimulationPrefs,
    roster: Mutex<Vec<Actor>>,
    rng: Mutex<StdRng>,
    control: Mutex<Control>,
    events: broadcast::Sender<SimulationEvent>,
}

#[derive(Default)]
struct Control {
    enabled: bool,
    tasks: Vec<PeriodicTask>,
}

struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    fn cancel(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

impl Control {
    fn stop_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.cancel();
        }
    }
}

impl<S> Drop for SimShared<S> {
    fn drop(&mut self) {
        self.control
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .stop_all();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Uniform draw in `[-range, range]`. A range that is not positive, or whose
/// span `2 * range` is not finite, yields 0.
fn jitter<R: Rng + ?Sized>(rng: &mut R, range: f64) -> f64 {
    if range.is_nan() || range <= 0.0 || !(2.0 * range).is_finite() {
        return 0.0;
    }
    rng.gen_range(-range..=range)
}

impl<S> SimShared<S>
where
    S: ConfigStore,
{
    fn run_tick(&self, token: &CancellationToken, tick: fn(&Self)) {
        let control = lock(&self.control);
        if token.is_cancelled() || !control.enabled {
            return;
        }
        tick(self);
        drop(control);
    }

    fn move_actors(&self) {
        let step = self.prefs.movement_step_deg;
        let moved = {
            let mut rng = lock(&self.rng);
            let mut roster = lock(&self.roster);
            // Every step reads only the prior snapshot.
            let next: Vec<Actor> = roster
                .iter()
                .map(|actor| {
                    let d_lat = jitter(&mut *rng, step);
                    let d_lng = jitter(&mut *rng, step);
                    Actor {
                        position: actor.position.offset(d_lat, d_lng),
                        ..actor.clone()
                    }
                })
                .collect();
            *roster = next.clone();
            next
        };
        trace!(actors = moved.len(), "movement tick");
        let _ = self.events.send(SimulationEvent::ActorsMoved(moved));
    }

    fn spawn_demand(&self) {
        let (kind, weight, position) = {
            let mut rng = lock(&self.rng);
            if !rng.gen_bool(self.prefs.clamped_demand_probability()) {
                trace!("demand tick: nothing spawned");
                return;
            }
            let kind = MATERIAL_TYPES[rng.gen_range(0..MATERIAL_TYPES.len())];
            let weight = WEIGHT_LABELS[rng.gen_range(0..WEIGHT_LABELS.len())];
            let jitter_deg = self.prefs.demand_jitter_deg;
            let position = Position::from(self.prefs.city_center)
                .offset(jitter(&mut *rng, jitter_deg), jitter(&mut *rng, jitter_deg));
            (kind, weight, position)
        };
        let material = self.registry.create(
            kind,
            weight,
            position,
            Some(SIMULATED_SOURCE_ID.to_string()),
        );
        self.notifications.post(
            format!("Novo descarte de {kind} detectado na região!"),
            Severity::Info,
        );
        debug!(material_id = %material.id, kind, "demand tick spawned material");
        let _ = self.events.send(SimulationEvent::MaterialSpawned(material));
    }
}

impl<S> Simulator<S>
where
    S: ConfigStore + Send + Sync + 'static,
{
    /// Build a disabled simulator over the default truck roster.
    pub fn new(
        registry: MaterialRegistry<S>,
        notifications: NotificationChannel,
        prefs: SimulationPrefs,
    ) -> Self {
        Self::with_roster(registry, notifications, prefs, default_roster())
    }

    /// Build a disabled simulator over a custom roster.
    pub fn with_roster(
        registry: MaterialRegistry<S>,
        notifications: NotificationChannel,
        prefs: SimulationPrefs,
        roster: Vec<Actor>,
    ) -> Self {
        let rng = prefs
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(SimShared {
                registry,
                notifications,
                prefs,
                roster: Mutex::new(roster),
                rng: Mutex::new(rng),
                control: Mutex::new(Control::default()),
                events,
            }),
        }
    }

    /// Apply the `enabled` preference. Call from inside a Tokio runtime.
    pub fn start(&self) {
        self.set_enabled(self.shared.prefs.enabled);
    }

    /// Turn both periodic processes on or off. Setting the current value is a no-op.
    ///
    /// Enabling outside a Tokio runtime is refused and logged.
    #[instrument(skip(self))]
    pub fn set_enabled(&self, enabled: bool) {
        let mut control = lock(&self.shared.control);
        self.apply(&mut control, enabled);
    }

    /// Flip the enabled flag and return its new value.
    pub fn toggle(&self) -> bool {
        let mut control = lock(&self.shared.control);
        let enabled = !control.enabled;
        self.apply(&mut control, enabled);
        control.enabled
    }

    /// Current value of the enabled flag.
    pub fn is_enabled(&self) -> bool {
        lock(&self.shared.control).enabled
    }

    /// Stop both processes and release their timers.
    pub fn shutdown(&self) {
        self.set_enabled(false);
    }

    fn apply(&self, control: &mut Control, enabled: bool) {
        if control.enabled == enabled {
            return;
        }
        if enabled {
            let Ok(handle) = Handle::try_current() else {
                warn!("no Tokio runtime; simulation stays disabled");
                return;
            };
            let prefs = &self.shared.prefs;
            control.tasks.push(self.spawn_periodic(
                &handle,
                "movement",
                prefs.movement_interval(),
                SimShared::move_actors,
            ));
            control.tasks.push(self.spawn_periodic(
                &handle,
                "demand",
                prefs.demand_interval(),
                SimShared::spawn_demand,
            ));
        } else {
            control.stop_all();
        }
        control.enabled = enabled;
        info!(enabled, "simulation toggled");
        let _ = self.shared.events.send(SimulationEvent::Toggled { enabled });
    }

    fn spawn_periodic(
        &self,
        handle: &Handle,
        name: &'static str,
        period: Duration,
        tick: fn(&SimShared<S>),
    ) -> PeriodicTask {
        let period = period.max(MIN_PERIOD);
        let token = CancellationToken::new();
        let task_token = token.clone();
        let weak: Weak<SimShared<S>> = Arc::downgrade(&self.shared);
        let first = Instant::now() + period;
        let handle = handle.spawn(async move {
            let mut interval = tokio::time::interval_at(first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                let Some(shared) = weak.upgrade() else { break };
                shared.run_tick(&task_token, tick);
            }
            debug!(process = name, "periodic process stopped");
        });
        debug!(process = name, ?period, "periodic process started");
        PeriodicTask { token, handle }
    }

    /// Snapshot of the roster.
    pub fn actors(&self) -> Vec<Actor> {
        lock(&self.shared.roster).clone()
    }

    /// Subscribe to movement, spawn and toggle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SimulationEvent> {
        self.shared.events.subscribe()
    }

    /// The registry the demand process writes into.
    pub fn registry(&self) -> &MaterialRegistry<S> {
        &self.shared.registry
    }

    /// The channel spawn notifications go to.
    pub fn notifications(&self) -> &NotificationChannel {
        &self.shared.notifications
    }

    /// Preferences this simulator was built with.
    pub fn prefs(&self) -> &SimulationPrefs {
        &self.shared.prefs
    }
}
