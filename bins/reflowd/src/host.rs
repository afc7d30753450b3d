// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Long-running host: registry + notifications + simulator, with every
//! change logged.

use anyhow::Result;
use reflow_app_core::config::ConfigService;
use reflow_app_core::prefs::{SimulationPrefs, SIMULATION_PREFS_KEY};
use reflow_config_fs::FsConfigStore;
use reflow_core::{
    MaterialRegistry, MaterialStats, NotificationChannel, NotificationEvent, RegistryEvent,
    SimulationEvent, Simulator,
};
use std::time::Duration;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, info, warn};

/// Load prefs best-effort and persist defaults once if absent.
fn load_prefs(store: &FsConfigStore) -> SimulationPrefs {
    let config = ConfigService::new(store.clone());
    match config.load::<SimulationPrefs>(SIMULATION_PREFS_KEY) {
        Ok(Some(prefs)) => prefs,
        Ok(None) => {
            let prefs = SimulationPrefs::default();
            if let Err(err) = config.save(SIMULATION_PREFS_KEY, &prefs) {
                warn!(?err, "could not write default simulation prefs");
            }
            prefs
        }
        Err(err) => {
            warn!(?err, "simulation prefs unreadable; using defaults");
            SimulationPrefs::default()
        }
    }
}

pub async fn run(store: FsConfigStore, for_secs: Option<u64>, paused: bool) -> Result<()> {
    let mut prefs = load_prefs(&store);
    if paused {
        prefs.enabled = false;
    }
    info!(dir = %store.base().display(), "using data dir");

    let registry = MaterialRegistry::restore(store);
    let notifications = NotificationChannel::new(prefs.notification_ttl());
    let simulator = Simulator::new(registry.clone(), notifications.clone(), prefs);

    let watcher = tokio::spawn(log_events(
        registry.subscribe(),
        simulator.subscribe(),
        notifications.subscribe(),
    ));

    simulator.start();
    info!(
        materials = registry.len(),
        enabled = simulator.is_enabled(),
        "reflowd running"
    );

    match for_secs {
        Some(secs) => {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
                res = tokio::signal::ctrl_c() => res?,
            }
        }
        None => tokio::signal::ctrl_c().await?,
    }

    simulator.shutdown();
    notifications.shutdown();
    watcher.abort();
    let stats = MaterialStats::from_materials(&registry.list());
    info!(?stats, "reflowd stopped");
    Ok(())
}

async fn log_events(
    mut materials: Receiver<RegistryEvent>,
    mut simulation: Receiver<SimulationEvent>,
    mut notifications: Receiver<NotificationEvent>,
) {
    loop {
        tokio::select! {
            ev = materials.recv() => match ev {
                Ok(ev) => log_registry(&ev),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "registry events lagged"),
                Err(RecvError::Closed) => break,
            },
            ev = simulation.recv() => match ev {
                Ok(ev) => log_simulation(&ev),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "simulation events lagged"),
                Err(RecvError::Closed) => break,
            },
            ev = notifications.recv() => match ev {
                Ok(ev) => log_notification(&ev),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notification events lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
}

fn log_registry(ev: &RegistryEvent) {
    match ev {
        RegistryEvent::Created(m) => info!(
            material_id = %m.id,
            kind = %m.kind,
            lat = m.position.lat,
            lng = m.position.lng,
            "new material"
        ),
        RegistryEvent::Claimed { id, collector_id } => {
            info!(material_id = %id, %collector_id, "material claimed");
        }
        RegistryEvent::Completed { id } => info!(material_id = %id, "material collected"),
        RegistryEvent::Reset => info!("registry reset"),
    }
}

fn log_simulation(ev: &SimulationEvent) {
    match ev {
        SimulationEvent::ActorsMoved(actors) => {
            for a in actors {
                debug!(truck = %a.id, lat = a.position.lat, lng = a.position.lng, "truck moved");
            }
        }
        SimulationEvent::MaterialSpawned(m) => debug!(material_id = %m.id, "organic demand"),
        SimulationEvent::Toggled { enabled } => info!(enabled, "simulation toggled"),
    }
}

fn log_notification(ev: &NotificationEvent) {
    match ev {
        NotificationEvent::Posted(n) => {
            info!(notification_id = n.id, severity = ?n.severity, "{}", n.message);
        }
        NotificationEvent::Expired(id) => debug!(notification_id = id, "notification expired"),
        NotificationEvent::Dismissed(id) => debug!(notification_id = id, "notification dismissed"),
    }
}
