//! Builds the running system out of a validated config: openers, doors,
//! vehicle workers and the status-topic routing table.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use geogdo_config::{Config, DoorConfig, OpenerConfig};
use geogdo_domain::ingest::Dispatcher;
use geogdo_domain::{Door, Vehicle};
use geogdo_opener_api::{NoopOpener, Opener};
use geogdo_opener_bus::{
    ratgdo_commands, telemetry_channel, BusOpener, DoorTelemetry, LoopbackBus, RatgdoTopics,
};
use geogdo_opener_http::HttpOpener;
use tokio::sync::watch;
use tracing::info;

use crate::feed::StdoutBus;

#[derive(Debug, Clone, Copy)]
enum StatusField {
    Door,
    Obstruction,
    Availability,
}

/// Routes door status topics into the telemetry feed of the matching
/// opener.
#[derive(Default)]
pub struct StatusRouter {
    routes: HashMap<String, (watch::Sender<DoorTelemetry>, StatusField)>,
}

impl StatusRouter {
    fn add(&mut self, sender: &watch::Sender<DoorTelemetry>, topic: String, field: StatusField) {
        self.routes.insert(topic, (sender.clone(), field));
    }

    /// Apply a message if its topic is a known status topic. Returns
    /// whether the message was consumed.
    pub fn route(&self, topic: &str, payload: &str) -> bool {
        let Some((sender, field)) = self.routes.get(topic) else {
            return false;
        };
        let payload = payload.to_string();
        sender.send_modify(|t| match field {
            StatusField::Door => t.door_state = payload,
            StatusField::Obstruction => t.obstruction = payload,
            StatusField::Availability => t.availability = payload,
        });
        true
    }
}

/// Everything `main` needs to run the daemon loop.
pub struct App {
    pub dispatcher: Dispatcher,
    pub status: StatusRouter,
    pub doors: Vec<Arc<Door>>,
}

pub fn build(config: &Config, testing: bool) -> anyhow::Result<App> {
    let mut dispatcher = Dispatcher::new(config.global.tracker_prefix.clone());
    let mut status = StatusRouter::default();
    let mut doors = Vec::new();

    for door_config in &config.garage_doors {
        let geofence = door_config
            .resolve_geofence()
            .with_context(|| format!("door `{}`", door_config.id))?;
        let opener = build_opener(door_config, testing, &mut status);
        let door = Door::new(
            door_config.id.clone(),
            geofence,
            opener,
            door_config.cooldown(&config.global),
            config.global.max_retries,
        );
        info!(
            door = %door.id,
            opener = door.opener.name(),
            vehicles = door_config.vehicles.len(),
            "configured garage door"
        );

        for vehicle in &door_config.vehicles {
            dispatcher.add_vehicle(Vehicle::new(
                vehicle.tracker_id,
                door.clone(),
                config.global.assume_at_home,
            ));
        }
        doors.push(door);
    }

    Ok(App {
        dispatcher,
        status,
        doors,
    })
}

fn build_opener(
    door: &DoorConfig,
    testing: bool,
    status: &mut StatusRouter,
) -> Box<dyn Opener> {
    // Testing mode swaps every controller for a simulated door so the full
    // trigger/await cycle runs with no hardware attached.
    if testing {
        let (tx, rx) = telemetry_channel();
        let bus = LoopbackBus::new(tx, "closed");
        return Box::new(BusOpener::new(
            door.id.clone(),
            format!("testing/{}", door.id),
            ratgdo_commands(),
            Duration::from_secs(30),
            Box::new(bus),
            rx,
        ));
    }

    match &door.opener {
        OpenerConfig::Ratgdo {
            topic_prefix,
            status_timeout_secs,
        } => {
            let (tx, rx) = telemetry_channel();
            let topics = RatgdoTopics::under(topic_prefix);
            status.add(&tx, topics.door, StatusField::Door);
            status.add(&tx, topics.obstruction, StatusField::Obstruction);
            status.add(&tx, topics.availability, StatusField::Availability);
            Box::new(BusOpener::new(
                door.id.clone(),
                topic_prefix.clone(),
                ratgdo_commands(),
                Duration::from_secs(*status_timeout_secs),
                Box::new(StdoutBus),
                rx,
            ))
        }
        OpenerConfig::Bus {
            topic_prefix,
            commands,
            status_topics,
            status_timeout_secs,
        } => {
            let (tx, rx) = telemetry_channel();
            status.add(
                &tx,
                format!("{topic_prefix}/{}", status_topics.door),
                StatusField::Door,
            );
            status.add(
                &tx,
                format!("{topic_prefix}/{}", status_topics.obstruction),
                StatusField::Obstruction,
            );
            status.add(
                &tx,
                format!("{topic_prefix}/{}", status_topics.availability),
                StatusField::Availability,
            );
            Box::new(BusOpener::new(
                door.id.clone(),
                topic_prefix.clone(),
                commands.clone(),
                Duration::from_secs(*status_timeout_secs),
                Box::new(StdoutBus),
                rx,
            ))
        }
        OpenerConfig::Http {
            settings,
            status_timeout_secs,
        } => Box::new(HttpOpener::new(
            door.id.clone(),
            settings.clone(),
            Duration::from_secs(*status_timeout_secs),
        )),
        OpenerConfig::Noop => Box::new(NoopOpener::new()),
    }
}
