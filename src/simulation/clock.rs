//! World clock and the authoritative simulation loop
//!
//! `Simulation` owns the world and is driven synchronously, which keeps it
//! testable without a runtime. `SimulationLoop` drives it on a tokio
//! interval and is the single writer of world state: control commands and
//! publish outcomes are applied between ticks, never during one.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::broadcast::hub::{BroadcastHub, ControlCommand};
use crate::broadcast::protocol::{BotSpeak, ResetComplete, ServerMessage};
use crate::broadcast::snapshot::WorldSnapshot;
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::publish::worker::{PublishJob, PublishOutcome, PublishQueue};
use crate::simulation::social::{Speech, SpeechSource};
use crate::simulation::tick::{run_simulation_tick, TickReport};
use crate::world::spawn::generate_world;
use crate::world::World;

pub struct Simulation {
    config: EngineConfig,
    world: World,
    speed: f32,
}

impl Simulation {
    pub fn new(config: EngineConfig) -> Self {
        let world = generate_world(&config, 0);
        let speed = config.clock.initial_speed;
        Self { config, world, speed }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn generation(&self) -> u64 {
        self.world.generation
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Wall-clock interval between ticks at the current speed
    pub fn tick_interval(&self) -> Duration {
        let ms = self.config.clock.base_tick_ms as f64 / self.speed as f64;
        Duration::from_secs_f64(ms.max(1.0) / 1000.0)
    }

    pub fn tick(&mut self) -> TickReport {
        run_simulation_tick(&mut self.world, &self.config, self.config.clock.sim_dt_secs)
    }

    /// Take everything the bots said since the last drain
    pub fn drain_speeches(&mut self) -> Vec<Speech> {
        std::mem::take(&mut self.world.outbox)
    }

    /// Replace the whole world with a fresh one from the configured seed
    pub fn reset(&mut self) -> ResetComplete {
        let generation = self.world.generation + 1;
        self.world = generate_world(&self.config, generation);
        info!(
            generation,
            agents = self.world.agent_count(),
            spots = self.world.env.resources.len(),
            "world reset"
        );
        ResetComplete {
            generation,
            agents: self.world.agent_count(),
            spots: self.world.env.resources.len(),
        }
    }

    pub fn set_speed(&mut self, speed: f32) -> Result<f32> {
        if !self.config.is_allowed_speed(speed) {
            return Err(EngineError::InvalidConfig(format!(
                "speed {} not in {:?}",
                speed, self.config.clock.allowed_speeds
            )));
        }
        self.speed = speed;
        Ok(speed)
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::capture(&self.world, self.speed)
    }

    /// Fold a publish outcome back into the world. Returns the `bot:speak`
    /// payload for posts the content service accepted.
    pub fn apply_outcome(&mut self, outcome: PublishOutcome) -> Option<BotSpeak> {
        if outcome.generation != self.world.generation {
            debug!(
                generation = outcome.generation,
                current = self.world.generation,
                "discarding outcome from previous world"
            );
            return None;
        }

        let speech = outcome.speech;
        match outcome.result {
            Ok(receipt) => {
                if let Some(agent) = self.world.agent_mut(speech.agent_id) {
                    agent.counters.posts += 1;
                }
                Some(BotSpeak {
                    agent_id: speech.agent_id,
                    name: speech.name,
                    color: speech.color,
                    post_id: Some(receipt.post_id),
                    title: speech.title,
                    content: speech.content,
                    timestamp: receipt.timestamp,
                })
            }
            Err(e) if e.is_soft() => {
                if let SpeechSource::Need { need, level, previous } = speech.source {
                    if let Some(agent) = self.world.agent_mut(speech.agent_id) {
                        // A newer announcement for this need wins over the rollback
                        if agent.announcements.last_announced(need) == Some(level) {
                            agent.announcements.restore(need, previous);
                        }
                    }
                }
                None
            }
            Err(e) => {
                error!(agent = %speech.agent_id, error = %e, "announcement lost");
                None
            }
        }
    }
}

/// Async driver wiring the simulation to observers and the publish worker
pub struct SimulationLoop {
    sim: Simulation,
    hub: BroadcastHub,
    control: mpsc::Receiver<ControlCommand>,
    publish: PublishQueue,
    outcomes: mpsc::UnboundedReceiver<PublishOutcome>,
}

impl SimulationLoop {
    pub fn new(
        sim: Simulation,
        hub: BroadcastHub,
        control: mpsc::Receiver<ControlCommand>,
        publish: PublishQueue,
        outcomes: mpsc::UnboundedReceiver<PublishOutcome>,
    ) -> Self {
        Self {
            sim,
            hub,
            control,
            publish,
            outcomes,
        }
    }

    /// Run until `shutdown` fires or its sender is dropped; hands the
    /// simulation back for inspection
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) -> Simulation {
        self.hub.publish_snapshot(self.sim.snapshot());
        let mut ticker = make_interval(self.sim.tick_interval());
        info!(
            generation = self.sim.generation(),
            speed = self.sim.speed(),
            "simulation loop started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(tick = self.sim.world().current_tick, "simulation loop stopping");
                    break;
                }
                Some(cmd) = self.control.recv() => {
                    if self.handle_command(cmd) {
                        ticker = make_interval(self.sim.tick_interval());
                    }
                }
                Some(outcome) = self.outcomes.recv() => {
                    self.apply_outcome(outcome);
                }
                _ = ticker.tick() => {
                    self.tick_once();
                }
            }
        }
        self.sim
    }

    fn tick_once(&mut self) {
        while let Ok(outcome) = self.outcomes.try_recv() {
            self.apply_outcome(outcome);
        }

        let report = self.sim.tick();

        let generation = self.sim.generation();
        for speech in self.sim.drain_speeches() {
            if let Err(job) = self.publish.submit(PublishJob { generation, speech }) {
                warn!(agent = %job.speech.agent_id, "publish queue full, skipping post");
                self.apply_outcome(PublishOutcome::dropped(job));
            }
        }

        let every = self.sim.config().clock.broadcast_every_ticks.max(1);
        if report.tick % every == 0 {
            self.hub.publish_update(self.sim.snapshot());
        }
    }

    fn apply_outcome(&mut self, outcome: PublishOutcome) {
        if let Some(speak) = self.sim.apply_outcome(outcome) {
            self.hub.send(&ServerMessage::BotSpeak(speak));
        }
    }

    /// Returns true when the tick interval must be rebuilt
    fn handle_command(&mut self, cmd: ControlCommand) -> bool {
        match cmd {
            ControlCommand::SetSpeed(speed) => match self.sim.set_speed(speed) {
                Ok(speed) => {
                    info!(speed, "speed changed");
                    self.hub.send(&ServerMessage::Speed { speed });
                    true
                }
                Err(e) => {
                    warn!(error = %e, "rejected speed change");
                    false
                }
            },
            ControlCommand::Reset => {
                info!(generation = self.sim.generation(), "reset requested");
                let ack = self.sim.reset();
                self.hub.send(&ServerMessage::ResetComplete(ack));
                self.hub.publish_snapshot(self.sim.snapshot());
                false
            }
        }
    }
}

/// First tick lands one full period from now, so a rebuilt interval never
/// fires an extra tick at the old pace
fn make_interval(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::needs::{NeedKind, NeedLevel};
    use crate::publish::contract::{PublishError, PublishReceipt};

    fn small_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.world.agent_count = 4;
        config
    }

    fn speech_for(sim: &Simulation, source: SpeechSource) -> Speech {
        let agent = &sim.world().agents[0];
        Speech {
            agent_id: agent.id,
            name: agent.appearance.name.clone(),
            color: agent.appearance.color.clone(),
            title: "Parched".into(),
            content: "Need water soon.".into(),
            source,
            tick: 1,
        }
    }

    #[test]
    fn test_set_speed_rejects_unlisted() {
        let mut sim = Simulation::new(small_config());
        assert_eq!(sim.set_speed(4.0).unwrap(), 4.0);
        assert!(sim.set_speed(3.0).is_err());
        assert_eq!(sim.speed(), 4.0);
    }

    #[test]
    fn test_tick_interval_scales_with_speed() {
        let mut sim = Simulation::new(small_config());
        let base = sim.tick_interval();
        sim.set_speed(2.0).unwrap();
        let doubled = sim.tick_interval().as_secs_f64() * 2.0;
        assert!((doubled - base.as_secs_f64()).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_rebuilt_interval_waits_a_full_period() {
        let period = Duration::from_millis(40);
        let start = Instant::now();
        let mut ticker = make_interval(period);
        ticker.tick().await;
        assert!(start.elapsed() >= period);
    }

    #[test]
    fn test_reset_rebuilds_initial_world() {
        let mut sim = Simulation::new(small_config());
        let initial_spots = sim.world().env.resources.len();
        for _ in 0..200 {
            sim.tick();
        }
        sim.world_mut().agents.pop();

        let ack = sim.reset();
        assert_eq!(ack.generation, 1);
        assert_eq!(ack.agents, 4);
        assert_eq!(ack.spots, initial_spots);
        assert_eq!(sim.world().current_tick, 0);
        assert!(sim.drain_speeches().is_empty());
    }

    #[test]
    fn test_success_counts_post() {
        let mut sim = Simulation::new(small_config());
        let speech = speech_for(&sim, SpeechSource::Chatter);
        let outcome = PublishOutcome {
            generation: 0,
            speech,
            result: Ok(PublishReceipt {
                post_id: "p-1".into(),
                timestamp: 42,
            }),
        };
        let speak = sim.apply_outcome(outcome).unwrap();
        assert_eq!(speak.post_id.as_deref(), Some("p-1"));
        assert_eq!(speak.timestamp, 42);
        assert_eq!(sim.world().agents[0].counters.posts, 1);
    }

    #[test]
    fn test_stale_outcome_is_discarded() {
        let mut sim = Simulation::new(small_config());
        let speech = speech_for(&sim, SpeechSource::Chatter);
        sim.reset();
        let outcome = PublishOutcome {
            generation: 0,
            speech,
            result: Ok(PublishReceipt {
                post_id: "p-1".into(),
                timestamp: 42,
            }),
        };
        assert!(sim.apply_outcome(outcome).is_none());
    }

    #[test]
    fn test_soft_failure_rolls_back_announcement() {
        let mut sim = Simulation::new(small_config());
        sim.world_mut().agents[0]
            .announcements
            .record(NeedKind::Water, NeedLevel::Seeking);

        let speech = speech_for(
            &sim,
            SpeechSource::Need {
                need: NeedKind::Water,
                level: NeedLevel::Seeking,
                previous: None,
            },
        );
        let outcome = PublishOutcome {
            generation: 0,
            speech,
            result: Err(PublishError::RateLimited),
        };
        assert!(sim.apply_outcome(outcome).is_none());
        assert_eq!(sim.world().agents[0].announcements.last_announced(NeedKind::Water), None);
        assert_eq!(sim.world().agents[0].counters.posts, 0);
    }

    #[test]
    fn test_unknown_failure_keeps_announcement() {
        let mut sim = Simulation::new(small_config());
        sim.world_mut().agents[0]
            .announcements
            .record(NeedKind::Water, NeedLevel::Critical);

        let speech = speech_for(
            &sim,
            SpeechSource::Need {
                need: NeedKind::Water,
                level: NeedLevel::Critical,
                previous: Some(NeedLevel::Seeking),
            },
        );
        let outcome = PublishOutcome {
            generation: 0,
            speech,
            result: Err(PublishError::Unknown("timeout".into())),
        };
        assert!(sim.apply_outcome(outcome).is_none());
        assert_eq!(
            sim.world().agents[0].announcements.last_announced(NeedKind::Water),
            Some(NeedLevel::Critical)
        );
    }
}
