//! The per-step control loop.
//!
//! Each `EnvStep` event schedules its successor first, then collects the
//! environment's step, sends it to the agent and blocks on the reply. No
//! simulated time passes while the agent thinks.
//!
//! A step only fires when its whole interval fits inside the run, so a run of
//! `D` at interval `I` exchanges exactly `floor(D / I)` states.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{NetworkModel, SimTime, Simulator};
use crate::bridge::{AgentChannel, AgentMessage, EndReason, SimMessage};
use crate::env::{Environment, StepState};
use crate::error::BridgeError;
use crate::spaces::BoxContainer;

/// Events the bridge puts on the simulation clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeEvent {
    EnvStep,
}

/// Where the scheduler is within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Scheduled,
    Notifying,
    AwaitingAction,
    Applying,
    Finished,
}

/// What one episode did, for the end-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub run_id: Uuid,
    pub steps: u64,
    pub actions_applied: u64,
    pub actions_rejected: u64,
    pub end_time: SimTime,
    pub end_reason: Option<EndReason>,
    pub stopped_by_agent: bool,
    pub total_reward: f64,
}

impl EpisodeReport {
    pub fn mean_reward(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total_reward / self.steps as f64
        }
    }
}

pub struct StepScheduler<E> {
    env: E,
    step_interval: SimTime,
    phase: Phase,
    run_id: Uuid,
    steps: u64,
    actions_applied: u64,
    actions_rejected: u64,
    total_reward: f64,
    stopped_by_agent: bool,
    game_over: bool,
}

impl<E: Environment> StepScheduler<E> {
    pub fn new(env: E, step_interval: SimTime) -> Self {
        Self {
            env,
            step_interval,
            phase: Phase::Idle,
            run_id: Uuid::new_v4(),
            steps: 0,
            actions_applied: 0,
            actions_rejected: 0,
            total_reward: 0.0,
            stopped_by_agent: false,
            game_over: false,
        }
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_env(self) -> E {
        self.env
    }

    /// Run one episode of `duration` simulated time against `channel`.
    ///
    /// The first step fires at time zero and step `k` fires at `k * interval`
    /// only while `(k + 1) * interval <= duration`. Unless the agent stopped
    /// the run, a single `end` message follows the last step; the channel is
    /// closed either way.
    pub async fn run<C, M>(
        &mut self,
        duration: SimTime,
        channel: &mut C,
        model: &mut M,
    ) -> Result<EpisodeReport, BridgeError>
    where
        C: AgentChannel,
        M: NetworkModel,
    {
        let mut sim = Simulator::new();
        sim.stop_at(duration);
        self.env.reset();

        info!(run_id = %self.run_id, duration = %duration, interval = %self.step_interval, "episode starting");
        self.handshake(channel).await?;

        if !self.stopped_by_agent && self.window_fits(SimTime::ZERO, duration) {
            sim.schedule_at(SimTime::ZERO, BridgeEvent::EnvStep);
            self.phase = Phase::Scheduled;
        }

        while let Some((now, event)) = sim.pop() {
            model.advance_to(now);
            match event {
                BridgeEvent::EnvStep => self.fire(&mut sim, now, duration, channel).await?,
            }
        }
        let end_time = sim.now();
        model.advance_to(end_time);

        let end_reason = if self.stopped_by_agent {
            None
        } else {
            let reason = if self.game_over {
                EndReason::GameOver
            } else {
                EndReason::SimulationEnd
            };
            channel
                .send(&SimMessage::End {
                    step: self.steps,
                    sim_time: end_time.as_secs_f64(),
                    reason,
                })
                .await?;
            Some(reason)
        };
        channel.close().await?;
        self.phase = Phase::Finished;

        info!(
            run_id = %self.run_id,
            steps = self.steps,
            end_time = %end_time,
            stopped_by_agent = self.stopped_by_agent,
            "episode finished"
        );

        Ok(EpisodeReport {
            run_id: self.run_id,
            steps: self.steps,
            actions_applied: self.actions_applied,
            actions_rejected: self.actions_rejected,
            end_time,
            end_reason,
            stopped_by_agent: self.stopped_by_agent,
            total_reward: self.total_reward,
        })
    }

    async fn handshake<C: AgentChannel>(&mut self, channel: &mut C) -> Result<(), BridgeError> {
        channel
            .send(&SimMessage::Init {
                run_id: self.run_id,
                observation_space: self.env.observation_space(),
                action_space: self.env.action_space(),
            })
            .await?;
        match channel.recv().await? {
            AgentMessage::InitAck => Ok(()),
            AgentMessage::Stop => {
                info!(run_id = %self.run_id, "agent stopped the run before the first step");
                self.stopped_by_agent = true;
                Ok(())
            }
            other => Err(BridgeError::UnexpectedMessage {
                expected: "init_ack",
                got: other.kind().to_string(),
            }),
        }
    }

    /// `true` when a step starting at `start` completes its interval by `duration`.
    fn window_fits(&self, start: SimTime, duration: SimTime) -> bool {
        self.step_interval > SimTime::ZERO && start.saturating_add(self.step_interval) <= duration
    }

    async fn fire<C: AgentChannel>(
        &mut self,
        sim: &mut Simulator<BridgeEvent>,
        now: SimTime,
        duration: SimTime,
        channel: &mut C,
    ) -> Result<(), BridgeError> {
        // Successor first, so a slow agent cannot shift the step grid.
        let next = now.saturating_add(self.step_interval);
        if self.window_fits(next, duration) {
            sim.schedule_at(next, BridgeEvent::EnvStep);
        }

        self.phase = Phase::Notifying;
        let state = StepState {
            step_index: self.steps,
            sim_time: now,
        };
        let outcome = self.env.step(&state)?;
        self.steps += 1;
        self.total_reward += f64::from(outcome.reward.value());

        debug!(
            step = state.step_index,
            sim_time = %now,
            observation = ?outcome.observation.values,
            reward = outcome.reward.value(),
            "step"
        );

        channel
            .send(&SimMessage::State {
                step: state.step_index,
                sim_time: now.as_secs_f64(),
                observation: outcome.observation,
                reward: outcome.reward.value(),
                done: outcome.done,
                extra_info: outcome.extra_info,
            })
            .await?;

        self.phase = Phase::AwaitingAction;
        match channel.recv().await? {
            AgentMessage::Action { values } => {
                self.phase = Phase::Applying;
                if self.env.execute(&BoxContainer::from_values(values)) {
                    self.actions_applied += 1;
                } else {
                    self.actions_rejected += 1;
                }
            }
            AgentMessage::Stop => {
                info!(step = state.step_index, sim_time = %now, "agent requested stop");
                self.stopped_by_agent = true;
                sim.stop_now();
            }
            other => {
                return Err(BridgeError::UnexpectedMessage {
                    expected: "action",
                    got: other.kind().to_string(),
                })
            }
        }

        if outcome.done && !self.stopped_by_agent {
            info!(step = state.step_index, sim_time = %now, "environment reported game over");
            self.game_over = true;
            sim.stop_now();
        }
        self.phase = Phase::Scheduled;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
