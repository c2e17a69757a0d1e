//! Game simulation - the main game loop.
//!
//! This module contains the deterministic tick that advances players, rocks
//! and terrain. Given the same terrain and the same action sequence, two
//! simulations stay bit-identical, which is what rollback relies on.
//!
//! # Tick order
//!
//! 1. Each player, in `players` order, consumes one queued action: weapon
//!    switches, mode requests, movement, chunk registration, then weapon use.
//! 2. Rocks move in slot order and resolve terrain hits, agent hits and
//!    expiry.
//! 3. The frame counter advances.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxterra_physics::{
    check_ray_terrain_collision, InteractionMode, MovementConfig, MovementController, SolverConfig,
};
use voxterra_world::{
    chunk_coord_of, terraform_with_history, world_to_voxel, AgentRef, ChunkModification, ChunkStore,
    TerraformAction, TerraformBrush, TerraformConfig,
};

use crate::action::{ActionFlags, ActionQueue, PlayerAction};
use crate::event::SimEvent;
use crate::player::{Player, PlayerId, WEAPON_ROCK_LAUNCHER, WEAPON_TERRAFORM};
use crate::projectile::{Rock, RockArena, RockConfig, RockDestroyReason, RockId};
use crate::snapshot::{self, SimulationSnapshot, SnapshotError};

/// Game simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulation tick rate (ticks per second).
    pub tick_rate: u32,

    /// Movement physics configuration.
    pub movement: MovementConfig,

    /// Collision solver configuration.
    pub solver: SolverConfig,

    /// Terraform sweep limits.
    pub terraform: TerraformConfig,

    /// Rock launcher configuration.
    pub rocks: RockConfig,

    /// Pending actions kept per player.
    pub action_queue_capacity: usize,

    /// Terraform tool density change per second at the brush center.
    pub terraform_speed: f32,

    /// Terraform tool brush radius.
    pub terraform_radius: f32,

    /// How far the terraform tool reaches.
    pub terraform_reach: f32,

    /// Eye height above the shape center, as a fraction of its half height.
    pub eye_height: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            movement: MovementConfig::default(),
            solver: SolverConfig::default(),
            terraform: TerraformConfig::default(),
            rocks: RockConfig::default(),
            action_queue_capacity: 32,
            terraform_speed: 200.0,
            terraform_radius: 3.0,
            terraform_reach: 48.0,
            eye_height: 0.8,
        }
    }
}

impl SimulationConfig {
    /// Get the time step per tick in seconds.
    pub fn delta_time(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }
}

/// The main game simulation.
#[derive(Debug)]
pub struct Simulation {
    /// Current frame/tick number.
    pub frame: u64,

    pub config: SimulationConfig,

    /// All players, in processing order.
    pub players: Vec<Player>,

    /// Rocks in flight.
    pub rocks: RockArena,

    store: ChunkStore,
    controller: MovementController,
    queues: BTreeMap<PlayerId, ActionQueue>,
    pending_events: Vec<SimEvent>,
    next_player_id: PlayerId,
}

impl Simulation {
    /// Create a simulation over the given terrain.
    pub fn new(config: SimulationConfig, store: ChunkStore) -> Self {
        let controller = MovementController::new(config.movement.clone(), config.solver.clone());
        let rocks = RockArena::new(config.rocks.max_rocks);

        Self {
            frame: 0,
            config,
            players: Vec::new(),
            rocks,
            store,
            controller,
            queues: BTreeMap::new(),
            pending_events: Vec::new(),
            next_player_id: 1,
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    pub fn controller(&self) -> &MovementController {
        &self.controller
    }

    /// Get the delta time for this simulation.
    pub fn delta_time(&self) -> f32 {
        self.config.delta_time()
    }

    // ========================================================================
    // Players
    // ========================================================================

    /// Add a player falling in as a meteorite. Returns the player's ID.
    pub fn add_player(&mut self, name: &str, spawn: Vec3) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;

        self.players.push(Player::new(id, name.to_string(), spawn));
        self.queues.insert(id, ActionQueue::new(self.config.action_queue_capacity));
        self.register_agent(self.players.len() - 1);
        id
    }

    /// Remove a player, its pending actions and its rocks.
    pub fn remove_player(&mut self, id: PlayerId) {
        let Some(index) = self.players.iter().position(|p| p.id == id) else {
            return;
        };
        let player = self.players.remove(index);

        if let Some(chunk) = player.chunk.and_then(|coord| self.store.access_chunk_mut(coord)) {
            chunk.remove_agent(AgentRef(id));
        }
        for rock in player.rocks.into_iter().flatten() {
            self.rocks.free(rock);
        }
        self.queues.remove(&id);
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// Queue an action for a player.
    ///
    /// Returns false if the player is unknown or its queue is full; a full
    /// queue is reported as [`SimEvent::ActionDropped`] on the next tick.
    pub fn push_action(&mut self, id: PlayerId, action: PlayerAction) -> bool {
        let Some(queue) = self.queues.get_mut(&id) else {
            return false;
        };
        if queue.push(action) {
            return true;
        }
        self.pending_events.push(SimEvent::ActionDropped { player: id });
        false
    }

    /// Actions waiting for a player.
    pub fn pending_actions(&self, id: PlayerId) -> usize {
        self.queues.get(&id).map_or(0, ActionQueue::len)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advance the simulation by one tick.
    ///
    /// Players without a queued action idle for one tick.
    pub fn tick(&mut self) -> Vec<SimEvent> {
        let mut events = std::mem::take(&mut self.pending_events);
        let dt = self.delta_time();

        for index in 0..self.players.len() {
            let id = self.players[index].id;
            let action = self
                .queues
                .get_mut(&id)
                .and_then(ActionQueue::pop)
                .unwrap_or_else(|| PlayerAction::idle(self.players[index].movement.view_direction, dt));
            self.step_player(index, &action, &mut events);
        }

        self.step_rocks(dt, &mut events);

        self.frame += 1;
        events
    }

    fn step_player(&mut self, index: usize, action: &PlayerAction, events: &mut Vec<SimEvent>) {
        let pressed = action.flags.pressed_since(self.players[index].held);
        let player = &mut self.players[index];
        let id = player.id;

        player.movement.set_view_direction(action.view_direction);

        if pressed.has(ActionFlags::NEXT_WEAPON) {
            player.cycle_weapon(true);
        }
        if pressed.has(ActionFlags::PREVIOUS_WEAPON) {
            player.cycle_weapon(false);
        }

        if pressed.has(ActionFlags::TOGGLE_FLOATING) {
            let target = match player.mode() {
                InteractionMode::Floating => InteractionMode::Standing,
                _ => InteractionMode::Floating,
            };
            if let Some((from, to)) = self.controller.request_mode(&mut player.movement, target) {
                events.push(SimEvent::ModeChanged { player: id, from, to });
            }
        }
        if pressed.has(ActionFlags::SWITCH_SHAPE) {
            self.controller.toggle_shape(&mut player.movement);
        }

        let outcome = self
            .controller
            .update(&mut player.movement, action.flags.movement(), &self.store, action.dt);
        if let Some((from, to)) = outcome.mode_changed {
            events.push(SimEvent::ModeChanged { player: id, from, to });
        }
        if outcome.landed {
            events.push(SimEvent::Landed { player: id });
        }

        self.register_agent(index);
        self.use_weapon(index, action, pressed, events);
        self.players[index].held = action.flags;
    }

    /// Move a player's registration to the chunk it now occupies.
    fn register_agent(&mut self, index: usize) {
        let player = &mut self.players[index];
        let coord = chunk_coord_of(world_to_voxel(player.position()));
        if player.chunk == Some(coord) {
            return;
        }

        let agent = AgentRef(player.id);
        if let Some(chunk) = player.chunk.take().and_then(|old| self.store.access_chunk_mut(old)) {
            chunk.remove_agent(agent);
        }
        if self.store.get_chunk(coord).add_agent(agent) {
            player.chunk = Some(coord);
        } else {
            log::debug!("chunk {:?} has no room for player {}", coord, player.id);
        }
    }

    /// Eye position and look direction of a player.
    fn aim(&self, player: &Player) -> (Vec3, Vec3) {
        let half_height = self.controller.radii(&player.movement).y;
        let eye = player.position() + player.movement.up * half_height * self.config.eye_height;
        (eye, player.movement.view_direction)
    }

    fn use_weapon(&mut self, index: usize, action: &PlayerAction, pressed: ActionFlags, events: &mut Vec<SimEvent>) {
        match self.players[index].weapon {
            WEAPON_TERRAFORM => self.use_terraform_tool(index, action, events),
            WEAPON_ROCK_LAUNCHER => {
                if pressed.has(ActionFlags::TRIGGER_PRIMARY) {
                    self.fire_rock(index, events);
                }
            }
            _ => {}
        }
    }

    fn use_terraform_tool(&mut self, index: usize, action: &PlayerAction, events: &mut Vec<SimEvent>) {
        let destroy = action.flags.has(ActionFlags::TRIGGER_PRIMARY);
        let build = action.flags.has(ActionFlags::TRIGGER_SECONDARY);
        let speed = self.config.terraform_speed;

        let player = &mut self.players[index];
        if !(destroy || build) {
            player.terraform_dt = 0.0;
            return;
        }

        let dt = if action.accumulated_dt > 0.0 {
            player.terraform_dt = 0.0;
            action.accumulated_dt
        } else {
            match player.accumulate_terraform(action.dt, speed) {
                Some(dt) => dt,
                None => return,
            }
        };

        let player = &self.players[index];
        let (eye, direction) = self.aim(player);
        let Some(hit) =
            check_ray_terrain_collision(&self.store, eye, direction, self.config.terraform_reach, &self.config.solver)
        else {
            return;
        };

        let brush = TerraformBrush {
            center: hit.point,
            radius: self.config.terraform_radius,
            speed,
            dt,
            action: if destroy {
                TerraformAction::Destroy
            } else {
                TerraformAction::Build
            },
            color: player.color,
        };
        let report = terraform_with_history(&mut self.store, &brush, &self.config.terraform);
        events.extend(report.changed_chunks.into_iter().map(|chunk| SimEvent::TerrainModified { chunk }));
    }

    fn fire_rock(&mut self, index: usize, events: &mut Vec<SimEvent>) {
        let player = &self.players[index];
        let Some(slot) = player.free_rock_slot() else {
            return;
        };

        let (eye, direction) = self.aim(player);
        let rock = Rock {
            position: eye,
            velocity: direction * self.config.rocks.speed,
            up: player.movement.up,
            owner: player.id,
            weapon: WEAPON_ROCK_LAUNCHER,
            slot,
            age: 0.0,
        };

        let Some(rock_id) = self.rocks.spawn(rock) else {
            log::debug!("rock arena full, player {} cannot fire", player.id);
            return;
        };

        let player = &mut self.players[index];
        player.rocks[slot] = Some(rock_id);
        events.push(SimEvent::RockFired {
            player: player.id,
            rock: rock_id,
        });
    }

    // ========================================================================
    // Rocks
    // ========================================================================

    fn step_rocks(&mut self, dt: f32, events: &mut Vec<SimEvent>) {
        let config = self.config.rocks.clone();

        for id in self.rocks.ids() {
            let Some(rock) = self.rocks.get_mut(id) else {
                continue;
            };
            rock.age += dt;
            rock.velocity -= rock.up * config.gravity * dt;
            let start = rock.position;
            let step = rock.velocity * dt;
            let (owner, age) = (rock.owner, rock.age);

            let hit = check_ray_terrain_collision(&self.store, start, step, step.length(), &self.config.solver);
            if let Some(hit) = hit {
                let brush = TerraformBrush {
                    center: hit.point,
                    radius: config.blast_radius,
                    speed: config.blast_strength,
                    dt: 1.0,
                    action: TerraformAction::Destroy,
                    color: 0,
                };
                let report = terraform_with_history(&mut self.store, &brush, &self.config.terraform);
                events.extend(report.changed_chunks.into_iter().map(|chunk| SimEvent::TerrainModified { chunk }));
                self.destroy_rock(id, RockDestroyReason::Terrain, events);
                continue;
            }

            let position = start + step;
            if let Some(rock) = self.rocks.get_mut(id) {
                rock.position = position;
            }

            if let Some(target) = self.agent_hit_by_rock(position, owner, config.radius) {
                events.push(SimEvent::AgentHit { shooter: owner, target });
                self.destroy_rock(id, RockDestroyReason::Agent, events);
                continue;
            }

            if age >= config.lifetime {
                self.destroy_rock(id, RockDestroyReason::Expired, events);
            }
        }
    }

    /// First agent registered in the rock's chunk whose shape the rock touches.
    fn agent_hit_by_rock(&self, position: Vec3, owner: PlayerId, radius: f32) -> Option<PlayerId> {
        let chunk = self.store.access_chunk(chunk_coord_of(world_to_voxel(position)))?;

        chunk
            .agents()
            .iter()
            .filter(|agent| agent.0 != owner)
            .filter_map(|agent| self.get_player(agent.0))
            .find(|player| {
                let reach = self.controller.radii(&player.movement) + Vec3::splat(radius);
                ((position - player.position()) / reach).length_squared() <= 1.0
            })
            .map(|player| player.id)
    }

    fn destroy_rock(&mut self, id: RockId, reason: RockDestroyReason, events: &mut Vec<SimEvent>) {
        let Some(rock) = self.rocks.free(id) else {
            return;
        };
        if let Some(owner) = self.get_player_mut(rock.owner) {
            owner.release_rock(rock.slot, id);
        }
        log::debug!("rock {:?} of player {} destroyed: {:?}", id, rock.owner, reason);
        events.push(SimEvent::RockDestroyed { rock: id, reason });
    }

    // ========================================================================
    // Synchronization and rollback
    // ========================================================================

    /// Collect the terrain changes since the previous sync point and start a
    /// new modification cycle.
    pub fn sync_point(&mut self) -> Vec<ChunkModification> {
        let records = self.store.collect_modifications();
        self.store.reset_modification_tracker();
        records
    }

    /// Encode the current frame, players and rocks.
    ///
    /// Take snapshots right after [`Simulation::sync_point`] so that
    /// [`Simulation::restore`] can roll terrain back to the same moment.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        snapshot::encode(&SimulationSnapshot {
            frame: self.frame,
            players: self.players.clone(),
            rocks: self.rocks.clone(),
        })
    }

    /// Roll back to a snapshot.
    ///
    /// Terrain changes recorded since the last sync point are reverted.
    /// Pending actions of players that still exist are kept. On a decode
    /// error nothing is changed.
    pub fn restore(&mut self, data: &[u8]) -> Result<(), SnapshotError> {
        let snapshot = snapshot::decode(data)?;

        for player in &self.players {
            if let Some(chunk) = player.chunk.and_then(|coord| self.store.access_chunk_mut(coord)) {
                chunk.remove_agent(AgentRef(player.id));
            }
        }
        self.store.revert_modifications();

        self.frame = snapshot.frame;
        self.players = snapshot.players;
        self.rocks = snapshot.rocks;

        let capacity = self.config.action_queue_capacity;
        self.queues.retain(|id, _| snapshot_has(&self.players, *id));
        for index in 0..self.players.len() {
            let id = self.players[index].id;
            self.queues.entry(id).or_insert_with(|| ActionQueue::new(capacity));
            self.next_player_id = self.next_player_id.max(id + 1);

            self.players[index].chunk = None;
            self.register_agent(index);
        }

        log::debug!("restored frame {}", self.frame);
        Ok(())
    }
}

fn snapshot_has(players: &[Player], id: PlayerId) -> bool {
    players.iter().any(|p| p.id == id)
}

// ============================================================================
// Tests
// ============================================================================
