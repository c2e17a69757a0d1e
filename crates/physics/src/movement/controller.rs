//! Agent movement controller.
//!
//! This is the main entry point for agent movement. It takes the buttons held
//! this tick and advances a [`MovementState`] through the terrain.

use glam::Vec3;
use voxterra_world::ChunkStore;

use crate::collision::{collide_and_slide, Contact, Ellipsoid, SolverConfig};

use super::config::MovementConfig;
use super::state::{InteractionMode, MovementInput, MovementState, ShapeSwitch};

/// What happened during one [`MovementController::update`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MovementOutcome {
    /// Terrain contact at the end of the update.
    pub contact: Option<Contact>,
    /// Any movement button was held.
    pub made_movement: bool,
    /// Mode transition `(from, to)` that happened this update.
    pub mode_changed: Option<(InteractionMode, InteractionMode)>,
    /// The agent was airborne before this update and is grounded after it.
    pub landed: bool,
}

/// Agent movement controller.
///
/// # Example
///
/// ```ignore
/// let controller = MovementController::new(MovementConfig::default(), SolverConfig::default());
/// let mut state = MovementState::new(spawn, InteractionMode::Meteorite);
///
/// // Each tick:
/// let outcome = controller.update(&mut state, input, &store, dt);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MovementController {
    pub config: MovementConfig,
    pub solver: SolverConfig,
}

impl MovementController {
    pub fn new(config: MovementConfig, solver: SolverConfig) -> Self {
        Self { config, solver }
    }

    /// Collision half extents for the state's mode, blended during a shape switch.
    pub fn radii(&self, state: &MovementState) -> Vec3 {
        match state.shape_switch {
            Some(switch) => self
                .config
                .radii(switch.from)
                .lerp(self.config.radii(switch.to), switch.progress()),
            None => self.config.radii(state.mode),
        }
    }

    /// Update agent movement for one tick.
    pub fn update(
        &self,
        state: &mut MovementState,
        input: MovementInput,
        store: &ChunkStore,
        dt: f32,
    ) -> MovementOutcome {
        let mut outcome = MovementOutcome::default();

        let dt = dt.min(self.config.max_delta_time);
        if !(dt > 0.0) {
            return outcome;
        }

        self.advance_shape_switch(state, dt, &mut outcome);

        let was_grounded = state.grounded;
        match state.mode {
            InteractionMode::Meteorite => self.meteorite_move(state, store, dt, &mut outcome),
            InteractionMode::Floating => self.floating_move(state, input, dt, &mut outcome),
            InteractionMode::Standing | InteractionMode::Ball => {
                self.surface_move(state, input, store, dt, &mut outcome)
            }
        }
        outcome.landed = !was_grounded && state.grounded;

        outcome
    }

    /// Switch between floating and standing.
    ///
    /// Only `Floating` and `Standing` may be requested; other requests and
    /// requests for the current mode return `None`.
    pub fn request_mode(
        &self,
        state: &mut MovementState,
        mode: InteractionMode,
    ) -> Option<(InteractionMode, InteractionMode)> {
        let from = state.mode;
        if from == mode {
            return None;
        }

        match mode {
            InteractionMode::Floating => {
                state.grounded = false;
            }
            InteractionMode::Standing if from == InteractionMode::Floating => {}
            _ => return None,
        }

        state.mode = mode;
        state.shape_switch = None;
        log::debug!("movement mode {:?} -> {:?} (requested)", from, mode);
        Some((from, mode))
    }

    /// Start the standing ↔ ball transition, or reverse one in progress.
    ///
    /// Returns false in modes that have no shape to switch.
    pub fn toggle_shape(&self, state: &mut MovementState) -> bool {
        if let Some(switch) = state.shape_switch.as_mut() {
            switch.reverse();
            log::debug!("shape switch reversed toward {:?}", switch.to);
            return true;
        }

        let to = match state.mode {
            InteractionMode::Standing => InteractionMode::Ball,
            InteractionMode::Ball => InteractionMode::Standing,
            _ => return false,
        };
        state.shape_switch = Some(ShapeSwitch::new(state.mode, to, self.config.shape_switch_duration));
        log::debug!("shape switch {:?} -> {:?} started", state.mode, to);
        true
    }

    // ========================================================================
    // Modes
    // ========================================================================

    fn advance_shape_switch(&self, state: &mut MovementState, dt: f32, outcome: &mut MovementOutcome) {
        let Some(switch) = state.shape_switch.as_mut() else {
            return;
        };
        switch.elapsed += dt;
        if !switch.is_complete() {
            return;
        }

        let to = switch.to;
        state.shape_switch = None;
        log::debug!("shape switch to {:?} complete", to);

        if state.mode != to {
            outcome.mode_changed = Some((state.mode, to));
            state.mode = to;
        }
    }

    fn meteorite_move(&self, state: &mut MovementState, store: &ChunkStore, dt: f32, outcome: &mut MovementOutcome) {
        state.velocity -= state.up * self.config.gravity * dt;

        let ellipsoid = Ellipsoid::new(self.radii(state));
        let result = collide_and_slide(store, &ellipsoid, state.position, state.velocity * dt, &self.solver);
        state.position = result.position;

        let Some(contact) = result.contact else {
            return;
        };

        state.up = contact.normal;
        state.surface_normal = contact.normal;
        state.velocity = Vec3::ZERO;
        state.grounded = true;
        state.mode = InteractionMode::Standing;
        outcome.contact = Some(contact);
        outcome.mode_changed = Some((InteractionMode::Meteorite, InteractionMode::Standing));
        log::debug!("meteorite landed at {:?}", state.position);
    }

    fn floating_move(&self, state: &mut MovementState, input: MovementInput, dt: f32, outcome: &mut MovementOutcome) {
        let acceleration = self.input_acceleration(state, input, dt);
        outcome.made_movement = !input.is_empty();

        state.velocity += acceleration * dt * self.config.acceleration_coefficient;
        state.position += state.velocity * dt;
        state.velocity *= (1.0 - self.config.floating_damping * dt).max(0.0);
        state.grounded = false;
    }

    fn surface_move(
        &self,
        state: &mut MovementState,
        input: MovementInput,
        store: &ChunkStore,
        dt: f32,
        outcome: &mut MovementOutcome,
    ) {
        let config = &self.config;

        let acceleration = self.input_acceleration(state, input, dt);
        outcome.made_movement = !input.is_empty();
        state.velocity += acceleration * dt * config.acceleration_coefficient;

        let check_incline = state.mode == InteractionMode::Standing;
        let on_shallow_ground =
            state.grounded && state.up.dot(state.surface_normal) >= config.incline_threshold;
        let gravity_applied = !(check_incline && on_shallow_ground);
        if gravity_applied {
            state.velocity -= state.up * config.gravity * dt;
        }

        if state.grounded {
            state.velocity *= (1.0 - config.friction * dt).max(0.0);
        }

        let mut sweep = state.velocity * dt;
        if state.grounded {
            sweep -= state.surface_normal * config.ground_probe;
        }

        let start = state.position;
        let ellipsoid = Ellipsoid::new(self.radii(state));
        let result = collide_and_slide(store, &ellipsoid, start, sweep, &self.solver);
        state.position = result.position;

        let Some(contact) = result.contact else {
            state.grounded = false;
            return;
        };

        self.respond_to_contact(state, contact, gravity_applied, dt);

        state.grounded = true;
        outcome.contact = Some(contact);
    }

    /// Adopt a terrain contact.
    ///
    /// Ball agents take the contact normal as `up`; standing agents only
    /// record it as the surface normal. Gravity integrated this tick is then
    /// cancelled along `up` so the agent does not sink into what holds it.
    fn respond_to_contact(&self, state: &mut MovementState, contact: Contact, gravity_applied: bool, dt: f32) {
        if state.mode == InteractionMode::Ball {
            state.up = contact.normal;
        }
        state.surface_normal = contact.normal;

        if state.velocity.length_squared() == 0.0 {
            state.velocity = Vec3::ZERO;
        } else if gravity_applied {
            state.velocity += state.up * self.config.gravity * dt;
        }
    }

    /// `Σ axis × dt × speed` over the held buttons.
    fn input_acceleration(&self, state: &MovementState, input: MovementInput, dt: f32) -> Vec3 {
        if input.is_empty() {
            return Vec3::ZERO;
        }

        let (forward, right) = state.axes();
        let step = dt * self.config.speed(state.mode);

        let mut acceleration = Vec3::ZERO;
        if input.has(MovementInput::FORWARD) {
            acceleration += forward * step;
        }
        if input.has(MovementInput::BACKWARD) {
            acceleration -= forward * step;
        }
        if input.has(MovementInput::RIGHT) {
            acceleration += right * step;
        }
        if input.has(MovementInput::LEFT) {
            acceleration -= right * step;
        }
        if input.has(MovementInput::JUMP) {
            acceleration += state.up * step;
        }
        if input.has(MovementInput::CROUCH) {
            acceleration -= state.up * step;
        }
        acceleration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use voxterra_world::Voxel;

    const DT: f32 = 1.0 / 60.0;
    const GROUND: f32 = 0.5;

    fn flat_ground() -> ChunkStore {
        let mut store = ChunkStore::new();
        for x in -32..32 {
            for z in -32..32 {
                for y in -2..=0 {
                    store.set_voxel(IVec3::new(x, y, z), Voxel::new(254, 1));
                }
            }
        }
        store
    }

    fn controller() -> MovementController {
        MovementController::default()
    }

    fn settle(controller: &MovementController, state: &mut MovementState, store: &ChunkStore) {
        for _ in 0..240 {
            controller.update(state, MovementInput::default(), store, DT);
        }
    }

    #[test]
    fn test_meteorite_lands_and_stands() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 6.0, 0.0), InteractionMode::Meteorite);

        let mut landing = None;
        for _ in 0..240 {
            let outcome = controller.update(&mut state, MovementInput(MovementInput::FORWARD), &store, DT);
            if outcome.mode_changed.is_some() {
                landing = Some(outcome);
                break;
            }
        }

        let outcome = landing.expect("meteorite should land");
        assert_eq!(outcome.mode_changed, Some((InteractionMode::Meteorite, InteractionMode::Standing)));
        assert!(outcome.landed);
        assert!(!outcome.made_movement, "meteorites ignore input");
        assert_eq!(state.mode, InteractionMode::Standing);
        assert!(state.up.y > 0.99);
        assert!(state.position.x.abs() < 1e-4);
    }

    #[test]
    fn test_standing_rests_on_flat_ground() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 3.0, 0.0), InteractionMode::Standing);

        settle(&controller, &mut state, &store);

        let rest = GROUND + controller.config.standing_radii.y;
        assert!(state.grounded);
        assert!((state.position.y - rest).abs() < 0.05, "y = {}", state.position.y);
        assert!(state.velocity.length() < 0.5, "velocity = {:?}", state.velocity);
    }

    #[test]
    fn test_forward_input_moves_along_view() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 3.0, 0.0), InteractionMode::Standing);
        settle(&controller, &mut state, &store);
        let start = state.position;

        let mut made_movement = false;
        for _ in 0..30 {
            let outcome = controller.update(&mut state, MovementInput(MovementInput::FORWARD), &store, DT);
            made_movement |= outcome.made_movement;
        }

        assert!(made_movement);
        assert!(state.position.z < start.z - 0.5, "moved to {:?}", state.position);
        assert!(state.position.x.abs() < 0.05);
        assert!(state.position.y > GROUND + controller.config.standing_radii.y - 0.05);
    }

    #[test]
    fn test_floating_ignores_gravity_and_damps() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 10.0, 0.0), InteractionMode::Floating);

        for _ in 0..60 {
            controller.update(&mut state, MovementInput::default(), &store, DT);
        }
        assert_eq!(state.position, Vec3::new(0.0, 10.0, 0.0));

        state.velocity = Vec3::new(5.0, 0.0, 0.0);
        for _ in 0..120 {
            controller.update(&mut state, MovementInput::default(), &store, DT);
        }
        assert!(state.velocity.length() < 0.05);
        assert!(!state.grounded);
    }

    #[test]
    fn test_floating_passes_through_terrain() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 2.0, 0.0), InteractionMode::Floating);
        state.velocity = Vec3::new(0.0, -60.0, 0.0);

        controller.update(&mut state, MovementInput::default(), &store, DT);
        assert!(state.position.y < 1.5);
    }

    #[test]
    fn test_request_mode_edges() {
        let controller = controller();
        let mut state = MovementState::new(Vec3::ZERO, InteractionMode::Standing);

        assert_eq!(
            controller.request_mode(&mut state, InteractionMode::Floating),
            Some((InteractionMode::Standing, InteractionMode::Floating))
        );
        assert_eq!(controller.request_mode(&mut state, InteractionMode::Floating), None);
        assert_eq!(controller.request_mode(&mut state, InteractionMode::Ball), None);
        assert_eq!(
            controller.request_mode(&mut state, InteractionMode::Standing),
            Some((InteractionMode::Floating, InteractionMode::Standing))
        );
        assert!(!controller.toggle_shape(&mut MovementState::new(Vec3::ZERO, InteractionMode::Floating)));
    }

    #[test]
    fn test_shape_switch_completes_after_duration() {
        let store = ChunkStore::new();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 50.0, 0.0), InteractionMode::Standing);

        assert!(controller.toggle_shape(&mut state));
        let mut changed = None;
        let mut ticks = 0;
        while changed.is_none() && ticks < 120 {
            changed = controller
                .update(&mut state, MovementInput::default(), &store, DT)
                .mode_changed;
            ticks += 1;
        }

        assert_eq!(changed, Some((InteractionMode::Standing, InteractionMode::Ball)));
        let expected = (controller.config.shape_switch_duration / DT).ceil() as i32;
        assert!((ticks - expected).abs() <= 1, "took {ticks} ticks");
        assert_eq!(controller.radii(&state), Vec3::splat(controller.config.ball_radius));
    }

    #[test]
    fn test_shape_switch_reverse_returns_to_start() {
        let store = ChunkStore::new();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 50.0, 0.0), InteractionMode::Standing);

        controller.toggle_shape(&mut state);
        for _ in 0..6 {
            controller.update(&mut state, MovementInput::default(), &store, DT);
        }
        let radii_before = controller.radii(&state);
        controller.toggle_shape(&mut state);
        assert!((controller.radii(&state) - radii_before).length() < 1e-5);

        let mut changes = 0;
        for _ in 0..60 {
            if controller
                .update(&mut state, MovementInput::default(), &store, DT)
                .mode_changed
                .is_some()
            {
                changes += 1;
            }
        }
        assert_eq!(changes, 0, "returning to the original shape is not a mode change");
        assert_eq!(state.mode, InteractionMode::Standing);
        assert!(state.shape_switch.is_none());
    }

    #[test]
    fn test_ball_follows_contact_normal() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 3.0, 0.0), InteractionMode::Ball);
        state.up = Vec3::new(0.3, 1.0, 0.0).normalize();

        settle(&controller, &mut state, &store);
        assert!(state.grounded);
        assert!(state.up.y > 0.99, "up = {:?}", state.up);
    }

    #[test]
    fn test_contact_cancels_gravity_along_up() {
        let controller = controller();
        let gravity = controller.config.gravity;
        let slope = Vec3::new(0.5, 0.866, 0.0).normalize();
        let contact = Contact {
            point: Vec3::ZERO,
            normal: slope,
        };

        // Standing keeps its up axis on a slope, so the term follows Y
        let mut standing = MovementState::new(Vec3::ZERO, InteractionMode::Standing);
        standing.velocity = Vec3::new(1.0, -gravity * DT, 0.0);
        controller.respond_to_contact(&mut standing, contact, true, DT);
        assert_eq!(standing.up, Vec3::Y);
        assert_eq!(standing.surface_normal, slope);
        assert!((standing.velocity - Vec3::X).length() < 1e-5, "velocity = {:?}", standing.velocity);

        let mut ball = MovementState::new(Vec3::ZERO, InteractionMode::Ball);
        ball.velocity = Vec3::new(1.0, -1.0, 0.0);
        controller.respond_to_contact(&mut ball, contact, true, DT);
        assert_eq!(ball.up, slope);
        let expected = Vec3::new(1.0, -1.0, 0.0) + slope * gravity * DT;
        assert!((ball.velocity - expected).length() < 1e-5, "velocity = {:?}", ball.velocity);

        let mut resting = MovementState::new(Vec3::ZERO, InteractionMode::Standing);
        controller.respond_to_contact(&mut resting, contact, true, DT);
        assert_eq!(resting.velocity, Vec3::ZERO);

        let mut supported = MovementState::new(Vec3::ZERO, InteractionMode::Standing);
        supported.velocity = Vec3::new(2.0, 0.0, 0.0);
        controller.respond_to_contact(&mut supported, contact, false, DT);
        assert_eq!(supported.velocity, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_update_is_deterministic() {
        let store = flat_ground();
        let controller = controller();
        let run = || {
            let mut state = MovementState::new(Vec3::new(0.3, 4.0, -0.2), InteractionMode::Meteorite);
            for tick in 0..200u32 {
                let mut input = MovementInput::default();
                input.set(MovementInput::FORWARD, tick % 3 == 0);
                input.set(MovementInput::LEFT, tick % 5 == 0);
                state.set_view_direction(Vec3::new((tick as f32 * 0.1).sin(), 0.0, -1.0));
                controller.update(&mut state, input, &store, DT);
            }
            state
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let store = flat_ground();
        let controller = controller();
        let mut state = MovementState::new(Vec3::new(0.0, 5.0, 0.0), InteractionMode::Standing);
        let before = state.clone();

        let outcome = controller.update(&mut state, MovementInput(MovementInput::FORWARD), &store, 0.0);
        assert_eq!(state, before);
        assert_eq!(outcome, MovementOutcome::default());
    }
}
