use ndarray::Array1;
use tracing::debug;

use super::super::brain::{NeuralNetwork, TopologyError};
use super::super::geometric_utils::{
    Point, Polygon, forward_vector, polygon_touches_segment, polygons_intersect,
};
use super::super::params::{CONTROL_COUNT, Params};
use super::super::road::Road;
use super::super::sensor::Sensor;
use super::super::spatial::ObstacleIndex;
use super::assist::{LaneKeeping, lane_keeping, must_stop_for_light};
use super::controls::{Controls, Driver};
use super::recovery::{Recovery, RecoveryPhase, recovery_steering};
use super::route::LaneRoute;

/// Agents slower than this are considered stalled by auto-run.
const STALL_SPEED: f32 = 0.1;

/// Traffic with a sensor hit closer than this offset ignores its network.
const UNSAFE_OFFSET: f32 = 0.1;

/// Lifecycle state of an agent within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Driving normally.
    Active,
    /// Backing off after a collision. Learning agents only.
    Recovering(Recovery),
    /// Out for the rest of the generation. Position and fitness are frozen.
    Damaged,
}

/// A vehicle on the road.
#[derive(Debug, Clone)]
pub struct Agent {
    id: usize,
    position: Point,
    heading: f32,
    speed: f32,
    width: f32,
    height: f32,
    max_speed: f32,
    fitness: f32,
    controls: Controls,
    state: AgentState,
    driver: Driver,
    polygon: Polygon,
}

impl Agent {
    fn with_driver(id: usize, position: Point, heading: f32, params: &Params, driver: Driver) -> Self {
        Self {
            id,
            position,
            heading,
            speed: 0.0,
            width: params.car_width,
            height: params.car_height,
            max_speed: params.max_speed,
            fitness: 0.0,
            controls: Controls::default(),
            state: AgentState::Active,
            driver,
            polygon: body_polygon(position, heading, params.car_width, params.car_height),
        }
    }

    /// A scripted agent that always holds `forward`.
    pub fn scripted(id: usize, position: Point, heading: f32, params: &Params) -> Self {
        let mut agent = Self::with_driver(id, position, heading, params, Driver::Scripted);
        agent.controls = Controls::forward_only();
        agent
    }

    /// An agent steered through [`Agent::controls_mut`].
    pub fn player(id: usize, position: Point, heading: f32, params: &Params) -> Self {
        let sensor = Sensor::new(params);
        Self::with_driver(id, position, heading, params, Driver::PlayerControlled { sensor })
    }

    /// A learning agent driven by `brain`.
    ///
    /// # Errors
    ///
    /// Fails if the network does not take one input per sensor ray or does
    /// not produce one output per control.
    pub fn learning(
        id: usize,
        position: Point,
        heading: f32,
        params: &Params,
        brain: NeuralNetwork,
    ) -> Result<Self, TopologyError> {
        check_brain(&brain, params)?;
        let driver = Driver::Learning {
            sensor: Sensor::new(params),
            brain,
            activations: Vec::new(),
        };
        Ok(Self::with_driver(id, position, heading, params, driver))
    }

    /// Traffic that always drives towards its route target, capped at
    /// `traffic_max_speed`.
    pub fn traffic(id: usize, position: Point, heading: f32, params: &Params, route: LaneRoute) -> Self {
        let driver = Driver::LaneFollowing {
            sensor: Sensor::new(params),
            route,
            brain: None,
        };
        Self::with_driver(id, position, heading, params, driver).with_max_speed(params.traffic_max_speed)
    }

    /// Traffic driven by `brain` until its way looks unsafe or the network
    /// asks for reverse, then by its route.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`Agent::learning`].
    pub fn traffic_with_brain(
        id: usize,
        position: Point,
        heading: f32,
        params: &Params,
        route: LaneRoute,
        brain: NeuralNetwork,
    ) -> Result<Self, TopologyError> {
        check_brain(&brain, params)?;
        let driver = Driver::LaneFollowing {
            sensor: Sensor::new(params),
            route,
            brain: Some(brain),
        };
        Ok(Self::with_driver(id, position, heading, params, driver).with_max_speed(params.traffic_max_speed))
    }

    /// Overrides the top speed taken from the parameters.
    #[must_use]
    pub fn with_max_speed(mut self, max_speed: f32) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Identifier, unique among the agents of one engine.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Center of the body.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Heading in radians; `0` points up.
    pub fn heading(&self) -> f32 {
        self.heading
    }

    /// Signed speed; negative while reversing.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Top forward speed.
    pub fn max_speed(&self) -> f32 {
        self.max_speed
    }

    /// Forward distance covered while not damaged.
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    /// Body rectangle as of the last update.
    pub fn polygon(&self) -> &Polygon {
        &self.polygon
    }

    /// Control inputs used on the last update.
    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Mutable controls for player-driven agents. Other drivers overwrite
    /// them on every update.
    pub fn controls_mut(&mut self) -> &mut Controls {
        &mut self.controls
    }

    /// Lifecycle state.
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Whether the agent is out for the rest of the generation.
    pub fn is_damaged(&self) -> bool {
        self.state == AgentState::Damaged
    }

    /// Whether the agent is recovering from a collision.
    pub fn is_recovering(&self) -> bool {
        matches!(self.state, AgentState::Recovering(_))
    }

    /// Who drives this agent.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Sensor, if the driver has one.
    pub fn sensor(&self) -> Option<&Sensor> {
        self.driver.sensor()
    }

    /// Network, if the driver has one.
    pub fn brain(&self) -> Option<&NeuralNetwork> {
        self.driver.brain()
    }

    /// Lane target, for traffic.
    pub fn route(&self) -> Option<&LaneRoute> {
        self.driver.route()
    }

    /// Per-level network outputs from the last update. Empty for non-learning agents.
    pub fn activations(&self) -> &[Array1<f32>] {
        match &self.driver {
            Driver::Learning { activations, .. } => activations,
            Driver::Scripted | Driver::PlayerControlled { .. } | Driver::LaneFollowing { .. } => &[],
        }
    }

    /// Advances the agent by one tick.
    ///
    /// Damaged agents are left untouched. Traffic first steers towards its
    /// route target. Then the agent moves, collects fitness, checks for
    /// collisions against the road borders and `obstacles` and derives next
    /// tick's controls from its sensor, network and driver assists.
    pub fn update(&mut self, road: &Road, obstacles: &ObstacleIndex, params: &Params) {
        if self.is_damaged() {
            return;
        }
        self.follow_route(road, obstacles, params);
        self.step_physics(params);
        self.fitness += self.speed.max(0.0);
        self.polygon = body_polygon(self.position, self.heading, self.width, self.height);
        if self.assess_damage(road, obstacles) {
            self.on_collision(params);
        }
        if !self.sense(road, obstacles) {
            return;
        }

        let must_stop = must_stop_for_light(self.position, self.heading, &road.lights, params);
        if must_stop {
            self.controls.forward = false;
            self.controls.reverse = false;
            if self.speed > 0.0 {
                self.speed = (self.speed - params.friction * 2.0).max(0.0);
            }
        }

        match self.state() {
            AgentState::Active if self.driver.is_learning() => self.keep_lane(must_stop, road, params),
            AgentState::Recovering(recovery) => self.recover(recovery, road, obstacles, params),
            _ => {}
        }
    }

    /// Accelerates, applies friction, turns and moves according to the current controls.
    fn step_physics(&mut self, params: &Params) {
        if self.controls.forward {
            self.speed += params.acceleration;
        }
        if self.controls.reverse {
            self.speed -= params.acceleration;
        }
        self.speed = self.speed.clamp(-self.max_speed / 2.0, self.max_speed);
        if self.speed > 0.0 {
            self.speed -= params.friction;
        }
        if self.speed < 0.0 {
            self.speed += params.friction;
        }
        if self.speed.abs() < params.friction {
            self.speed = 0.0;
        }
        if self.speed != 0.0 {
            // steering reverses with the direction of travel
            let flip = self.speed.signum();
            if self.controls.left {
                self.heading += params.turn_speed * flip;
            }
            if self.controls.right {
                self.heading -= params.turn_speed * flip;
            }
        }
        self.position = self.position + forward_vector(self.heading) * self.speed;
    }

    fn assess_damage(&self, road: &Road, obstacles: &ObstacleIndex) -> bool {
        road.borders
            .iter()
            .any(|border| polygon_touches_segment(&self.polygon, border))
            || obstacles
                .near(self.position, self.polygon.radius(), self.id)
                .into_iter()
                .any(|body| polygons_intersect(&self.polygon, body))
    }

    fn on_collision(&mut self, params: &Params) {
        if self.driver.is_learning() {
            debug!(agent = self.id, restarted = self.is_recovering(), "collision, recovering");
            self.state = AgentState::Recovering(Recovery::new(params));
        } else {
            debug!(agent = self.id, fitness = self.fitness, "agent damaged");
            self.state = AgentState::Damaged;
        }
    }

    /// Updates the sensor and, for learning agents, the controls from the
    /// network. Returns `false` for agents without a sensor.
    fn sense(&mut self, road: &Road, obstacles: &ObstacleIndex) -> bool {
        let (sensor, learning) = match &mut self.driver {
            Driver::Scripted => return false,
            Driver::PlayerControlled { sensor } | Driver::LaneFollowing { sensor, .. } => (sensor, None),
            Driver::Learning {
                sensor,
                brain,
                activations,
            } => (sensor, Some((brain, activations))),
        };
        let nearby = obstacles.near(self.position, sensor.ray_length(), self.id);
        sensor.update(self.position, self.heading, &road.borders, &nearby);
        if let Some((brain, activations)) = learning {
            *activations = brain.activations(&sensor.inputs());
            if let Some(outputs) = activations.last() {
                self.controls = Controls::from_outputs(outputs);
            }
        }
        true
    }

    /// Sets traffic controls for this tick's move from a fresh sensor reading.
    /// Drives at the route target unless a network is in charge and the way
    /// is clear. A light ahead keeps it from accelerating.
    fn follow_route(&mut self, road: &Road, obstacles: &ObstacleIndex, params: &Params) {
        let must_stop = must_stop_for_light(self.position, self.heading, &road.lights, params);
        let Driver::LaneFollowing { sensor, route, brain } = &mut self.driver else {
            return;
        };
        route.advance(road, self.position, self.heading);
        let delta = route.steering_delta(self.position, self.heading);

        let nearby = obstacles.near(self.position, sensor.ray_length(), self.id);
        sensor.update(self.position, self.heading, &road.borders, &nearby);
        let take_over = match brain {
            Some(brain) => {
                self.controls = Controls::from_outputs(&brain.feed_forward(&sensor.inputs()));
                let closest = sensor
                    .readings()
                    .iter()
                    .flatten()
                    .map(|reading| reading.offset)
                    .fold(1.0, f32::min);
                closest < UNSAFE_OFFSET || self.controls.reverse
            }
            None => true,
        };
        if take_over {
            self.controls.forward = !must_stop;
            self.controls.reverse = false;
            self.controls.steer_towards(delta, params.turn_speed * 2.0);
        }
    }

    fn keep_lane(&mut self, must_stop: bool, road: &Road, params: &Params) {
        if params.auto_run && !must_stop && self.speed < STALL_SPEED {
            self.controls.forward = true;
            self.controls.reverse = false;
        }
        let (delta, snap) = match lane_keeping(self.position, self.heading, road, params) {
            LaneKeeping::OnLane => return,
            LaneKeeping::Nudge { delta } => {
                self.controls.steer_towards(delta, params.turn_speed * 1.5);
                return;
            }
            LaneKeeping::Enforce { delta } => (delta, None),
            LaneKeeping::Snap { delta, point, heading } => (delta, Some((point, heading))),
        };

        self.controls.forward = true;
        self.controls.reverse = false;
        self.controls.steer_towards(delta, 0.0);
        let cap = self.max_speed * 0.5;
        if self.speed > cap {
            self.speed = (self.speed - params.friction * 2.0).max(cap);
        }
        if let Some((point, heading)) = snap {
            debug!(agent = self.id, x = point.x, y = point.y, "snapped back onto lane");
            self.position = point;
            self.heading = heading;
            self.speed = self.speed.min(cap * 0.5);
            self.polygon = body_polygon(self.position, self.heading, self.width, self.height);
        }
    }

    fn recover(&mut self, mut recovery: Recovery, road: &Road, obstacles: &ObstacleIndex, params: &Params) {
        let readings = self.sensor().map_or(&[][..], Sensor::readings);
        let steering = recovery_steering(self.position, self.heading, road, readings);

        let reversing = recovery.phase(params) == RecoveryPhase::Reversing;
        self.controls.reverse = reversing;
        self.controls.forward = !reversing;
        self.controls.steer_towards(steering.delta, params.turn_speed * 2.0);
        if reversing && self.speed > 0.0 {
            self.speed = (self.speed - params.friction * 3.0).max(0.0);
        }

        let still_hit = self.assess_damage(road, obstacles);
        self.state = if recovery.advance(still_hit, steering.lane_distance, params) {
            debug!(agent = self.id, "recovered");
            AgentState::Active
        } else {
            AgentState::Recovering(recovery)
        };
    }
}

fn check_brain(brain: &NeuralNetwork, params: &Params) -> Result<(), TopologyError> {
    if brain.input_size() != params.ray_count {
        return Err(TopologyError::InputWidth {
            expected: params.ray_count,
            actual: brain.input_size(),
        });
    }
    if brain.output_size() != CONTROL_COUNT {
        return Err(TopologyError::OutputWidth {
            expected: CONTROL_COUNT,
            actual: brain.output_size(),
        });
    }
    Ok(())
}

/// Corners of a `width` x `height` rectangle centered on `position` and
/// rotated to `heading`.
pub fn body_polygon(position: Point, heading: f32, width: f32, height: f32) -> Polygon {
    let rad = width.hypot(height) / 2.0;
    let alpha = width.atan2(height);
    let corner = |angle: f32| Point {
        x: position.x - angle.sin() * rad,
        y: position.y - angle.cos() * rad,
    };
    Polygon::new(vec![
        corner(heading - alpha),
        corner(heading + alpha),
        corner(std::f32::consts::PI + heading - alpha),
        corner(std::f32::consts::PI + heading + alpha),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::geometric_utils::Segment;

    fn params() -> Params {
        Params::default()
    }

    #[test]
    fn body_is_centered_and_upright() {
        let body = body_polygon(Point { x: 10.0, y: 20.0 }, 0.0, 30.0, 50.0);
        let xs: Vec<f32> = body.points().iter().map(|p| p.x).collect();
        let ys: Vec<f32> = body.points().iter().map(|p| p.y).collect();
        let span = |v: &[f32]| {
            v.iter().copied().fold(f32::MIN, f32::max) - v.iter().copied().fold(f32::MAX, f32::min)
        };
        assert!((span(&xs) - 30.0).abs() < 1e-3);
        assert!((span(&ys) - 50.0).abs() < 1e-3);
        let c = body.centroid();
        assert!((c.x - 10.0).abs() < 1e-4 && (c.y - 20.0).abs() < 1e-4);
    }

    #[test]
    fn friction_snaps_to_zero() {
        let params = params();
        let mut agent = Agent::player(0, Point { x: 0.0, y: 0.0 }, 0.0, &params);
        agent.speed = 0.04;
        agent.step_physics(&params);
        assert_eq!(agent.speed, 0.0);
    }

    #[test]
    fn reverse_is_capped_at_half_max_speed() {
        let params = params();
        let mut agent = Agent::player(0, Point { x: 0.0, y: 0.0 }, 0.0, &params);
        agent.controls_mut().reverse = true;
        for _ in 0..100 {
            agent.step_physics(&params);
        }
        assert!((agent.speed + (params.max_speed / 2.0 - params.friction)).abs() < 1e-5);
    }

    #[test]
    fn steering_flips_in_reverse() {
        let params = params();
        let mut agent = Agent::player(0, Point { x: 0.0, y: 0.0 }, 0.0, &params);
        agent.speed = -1.0;
        agent.controls_mut().left = true;
        agent.step_physics(&params);
        assert!(agent.heading < 0.0);
    }

    #[test]
    fn learning_agent_rejects_wrong_input_width() {
        let params = params();
        let brain = NeuralNetwork::new(&[3, 4, 4]).unwrap();
        let err = Agent::learning(0, Point { x: 0.0, y: 0.0 }, 0.0, &params, brain).unwrap_err();
        assert_eq!(err, TopologyError::InputWidth { expected: 5, actual: 3 });
    }

    /// A `[ray_count, 4]` network that only ever asks for reverse.
    fn reverse_only_brain(params: &Params) -> NeuralNetwork {
        let level = crate::simulation::brain::Level {
            weights: ndarray::Array2::zeros((params.ray_count, CONTROL_COUNT)),
            biases: ndarray::array![10.0, 10.0, 10.0, -10.0],
        };
        NeuralNetwork::from_levels(vec![level]).unwrap()
    }

    #[test]
    fn traffic_network_asking_for_reverse_is_overruled() {
        let params = params();
        let road = Road::default();
        let route = LaneRoute::starting_at(&road, Point { x: 0.0, y: 0.0 }, 0.0, 3);
        let mut agent =
            Agent::traffic_with_brain(1, Point { x: 0.0, y: 0.0 }, 0.0, &params, route, reverse_only_brain(&params))
                .unwrap();
        agent.update(&road, &ObstacleIndex::empty(), &params);
        let controls = agent.controls();
        assert!(controls.forward && !controls.reverse);
        assert!(agent.speed() > 0.0);
        assert_eq!(agent.max_speed(), params.traffic_max_speed);
    }

    #[test]
    fn traffic_is_damaged_on_contact() {
        let params = params();
        let wall = Road::new(vec![Segment::new(Point { x: -100.0, y: 0.0 }, Point { x: 100.0, y: 0.0 })]);
        let route = LaneRoute::starting_at(&wall, Point { x: 0.0, y: 0.0 }, 0.0, 3);
        let mut agent = Agent::traffic(1, Point { x: 0.0, y: 0.0 }, 0.0, &params, route);
        agent.update(&wall, &ObstacleIndex::empty(), &params);
        assert!(agent.is_damaged());
    }

    #[test]
    fn collision_restarts_recovery() {
        let params = params();
        let brain = NeuralNetwork::new(&params.layer_widths()).unwrap();
        let mut agent = Agent::learning(0, Point { x: 0.0, y: 0.0 }, 0.0, &params, brain).unwrap();
        let wall = Road::new(vec![Segment::new(Point { x: -100.0, y: 0.0 }, Point { x: 100.0, y: 0.0 })]);
        let none = ObstacleIndex::empty();
        agent.update(&wall, &none, &params);
        agent.update(&wall, &none, &params);
        match agent.state() {
            AgentState::Recovering(r) => assert_eq!(r.ticks_left(), params.recovery_ticks - 1),
            other => panic!("expected recovery, got {other:?}"),
        }
    }
}
