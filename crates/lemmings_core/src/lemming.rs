//! The agent state machine.
//!
//! One [`Lemming`] per released agent. Each tick the agent samples the
//! stencil at its foot and one or two pixels ahead of its facing
//! direction, then advances by exact integer pixel deltas. Working
//! states (digging, bashing, mining, building) drive stencil mutation
//! once per stroke through [`Stencil`] until their terrain-dependent
//! termination condition is met.
//!
//! All physics is integer-exact: a run replays bit-identically from the
//! same action stream.

use serde::{Deserialize, Serialize};

use crate::level::{LevelObject, ObjectKind};
use crate::stencil::{MaskOp, Stencil};
use crate::terrain::TerrainBitmap;

/// Unique identifier for agents; also the spawn-order index.
pub type LemmingId = u32;

// --- Movement tuning ------------------------------------------------------

/// Highest step a walker can climb without jumping.
pub const FREE_STEP: i32 = 2;
/// Highest step a walker clears with a hop; above this it is a wall.
pub const JUMP_STEP: i32 = 6;
/// Deepest drop a walker steps down without falling.
pub const WALK_DROP: i32 = 3;
/// Pixels fallen per tick.
pub const FALL_SPEED: i32 = 3;
/// Pixels fallen per tick with an open parachute.
pub const FLOAT_SPEED: i32 = 2;
/// Accumulated fall distance past which landing is lethal.
pub const MAX_FALL: i32 = 60;
/// Fall distance after which a floater's parachute opens.
pub const FLOATER_DELAY: i32 = 16;

// --- Working-state tuning -------------------------------------------------

/// Ticks between digger strokes.
pub const DIG_INTERVAL: u32 = 8;
/// Width of the strip a digger removes per stroke.
pub const DIG_WIDTH: i32 = 9;
/// Ticks between basher swings.
pub const BASH_INTERVAL: u32 = 4;
/// Radius of the disc a basher removes per swing.
pub const BASH_RADIUS: i32 = 5;
/// Ticks between miner swings.
pub const MINE_INTERVAL: u32 = 6;
/// Radius of the disc a miner removes per swing.
pub const MINE_RADIUS: i32 = 5;
/// Ticks between builder bricks.
pub const BUILD_INTERVAL: u32 = 8;
/// Width of one builder brick.
pub const BRICK_WIDTH: i32 = 6;
/// Bricks in a builder's supply.
pub const MAX_BRICKS: u32 = 12;
/// Half-width of a blocker's turn-around field.
pub const BLOCK_RANGE: i32 = 4;

// --- Countdown tuning -----------------------------------------------------

/// Ticks from bomber assignment to detonation.
pub const BOMBER_COUNTDOWN: u32 = 79;
/// Radius of the explosion crater (steel immune).
pub const EXPLOSION_RADIUS: i32 = 9;
/// Ticks of the explosion animation before removal.
pub const EXPLODE_TICKS: u32 = 8;
/// Ticks of the drowning animation before removal.
pub const DROWN_TICKS: u32 = 16;
/// Ticks of the exit animation before removal.
pub const EXIT_TICKS: u32 = 8;
/// Ticks of the splat animation before removal.
pub const SPLAT_TICKS: u32 = 16;
/// Ticks spent hoisting over a climbed edge.
pub const HOIST_TICKS: u32 = 2;
/// Ticks spent shrugging when the brick supply runs out.
pub const SHRUG_TICKS: u32 = 4;

/// Vertical extent of the body above the foot pixel, used for cursor
/// hit testing and ceiling checks.
pub const BODY_HEIGHT: i32 = 10;
/// Horizontal half-width of the cursor hit box.
pub const HIT_HALF_WIDTH: i32 = 4;

/// Facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Facing left (negative x).
    Left,
    /// Facing right (positive x).
    Right,
}

impl Direction {
    /// Per-tick x delta for this direction.
    #[must_use]
    pub const fn dx(self) -> i32 {
        match self {
            Self::Left => -1,
            Self::Right => 1,
        }
    }

    /// The opposite direction.
    #[must_use]
    pub const fn flip(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// State-machine state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Walking along the ground.
    Walking,
    /// Falling; lethal past [`MAX_FALL`].
    Falling,
    /// One-tick hop up a 3..=6 pixel step.
    Jumping,
    /// Removing terrain straight down.
    Digging,
    /// Removing terrain horizontally.
    Bashing,
    /// Removing terrain diagonally down.
    Mining,
    /// Laying a staircase of bricks.
    Building,
    /// Standing still, turning other agents around.
    Blocking,
    /// Descending under an open parachute.
    Floating,
    /// Ascending a vertical wall.
    Climbing,
    /// Pulling up over the top of a climbed wall.
    Hoisting,
    /// Out of bricks; briefly shrugging before walking on.
    Shrugging,
    /// Detonating.
    Exploding,
    /// Drowning in water.
    Drowning,
    /// Leaving through the exit.
    Exiting,
    /// Fatal landing.
    Splatting,
}

impl Action {
    /// Stable discriminant for state hashing.
    #[must_use]
    pub const fn discriminant(self) -> u8 {
        match self {
            Self::Walking => 0,
            Self::Falling => 1,
            Self::Jumping => 2,
            Self::Digging => 3,
            Self::Bashing => 4,
            Self::Mining => 5,
            Self::Building => 6,
            Self::Blocking => 7,
            Self::Floating => 8,
            Self::Climbing => 9,
            Self::Hoisting => 10,
            Self::Shrugging => 11,
            Self::Exploding => 12,
            Self::Drowning => 13,
            Self::Exiting => 14,
            Self::Splatting => 15,
        }
    }
}

/// How an agent left the active simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terminal {
    /// Reached the exit.
    Exited,
    /// Splatted, drowned, was trapped, or exploded.
    Dead,
}

/// Mutable world access for one agent step.
///
/// The session constructs this per tick from its exclusively-owned
/// buffers; agents never hold references across ticks.
pub struct StepContext<'a> {
    /// The classification grid (mutated by working states).
    pub stencil: &'a mut Stencil,
    /// The terrain bitmap (mutated together with the stencil).
    pub terrain: &'a mut TerrainBitmap,
    /// Object registry, indexed by object id.
    pub objects: &'a [LevelObject],
    /// Foot positions of all currently blocking agents (excluding the
    /// one being stepped).
    pub blockers: &'a [(i32, i32)],
}

impl StepContext<'_> {
    /// First triggering object kind under a pixel, in z-order.
    fn trigger_at(&self, x: i32, y: i32) -> Option<ObjectKind> {
        for &id in self.stencil.objects_at(x, y) {
            let object = self.objects.get(id as usize)?;
            match object.kind {
                ObjectKind::Decoration | ObjectKind::OneWay(_) => {}
                kind => {
                    if object.trigger.contains(x, y) {
                        return Some(kind);
                    }
                }
            }
        }
        None
    }

    /// Whether a walker at (x, y) moving in `dir` runs into a blocker field.
    fn blocked(&self, x: i32, y: i32, dir: Direction) -> bool {
        self.blockers.iter().any(|&(bx, by)| {
            let dx = bx - x;
            let in_field = dx.abs() <= BLOCK_RANGE && (by - y).abs() <= BODY_HEIGHT;
            // Only turn agents moving toward the blocker's centre.
            in_field && dx.signum() == dir.dx().signum()
        })
    }
}

/// One autonomous agent.
///
/// Position (x, y) is the foot pixel: the agent stands when
/// `stencil.is_solid(x, y + 1)`. The body occupies the pixels above.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lemming {
    /// Identity; spawn-order index.
    pub id: LemmingId,
    /// Foot x.
    pub x: i32,
    /// Foot y.
    pub y: i32,
    /// Facing direction.
    pub dir: Direction,
    /// Current state-machine state.
    pub action: Action,
    /// Frame counter private to the current action.
    pub frame: u32,
    /// Accumulated fall distance in pixels.
    pub fallen: i32,
    /// Bricks remaining while building.
    pub bricks_left: u32,
    /// Ticks until detonation, when armed as a bomber.
    pub countdown: Option<u32>,
    /// Sticky climber skill.
    pub is_climber: bool,
    /// Sticky floater skill.
    pub is_floater: bool,
    /// Cursor highlight flag for rendering.
    pub highlighted: bool,
    /// Terminal record; `Some` once removed from the active set.
    pub terminal: Option<Terminal>,
}

impl Lemming {
    /// Create an agent at the spawn point. Newly released agents fall
    /// out of the hatch.
    #[must_use]
    pub fn new(id: LemmingId, x: i32, y: i32, dir: Direction) -> Self {
        Self {
            id,
            x,
            y,
            dir,
            action: Action::Falling,
            frame: 0,
            fallen: 0,
            bricks_left: 0,
            countdown: None,
            is_climber: false,
            is_floater: false,
            highlighted: false,
            terminal: None,
        }
    }

    /// Whether the agent is still part of the active simulation.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.terminal.is_none()
    }

    /// Whether the cursor hit box contains a pixel.
    #[must_use]
    pub const fn footprint_contains(&self, cx: i32, cy: i32) -> bool {
        cx >= self.x - HIT_HALF_WIDTH
            && cx <= self.x + HIT_HALF_WIDTH
            && cy >= self.y - BODY_HEIGHT
            && cy <= self.y + 1
    }

    /// Enter a new action, resetting the per-action frame counter.
    pub fn set_action(&mut self, action: Action) {
        if self.action != action {
            self.action = action;
            self.frame = 0;
        }
    }

    fn turn_around(&mut self) {
        self.dir = self.dir.flip();
    }

    fn start_falling(&mut self) {
        self.fallen = 0;
        self.set_action(Action::Falling);
    }

    /// Whether there is solid ground directly under the feet.
    fn supported(&self, ctx: &StepContext<'_>) -> bool {
        ctx.stencil.is_solid(self.x, self.y + 1)
    }

    /// Advance the state machine by one tick.
    ///
    /// Returns `Some` when the agent leaves the active set this tick.
    pub fn step(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        if self.terminal.is_some() {
            return None;
        }

        // A bomber countdown runs regardless of the current action,
        // except once the agent is already leaving or dying.
        if !matches!(
            self.action,
            Action::Exiting | Action::Exploding | Action::Drowning | Action::Splatting
        ) {
            if let Some(remaining) = self.countdown {
                if remaining == 0 {
                    self.countdown = None;
                    self.set_action(Action::Exploding);
                } else {
                    self.countdown = Some(remaining - 1);
                }
            }
        }

        match self.action {
            Action::Walking => self.step_walking(ctx),
            Action::Falling => self.step_falling(ctx),
            Action::Jumping => {
                // The hop itself happened on entry; settle back to walking.
                self.set_action(Action::Walking);
                self.step_walking(ctx)
            }
            Action::Digging => self.step_digging(ctx),
            Action::Bashing => self.step_bashing(ctx),
            Action::Mining => self.step_mining(ctx),
            Action::Building => self.step_building(ctx),
            Action::Blocking => self.step_blocking(ctx),
            Action::Floating => self.step_floating(ctx),
            Action::Climbing => self.step_climbing(ctx),
            Action::Hoisting => {
                self.frame += 1;
                if self.frame >= HOIST_TICKS {
                    self.set_action(Action::Walking);
                }
                None
            }
            Action::Shrugging => {
                self.frame += 1;
                if self.frame >= SHRUG_TICKS {
                    self.set_action(Action::Walking);
                }
                None
            }
            Action::Exploding => self.step_exploding(ctx),
            Action::Drowning => self.finish_after(DROWN_TICKS, Terminal::Dead),
            Action::Exiting => self.finish_after(EXIT_TICKS, Terminal::Exited),
            Action::Splatting => self.finish_after(SPLAT_TICKS, Terminal::Dead),
        }
    }

    fn finish_after(&mut self, ticks: u32, terminal: Terminal) -> Option<Terminal> {
        self.frame += 1;
        if self.frame >= ticks {
            self.terminal = Some(terminal);
            Some(terminal)
        } else {
            None
        }
    }

    /// Check water/exit/trap triggers at the current foot position.
    fn check_triggers(&mut self, ctx: &StepContext<'_>) {
        match ctx.trigger_at(self.x, self.y) {
            Some(ObjectKind::Exit) => {
                tracing::trace!(id = self.id, "agent reached exit");
                self.set_action(Action::Exiting);
            }
            Some(ObjectKind::Water) => self.set_action(Action::Drowning),
            Some(ObjectKind::Trap) => self.set_action(Action::Splatting),
            _ => {}
        }
    }

    fn step_walking(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        if !self.supported(ctx) {
            self.start_falling();
            return None;
        }

        if ctx.blocked(self.x, self.y, self.dir) {
            self.turn_around();
            return None;
        }

        let dx = self.dir.dx();
        let nx = self.x + dx;

        if ctx.stencil.is_solid(nx, self.y) {
            // Obstruction at body level: measure the rise.
            let mut rise = 0;
            while rise <= JUMP_STEP && ctx.stencil.is_solid(nx, self.y - rise) {
                rise += 1;
            }
            if rise > JUMP_STEP {
                if self.is_climber {
                    self.set_action(Action::Climbing);
                } else {
                    self.turn_around();
                }
            } else if rise > FREE_STEP {
                self.x = nx;
                self.y -= rise;
                self.set_action(Action::Jumping);
            } else {
                self.x = nx;
                self.y -= rise;
            }
        } else {
            // Open ahead: walk down small steps, fall off big ones.
            let mut drop = 0;
            while drop <= WALK_DROP && !ctx.stencil.is_solid(nx, self.y + 1 + drop) {
                drop += 1;
            }
            self.x = nx;
            if drop > WALK_DROP {
                self.start_falling();
            } else {
                self.y += drop;
            }
        }

        self.check_triggers(ctx);
        None
    }

    fn step_falling(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        if self.is_floater && self.fallen >= FLOATER_DELAY {
            self.set_action(Action::Floating);
            return self.step_floating(ctx);
        }
        self.descend(ctx, FALL_SPEED);
        if self.supported(ctx) {
            if self.fallen > MAX_FALL {
                self.set_action(Action::Splatting);
            } else {
                self.fallen = 0;
                self.set_action(Action::Walking);
            }
        } else if self.y > ctx.stencil.height() {
            // Fell out of the level.
            self.terminal = Some(Terminal::Dead);
            return Some(Terminal::Dead);
        }
        self.check_triggers(ctx);
        None
    }

    fn step_floating(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.descend(ctx, FLOAT_SPEED);
        if self.supported(ctx) {
            self.fallen = 0;
            self.set_action(Action::Walking);
        } else if self.y > ctx.stencil.height() {
            self.terminal = Some(Terminal::Dead);
            return Some(Terminal::Dead);
        }
        self.check_triggers(ctx);
        None
    }

    /// Move down up to `speed` pixels without tunnelling through ground.
    fn descend(&mut self, ctx: &StepContext<'_>, speed: i32) {
        for _ in 0..speed {
            if ctx.stencil.is_solid(self.x, self.y + 1) {
                break;
            }
            self.y += 1;
            self.fallen += 1;
        }
    }

    fn step_climbing(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        let dx = self.dir.dx();
        // Overhang above the head knocks the climber off.
        if ctx.stencil.is_solid(self.x, self.y - BODY_HEIGHT) {
            self.turn_around();
            self.start_falling();
            return None;
        }
        self.y -= 1;
        if !ctx.stencil.is_solid(self.x + dx, self.y + 1) {
            // Wall ended: pull up onto the ledge.
            self.x += dx;
            self.set_action(Action::Hoisting);
        }
        self.check_triggers(ctx);
        None
    }

    fn step_digging(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.frame += 1;
        if self.frame < DIG_INTERVAL {
            return None;
        }
        self.frame = 0;

        if ctx.stencil.is_steel(self.x, self.y + 1) {
            self.set_action(Action::Walking);
            return None;
        }
        ctx.stencil.apply_rect_mask(
            ctx.terrain,
            self.x - DIG_WIDTH / 2,
            self.y + 1,
            DIG_WIDTH,
            1,
            MaskOp::Erase { allow_steel: false },
        );
        self.y += 1;
        if !self.supported(ctx) {
            self.start_falling();
        }
        self.check_triggers(ctx);
        None
    }

    fn step_bashing(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.frame += 1;
        if self.frame < BASH_INTERVAL {
            return None;
        }
        self.frame = 0;

        let dx = self.dir.dx();
        let swing_cx = self.x + dx * 3;
        // Swing covers the body rows but never reaches below the foot.
        let swing_cy = self.y - BASH_RADIUS;

        // Steel anywhere in the swing stops the basher cold.
        if self.steel_in_disc(ctx, swing_cx, swing_cy, BASH_RADIUS) {
            self.set_action(Action::Walking);
            return None;
        }
        ctx.stencil
            .apply_circular_mask(ctx.terrain, swing_cx, swing_cy, BASH_RADIUS, MaskOp::Erase {
                allow_steel: false,
            });
        self.x += dx;

        if !self.supported(ctx) {
            self.start_falling();
            return None;
        }
        // No terrain left ahead: the tunnel is finished.
        let probe_x = self.x + dx * (BASH_RADIUS + 1);
        let any_ahead =
            (0..BODY_HEIGHT).any(|row| ctx.stencil.is_solid(probe_x, self.y - row));
        if !any_ahead {
            self.set_action(Action::Walking);
        }
        self.check_triggers(ctx);
        None
    }

    fn step_mining(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.frame += 1;
        if self.frame < MINE_INTERVAL {
            return None;
        }
        self.frame = 0;

        let dx = self.dir.dx();
        let swing_cx = self.x + dx * 2;
        let swing_cy = self.y;

        if self.steel_in_disc(ctx, swing_cx, swing_cy, MINE_RADIUS) {
            self.set_action(Action::Walking);
            return None;
        }
        ctx.stencil
            .apply_circular_mask(ctx.terrain, swing_cx, swing_cy, MINE_RADIUS, MaskOp::Erase {
                allow_steel: false,
            });
        self.x += dx;
        self.y += 1;

        if !self.supported(ctx) {
            self.start_falling();
        }
        self.check_triggers(ctx);
        None
    }

    fn step_building(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.frame += 1;
        if self.frame < BUILD_INTERVAL {
            return None;
        }
        self.frame = 0;

        if self.bricks_left == 0 {
            self.set_action(Action::Shrugging);
            return None;
        }

        let dx = self.dir.dx();
        let brick_x = if dx > 0 { self.x + 1 } else { self.x - BRICK_WIDTH };
        ctx.stencil
            .apply_rect_mask(ctx.terrain, brick_x, self.y, BRICK_WIDTH, 1, MaskOp::Paint);
        self.bricks_left -= 1;

        // Step up onto the fresh brick.
        self.x += dx * 2;
        self.y -= 1;

        // Head bump or wall ahead turns the builder around.
        let ahead_solid = ctx.stencil.is_solid(self.x + dx, self.y)
            || ctx.stencil.is_solid(self.x, self.y - BODY_HEIGHT);
        if ahead_solid {
            self.turn_around();
            self.set_action(Action::Walking);
        } else if self.bricks_left == 0 {
            self.set_action(Action::Shrugging);
        }
        self.check_triggers(ctx);
        None
    }

    fn step_blocking(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        // Blockers stand until the ground is eroded from under them.
        if !self.supported(ctx) {
            self.start_falling();
        }
        None
    }

    fn step_exploding(&mut self, ctx: &mut StepContext<'_>) -> Option<Terminal> {
        self.frame += 1;
        if self.frame < EXPLODE_TICKS {
            return None;
        }
        tracing::trace!(id = self.id, x = self.x, y = self.y, "agent detonated");
        ctx.stencil.apply_circular_mask(
            ctx.terrain,
            self.x,
            self.y - 4,
            EXPLOSION_RADIUS,
            MaskOp::Erase { allow_steel: false },
        );
        self.terminal = Some(Terminal::Dead);
        Some(Terminal::Dead)
    }

    fn steel_in_disc(&self, ctx: &StepContext<'_>, cx: i32, cy: i32, radius: i32) -> bool {
        let r_sq = radius * radius;
        for y in cy - radius..=cy + radius {
            for x in cx - radius..=cx + radius {
                let dx = x - cx;
                let dy = y - cy;
                if dx * dx + dy * dy <= r_sq && ctx.stencil.is_steel(x, y) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelObject, ObjectKind, Rect};
    use crate::stencil::{mask, Stencil};
    use crate::terrain::TerrainBitmap;

    struct World {
        stencil: Stencil,
        terrain: TerrainBitmap,
        objects: Vec<LevelObject>,
        blockers: Vec<(i32, i32)>,
    }

    impl World {
        /// 200x100 world with a flat floor at y = 80.
        fn flat() -> Self {
            let mut stencil = Stencil::new(200, 100);
            let mut terrain = TerrainBitmap::new(200, 100);
            stencil.apply_rect_mask(&mut terrain, 0, 81, 200, 19, MaskOp::Paint);
            Self {
                stencil,
                terrain,
                objects: Vec::new(),
                blockers: Vec::new(),
            }
        }

        fn ctx(&mut self) -> StepContext<'_> {
            StepContext {
                stencil: &mut self.stencil,
                terrain: &mut self.terrain,
                objects: &self.objects,
                blockers: &self.blockers,
            }
        }

        fn step(&mut self, lemming: &mut Lemming) -> Option<Terminal> {
            let mut ctx = self.ctx();
            lemming.step(&mut ctx)
        }
    }

    fn walker() -> Lemming {
        let mut lemming = Lemming::new(0, 50, 80, Direction::Right);
        lemming.set_action(Action::Walking);
        lemming
    }

    #[test]
    fn walker_advances_one_pixel_per_tick() {
        let mut world = World::flat();
        let mut lemming = walker();
        world.step(&mut lemming);
        assert_eq!((lemming.x, lemming.y), (51, 80));
        assert_eq!(lemming.action, Action::Walking);
    }

    #[test]
    fn walker_turns_at_tall_wall() {
        let mut world = World::flat();
        // Wall taller than JUMP_STEP directly ahead.
        world
            .stencil
            .apply_rect_mask(&mut world.terrain, 51, 60, 3, 21, MaskOp::Paint);
        let mut lemming = walker();
        world.step(&mut lemming);
        assert_eq!(lemming.dir, Direction::Left);
        assert_eq!(lemming.x, 50);
    }

    #[test]
    fn climber_scales_tall_wall() {
        let mut world = World::flat();
        world
            .stencil
            .apply_rect_mask(&mut world.terrain, 51, 40, 3, 41, MaskOp::Paint);
        let mut lemming = walker();
        lemming.is_climber = true;

        world.step(&mut lemming);
        assert_eq!(lemming.action, Action::Climbing);

        for _ in 0..60 {
            world.step(&mut lemming);
            if lemming.action == Action::Hoisting {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Hoisting);
        assert_eq!(lemming.x, 51);
    }

    #[test]
    fn walker_steps_up_small_rise() {
        let mut world = World::flat();
        world
            .stencil
            .apply_rect_mask(&mut world.terrain, 51, 79, 20, 2, MaskOp::Paint);
        let mut lemming = walker();
        world.step(&mut lemming);
        assert_eq!((lemming.x, lemming.y), (51, 78));
        assert_eq!(lemming.action, Action::Walking);
    }

    #[test]
    fn short_fall_lands_walking() {
        let mut world = World::flat();
        let mut lemming = Lemming::new(0, 50, 60, Direction::Right);
        for _ in 0..20 {
            world.step(&mut lemming);
            if lemming.action == Action::Walking {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Walking);
        assert_eq!(lemming.y, 80);
    }

    #[test]
    fn long_fall_splats() {
        let mut world = World::flat();
        let mut lemming = Lemming::new(0, 50, 0, Direction::Right);
        let mut terminal = None;
        for _ in 0..200 {
            if let Some(t) = world.step(&mut lemming) {
                terminal = Some(t);
                break;
            }
        }
        assert_eq!(terminal, Some(Terminal::Dead));
    }

    #[test]
    fn floater_survives_long_fall() {
        let mut world = World::flat();
        let mut lemming = Lemming::new(0, 50, 0, Direction::Right);
        lemming.is_floater = true;
        for _ in 0..200 {
            world.step(&mut lemming);
            if lemming.action == Action::Walking {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Walking);
        assert!(lemming.is_active());
    }

    #[test]
    fn digger_descends_and_falls_through() {
        let mut world = World::flat();
        let mut lemming = walker();
        lemming.set_action(Action::Digging);

        // Floor is 19 px thick; enough strokes reach the void below.
        for _ in 0..(20 * DIG_INTERVAL as usize + 8) {
            world.step(&mut lemming);
            if lemming.action == Action::Falling {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Falling);
        assert!(lemming.y > 80);
        world.stencil.check_terrain_sync(&world.terrain).unwrap();
    }

    #[test]
    fn digger_stops_on_steel() {
        let mut world = World::flat();
        for y in 83..85 {
            for x in 40..60 {
                world.stencil.or_mask(x, y, mask::STEEL);
            }
        }
        let mut lemming = walker();
        lemming.set_action(Action::Digging);

        for _ in 0..(10 * DIG_INTERVAL as usize) {
            world.step(&mut lemming);
            if lemming.action == Action::Walking {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Walking);
        assert!(lemming.y < 83, "steel stopped the dig above the plate");
    }

    #[test]
    fn basher_tunnels_through_wall() {
        let mut world = World::flat();
        world
            .stencil
            .apply_rect_mask(&mut world.terrain, 55, 50, 12, 31, MaskOp::Paint);
        let mut lemming = walker();
        lemming.set_action(Action::Bashing);

        for _ in 0..400 {
            world.step(&mut lemming);
            if lemming.action != Action::Bashing {
                break;
            }
        }
        assert_eq!(lemming.action, Action::Walking);
        assert!(lemming.x > 55, "basher advanced into the wall");
        world.stencil.check_terrain_sync(&world.terrain).unwrap();
    }

    #[test]
    fn builder_runs_out_of_bricks_and_falls_into_gap() {
        let mut world = World::flat();
        // A gap far wider than 12 bricks can span.
        world.stencil.apply_rect_mask(
            &mut world.terrain,
            60,
            81,
            120,
            19,
            MaskOp::Erase { allow_steel: false },
        );
        let mut lemming = walker();
        lemming.x = 55;
        lemming.set_action(Action::Building);
        lemming.bricks_left = MAX_BRICKS;

        let mut fell = false;
        for _ in 0..2000 {
            world.step(&mut lemming);
            if lemming.action == Action::Falling {
                fell = true;
                break;
            }
        }
        assert!(fell, "builder must end up falling, not erroring");
        assert_eq!(lemming.bricks_left, 0);
    }

    #[test]
    fn blocker_turns_walker_around() {
        let mut world = World::flat();
        world.blockers.push((55, 80));
        let mut lemming = walker();
        for _ in 0..10 {
            world.step(&mut lemming);
        }
        assert_eq!(lemming.dir, Direction::Left);
        assert!(lemming.x < 55);
    }

    #[test]
    fn bomber_countdown_detonates_and_craters() {
        let mut world = World::flat();
        let mut lemming = walker();
        lemming.countdown = Some(10);

        let mut terminal = None;
        for _ in 0..(10 + EXPLODE_TICKS as usize + 2) {
            if let Some(t) = world.step(&mut lemming) {
                terminal = Some(t);
                break;
            }
        }
        assert_eq!(terminal, Some(Terminal::Dead));
        // The crater reaches into the floor below the detonation point.
        assert!(!world.stencil.is_solid(lemming.x, 82));
        world.stencil.check_terrain_sync(&world.terrain).unwrap();
    }

    #[test]
    fn water_trigger_drowns() {
        let mut world = World::flat();
        world.objects.push(LevelObject {
            id: 0,
            kind: ObjectKind::Water,
            trigger: Rect::new(60, 70, 30, 15),
        });
        world.stencil.add_object(0, 60, 70, 30, 15);
        // Remove the floor under the water area.
        world.stencil.apply_rect_mask(
            &mut world.terrain,
            60,
            81,
            30,
            19,
            MaskOp::Erase { allow_steel: false },
        );

        let mut lemming = walker();
        lemming.x = 58;
        let mut terminal = None;
        for _ in 0..100 {
            if let Some(t) = world.step(&mut lemming) {
                terminal = Some(t);
                break;
            }
        }
        assert_eq!(terminal, Some(Terminal::Dead));
    }

    #[test]
    fn exit_trigger_exits() {
        let mut world = World::flat();
        world.objects.push(LevelObject {
            id: 0,
            kind: ObjectKind::Exit,
            trigger: Rect::new(60, 70, 8, 11),
        });
        world.stencil.add_object(0, 60, 70, 8, 11);

        let mut lemming = walker();
        let mut terminal = None;
        for _ in 0..100 {
            if let Some(t) = world.step(&mut lemming) {
                terminal = Some(t);
                break;
            }
        }
        assert_eq!(terminal, Some(Terminal::Exited));
    }

    #[test]
    fn footprint_hit_box() {
        let lemming = Lemming::new(0, 50, 80, Direction::Right);
        assert!(lemming.footprint_contains(50, 75));
        assert!(lemming.footprint_contains(46, 80));
        assert!(!lemming.footprint_contains(40, 80));
        assert!(!lemming.footprint_contains(50, 60));
    }
}
