//! Fixed-tick frame scheduling.
//!
//! One render frame corresponds to one or more simulation ticks
//! depending on the active speed multiplier; ticks are never
//! subdivided. The [`FrameClock`] owns the wall-clock timer on its own
//! thread and coalesces overdue frames into a single due flag, so a
//! stalled consumer catches up by at most one frame instead of
//! replaying a backlog.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use lemmings_core::error::Result;
use lemmings_core::level::LevelDescriptor;
use lemmings_core::replay::{PlayerAction, Recorder, Replay};
use lemmings_core::session::{GameSession, SessionOutcome};
use lemmings_core::skills::{CursorSelection, SelectionFilter};

use crate::input::{InputQueue, LogicalAction};
use crate::snapshot::RenderSnapshot;

/// Nominal frame period in nanoseconds (30 ms).
pub const FRAME_NANOS: u64 = 30_000_000;

/// Tick multiplier while fast-forward is held.
pub const FAST_FORWARD_MULTIPLIER: u32 = 5;
/// Tick multiplier in turbo mode.
pub const TURBO_MULTIPLIER: u32 = 10;
/// Tick multiplier for superlemming levels.
pub const SUPERLEMMING_MULTIPLIER: u32 = 3;

/// Active speed modifiers. Strongest wins; they do not stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeedFlags {
    /// Player is holding fast-forward.
    pub fast_forward: bool,
    /// Turbo mode toggled on.
    pub turbo: bool,
    /// The level itself runs at superlemming speed.
    pub superlemming: bool,
}

impl SpeedFlags {
    /// Ticks per frame under the current flags.
    #[must_use]
    pub const fn multiplier(self) -> u32 {
        if self.turbo {
            TURBO_MULTIPLIER
        } else if self.fast_forward {
            FAST_FORWARD_MULTIPLIER
        } else if self.superlemming {
            SUPERLEMMING_MULTIPLIER
        } else {
            1
        }
    }
}

/// Where the game loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Session built but not started.
    Idle,
    /// Ticking every frame.
    Running,
    /// Frames pass, ticks do not.
    Paused,
    /// The session reached an outcome.
    Ended,
}

/// Wall-clock frame timer on a dedicated thread.
///
/// Frames that elapse while the consumer is busy coalesce into one due
/// flag; the simulation never owes more than one frame of work.
#[derive(Debug)]
pub struct FrameClock {
    shared: Arc<ClockShared>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct ClockShared {
    due: Mutex<bool>,
    cond: Condvar,
    stop: AtomicBool,
}

impl FrameClock {
    /// Start a clock with the given frame period.
    #[must_use]
    pub fn start(period: Duration) -> Self {
        let shared = Arc::new(ClockShared {
            due: Mutex::new(false),
            cond: Condvar::new(),
            stop: AtomicBool::new(false),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::spawn(move || {
            while !thread_shared.stop.load(Ordering::Relaxed) {
                std::thread::sleep(period);
                if let Ok(mut due) = thread_shared.due.lock() {
                    *due = true;
                }
                thread_shared.cond.notify_one();
            }
        });
        Self {
            shared,
            handle: Some(handle),
        }
    }

    /// Start a clock at the nominal frame rate.
    #[must_use]
    pub fn start_nominal() -> Self {
        Self::start(Duration::from_nanos(FRAME_NANOS))
    }

    /// Block until the next frame is due, then consume the flag.
    pub fn wait_frame(&self) {
        let Ok(mut due) = self.shared.due.lock() else {
            return;
        };
        while !*due {
            match self.shared.cond.wait(due) {
                Ok(guard) => due = guard,
                Err(_) => return,
            }
        }
        *due = false;
    }
}

impl Drop for FrameClock {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Relaxed);
        self.shared.cond.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// The frame-driven game loop: session, input, recording, and pacing.
#[derive(Debug)]
pub struct GameLoop {
    level: LevelDescriptor,
    session: GameSession,
    input: InputQueue,
    recorder: Option<Recorder>,
    speed: SpeedFlags,
    state: SchedulerState,
    filter: SelectionFilter,
}

impl GameLoop {
    /// Build a loop for a level.
    ///
    /// # Errors
    ///
    /// Fails when the level description is invalid.
    pub fn new(level: LevelDescriptor) -> Result<Self> {
        let session = GameSession::new(level.clone())?;
        Ok(Self {
            level,
            session,
            input: InputQueue::new(),
            recorder: None,
            speed: SpeedFlags::default(),
            state: SchedulerState::Idle,
            filter: SelectionFilter::Any,
        })
    }

    /// Enable replay recording for this attempt.
    #[must_use]
    pub fn with_recording(mut self) -> Self {
        self.recorder = Some(Recorder::new(&self.level));
        self
    }

    /// Handle to push input from another thread.
    #[must_use]
    pub fn input(&self) -> InputQueue {
        self.input.clone()
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Active speed flags.
    #[must_use]
    pub const fn speed(&self) -> SpeedFlags {
        self.speed
    }

    /// Mark the level as a superlemming level.
    pub fn set_superlemming(&mut self, on: bool) {
        self.speed.superlemming = on;
    }

    /// The underlying session.
    #[must_use]
    pub const fn session(&self) -> &GameSession {
        &self.session
    }

    /// Leave `Idle` and start ticking.
    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Running;
        }
    }

    /// Run one frame: resolve buffered input, run the due sub-steps,
    /// and capture a snapshot for the renderer.
    pub fn step_frame(&mut self) -> RenderSnapshot {
        for action in self.input.drain() {
            self.handle_action(action);
        }

        if self.state == SchedulerState::Running {
            for _ in 0..self.speed.multiplier() {
                self.session.tick();
                if matches!(self.session.outcome(), SessionOutcome::Ended { .. }) {
                    self.state = SchedulerState::Ended;
                    break;
                }
            }
        }

        RenderSnapshot::capture(&self.session)
    }

    /// Drive the loop off a frame clock until the session ends,
    /// handing each frame's snapshot to the renderer callback.
    pub fn run<F: FnMut(&RenderSnapshot)>(&mut self, clock: &FrameClock, mut on_frame: F) {
        self.start();
        while self.state != SchedulerState::Ended {
            clock.wait_frame();
            let snapshot = self.step_frame();
            on_frame(&snapshot);
        }
    }

    /// Seal and return the recording, if any.
    #[must_use]
    pub fn finish_recording(self) -> Option<Replay> {
        self.recorder.map(|r| r.finalize(&self.session))
    }

    fn record(&mut self, action: PlayerAction) {
        let tick = self.session.tick_count();
        if let Some(recorder) = self.recorder.as_mut() {
            recorder.record(tick, action);
        }
    }

    fn handle_action(&mut self, action: LogicalAction) {
        match action {
            LogicalAction::AssignAt { x, y, skill } => {
                let cursor = CursorSelection {
                    x,
                    y,
                    filter: self.filter,
                };
                if let Some(id) = self.session.resolve_and_assign(cursor, skill) {
                    self.record(PlayerAction::Assign { lemming: id, skill });
                }
            }
            LogicalAction::CursorMoved { x, y } => {
                self.session.update_highlight(Some(CursorSelection {
                    x,
                    y,
                    filter: self.filter,
                }));
            }
            LogicalAction::SetFilter(filter) => {
                self.filter = filter;
            }
            LogicalAction::Nuke => {
                if self.session.apply_action(&PlayerAction::Nuke) {
                    self.record(PlayerAction::Nuke);
                }
            }
            LogicalAction::AdjustReleaseRate(delta) => {
                if self.session.apply_action(&PlayerAction::ReleaseRate { delta }) {
                    self.record(PlayerAction::ReleaseRate { delta });
                }
            }
            LogicalAction::TogglePause => {
                self.state = match self.state {
                    SchedulerState::Running => SchedulerState::Paused,
                    SchedulerState::Paused => SchedulerState::Running,
                    other => other,
                };
                self.record(PlayerAction::Pause);
            }
            LogicalAction::ToggleFastForward => {
                self.speed.fast_forward = !self.speed.fast_forward;
            }
            LogicalAction::ToggleTurbo => {
                self.speed.turbo = !self.speed.turbo;
            }
            LogicalAction::Pan { dx, dy } => {
                self.record(PlayerAction::Pan { dx, dy });
            }
            LogicalAction::Restart => match GameSession::new(self.level.clone()) {
                Ok(session) => {
                    tracing::info!(level = %self.level.identity, "level restarted");
                    self.session = session;
                    if self.recorder.is_some() {
                        self.recorder = Some(Recorder::new(&self.level));
                    }
                    self.speed.fast_forward = false;
                    self.speed.turbo = false;
                    self.state = SchedulerState::Running;
                }
                Err(err) => tracing::error!(%err, "restart failed"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lemmings_core::level::{LevelIdentity, Rect};
    use lemmings_core::lemming::Direction;
    use lemmings_core::skills::{Skill, SkillSupply};

    fn level() -> LevelDescriptor {
        LevelDescriptor {
            identity: LevelIdentity {
                pack: "runtime".into(),
                rating: "test".into(),
                index: 1,
                name: "pacing".into(),
            },
            width: 300,
            height: 150,
            terrain_rects: vec![Rect::new(0, 101, 300, 49)],
            steel_rects: vec![],
            one_way_rects: vec![],
            objects: vec![],
            spawn_x: 40,
            spawn_y: 80,
            spawn_dir: Direction::Right,
            lemming_count: 5,
            required_rescue: 0,
            time_limit_ticks: 20_000,
            release_rate_min: 1,
            release_rate_max: 99,
            release_rate_initial: 50,
            skills: SkillSupply::uniform(5),
            classic_steel: false,
            seed: 0,
        }
    }

    #[test]
    fn multiplier_precedence() {
        let mut speed = SpeedFlags::default();
        assert_eq!(speed.multiplier(), 1);
        speed.superlemming = true;
        assert_eq!(speed.multiplier(), SUPERLEMMING_MULTIPLIER);
        speed.fast_forward = true;
        assert_eq!(speed.multiplier(), FAST_FORWARD_MULTIPLIER);
        speed.turbo = true;
        assert_eq!(speed.multiplier(), TURBO_MULTIPLIER);
    }

    #[test]
    fn frames_do_not_tick_until_started() {
        let mut game = GameLoop::new(level()).unwrap();
        let snapshot = game.step_frame();
        assert_eq!(snapshot.tick, 0);
        assert_eq!(game.state(), SchedulerState::Idle);

        game.start();
        let snapshot = game.step_frame();
        assert_eq!(snapshot.tick, 1);
    }

    #[test]
    fn pause_stops_ticks_but_frames_continue() {
        let mut game = GameLoop::new(level()).unwrap();
        game.start();
        for _ in 0..10 {
            game.step_frame();
        }
        game.input().push(LogicalAction::TogglePause);
        let paused_at = game.step_frame().tick;
        assert_eq!(game.state(), SchedulerState::Paused);

        for _ in 0..5 {
            assert_eq!(game.step_frame().tick, paused_at);
        }

        game.input().push(LogicalAction::TogglePause);
        game.step_frame();
        assert_eq!(game.state(), SchedulerState::Running);
        assert!(game.step_frame().tick > paused_at);
    }

    #[test]
    fn fast_forward_runs_whole_ticks() {
        let mut plain = GameLoop::new(level()).unwrap();
        plain.start();
        for _ in 0..FAST_FORWARD_MULTIPLIER {
            plain.step_frame();
        }

        let mut fast = GameLoop::new(level()).unwrap();
        fast.start();
        fast.input().push(LogicalAction::ToggleFastForward);
        let snapshot = fast.step_frame();

        // One fast frame equals five plain frames, state included.
        assert_eq!(snapshot.tick, u64::from(FAST_FORWARD_MULTIPLIER));
        assert_eq!(plain.session().state_hash(), fast.session().state_hash());
    }

    #[test]
    fn cursor_assignment_through_the_queue() {
        let mut game = GameLoop::new(level()).unwrap();
        game.start();
        for _ in 0..30 {
            game.step_frame();
        }
        let target = game.session().lemming(0).unwrap();
        game.input().push(LogicalAction::AssignAt {
            x: target.x,
            y: target.y,
            skill: Skill::Digger,
        });
        game.step_frame();
        assert_eq!(
            game.session().lemming(0).unwrap().action,
            lemmings_core::lemming::Action::Digging
        );
    }

    #[test]
    fn cursor_hover_highlights_the_target() {
        let mut game = GameLoop::new(level()).unwrap();
        game.start();
        for _ in 0..30 {
            game.step_frame();
        }
        let target = game.session().lemming(0).unwrap();
        game.input().push(LogicalAction::CursorMoved {
            x: target.x,
            y: target.y,
        });
        game.input().push(LogicalAction::TogglePause);
        let snapshot = game.step_frame();
        assert!(snapshot.lemmings[0].highlighted);

        // Hovering empty space clears it again.
        game.input().push(LogicalAction::CursorMoved { x: 0, y: 0 });
        let snapshot = game.step_frame();
        assert!(!snapshot.lemmings[0].highlighted);
    }

    #[test]
    fn restart_resets_the_session() {
        let mut game = GameLoop::new(level()).unwrap().with_recording();
        game.start();
        for _ in 0..50 {
            game.step_frame();
        }
        assert!(game.session().tick_count() >= 50);

        game.input().push(LogicalAction::Restart);
        let snapshot = game.step_frame();
        // Restart happens before the frame's sub-steps, so the new
        // session has run exactly one tick.
        assert_eq!(snapshot.tick, 1);
        assert_eq!(game.state(), SchedulerState::Running);
    }

    #[test]
    fn recording_captures_applied_actions() {
        let mut game = GameLoop::new(level()).unwrap().with_recording();
        game.start();
        for _ in 0..30 {
            game.step_frame();
        }
        game.input().push(LogicalAction::Nuke);
        game.step_frame();
        while game.state() != SchedulerState::Ended {
            game.step_frame();
        }
        let replay = game.finish_recording().unwrap();
        assert!(replay
            .actions
            .iter()
            .any(|a| a.action == PlayerAction::Nuke));
        assert!(replay.final_tick > 0);
    }

    #[test]
    fn frame_clock_coalesces_and_stops() {
        let clock = FrameClock::start(Duration::from_millis(1));
        // Several periods elapse; we still only consume one due flag at
        // a time.
        std::thread::sleep(Duration::from_millis(10));
        clock.wait_frame();
        clock.wait_frame();
        drop(clock);
    }
}
