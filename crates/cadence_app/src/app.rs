//! Application root
//!
//! The [`App`] owns the root context, the event dispatcher, an app-level
//! frame dispatch that outlives scenes, and the frame pacer. Each tick it
//! asks the pacer how many logical frames are due and runs them:
//!
//! 1. app-level frame dispatch
//! 2. the current scene (and through it the whole node tree)
//!
//! After the frames it applies any requested scene switch and then delivers
//! deferred events.

use std::cell::RefCell;
use std::fmt;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use cadence_core::FrameDispatch;
use tracing::debug;

use crate::config::AppConfig;
use crate::context::Context;
use crate::error::{AppError, Result};
use crate::events::{EventDispatcher, EVENT_DISPATCH_KEY};
use crate::node::{Node, SharedNode, FLUSH_TWEENS_KEY};
use crate::timer::FixedRateTimer;

/// Context key for the [`SceneSwitch`] handle
pub const SCENE_SWITCH_KEY: &str = "scene_switch";

/// Lets nodes ask the app to change scene at the end of the current tick
#[derive(Clone, Default)]
pub struct SceneSwitch {
    pending: Rc<RefCell<Option<SharedNode>>>,
}

impl SceneSwitch {
    /// Replace the current scene once the running tick finishes
    ///
    /// A later request in the same tick wins.
    pub fn request<N: Node + 'static>(&self, scene: N) {
        let scene: SharedNode = Rc::new(RefCell::new(scene));
        *self.pending.borrow_mut() = Some(scene);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }

    fn take(&self) -> Option<SharedNode> {
        self.pending.borrow_mut().take()
    }
}

impl fmt::Debug for SceneSwitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneSwitch")
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Root of a running application
pub struct App {
    config: AppConfig,
    context: Context,
    events: EventDispatcher,
    dispatch: FrameDispatch,
    timer: FixedRateTimer,
    scene_switch: SceneSwitch,
    scene: Option<SharedNode>,
    disposed: bool,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let context = Context::new();
        let events = EventDispatcher::new();
        let scene_switch = SceneSwitch::default();

        context.set(EVENT_DISPATCH_KEY, events.clone());
        context.set(SCENE_SWITCH_KEY, scene_switch.clone());
        context.set(FLUSH_TWEENS_KEY, config.scene.flush_tweens_on_dispose);

        Self {
            timer: FixedRateTimer::from_config(&config.timing),
            config,
            context,
            events,
            dispatch: FrameDispatch::new(),
            scene_switch,
            scene: None,
            disposed: false,
        }
    }

    /// Create an app configured from a TOML file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = AppConfig::load_from_path(path).map_err(AppError::Config)?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The root context every scene derives from
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Frame dispatch that keeps running across scene changes
    pub fn frame_dispatch(&self) -> &FrameDispatch {
        &self.dispatch
    }

    pub fn scene_switch(&self) -> SceneSwitch {
        self.scene_switch.clone()
    }

    pub fn scene(&self) -> Option<SharedNode> {
        self.scene.clone()
    }

    /// Dispose the current scene and begin `scene` in its place
    pub fn set_scene<N: Node + 'static>(&mut self, scene: N) -> Result<Rc<RefCell<N>>> {
        let scene = Rc::new(RefCell::new(scene));
        self.replace_scene(Some(scene.clone()))?;
        Ok(scene)
    }

    /// Dispose the current scene, leaving the app empty
    pub fn clear_scene(&mut self) -> Result<()> {
        self.replace_scene(None)
    }

    fn replace_scene(&mut self, scene: Option<SharedNode>) -> Result<()> {
        let previous = self.scene.take();
        self.timer.reset();

        if let Some(previous) = previous {
            let outcome = previous.borrow_mut().dispose();
            outcome?;
        }

        if let Some(scene) = scene {
            debug!("beginning scene");
            scene.borrow().core().set_context(self.context.derive());
            self.scene = Some(scene.clone());
            let outcome = scene.borrow_mut().begin();
            outcome?;
        }
        Ok(())
    }

    /// Change the frame rate, dropping any accumulated time
    pub fn set_frame_rate(&mut self, fps: u32, min_frames: u32, max_frames: u32) {
        self.config.timing.fps = fps;
        self.timer.set_fps(fps, min_frames, max_frames, true);
    }

    /// Run the frames due on the wall clock; returns how many ran
    pub fn tick(&mut self) -> Result<u32> {
        let frames = self.timer.frames_due();
        self.run_frames(frames)
    }

    /// Run the frames due after `elapsed`; returns how many ran
    pub fn advance(&mut self, elapsed: Duration) -> Result<u32> {
        let frames = self.timer.advance(elapsed);
        self.run_frames(frames)
    }

    /// Run exactly one frame regardless of the pacer
    pub fn step(&mut self) -> Result<()> {
        self.run_frames(1).map(|_| ())
    }

    fn run_frames(&mut self, frames: u32) -> Result<u32> {
        if self.disposed {
            return Ok(0);
        }

        for _ in 0..frames {
            self.dispatch.update();
            if let Some(scene) = self.scene.clone() {
                let outcome = scene.borrow_mut().update();
                outcome?;
            }
        }

        if let Some(next) = self.scene_switch.take() {
            self.replace_scene(Some(next))?;
        }
        self.events.dispatch_deferred();
        Ok(frames)
    }

    /// Dispose the scene, the app-level dispatch, and the event dispatcher
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Err(AppError::AlreadyDisposed("app"));
        }
        self.disposed = true;
        debug!("disposing app");

        self.replace_scene(None)?;
        self.dispatch.dispose()?;
        self.events.dispose()
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("timer", &self.timer)
            .field("has_scene", &self.scene.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}
