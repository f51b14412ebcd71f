//! Cadence Application Layer
//!
//! Hosts the scheduling core in a tree of nodes driven by a fixed-rate pacer.
//!
//! # Example
//!
//! ```rust
//! use cadence_animation::{easing, PropertyBag, TweenParams};
//! use cadence_app::prelude::*;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! # fn main() -> cadence_app::Result<()> {
//! let mut app = App::new(AppConfig::default());
//! let scene = app.set_scene(BasicNode::new())?;
//! let sprite = Rc::new(RefCell::new(PropertyBag::new().with("alpha", 0.0)));
//!
//! let core = scene.borrow().core().clone();
//! let handle = core.tween(&sprite, easing::linear(3), [("alpha", 1.0)], TweenParams::new())?;
//! let target = sprite.clone();
//! core.run(move |co| async move {
//!     co.suspend(handle.suspension()).await;
//!     target.borrow_mut().set("visible", 1.0);
//!     Ok(())
//! });
//!
//! // a quarter second at 60 fps is capped at 4 frames by default
//! app.advance(Duration::from_millis(250))?;
//! assert_eq!(sprite.borrow().number("alpha"), Some(1.0));
//! assert_eq!(sprite.borrow().number("visible"), Some(1.0));
//! # Ok(())
//! # }
//! ```

mod app;
mod config;
mod context;
mod error;
mod events;
mod node;
mod state;
mod timer;

pub use app::{App, SceneSwitch, SCENE_SWITCH_KEY};
pub use config::{AppConfig, SceneConfig, TimingConfig};
pub use context::{Context, ContextKey};
pub use error::{AppError, Result};
pub use events::{EventDispatcher, EventListener, EVENT_DISPATCH_KEY};
pub use node::{BasicNode, Node, NodeCore, SharedNode, FLUSH_TWEENS_KEY};
pub use state::{StateSwitch, SwitchCase};
pub use timer::FixedRateTimer;

/// Prelude module - import everything commonly needed
pub mod prelude {
    pub use crate::app::{App, SceneSwitch};
    pub use crate::config::AppConfig;
    pub use crate::context::Context;
    pub use crate::error::{AppError, Result};
    pub use crate::events::EventDispatcher;
    pub use crate::node::{BasicNode, Node, NodeCore};

    // Scheduling core
    pub use cadence_core::{CoroutineManager, FrameDispatch, Suspension, Yielder};
}
