//! Cadence Animation System
//!
//! Frame-stepped property tweens driven by precomputed easing curves.
//!
//! # Features
//!
//! - **Easing Curves**: quadratic, cubic, and bezier easings sampled into
//!   per-frame ratio sequences, plus resampling of arbitrary control values
//! - **Tweens**: animate numeric and unit-suffixed properties (`"90px"`) on
//!   any [`Tweenable`] target, with delays and completion callbacks
//! - **Tween Manager**: steps every tween once per frame and cancels by target
//!
//! # Example
//!
//! ```rust
//! use cadence_animation::{easing, PropertyBag, TweenManager, TweenParams};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let tweens = TweenManager::new();
//! let sprite = Rc::new(RefCell::new(PropertyBag::new().with("left", "0px")));
//!
//! tweens
//!     .tween(&sprite, easing::ease_out(4), [("left", 80.0)], TweenParams::new())
//!     .unwrap();
//! for _ in 0..4 {
//!     tweens.update();
//! }
//! assert_eq!(sprite.borrow().get("left").unwrap().to_string(), "80px");
//! assert!(tweens.is_clear());
//! ```

pub mod easing;
pub mod error;
pub mod manager;
pub mod property;
pub mod tween;

pub use easing::{Curve, Easing};
pub use error::TweenError;
pub use manager::TweenManager;
pub use property::{PropertyBag, PropertyValue, Tweenable};
pub use tween::{Tween, TweenHandle, TweenParams};
