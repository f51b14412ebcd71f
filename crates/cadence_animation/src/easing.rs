//! Easing curves
//!
//! Animations run at a fixed frame rate, so easing is precomputed into a
//! [`Curve`]: one ratio per frame, the first at `1/n` and the last at `1`.

use std::ops::Deref;
use std::rc::Rc;

/// Easing function type
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Easing {
    #[default]
    Linear,
    /// Quadratic ease in
    EaseIn,
    /// Quadratic ease out
    EaseOut,
    /// Quadratic ease in, then out, symmetric about the midpoint
    EaseInOut,
    EaseInCubic,
    EaseOutCubic,
    EaseInOutCubic,
    CubicBezier(f64, f64, f64, f64),
}

impl Easing {
    /// Apply the easing function to a progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Easing::EaseInOut => {
                let t = t * 2.0;
                if t < 1.0 {
                    t * t * 0.5
                } else {
                    let rest = 2.0 - t;
                    0.5 + (1.0 - rest * rest) * 0.5
                }
            }
            Easing::EaseInCubic => t * t * t,
            Easing::EaseOutCubic => 1.0 - (1.0 - t).powi(3),
            Easing::EaseInOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::CubicBezier(x1, y1, x2, y2) => Bezier::new(*x1, *y1, *x2, *y2).ease(t),
        }
    }

    /// Sample this easing into a curve of `frames` ratios
    pub fn curve(&self, frames: usize) -> Curve {
        Curve::from_fn(frames, |t| self.apply(t))
    }
}

/// A precomputed per-frame sequence of interpolation ratios
///
/// Cloning is cheap; clones share the same ratios.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    ratios: Rc<[f64]>,
}

impl Curve {
    /// Sample `formula` at `i/frames` for `i` in `1..=frames`
    pub fn from_fn(frames: usize, formula: impl Fn(f64) -> f64) -> Self {
        let total = frames as f64;
        (1..=frames).map(|i| formula(i as f64 / total)).collect()
    }

    /// Use explicit ratios as a curve
    pub fn from_ratios(ratios: impl Into<Rc<[f64]>>) -> Self {
        Self {
            ratios: ratios.into(),
        }
    }

    pub fn ratios(&self) -> &[f64] {
        &self.ratios
    }

    /// The ratio of the final frame
    pub fn final_ratio(&self) -> Option<f64> {
        self.ratios.last().copied()
    }
}

impl Deref for Curve {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.ratios
    }
}

impl FromIterator<f64> for Curve {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self {
            ratios: iter.into_iter().collect(),
        }
    }
}

pub fn linear(frames: usize) -> Curve {
    Easing::Linear.curve(frames)
}

pub fn ease_in(frames: usize) -> Curve {
    Easing::EaseIn.curve(frames)
}

pub fn ease_out(frames: usize) -> Curve {
    Easing::EaseOut.curve(frames)
}

pub fn ease_inout(frames: usize) -> Curve {
    Easing::EaseInOut.curve(frames)
}

/// Resample control `values` onto `frames` output frames
///
/// Adjacent control values are linearly interpolated. The last output frame
/// is always exactly the last control value.
pub fn interpolate(values: &[f64], frames: usize) -> Curve {
    let Some(&last) = values.last() else {
        return Curve::from_ratios(Vec::new());
    };

    let scale = (values.len() - 1) as f64 / frames as f64;
    let mut out: Vec<f64> = (0..frames)
        .map(|i| {
            let position = (i + 1) as f64 * scale;
            let base = position.floor() as usize;
            let offset = position - base as f64;
            match (values.get(base), values.get(base + 1)) {
                (Some(from), Some(to)) => from * (1.0 - offset) + to * offset,
                _ => last,
            }
        })
        .collect();

    if let Some(end) = out.last_mut() {
        *end = last;
    }
    Curve::from_ratios(out)
}

/// CSS-style cubic bezier through (0, 0), (x1, y1), (x2, y2), (1, 1)
///
/// Each axis is kept in polynomial form `((a * p + b) * p + c) * p`.
#[derive(Clone, Copy)]
struct Bezier {
    x: [f64; 3],
    y: [f64; 3],
}

impl Bezier {
    const EPSILON: f64 = 1e-7;

    fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x: Self::coefficients(x1, x2),
            y: Self::coefficients(y1, y2),
        }
    }

    fn coefficients(p1: f64, p2: f64) -> [f64; 3] {
        let c = 3.0 * p1;
        let b = 3.0 * (p2 - p1) - c;
        [1.0 - c - b, b, c]
    }

    fn eval([a, b, c]: [f64; 3], p: f64) -> f64 {
        ((a * p + b) * p + c) * p
    }

    fn slope([a, b, c]: [f64; 3], p: f64) -> f64 {
        (3.0 * a * p + 2.0 * b) * p + c
    }

    /// Curve parameter whose x coordinate is `x`
    fn param_for(&self, x: f64) -> f64 {
        let mut p = x;
        for _ in 0..8 {
            let offset = Self::eval(self.x, p) - x;
            if offset.abs() < Self::EPSILON {
                return p;
            }
            let slope = Self::slope(self.x, p);
            if slope.abs() < Self::EPSILON {
                break;
            }
            p -= offset / slope;
        }

        // newton stalled on a flat section, bisect instead
        let (mut lo, mut hi) = (0.0, 1.0);
        p = x;
        while hi - lo > Self::EPSILON {
            let at = Self::eval(self.x, p);
            if (at - x).abs() < Self::EPSILON {
                break;
            }
            if at < x {
                lo = p;
            } else {
                hi = p;
            }
            p = (lo + hi) / 2.0;
        }
        p
    }

    fn ease(&self, t: f64) -> f64 {
        if t <= 0.0 {
            0.0
        } else if t >= 1.0 {
            1.0
        } else {
            Self::eval(self.y, self.param_for(t))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_linear() {
        assert_eq!(linear(4).ratios(), &[0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_quadratic_curves() {
        assert_close(&ease_in(4), &[0.0625, 0.25, 0.5625, 1.0]);
        assert_close(&ease_out(4), &[0.4375, 0.75, 0.9375, 1.0]);
    }

    #[test]
    fn test_ease_inout_is_symmetric() {
        let curve = ease_inout(10);
        assert_eq!(curve.len(), 10);
        assert!((curve[4] - 0.5).abs() < 1e-12);
        assert!((curve[9] - 1.0).abs() < 1e-12);
        for i in 1..5 {
            let t = i as f64 / 10.0;
            let below = Easing::EaseInOut.apply(0.5 - t);
            let above = Easing::EaseInOut.apply(0.5 + t);
            assert!((below + above - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_interpolate_two_values() {
        let curve = interpolate(&[0.0, 10.0], 5);
        assert_close(&curve, &[2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(curve.final_ratio(), Some(10.0));
    }

    #[test]
    fn test_interpolate_control_points() {
        let curve = interpolate(&[0.0, 1.0, 0.5, 1.0], 6);
        assert_close(&curve, &[0.5, 1.0, 0.75, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_interpolate_degenerate_inputs() {
        assert!(interpolate(&[], 5).is_empty());
        assert_eq!(interpolate(&[3.0], 3).ratios(), &[3.0, 3.0, 3.0]);
        assert!(interpolate(&[0.0, 1.0], 0).is_empty());
    }

    #[test]
    fn test_curves_are_monotonic() {
        for easing in [
            Easing::Linear,
            Easing::EaseIn,
            Easing::EaseOut,
            Easing::EaseInOut,
            Easing::EaseInOutCubic,
            Easing::CubicBezier(0.25, 0.1, 0.25, 1.0),
        ] {
            let curve = easing.curve(30);
            assert!(
                curve.windows(2).all(|w| w[0] <= w[1]),
                "{easing:?} is not monotonic"
            );
            assert!((curve.final_ratio().unwrap() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cubic_bezier_known_points() {
        // control points on the diagonal trace the identity
        let straight = Easing::CubicBezier(0.0, 0.0, 1.0, 1.0);
        for t in [0.1, 0.35, 0.5, 0.8] {
            assert!((straight.apply(t) - t).abs() < 1e-6);
        }

        let symmetric = Easing::CubicBezier(0.42, 0.0, 0.58, 1.0);
        assert!((symmetric.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(symmetric.apply(0.25) < 0.25);
        assert_eq!(symmetric.apply(-1.0), 0.0);
        assert_eq!(symmetric.apply(2.0), 1.0);
    }

    #[test]
    fn test_clones_share_ratios() {
        let curve = linear(8);
        let copy = curve.clone();
        assert!(Rc::ptr_eq(&curve.ratios, &copy.ratios));
    }
}
