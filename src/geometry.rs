//! Container geometry: canvas size, the four static walls and the interior
//! box the particle centres are confined to.

use serde::{Deserialize, Serialize};

/// Distance a particle caught in a corner is pushed back inside, pixels.
pub const CORNER_NUDGE: f64 = 1e-3;

/// Smallest accepted canvas extent, pixels.
pub const MIN_CANVAS_EXTENT: f64 = 50.0;

/// Drawing area the container fills, pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Replaces non-finite or too small extents so the interior always fits
    /// at least one particle of `radius`.
    pub fn sanitized(self, radius: f64) -> Self {
        let min = MIN_CANVAS_EXTENT.max(4.0 * radius);
        let fix = |v: f64| if v.is_finite() && v >= min { v } else { min };
        let out = Self::new(fix(self.width), fix(self.height));
        if out != self {
            log::warn!(
                "canvas {}x{} is unusable, using {}x{}",
                self.width,
                self.height,
                out.width,
                out.height
            );
        }
        out
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self::new(800.0, 500.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WallSide {
    Top,
    Bottom,
    Left,
    Right,
}

impl WallSide {
    pub const ALL: [WallSide; 4] = [WallSide::Top, WallSide::Bottom, WallSide::Left, WallSide::Right];
}

/// A static, infinitely massive rectangle. Centre and extents in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub side: WallSide,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl Wall {
    /// Coordinate of the face that touches the interior.
    pub fn inner_edge(&self) -> f64 {
        match self.side {
            WallSide::Top => self.center_y + self.height / 2.0,
            WallSide::Bottom => self.center_y - self.height / 2.0,
            WallSide::Left => self.center_x + self.width / 2.0,
            WallSide::Right => self.center_x - self.width / 2.0,
        }
    }
}

/// Builds the four walls just outside the canvas, so the canvas itself is
/// the interior.
pub fn create_walls(canvas: CanvasSize, thickness: f64) -> [Wall; 4] {
    let t = if thickness.is_finite() && thickness > 0.0 { thickness } else { 50.0 };
    let (w, h) = (canvas.width, canvas.height);
    let half = t / 2.0;
    [
        Wall { side: WallSide::Top, center_x: w / 2.0, center_y: -half, width: w, height: t },
        Wall { side: WallSide::Bottom, center_x: w / 2.0, center_y: h + half, width: w, height: t },
        Wall { side: WallSide::Left, center_x: -half, center_y: h / 2.0, width: t, height: h },
        Wall { side: WallSide::Right, center_x: w + half, center_y: h / 2.0, width: t, height: h },
    ]
}

/// Which walls a particle touched during one wall pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WallContact {
    pub x_side: Option<WallSide>,
    pub y_side: Option<WallSide>,
}

impl WallContact {
    pub fn is_corner(&self) -> bool {
        self.x_side.is_some() && self.y_side.is_some()
    }

    pub fn sides(&self) -> impl Iterator<Item = WallSide> {
        self.x_side.into_iter().chain(self.y_side)
    }
}

/// Region the centre of a particle with a given radius may occupy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Interior of `walls` shrunk by `radius` on every side.
    pub fn from_walls(walls: &[Wall; 4], radius: f64) -> Self {
        let mut b = Bounds {
            min_x: 0.0,
            max_x: 0.0,
            min_y: 0.0,
            max_y: 0.0,
        };
        for wall in walls {
            let edge = wall.inner_edge();
            match wall.side {
                WallSide::Top => b.min_y = edge + radius,
                WallSide::Bottom => b.max_y = edge - radius,
                WallSide::Left => b.min_x = edge + radius,
                WallSide::Right => b.max_x = edge - radius,
            }
        }
        b
    }

    #[inline]
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Moves a point inside the bounds without touching velocity. Never
    /// panics, even on NaN bounds.
    #[inline]
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (x.max(self.min_x).min(self.max_x), y.max(self.min_y).min(self.max_y))
    }

    /// Reflects a particle off any wall it has crossed and pulls it back to
    /// the boundary.
    ///
    /// The reflected component is forced to point inward, so a particle
    /// already heading away from the wall is not turned back into it.
    /// When both axes are out of bounds at once the particle is in a corner:
    /// both components are reflected and the position is pushed
    /// [`CORNER_NUDGE`] inside so the next tick does not see it on the
    /// boundary again.
    pub fn resolve(&self, x: &mut f64, y: &mut f64, vx: &mut f64, vy: &mut f64) -> Option<WallContact> {
        let x_side = if *x < self.min_x {
            Some(WallSide::Left)
        } else if *x > self.max_x {
            Some(WallSide::Right)
        } else {
            None
        };
        let y_side = if *y < self.min_y {
            Some(WallSide::Top)
        } else if *y > self.max_y {
            Some(WallSide::Bottom)
        } else {
            None
        };
        let contact = WallContact { x_side, y_side };
        if contact.x_side.is_none() && contact.y_side.is_none() {
            return None;
        }
        let nudge = if contact.is_corner() { CORNER_NUDGE } else { 0.0 };

        match x_side {
            Some(WallSide::Left) => {
                *x = self.min_x + nudge;
                *vx = vx.abs();
            }
            Some(WallSide::Right) => {
                *x = self.max_x - nudge;
                *vx = -vx.abs();
            }
            _ => {}
        }
        match y_side {
            Some(WallSide::Top) => {
                *y = self.min_y + nudge;
                *vy = vy.abs();
            }
            Some(WallSide::Bottom) => {
                *y = self.max_y - nudge;
                *vy = -vy.abs();
            }
            _ => {}
        }
        Some(contact)
    }
}
