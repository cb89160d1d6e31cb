//! JSON description of a selection build-up
//!
//! ```json
//! {
//!     "width": 64,
//!     "height": 48,
//!     "operations": [
//!         {"type": "ellipse", "x": 4, "y": 4, "w": 40, "h": 30, "antialias": true},
//!         {"type": "rect", "op": "subtract", "x": 20, "y": 0, "w": 8, "h": 48},
//!         {"type": "polygon", "op": "add", "points": [[50, 10], [62, 40], [44, 40]]}
//!     ]
//! }
//! ```
use crate::{
    CombineOp, MaskError, Point, Scalar, Selection, ShapeSpec, selection::DEFAULT_ANTIALIAS,
};
use serde::{Deserialize, Serialize};
use std::{io::Read, str::FromStr};

/// Single step of the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    Rect {
        #[serde(default)]
        op: CombineOp,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    },
    RoundedRect {
        #[serde(default)]
        op: CombineOp,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        rx: Scalar,
        ry: Scalar,
        #[serde(default)]
        antialias: bool,
    },
    Ellipse {
        #[serde(default)]
        op: CombineOp,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        #[serde(default)]
        antialias: bool,
    },
    Polygon {
        #[serde(default)]
        op: CombineOp,
        points: Vec<Point>,
        /// Overrides antialias factor of the script
        #[serde(default)]
        antialias: Option<usize>,
    },
    Invert,
    Clear,
    All,
}

fn default_antialias() -> usize {
    DEFAULT_ANTIALIAS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    pub width: usize,
    pub height: usize,
    /// Oversampling factor of polygons
    #[serde(default = "default_antialias")]
    pub antialias: usize,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

impl FromStr for Script {
    type Err = MaskError;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(string)?)
    }
}

impl Script {
    pub fn from_reader(reader: impl Read) -> Result<Self, MaskError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json(&self) -> Result<String, MaskError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Execute all operations on a new selection
    pub fn run(&self) -> Result<Selection<u8>, MaskError> {
        let mut selection = Selection::new(self.width, self.height)?;
        for (index, operation) in self.operations.iter().enumerate() {
            let changed = self.apply(&mut selection, operation)?;
            tracing::debug!(index, changed, ?operation, "[script]");
        }
        Ok(selection)
    }

    fn apply(
        &self,
        selection: &mut Selection<u8>,
        operation: &Operation,
    ) -> Result<bool, MaskError> {
        let changed = match *operation {
            Operation::Rect { op, x, y, w, h } => selection.combine_rect(op, x, y, w, h),
            Operation::RoundedRect {
                op,
                x,
                y,
                w,
                h,
                rx,
                ry,
                antialias,
            } => selection.combine_rounded_rect(
                op,
                ShapeSpec::rect(x, y, w, h)
                    .with_radius(rx, ry)
                    .with_antialias(antialias),
            ),
            Operation::Ellipse {
                op,
                x,
                y,
                w,
                h,
                antialias,
            } => selection.combine_ellipse(op, x, y, w, h, antialias),
            Operation::Polygon {
                op,
                ref points,
                antialias,
            } => selection.combine_polygon(op, points, antialias.unwrap_or(self.antialias))?,
            Operation::Invert => {
                selection.invert();
                true
            }
            Operation::Clear => {
                selection.clear();
                true
            }
            Operation::All => {
                selection.fill();
                true
            }
        };
        Ok(changed)
    }
}
