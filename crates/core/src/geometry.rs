//! 2D shape primitives and overlap tests for annotation regions.
//!
//! Shapes arrive from the viewer as JSON objects tagged by `tool`
//! (`"rectangle"` or `"circle"`) with `startX`/`startY`/`endX`/`endY`
//! coordinates. They are parsed into the closed [`Shape`] enum; anything that
//! does not parse is reported as a [`ShapeError`] so callers can skip it
//! instead of aborting a whole batch.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The drag gesture that produced a shape: where the pointer went down and
/// where it was released.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragBounds {
    pub start_x: f64,
    pub start_y: f64,
    pub end_x: f64,
    pub end_y: f64,
}

impl DragBounds {
    pub fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
        }
    }

    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    pub fn end(&self) -> Point {
        Point::new(self.end_x, self.end_y)
    }
}

/// A region drawn on an image. Adding a variant forces every overlap match
/// below to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned rectangle spanning the drag bounds.
    Rectangle(DragBounds),
    /// Circle centred on the drag start; the radius reaches the drag end.
    Circle(DragBounds),
}

/// Why a stored shape could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum ShapeError {
    #[error("shape is not a JSON object")]
    NotAnObject,

    #[error("shape has no 'tool' tag")]
    MissingTool,

    #[error("unsupported shape tool '{0}'")]
    UnsupportedTool(String),

    #[error("malformed {tool} shape: {reason}")]
    Malformed { tool: String, reason: String },
}

/// All shape tool tags the engine understands.
pub const SUPPORTED_TOOLS: &[&str] = &["rectangle", "circle"];

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl Shape {
    /// Parse a single stored shape object.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ShapeError> {
        let obj = value.as_object().ok_or(ShapeError::NotAnObject)?;
        let tool = obj
            .get("tool")
            .and_then(|t| t.as_str())
            .ok_or(ShapeError::MissingTool)?;

        if !SUPPORTED_TOOLS.contains(&tool) {
            return Err(ShapeError::UnsupportedTool(tool.to_string()));
        }

        let shape: Shape =
            serde_json::from_value(value.clone()).map_err(|e| ShapeError::Malformed {
                tool: tool.to_string(),
                reason: e.to_string(),
            })?;

        if !shape.bounds().is_finite() {
            return Err(ShapeError::Malformed {
                tool: tool.to_string(),
                reason: "coordinates must be finite".to_string(),
            });
        }

        Ok(shape)
    }

    /// The drag bounds the shape was built from.
    pub fn bounds(&self) -> &DragBounds {
        match self {
            Self::Rectangle(b) | Self::Circle(b) => b,
        }
    }

    /// Return the tool tag as a string slice.
    pub fn tool(&self) -> &'static str {
        match self {
            Self::Rectangle(_) => "rectangle",
            Self::Circle(_) => "circle",
        }
    }
}

impl DragBounds {
    fn is_finite(&self) -> bool {
        [self.start_x, self.start_y, self.end_x, self.end_y]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// Parse an annotation's `shapes` array, keeping the position of every entry.
///
/// A value that is not an array yields an empty list; callers that care
/// about that case check `is_array()` themselves.
pub fn parse_shapes(value: &serde_json::Value) -> Vec<Result<Shape, ShapeError>> {
    match value.as_array() {
        Some(items) => items.iter().map(Shape::from_json).collect(),
        None => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Overlap tests
// ---------------------------------------------------------------------------

/// Corners of a rectangle in drawing order: start, (end.x, start.y), end,
/// (start.x, end.y).
pub fn rectangle_corners(b: &DragBounds) -> [Point; 4] {
    [
        Point::new(b.start_x, b.start_y),
        Point::new(b.end_x, b.start_y),
        Point::new(b.end_x, b.end_y),
        Point::new(b.start_x, b.end_y),
    ]
}

/// Ray-casting point-in-polygon test.
///
/// A horizontal ray is cast from `point`; each edge it crosses flips the
/// result, so an odd number of crossings means the point is inside.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y)
            && point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Vertex containment overlap for two polygons.
///
/// True when any vertex of either polygon lies inside the other. This misses
/// intersections where no vertex is contained (a plus-sign crossing).
pub fn polygons_overlap(a: &[Point], b: &[Point]) -> bool {
    a.iter().any(|p| point_in_polygon(*p, b)) || b.iter().any(|p| point_in_polygon(*p, a))
}

/// Two circles overlap when their centres are closer than the sum of radii.
pub fn circles_overlap(a: &DragBounds, b: &DragBounds) -> bool {
    let radius_a = a.start().distance_to(&a.end());
    let radius_b = b.start().distance_to(&b.end());
    a.start().distance_to(&b.start()) < radius_a + radius_b
}

/// Whether two shapes overlap. Mixed rectangle/circle pairs never do.
pub fn shapes_overlap(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Rectangle(ra), Shape::Rectangle(rb)) => {
            polygons_overlap(&rectangle_corners(ra), &rectangle_corners(rb))
        }
        (Shape::Circle(ca), Shape::Circle(cb)) => circles_overlap(ca, cb),
        (Shape::Rectangle(_), Shape::Circle(_)) | (Shape::Circle(_), Shape::Rectangle(_)) => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
