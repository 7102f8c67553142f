// src/types.rs
//
// Core data types shared across the counting pipeline. Detections arrive
// from an external tracker as one JSON frame batch per line; everything
// downstream (filter, gates, sequencer, counter) works on these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Track identifier assigned by the upstream tracker. Stable across
/// consecutive frames for one object, but NOT unique across restarts.
pub type TrackId = i64;

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn center_x(&self) -> f32 {
        (self.x1 + self.x2) * 0.5
    }

    /// max(w/h, h/w) — used to reject implausibly elongated boxes.
    pub fn aspect_ratio(&self) -> f32 {
        let w = self.width();
        let h = self.height();
        if w <= 0.0 || h <= 0.0 {
            return f32::INFINITY;
        }
        (w / h).max(h / w)
    }
}

/// One detected object in one frame.
#[derive(Debug, Clone, Deserialize)]
pub struct Detection {
    pub track_id: TrackId,
    pub bbox: BoundingBox,
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// All detections for a single frame. One of these per stdin line.
/// Frame timestamps are seconds and assumed non-decreasing.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameBatch {
    pub timestamp: f64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Which point of the bounding box is compared against the gate lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefPoint {
    Center,
    Top,
    /// One quarter down from the top edge. Tracks the vehicle front
    /// better than the box center under perspective.
    TopQuarter,
    Bottom,
}

impl RefPoint {
    pub fn ref_y(&self, bbox: &BoundingBox) -> f32 {
        match self {
            Self::Center => (bbox.y1 + bbox.y2) * 0.5,
            Self::Top => bbox.y1,
            Self::TopQuarter => bbox.y1 + 0.25 * (bbox.y2 - bbox.y1),
            Self::Bottom => bbox.y2,
        }
    }
}

/// The two physical gates, placed in order along the lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateId {
    Gate1,
    Gate2,
}

impl GateId {
    pub fn index(&self) -> usize {
        match self {
            Self::Gate1 => 0,
            Self::Gate2 => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gate1 => "G1",
            Self::Gate2 => "G2",
        }
    }
}

/// Direction of a completed traversal of one gate's band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossingDirection {
    /// Entered past line A, exited past line B.
    AToB,
    /// Entered past line B, exited past line A.
    BToA,
}

impl CrossingDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AToB => "A->B",
            Self::BToA => "B->A",
        }
    }
}

/// Emitted by a GateMonitor once per qualifying band traversal.
/// Consumed immediately by the Sequencer.
#[derive(Debug, Clone, Copy)]
pub struct GateCrossingEvent {
    pub track_id: TrackId,
    pub gate: GateId,
    pub direction: CrossingDirection,
    pub timestamp: f64,
}

/// An accepted occupancy change. Logged as JSON and reported downstream.
#[derive(Debug, Clone, Serialize)]
pub struct OccupancyChange {
    pub timestamp: DateTime<Utc>,
    pub delta: i32,
    pub track_id: TrackId,
    pub occupancy_before: u32,
    pub occupancy_after: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_point_modes() {
        let bbox = BoundingBox {
            x1: 0.0,
            y1: 100.0,
            x2: 50.0,
            y2: 200.0,
        };
        assert_eq!(RefPoint::Top.ref_y(&bbox), 100.0);
        assert_eq!(RefPoint::Bottom.ref_y(&bbox), 200.0);
        assert_eq!(RefPoint::Center.ref_y(&bbox), 150.0);
        assert_eq!(RefPoint::TopQuarter.ref_y(&bbox), 125.0);
    }

    #[test]
    fn aspect_ratio_is_symmetric() {
        let wide = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 100.0,
            y2: 10.0,
        };
        let tall = BoundingBox {
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 100.0,
        };
        assert_eq!(wide.aspect_ratio(), 10.0);
        assert_eq!(tall.aspect_ratio(), 10.0);
    }

    #[test]
    fn frame_batch_parses_from_json_line() {
        let line = r#"{"timestamp": 12.5, "detections": [{"track_id": 7, "bbox": {"x1": 10.0, "y1": 20.0, "x2": 60.0, "y2": 90.0}, "confidence": 0.82}]}"#;
        let batch: FrameBatch = serde_json::from_str(line).unwrap();
        assert_eq!(batch.timestamp, 12.5);
        assert_eq!(batch.detections.len(), 1);
        assert_eq!(batch.detections[0].track_id, 7);
    }
}
