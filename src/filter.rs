// src/filter.rs
//
// Per-detection eligibility gate. Noise never becomes an error here —
// undersized boxes, spawn-fresh tracks, static boxes and identity-switch
// jumps are all silently dropped before they reach the gate monitors.

use crate::config::FilterConfig;
use crate::tracks::PositionSample;
use crate::types::Detection;

/// Why a detection was rejected. Only used for debug logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    BoxTooSmall,
    AspectRatio,
    TrackTooYoung,
    TooSlow,
    TooFast,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BoxTooSmall => "box_too_small",
            Self::AspectRatio => "aspect_ratio",
            Self::TrackTooYoung => "track_too_young",
            Self::TooSlow => "too_slow",
            Self::TooFast => "too_fast",
        }
    }
}

pub struct TrackFilter {
    config: FilterConfig,
}

impl TrackFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    pub fn ref_y(&self, detection: &Detection) -> f32 {
        self.config.ref_point.ref_y(&detection.bbox)
    }

    /// Accept or reject a sighting for counting purposes. Rejected
    /// sightings still update track history upstream; they just never
    /// reach the gate monitors.
    pub fn evaluate(
        &self,
        detection: &Detection,
        sample: &PositionSample,
    ) -> Result<(), RejectReason> {
        let bbox = &detection.bbox;
        if bbox.width() < self.config.min_box_w || bbox.height() < self.config.min_box_h {
            return Err(RejectReason::BoxTooSmall);
        }
        if bbox.aspect_ratio() > self.config.max_aspect_ratio {
            return Err(RejectReason::AspectRatio);
        }
        if sample.age_frames < self.config.min_track_age {
            return Err(RejectReason::TrackTooYoung);
        }
        let speed = sample.speed.abs();
        if speed < self.config.min_speed {
            return Err(RejectReason::TooSlow);
        }
        if speed > self.config.max_speed {
            return Err(RejectReason::TooFast);
        }
        Ok(())
    }
}
