//! Keyframe animation of morph target influences.

use std::f32::consts::PI;

use serde::Serialize;

use meshview_core::{MeshViewError, ResourceId, ResourceKind, Result, SharedLedger};

/// How values between keyframes are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Interpolation {
    Discrete,
    Linear,
    /// Cubic Hermite with Catmull-Rom tangents and flat ends.
    Smooth,
}

/// How an action continues past the end of its clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopMode {
    Once,
    Repeat,
    /// Plays forward, then backward, indefinitely.
    PingPong,
}

/// Scalar keyframes driving one animated property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumberKeyframeTrack {
    pub name: String,
    pub times: Vec<f32>,
    pub values: Vec<f32>,
    pub interpolation: Interpolation,
}

impl NumberKeyframeTrack {
    /// Creates a track; `times` must be non-decreasing and as long as `values`.
    pub fn new(
        name: impl Into<String>,
        times: Vec<f32>,
        values: Vec<f32>,
        interpolation: Interpolation,
    ) -> Result<Self> {
        if times.len() != values.len() {
            return Err(MeshViewError::size_mismatch("keyframe values", times.len(), values.len()));
        }
        if times.windows(2).any(|w| w[1] < w[0]) {
            return Err(MeshViewError::InvalidGeometry(
                "keyframe times must be non-decreasing".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            times,
            values,
            interpolation,
        })
    }

    /// Time of the last keyframe.
    pub fn duration(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Value of the property at time `t`, clamped to the keyframe range.
    pub fn evaluate(&self, t: f32) -> f32 {
        let n = self.times.len();
        match n {
            0 => return 0.0,
            1 => return self.values[0],
            _ => {}
        }
        if t <= self.times[0] {
            return self.values[0];
        }
        if t >= self.times[n - 1] {
            return self.values[n - 1];
        }
        // First keyframe strictly after t; t lies in [times[k-1], times[k]).
        let k = self.times.partition_point(|&time| time <= t);
        let (t0, t1) = (self.times[k - 1], self.times[k]);
        let (v0, v1) = (self.values[k - 1], self.values[k]);
        let dt = t1 - t0;
        if dt <= f32::EPSILON {
            return v1;
        }
        let s = (t - t0) / dt;
        match self.interpolation {
            Interpolation::Discrete => v0,
            Interpolation::Linear => v0 + (v1 - v0) * s,
            Interpolation::Smooth => {
                let m0 = self.tangent(k - 1) * dt;
                let m1 = self.tangent(k) * dt;
                let (s2, s3) = (s * s, s * s * s);
                (2.0 * s3 - 3.0 * s2 + 1.0) * v0
                    + (s3 - 2.0 * s2 + s) * m0
                    + (-2.0 * s3 + 3.0 * s2) * v1
                    + (s3 - s2) * m1
            }
        }
    }

    /// Catmull-Rom slope at keyframe `i`; zero at both ends.
    fn tangent(&self, i: usize) -> f32 {
        if i == 0 || i + 1 >= self.times.len() {
            return 0.0;
        }
        let dt = self.times[i + 1] - self.times[i - 1];
        if dt <= f32::EPSILON {
            0.0
        } else {
            (self.values[i + 1] - self.values[i - 1]) / dt
        }
    }
}

/// Builds the blend-weight track that morphs between a mesh and its flattening.
///
/// Blend weights are linearly spaced, but keyed at arcsine-warped times so the
/// motion dwells near both extremes and moves fastest through the midpoint.
pub fn flattening_track(duration: f32, samples: usize) -> Result<NumberKeyframeTrack> {
    let samples = samples.max(2);
    let amplitude: Vec<f32> = (0..samples)
        .map(|i| -1.0 + 2.0 * i as f32 / (samples - 1) as f32)
        .collect();
    let times = amplitude
        .iter()
        .map(|&a| (a.clamp(-1.0, 1.0).asin() / PI + 0.5) * duration)
        .collect();
    let weights = amplitude.iter().map(|&a| 0.5 * (a + 1.0)).collect();
    NumberKeyframeTrack::new(
        ".morphTargetInfluences[0]",
        times,
        weights,
        Interpolation::Smooth,
    )
}

/// A set of tracks played together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationClip {
    pub name: String,
    pub tracks: Vec<NumberKeyframeTrack>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, tracks: Vec<NumberKeyframeTrack>) -> Self {
        Self {
            name: name.into(),
            tracks,
        }
    }

    /// Longest track duration.
    pub fn duration(&self) -> f32 {
        self.tracks
            .iter()
            .map(NumberKeyframeTrack::duration)
            .fold(0.0, f32::max)
    }
}

/// Playback of a clip on one mesh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationAction {
    #[serde(skip)]
    id: ResourceId,
    pub clip: AnimationClip,
    #[serde(skip)]
    pub target: ResourceId,
    pub loop_mode: LoopMode,
}

impl AnimationAction {
    pub fn new(
        ledger: &SharedLedger,
        clip: AnimationClip,
        target: ResourceId,
        loop_mode: LoopMode,
    ) -> Self {
        Self {
            id: ledger.acquire(ResourceKind::Animation),
            clip,
            target,
            loop_mode,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Maps elapsed time to clip time according to the loop mode.
    pub fn local_time(&self, elapsed: f32) -> f32 {
        let d = self.clip.duration();
        if d <= 0.0 || elapsed <= 0.0 {
            return 0.0;
        }
        match self.loop_mode {
            LoopMode::Once => elapsed.min(d),
            LoopMode::Repeat => elapsed % d,
            LoopMode::PingPong => {
                let t = elapsed % (2.0 * d);
                if t <= d {
                    t
                } else {
                    2.0 * d - t
                }
            }
        }
    }

    /// Value of the first track after `elapsed` seconds of playback.
    pub fn weight_at(&self, elapsed: f32) -> f32 {
        let t = self.local_time(elapsed);
        self.clip.tracks.first().map_or(0.0, |track| track.evaluate(t))
    }

    pub fn dispose(&self, ledger: &SharedLedger) -> Result<()> {
        ledger.release(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::ResourceLedger;

    #[test]
    fn test_flattening_track_shape() {
        let track = flattening_track(5.0, 20).unwrap();
        assert_eq!(track.times.len(), 20);
        assert!(track.times[0].abs() < 1e-6);
        assert!((track.times[19] - 5.0).abs() < 1e-5);
        assert!(track.times.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(track.values[0], 0.0);
        assert_eq!(track.values[19], 1.0);
        // Keys spread out near the ends, so the weight lingers at 0 and 1.
        let first_gap = track.times[1] - track.times[0];
        let mid_gap = track.times[10] - track.times[9];
        assert!(first_gap > mid_gap);
    }

    #[test]
    fn test_linear_evaluate() {
        let track =
            NumberKeyframeTrack::new("x", vec![0.0, 2.0], vec![0.0, 1.0], Interpolation::Linear)
                .unwrap();
        assert_eq!(track.evaluate(-1.0), 0.0);
        assert_eq!(track.evaluate(1.0), 0.5);
        assert_eq!(track.evaluate(3.0), 1.0);
    }

    #[test]
    fn test_smooth_hits_keyframes() {
        let track = flattening_track(4.0, 20).unwrap();
        for (t, v) in track.times.iter().zip(&track.values) {
            assert!((track.evaluate(*t) - v).abs() < 1e-5);
        }
        assert!((track.evaluate(2.0) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_mismatched_keys() {
        assert!(NumberKeyframeTrack::new("x", vec![0.0], vec![], Interpolation::Linear).is_err());
        assert!(
            NumberKeyframeTrack::new("x", vec![1.0, 0.0], vec![0.0, 1.0], Interpolation::Linear)
                .is_err()
        );
    }

    #[test]
    fn test_ping_pong() {
        let ledger = ResourceLedger::shared();
        let track =
            NumberKeyframeTrack::new("x", vec![0.0, 1.0], vec![0.0, 1.0], Interpolation::Linear)
                .unwrap();
        let action = AnimationAction::new(
            &ledger,
            AnimationClip::new("clip", vec![track]),
            ledger.acquire(ResourceKind::Mesh),
            LoopMode::PingPong,
        );
        assert_eq!(action.weight_at(0.25), 0.25);
        assert_eq!(action.weight_at(1.25), 0.75);
        assert_eq!(action.weight_at(2.25), 0.25);
    }
}
