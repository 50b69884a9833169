//! Transition events and transformation orders.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::records::{Vec4, ZERO_VEC4};
use crate::stream::{FrameIndex, StreamId};

/// Trust level of a candidate pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Pose geometry only
    PoseOnly,
    /// Pose geometry confirmed by facial identity
    IdentityVerified,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::PoseOnly => "pose_only",
            Tier::IdentityVerified => "identity_verified",
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, Tier::IdentityVerified)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Geometric vectors justifying a cut: `vector1` on the outgoing stream,
/// `vector2` on the incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlignmentPair {
    pub vector1: Vec4,
    pub vector2: Vec4,
}

impl AlignmentPair {
    pub fn new(vector1: Vec4, vector2: Vec4) -> Self {
        Self { vector1, vector2 }
    }

    pub fn swapped(self) -> Self {
        Self {
            vector1: self.vector2,
            vector2: self.vector1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.vector1 == ZERO_VEC4 && self.vector2 == ZERO_VEC4
    }
}

impl Default for AlignmentPair {
    fn default() -> Self {
        Self {
            vector1: ZERO_VEC4,
            vector2: ZERO_VEC4,
        }
    }
}

/// A single selected cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TransitionEvent {
    pub frame: FrameIndex,
    pub from_stream: StreamId,
    pub to_stream: StreamId,
    #[serde(default)]
    pub alignment: AlignmentPair,
    /// Trust tier of the correspondence that justified the cut
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl TransitionEvent {
    pub fn new(frame: FrameIndex, from: impl Into<StreamId>, to: impl Into<StreamId>) -> Self {
        Self {
            frame,
            from_stream: from.into(),
            to_stream: to.into(),
            alignment: AlignmentPair::default(),
            tier: None,
        }
    }

    pub fn with_alignment(mut self, alignment: AlignmentPair) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }
}

/// Ordered sequence of cuts defining the final edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TransformationOrder(pub Vec<TransitionEvent>);

impl TransformationOrder {
    pub fn new(events: Vec<TransitionEvent>) -> Self {
        Self(events)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn events(&self) -> &[TransitionEvent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn frames(&self) -> Vec<FrameIndex> {
        self.0.iter().map(|e| e.frame).collect()
    }

    /// Number of cuts backed by identity-verified correspondences.
    pub fn verified_count(&self) -> usize {
        self.0
            .iter()
            .filter(|e| e.tier.is_some_and(|t| t.is_verified()))
            .count()
    }

    /// Distinct streams that play a segment, including the opening stream.
    pub fn covered_streams(&self) -> BTreeSet<StreamId> {
        let mut covered = BTreeSet::new();
        if let Some(first) = self.0.first() {
            covered.insert(first.from_stream.clone());
        }
        for event in &self.0 {
            covered.insert(event.to_stream.clone());
        }
        covered
    }

    pub fn push(&mut self, event: TransitionEvent) {
        self.0.push(event);
    }
}

impl IntoIterator for TransformationOrder {
    type Item = TransitionEvent;
    type IntoIter = std::vec::IntoIter<TransitionEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One entry of a user-edited sequence: play `video` from `start` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManualSegment {
    pub video: String,
    pub start: f64,
}

impl ManualSegment {
    pub fn new(video: impl Into<String>, start: f64) -> Self {
        Self {
            video: video.into(),
            start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_coverage() {
        let order = TransformationOrder::new(vec![
            TransitionEvent::new(10, "a", "b"),
            TransitionEvent::new(20, "b", "c").with_tier(Tier::IdentityVerified),
        ]);
        let covered = order.covered_streams();
        assert_eq!(covered.len(), 3);
        assert_eq!(order.verified_count(), 1);
        assert_eq!(order.frames(), vec![10, 20]);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::IdentityVerified > Tier::PoseOnly);
    }

    #[test]
    fn test_event_defaults_to_zero_alignment() {
        let json = r#"{"frame":5,"from_stream":"a","to_stream":"b"}"#;
        let event: TransitionEvent = serde_json::from_str(json).unwrap();
        assert!(event.alignment.is_zero());
        assert!(event.tier.is_none());
    }
}
