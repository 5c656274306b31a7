//! Joint-space animation played back by the timeline.

pub mod clip;

pub use clip::AnimationClip;
