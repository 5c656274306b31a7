//! Rigid-body model read from a model file, plus the forward kinematics the
//! scene loader needs to place segments.

pub mod joint;
pub mod kinematics;
pub mod model;
pub mod segment;
pub mod visual;

pub use joint::{Joint, JointKind, SpatialAxis};
pub use kinematics::BodyPose;
pub use model::{ROOT_NAME, RigidBodyModel};
pub use segment::{Body, JointFrame, Segment};
pub use visual::{AxisConvention, VisualDesc, VisualRotation};
