pub mod activations;
pub mod layers;
pub mod loss;
mod model;
mod pose_net;
mod sequential;

pub use model::{Model, ParamView, ParamViewMut, check_residency};
pub use pose_net::{PoseNet, PoseNetConfig};
pub use sequential::Sequential;
