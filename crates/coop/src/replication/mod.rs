mod mirror;
mod shadow;
mod tracker;

pub use mirror::{Equipment, MirrorEnv, MirrorKind, MirrorState, RemoteActorMirror};
pub use shadow::{Appearance, LocalActorShadow, PulseContext, ShadowKind};
pub use tracker::{Debounced, DirtySet};
