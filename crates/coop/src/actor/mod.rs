mod adapter;
mod sim;

pub use adapter::{
    ActorAdapter, ActorHandle, ActorSnapshot, Attribute, EquipSlot, HitTarget, ItemHandle, ProxySpec,
};
pub use sim::{AdapterCall, GroundItem, SimActor, SimWorld};
