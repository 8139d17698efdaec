pub mod events;
pub mod items;
