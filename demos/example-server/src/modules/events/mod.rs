use crate::modules::items::ItemsModule;
use keel::prelude::*;

pub mod gateway;

pub use gateway::EventsGateway;

#[module(imports = [ItemsModule], gateways = [EventsGateway])]
pub struct EventsModule;
