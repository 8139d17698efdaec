use crate::infrastructure::database::DatabaseModule;
use crate::modules::events::EventsModule;
use crate::modules::items::ItemsModule;
use keel::prelude::*;

/// Root application module
///
/// Wires configuration and the database, then the feature modules.
#[module(
    imports = [
        ConfigModule::for_root(ConfigOptions::new().load_env(true)),
        DatabaseModule::for_root("memory://items"),
        ItemsModule,
        EventsModule,
    ],
)]
pub struct AppModule;
