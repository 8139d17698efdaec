use keel::prelude::*;

pub mod controller;
pub mod guard;
pub mod model;
pub mod repository;
pub mod service;

pub use controller::ItemController;
pub use guard::RolesGuard;
pub use repository::{DatabaseItemRepository, ItemRepository};
pub use service::ItemService;

#[module(
    controllers = [ItemController],
    providers = [
        Provider::bind::<dyn ItemRepository, DatabaseItemRepository>(|repo| repo as Arc<dyn ItemRepository>),
        ItemService,
        ValidationPipe,
        ParseIntPipe,
    ],
    exports = [ItemService],
)]
pub struct ItemsModule;
