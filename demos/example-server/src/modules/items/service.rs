use super::model::{CreateItemRequest, Item};
use super::repository::ItemRepository;
use keel::prelude::*;

#[derive(Injectable)]
pub struct ItemService {
    repository: Arc<dyn ItemRepository>,
}

impl ItemService {
    pub fn create(&self, request: CreateItemRequest) -> Result<Item, Exception> {
        let item = Item {
            id: self.repository.next_id(),
            name: request.name,
            quantity: request.quantity,
        };
        self.repository.save(&item)?;
        Ok(item)
    }

    pub fn get(&self, id: u64) -> Result<Item, HttpException> {
        self.repository
            .find_by_id(id)
            .ok_or_else(|| HttpException::not_found(format!("Item {} not found", id)))
    }

    pub fn list(&self) -> Vec<Item> {
        self.repository.find_all()
    }
}
