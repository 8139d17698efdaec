use super::model::Item;
use crate::infrastructure::database::Database;
use keel::prelude::*;

pub trait ItemRepository: Send + Sync {
    fn save(&self, item: &Item) -> Result<(), Exception>;
    fn find_by_id(&self, id: u64) -> Option<Item>;
    fn find_all(&self) -> Vec<Item>;
    fn next_id(&self) -> u64;
}

#[derive(Injectable)]
pub struct DatabaseItemRepository {
    database: Arc<Database>,
}

impl ItemRepository for DatabaseItemRepository {
    fn save(&self, item: &Item) -> Result<(), Exception> {
        self.database.insert(item.id, serde_json::to_value(item)?);
        Ok(())
    }

    fn find_by_id(&self, id: u64) -> Option<Item> {
        self.database
            .get(id)
            .and_then(|row| serde_json::from_value(row).ok())
    }

    fn find_all(&self) -> Vec<Item> {
        self.database
            .all()
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect()
    }

    fn next_id(&self) -> u64 {
        self.database.next_id()
    }
}
