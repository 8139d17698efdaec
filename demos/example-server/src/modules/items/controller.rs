use super::model::{CreateItemRequest, Item};
use super::{ItemService, RolesGuard};
use keel::prelude::*;

#[controller(path = "/items", guards = [RolesGuard])]
pub struct ItemController {
    service: Arc<ItemService>,
}

#[routes]
impl ItemController {
    #[get]
    pub async fn list(&self) -> Json<Vec<Item>> {
        Json(self.service.list())
    }

    #[get("/:id")]
    #[use_pipes(ParseIntPipe)]
    pub async fn get_one(&self, #[param("id")] id: u64) -> Result<Json<Item>, HttpException> {
        self.service.get(id).map(Json)
    }

    #[post]
    #[use_pipes(ValidationPipe)]
    #[set_metadata("roles", ["admin"])]
    pub async fn create(
        &self,
        #[body]
        #[valid]
        request: CreateItemRequest,
    ) -> Result<(StatusCode, Json<Item>), Exception> {
        let item = self.service.create(request)?;
        Ok((StatusCode::CREATED, Json(item)))
    }

    #[post("/upload")]
    #[use_interceptors(FileInterceptor::new("file"))]
    pub async fn upload(&self, #[file] file: UploadedFile) -> Value {
        json!({
            "field": file.field_name,
            "name": file.file_name,
            "size": file.len(),
        })
    }
}
