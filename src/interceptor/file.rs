use async_trait::async_trait;
use axum::extract::{FromRequest, Multipart};

use crate::context::ExecutionContext;
use crate::controller::HandlerResult;
use crate::exception::{Exception, HttpException};
use crate::interceptor::{CallHandler, Interceptor};
use crate::request::{HttpRequest, UploadedFile};

/// Parses a `multipart/form-data` body and attaches one field as an
/// [`UploadedFile`], readable through a `#[file]` parameter.
///
/// Requests that are not multipart pass through untouched.
///
/// ```rust,ignore
/// #[post("/upload")]
/// #[use_interceptors(FileInterceptor::new("file"))]
/// async fn upload(&self, #[file] file: Option<UploadedFile>) -> Value { ... }
/// ```
#[derive(Debug, Clone)]
pub struct FileInterceptor {
    field: String,
}

impl FileInterceptor {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    async fn extract(&self, request: &HttpRequest) -> Result<Option<UploadedFile>, Exception> {
        let mut multipart = Multipart::from_request(request.to_request(), &())
            .await
            .map_err(parse_failed)?;

        while let Some(field) = multipart.next_field().await.map_err(parse_failed)? {
            if field.name() != Some(self.field.as_str()) {
                continue;
            }
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(parse_failed)?;
            return Ok(Some(UploadedFile {
                field_name: self.field.clone(),
                file_name,
                content_type,
                data,
            }));
        }
        Ok(None)
    }
}

fn parse_failed<E>(_: E) -> HttpException {
    HttpException::bad_request("Failed to parse multipart/form-data")
}

#[async_trait]
impl Interceptor for FileInterceptor {
    async fn intercept(&self, ctx: &ExecutionContext, next: CallHandler) -> HandlerResult {
        let request = ctx.request();
        if !request.is_multipart() {
            return next.handle().await;
        }

        match self.extract(request).await? {
            Some(file) => {
                tracing::debug!("Received upload {:?} ({} bytes)", file.file_name, file.len());
                request.insert(file);
            }
            None => tracing::debug!("Multipart request has no field {}", self.field),
        }
        next.handle().await
    }
}
