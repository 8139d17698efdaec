use keel::prelude::*;

/// Lets a request through when its `x-role` header is one of the roles
/// declared with `#[set_metadata("roles", [...])]`.
#[derive(Injectable)]
pub struct RolesGuard {
    reflector: Arc<Reflector>,
}

#[async_trait]
impl Guard for RolesGuard {
    async fn can_activate(&self, ctx: &ExecutionContext) -> Result<bool, Exception> {
        let Some(roles) = self.reflector.get::<Vec<String>>("roles", ctx) else {
            return Ok(true);
        };
        let role = ctx.request().header("x-role").unwrap_or_default();
        Ok(roles.iter().any(|allowed| allowed == role))
    }
}
