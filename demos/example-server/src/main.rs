use keel::prelude::*;

mod app_module;
mod infrastructure;
mod modules;

use app_module::AppModule;

#[tokio::main]
async fn main() -> keel::Result<()> {
    tracing_subscriber::fmt::init();

    tracing::info!("🚀 Starting Example Server...");

    let config = AppConfig::from_env()?;
    let app = Application::builder::<AppModule>()
        .config(config)
        .use_global_interceptors([Component::<dyn Interceptor>::of::<LoggingInterceptor>()])
        .use_static_assets("public", "/static")
        .build()
        .await?;

    tracing::info!("✅ Server running on http://{}", app.config().address());

    // Serves until SIGINT/SIGTERM, then runs the shutdown hooks
    app.listen().await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}
