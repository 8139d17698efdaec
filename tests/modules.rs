use keel::error::{DiError, Error};
use keel::module::{ImportPolicy, ModuleId};
use keel::prelude::*;

/// Stand-in for a pooled connection built from configuration.
struct Connection {
    url: String,
}

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

#[derive(Injectable)]
struct PoliteGreeter {
    config: Arc<ConfigService>,
}

impl Greeter for PoliteGreeter {
    fn greet(&self, name: &str) -> String {
        format!("{} {}", self.config.get_or("GREETING", "Hello"), name)
    }
}

#[derive(Injectable)]
struct UserRepository {
    #[inject(token = "DB_CONNECTION")]
    connection: Arc<Connection>,
}

#[derive(Injectable)]
struct UserService {
    repository: Arc<UserRepository>,
    greeter: Arc<dyn Greeter>,
}

#[derive(Injectable)]
struct InternalAudit;

#[derive(Injectable)]
#[injectable(scope = "transient")]
struct RequestId;

#[module(
    providers = [
        Provider::factory("DB_CONNECTION", [Token::of::<ConfigService>()], |deps| {
            let config = deps.take::<ConfigService>()?;
            Ok(Connection { url: config.get_or("DATABASE_URL", "memory://") })
        }),
    ],
    exports = ["DB_CONNECTION"],
)]
struct DatabaseModule;

#[module(
    imports = [DatabaseModule],
    providers = [
        UserRepository,
        UserService,
        InternalAudit,
        Provider::bind::<dyn Greeter, PoliteGreeter>(|greeter| greeter as Arc<dyn Greeter>),
    ],
    exports = [UserService, dyn Greeter],
)]
struct UsersModule;

#[module(
    imports = [
        ConfigModule::for_root(
            ConfigOptions::new()
                .value("DATABASE_URL", "postgres://users")
                .value("GREETING", "Welcome"),
        ),
        UsersModule,
    ],
    providers = [RequestId],
)]
struct AppModule;

async fn app() -> Application {
    Application::builder::<AppModule>().build().await.unwrap()
}

#[tokio::test]
async fn configured_module_feeds_factories_across_modules() {
    let app = app().await;

    let service = app.get::<UserService>().unwrap();
    assert_eq!(service.repository.connection.url, "postgres://users");
    assert_eq!(service.greeter.greet("Ada"), "Welcome Ada");
}

#[tokio::test]
async fn singletons_are_shared_between_modules() {
    let app = app().await;

    let from_app = app.get_in::<AppModule, UserService>().unwrap();
    let from_users = app.get_in::<UsersModule, UserService>().unwrap();
    assert!(Arc::ptr_eq(&from_app, &from_users));

    let greeter = app.get_dyn::<dyn Greeter>().unwrap();
    assert!(Arc::ptr_eq(&greeter, &from_app.greeter));
}

#[tokio::test]
async fn transient_providers_are_built_per_resolution() {
    let app = app().await;

    let first = app.get::<RequestId>().unwrap();
    let second = app.get::<RequestId>().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn unexported_providers_stay_private() {
    let app = app().await;

    assert!(app.get_in::<UsersModule, InternalAudit>().is_ok());
    let err = app.get_in::<AppModule, InternalAudit>().err().unwrap();
    assert!(matches!(err, Error::Di(DiError::ProviderNotFound { .. })));
}

#[tokio::test]
async fn global_config_is_visible_everywhere() {
    let app = app().await;

    let config = app.get_in::<UsersModule, ConfigService>().unwrap();
    assert_eq!(config.get("GREETING").as_deref(), Some("Welcome"));
    assert!(app.graph().is_global(&Token::of::<ConfigService>()));
}

#[derive(Injectable)]
struct Chicken {
    _egg: Arc<Egg>,
}

#[derive(Injectable)]
struct Egg {
    _chicken: Arc<Chicken>,
}

#[module(providers = [Chicken, Egg])]
struct CyclicModule;

#[tokio::test]
async fn dependency_cycles_fail_the_build() {
    let err = Application::builder::<CyclicModule>().build().await.err().unwrap();
    let Error::Di(err) = err else {
        panic!("expected a DI error, got {err}");
    };
    let DiError::CircularDependency { cycle } = err.root_cause() else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(cycle, "Chicken -> Egg -> Chicken");
}

struct NeverCompiled;

#[tokio::test]
async fn strict_imports_reject_unknown_modules() {
    let root = DynamicModule::new::<CyclicModule>().import(ModuleDef::reference(ModuleId::of::<NeverCompiled>()));

    let config = AppConfig {
        import_policy: ImportPolicy::Strict,
        ..AppConfig::default()
    };
    let err = ApplicationBuilder::new(root.clone()).config(config).build().await.err();
    assert!(matches!(err, Some(Error::Compile(_))));

    let app = ApplicationBuilder::new(root).build().await.unwrap();
    assert_eq!(app.graph().warnings().len(), 1);
}

#[module]
struct PoolModule;

impl PoolModule {
    fn for_url(url: &'static str) -> DynamicModule {
        DynamicModule::new::<PoolModule>()
            .provider(Provider::value("POOL_URL", url.to_string()))
            .provider(Provider::factory("POOL", [Token::from("POOL_URL")], |deps| {
                let url = deps.take::<String>()?;
                Ok(Connection { url: url.to_string() })
            }))
            .export("POOL")
    }
}

#[derive(Injectable)]
struct OrdersService {
    #[inject(token = "POOL")]
    pool: Arc<Connection>,
}

#[derive(Injectable)]
struct BillingService {
    #[inject(token = "POOL")]
    pool: Arc<Connection>,
}

#[module(imports = [PoolModule::for_url("memory://orders")], providers = [OrdersService])]
struct OrdersModule;

#[module(imports = [PoolModule::for_url("memory://billing")], providers = [BillingService])]
struct BillingModule;

#[module(imports = [OrdersModule, BillingModule])]
struct ShopModule;

#[tokio::test]
async fn configured_module_is_compiled_once_and_shared() {
    let app = Application::builder::<ShopModule>().build().await.unwrap();

    let orders = app.get::<OrdersService>().unwrap();
    let billing = app.get::<BillingService>().unwrap();
    assert!(Arc::ptr_eq(&orders.pool, &billing.pool));
    assert_eq!(orders.pool.url, "memory://orders");
}
