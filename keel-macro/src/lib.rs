use proc_macro::TokenStream;

mod args;
mod controller;
mod gateway;
mod injectable;
mod module;

/// Derive macro for making a struct injectable into the DI container
///
/// Fields are `Arc<T>` or `Arc<dyn Trait>` and are resolved in declaration
/// order. `#[inject(token = ...)]` overrides the inferred token and
/// `#[inject(default)]` skips injection.
///
/// # Example
/// ```ignore
/// use keel::Injectable;
///
/// #[derive(Injectable)]
/// #[injectable(on_init)]
/// pub struct UserService {
///     repository: Arc<dyn UserRepository>,
///     #[inject(token = "DB_CONNECTION")]
///     connection: Arc<Connection>,
/// }
/// ```
#[proc_macro_derive(Injectable, attributes(injectable, inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    injectable::derive_injectable(input)
}

/// Attribute macro for defining a controller
///
/// Derives `Injectable` and records the base path plus controller-level
/// middleware, guards, interceptors and filters.
///
/// # Example
/// ```ignore
/// #[controller(path = "/users", guards = [AuthGuard], interceptors = [LoggingInterceptor])]
/// pub struct UserController {
///     user_service: Arc<UserService>,
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::controller_attribute(attr, item)
}

/// Attribute macro for defining routes in a controller's impl block
///
/// # Example
/// ```ignore
/// #[routes]
/// impl UserController {
///     #[get("/:id")]
///     #[use_guards(RolesGuard)]
///     #[set_metadata("roles", ["admin"])]
///     async fn get_user(&self, #[param("id")] id: u64) -> Result<Json<User>, HttpException> {
///         // ...
///     }
///
///     #[post("/")]
///     #[use_pipes(ValidationPipe)]
///     async fn create(&self, #[body] #[valid] dto: CreateUserDto) -> Value {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::routes_attribute(attr, item)
}

/// Attribute macro for defining a module
///
/// # Example
/// ```ignore
/// #[module(
///     imports = [DatabaseModule::for_root("memory://")],
///     controllers = [UserController],
///     providers = [UserService, Provider::value("PREFIX", "/api".to_string())],
///     exports = [UserService],
/// )]
/// pub struct UserModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}

/// Attribute macro for defining a WebSocket gateway
///
/// # Example
/// ```ignore
/// #[gateway(on_connection, filters = [WsLoggingFilter])]
/// pub struct EventsGateway {
///     events: Arc<EventService>,
/// }
/// ```
#[proc_macro_attribute]
pub fn gateway(attr: TokenStream, item: TokenStream) -> TokenStream {
    gateway::gateway_attribute(attr, item)
}

/// Attribute macro for defining message handlers in a gateway's impl block
///
/// # Example
/// ```ignore
/// #[messages]
/// impl EventsGateway {
///     #[subscribe_message("get-data")]
///     async fn get_data(&self, #[message_body] data: Value) -> WsResponse {
///         WsResponse::new("data-reply", data)
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn messages(attr: TokenStream, item: TokenStream) -> TokenStream {
    gateway::messages_attribute(attr, item)
}
