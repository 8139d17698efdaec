//! Per-route execution plans, built once at startup.
//!
//! Each plan holds the resolved middleware, guards, pipes, interceptors and
//! filters for one route, concatenated global, then controller, then handler.
//! Pipes are handler-only. Plans are never mutated after the build.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use serde_json::Value;

use crate::controller::{ControllerMetadata, HandlerFn, ParamMetadata, RouteMetadata};
use crate::di::{Component, Container, ResolutionContext, Token, Visibility};
use crate::error::{DiResult, Result};
use crate::exception::{BoundFilter, ExceptionFilter};
use crate::guard::Guard;
use crate::interceptor::Interceptor;
use crate::middleware::Middleware;
use crate::module::{ModuleGraph, ModuleId};
use crate::pipe::Pipe;
use crate::router::{MatchitRouter, RouteId, join_paths};
use crate::websocket::WsExceptionFilter;

/// Components registered on the application rather than on a controller.
#[derive(Debug, Clone, Default)]
pub struct GlobalEnhancers {
    pub middleware: Vec<Component<dyn Middleware>>,
    pub guards: Vec<Component<dyn Guard>>,
    pub interceptors: Vec<Component<dyn Interceptor>>,
    pub filters: Vec<Component<dyn ExceptionFilter>>,
    pub ws_filters: Vec<Component<dyn WsExceptionFilter>>,
}

/// Everything the dispatcher needs to run one route.
pub struct ExecutionPlan {
    pub route: RouteId,
    pub method: Method,
    pub path: String,
    pub controller: Token,
    pub handler_name: &'static str,
    /// The module that declares the controller.
    pub module: ModuleId,
    pub middleware: Vec<Arc<dyn Middleware>>,
    pub guards: Vec<Arc<dyn Guard>>,
    pub pipes: Vec<Arc<dyn Pipe>>,
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    pub filters: Vec<BoundFilter>,
    pub params: Vec<ParamMetadata>,
    pub metadata: Arc<HashMap<String, Value>>,
    pub handler: HandlerFn,
}

impl fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("route", &self.route)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("controller", &self.controller)
            .field("handler", &self.handler_name)
            .field("module", &self.module)
            .field("middleware", &self.middleware.len())
            .field("guards", &self.guards.len())
            .field("pipes", &self.pipes.len())
            .field("interceptors", &self.interceptors.len())
            .field("filters", &self.filters)
            .field("params", &self.params)
            .finish()
    }
}

/// The built plans plus the matcher that points at them.
#[derive(Debug, Default)]
pub struct RoutePlans {
    pub plans: HashMap<RouteId, Arc<ExecutionPlan>>,
    pub router: MatchitRouter,
}

impl RoutePlans {
    pub fn get(&self, route: RouteId) -> Option<&Arc<ExecutionPlan>> {
        self.plans.get(&route)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Plans in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ExecutionPlan>> {
        let mut plans: Vec<_> = self.plans.values().collect();
        plans.sort_by_key(|plan| plan.route.0);
        plans.into_iter()
    }
}

/// Builds an [`ExecutionPlan`] for every route of every compiled controller.
pub struct PlanBuilder<'a> {
    graph: &'a ModuleGraph,
    container: &'a Container,
    globals: &'a GlobalEnhancers,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(graph: &'a ModuleGraph, container: &'a Container, globals: &'a GlobalEnhancers) -> Self {
        Self {
            graph,
            container,
            globals,
        }
    }

    /// Controllers are planned in the context of the first module, in
    /// discovery order, that lists them. Resolution failures are fatal;
    /// duplicate routes are logged and skipped.
    pub fn build(&self) -> Result<RoutePlans> {
        let mut plans = RoutePlans::default();
        let mut next_route = 0;

        let mut planned = HashSet::new();

        for record in self.graph.modules() {
            let ctx = ResolutionContext::new(self.graph, record.id());
            for controller in record.controllers() {
                // A controller listed by several modules belongs to the first.
                if !planned.insert(controller.token().clone()) {
                    tracing::warn!(
                        "Controller {} is already declared by another module, ignoring it in {}",
                        controller.token(),
                        record.name()
                    );
                    continue;
                }

                let metadata = controller.metadata();
                for route in &metadata.routes {
                    let id = RouteId(next_route);
                    let path = join_paths([metadata.path.as_str(), route.path.as_str()]);
                    if let Err(e) = plans.router.insert(route.method.clone(), &path, id) {
                        tracing::warn!("Skipping route: {}", e);
                        continue;
                    }
                    next_route += 1;

                    let plan = self.plan(id, path, controller.token(), &metadata, route, &ctx)?;
                    tracing::info!("Mapped {{{}, {}}} route", plan.path, plan.method);
                    plans.plans.insert(id, Arc::new(plan));
                }
            }
        }

        tracing::info!("Built {} execution plans", plans.len());
        Ok(plans)
    }

    fn plan(
        &self,
        route_id: RouteId,
        path: String,
        controller: &Token,
        metadata: &ControllerMetadata,
        route: &RouteMetadata,
        ctx: &ResolutionContext<'_>,
    ) -> Result<ExecutionPlan> {
        let middleware = self.resolve_all(
            [&self.globals.middleware, &metadata.middleware, &route.middleware],
            ctx,
            Visibility::Checked,
        )?;
        let guards = self.resolve_all(
            [&self.globals.guards, &metadata.guards, &route.guards],
            ctx,
            Visibility::Bypass,
        )?;
        let pipes = self.resolve_all([&route.pipes], ctx, Visibility::Checked)?;
        let interceptors = self.resolve_all(
            [&self.globals.interceptors, &metadata.interceptors, &route.interceptors],
            ctx,
            Visibility::Bypass,
        )?;

        let mut filters = Vec::new();
        for component in [&self.globals.filters, &metadata.filters, &route.filters]
            .into_iter()
            .flatten()
        {
            let filter = component.resolve(self.container, ctx, Visibility::Bypass)?;
            filters.push(BoundFilter::new(component.name(), filter));
        }

        Ok(ExecutionPlan {
            route: route_id,
            method: route.method.clone(),
            path,
            controller: controller.clone(),
            handler_name: route.handler_name,
            module: ctx.module,
            middleware,
            guards,
            pipes,
            interceptors,
            filters,
            params: route.params.clone(),
            metadata: Arc::new(route.metadata.clone()),
            handler: route.handler.clone(),
        })
    }

    fn resolve_all<const N: usize, C: ?Sized + 'static>(
        &self,
        levels: [&Vec<Component<C>>; N],
        ctx: &ResolutionContext<'_>,
        visibility: Visibility,
    ) -> DiResult<Vec<Arc<C>>> {
        levels
            .into_iter()
            .flatten()
            .map(|component| component.resolve(self.container, ctx, visibility))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Injectable;
    use crate::exception::{ArgumentsHost, Exception};
    use crate::module::{ModuleCompiler, ModuleDef};
    use crate::router::RouteMatcher;
    use crate::{controller, module, routes};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};

    macro_rules! filters {
        ($($name:ident),*) => {$(
            #[derive(Injectable)]
            struct $name;

            #[async_trait]
            impl ExceptionFilter for $name {
                async fn catch(&self, _: &Exception, _: &ArgumentsHost) -> Response {
                    StatusCode::IM_A_TEAPOT.into_response()
                }
            }
        )*};
    }

    filters!(GlobalFilter, ControllerFilter, HandlerFilter);

    #[controller(path = "/items", filters = [ControllerFilter])]
    struct ItemController;

    #[routes]
    impl ItemController {
        #[get("/:id")]
        #[use_filters(HandlerFilter)]
        #[set_metadata("roles", ["admin"])]
        async fn find(&self, #[param("id")] id: String) -> String {
            id
        }

        #[get("/:id")]
        async fn shadowed(&self) -> &'static str {
            "never"
        }

        #[post]
        async fn create(&self) -> StatusCode {
            StatusCode::CREATED
        }
    }

    #[module(controllers = [ItemController])]
    struct ItemModule;

    fn build() -> RoutePlans {
        let graph = ModuleCompiler::default()
            .compile(ModuleDef::of::<ItemModule>())
            .unwrap();
        let globals = GlobalEnhancers {
            filters: vec![Component::<dyn ExceptionFilter>::instance(GlobalFilter)],
            ..Default::default()
        };
        PlanBuilder::new(&graph, &Container::default(), &globals)
            .build()
            .unwrap()
    }

    fn filter_names(plan: &ExecutionPlan) -> Vec<&'static str> {
        plan.filters.iter().map(BoundFilter::name).collect()
    }

    #[test]
    fn components_run_global_then_controller_then_handler() {
        let plans = build();
        let find = plans.iter().next().unwrap();

        assert_eq!(find.path, "/items/:id");
        assert_eq!(find.handler_name, "find");
        assert_eq!(find.module, ModuleId::of::<ItemModule>());
        assert_eq!(filter_names(find), ["GlobalFilter", "ControllerFilter", "HandlerFilter"]);
        assert_eq!(find.metadata["roles"], serde_json::json!(["admin"]));
    }

    #[test]
    fn duplicate_routes_are_skipped() {
        let plans = build();
        assert_eq!(plans.len(), 2);

        let handlers: Vec<_> = plans.iter().map(|plan| plan.handler_name).collect();
        assert_eq!(handlers, ["find", "create"]);

        let matched = plans.router.match_route(&Method::GET, "/items/7").unwrap();
        assert_eq!(plans.get(matched.route).unwrap().handler_name, "find");
        assert_eq!(matched.params["id"], "7");
    }

    #[test]
    fn handler_without_path_maps_to_controller_root() {
        let plans = build();
        let create = plans.iter().find(|plan| plan.handler_name == "create").unwrap();
        assert_eq!(create.method, Method::POST);
        assert_eq!(create.path, "/items");
        assert_eq!(filter_names(create), ["GlobalFilter", "ControllerFilter"]);
    }
}
