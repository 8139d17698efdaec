use std::sync::Arc;

use super::{Bound, Dependencies, Instance, Provider, Scope, SingletonCache, Token};
use crate::error::{DiError, DiResult};
use crate::module::{ModuleGraph, ModuleId};

/// The requesting module plus the graph it lives in.
///
/// Visibility is computed from these two on every resolution, never cached.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'a> {
    pub graph: &'a ModuleGraph,
    pub module: ModuleId,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(graph: &'a ModuleGraph, module: ModuleId) -> Self {
        Self { graph, module }
    }

    fn with_module(self, module: ModuleId) -> Self {
        Self { module, ..self }
    }
}

/// Thread-safe dependency injection container.
///
/// Resolves tokens against a compiled [`ModuleGraph`], constructing class and
/// factory providers on demand and caching singletons in a shared
/// [`SingletonCache`].
#[derive(Clone, Default)]
pub struct Container {
    cache: Arc<SingletonCache>,
}

impl Container {
    pub fn new(cache: Arc<SingletonCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<SingletonCache> {
        &self.cache
    }

    /// Resolves `token` as seen from the requesting module.
    pub fn resolve(&self, token: &Token, ctx: &ResolutionContext<'_>) -> DiResult<Instance> {
        self.resolve_token(token, *ctx, &mut Vec::new())
    }

    /// Resolves `provider` without checking that the requesting module can
    /// see it. Used for infrastructure classes such as guards and filters.
    pub fn resolve_bypassing(
        &self,
        provider: &Provider,
        ctx: &ResolutionContext<'_>,
    ) -> DiResult<Instance> {
        self.instantiate(provider, *ctx, &mut Vec::new())
            .map_err(|source| wrap(ctx.module, provider.token(), source))
    }

    pub fn get<T: Send + Sync + 'static>(&self, ctx: &ResolutionContext<'_>) -> DiResult<Arc<T>> {
        self.resolve(&Token::of::<T>(), ctx)?
            .downcast::<T>()
            .map_err(|_| DiError::downcast_failed::<T>())
    }

    pub fn get_dyn<T: ?Sized + Send + Sync + 'static>(
        &self,
        ctx: &ResolutionContext<'_>,
    ) -> DiResult<Arc<T>> {
        Bound::object::<T>(&self.resolve(&Token::of::<T>(), ctx)?).ok_or_else(DiError::downcast_failed::<T>)
    }

    fn resolve_token(
        &self,
        token: &Token,
        ctx: ResolutionContext<'_>,
        path: &mut Vec<Token>,
    ) -> DiResult<Instance> {
        let (owner, provider) =
            ctx.graph
                .find_provider(&ctx.module, token)
                .ok_or_else(|| DiError::ProviderNotFound {
                    token: token.to_string(),
                    module: ctx.module.name().to_string(),
                })?;

        // Dependencies are resolved where the provider is declared.
        self.instantiate(provider, ctx.with_module(owner), path)
            .map_err(|source| wrap(ctx.module, token, source))
    }

    fn instantiate(
        &self,
        provider: &Provider,
        ctx: ResolutionContext<'_>,
        path: &mut Vec<Token>,
    ) -> DiResult<Instance> {
        if let Provider::Value { value, .. } = provider {
            return Ok(Arc::clone(value));
        }

        let token = provider.token();
        if let Some(position) = path.iter().position(|seen| seen == token) {
            let cycle = path[position..]
                .iter()
                .chain(std::iter::once(token))
                .map(Token::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(DiError::CircularDependency { cycle });
        }

        path.push(token.clone());
        let result = match provider.scope() {
            Scope::Singleton => self
                .cache
                .get_or_try_insert_with(token, || self.construct(provider, ctx, path)),
            Scope::Transient => self.construct(provider, ctx, path),
        };
        path.pop();
        result
    }

    fn construct(
        &self,
        provider: &Provider,
        ctx: ResolutionContext<'_>,
        path: &mut Vec<Token>,
    ) -> DiResult<Instance> {
        match provider {
            Provider::Value { value, .. } => Ok(Arc::clone(value)),
            Provider::Class { class, .. } => {
                let mut values = Vec::with_capacity(class.dependencies.len());
                for (index, dependency) in class.dependencies.iter().enumerate() {
                    let token = dependency.resolved_token().ok_or_else(|| {
                        DiError::UnresolvableParameter {
                            class: class.name.to_string(),
                            index,
                        }
                    })?;
                    values.push(self.resolve_token(token, ctx, path)?);
                }
                tracing::debug!("Constructing {} in {}", provider.token(), ctx.module);
                class.construct(&mut Dependencies::new(class.name, values))
            }
            Provider::Factory(factory) => {
                let values = factory
                    .inject
                    .iter()
                    .map(|token| self.resolve_token(token, ctx, path))
                    .collect::<DiResult<Vec<_>>>()?;
                tracing::debug!("Invoking factory {} in {}", factory.token, ctx.module);
                factory.call(&mut Dependencies::new("factory", values))
            }
        }
    }
}

fn wrap(module: ModuleId, token: &Token, source: DiError) -> DiError {
    DiError::Instantiation {
        module: module.name().to_string(),
        token: token.to_string(),
        source: Box::new(source),
    }
}

impl DiError {
    /// The innermost error below any instantiation context.
    pub fn root_cause(&self) -> &DiError {
        match self {
            Self::Instantiation { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
