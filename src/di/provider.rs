use std::fmt;
use std::sync::Arc;

use super::{Bound, Dependencies, Injectable, Instance, Token};
use crate::error::DiResult;
use crate::lifecycle::LifecycleHooks;

/// Lifetime of a constructed provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// One instance per token, shared by every module.
    #[default]
    Singleton,
    /// A new instance on every resolution.
    Transient,
}

/// One constructor parameter of a class provider.
///
/// An explicit `inject` token takes priority over the inferred parameter type.
#[derive(Debug, Clone, Default)]
pub struct Dependency {
    pub param_type: Option<Token>,
    pub inject: Option<Token>,
}

impl Dependency {
    /// A parameter whose token is inferred from its type.
    pub fn on<T: ?Sized + 'static>() -> Self {
        Self {
            param_type: Some(Token::of::<T>()),
            inject: None,
        }
    }

    /// A parameter with no type information, only an explicit token.
    pub fn token(token: impl Into<Token>) -> Self {
        Self {
            param_type: None,
            inject: Some(token.into()),
        }
    }

    /// Overrides the inferred token.
    pub fn inject(mut self, token: impl Into<Token>) -> Self {
        self.inject = Some(token.into());
        self
    }

    pub fn resolved_token(&self) -> Option<&Token> {
        self.inject.as_ref().or(self.param_type.as_ref())
    }
}

type ConstructFn = Arc<dyn Fn(&mut Dependencies) -> DiResult<Instance> + Send + Sync>;

/// Everything the container needs to construct a class.
#[derive(Clone)]
pub struct ClassMetadata {
    pub name: &'static str,
    pub scope: Scope,
    pub dependencies: Vec<Dependency>,
    pub hooks: LifecycleHooks,
    construct: ConstructFn,
}

impl ClassMetadata {
    pub fn of<T: Injectable>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            scope: T::scope(),
            dependencies: T::dependencies(),
            hooks: T::hooks(),
            construct: Arc::new(|deps: &mut Dependencies| Ok(Arc::new(T::inject(deps)?) as Instance)),
        }
    }

    /// Metadata for `Impl`, stored under its trait object type.
    fn cast<Trait, Impl>(caster: fn(Arc<Impl>) -> Arc<Trait>) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
    {
        Self {
            construct: Arc::new(move |deps: &mut Dependencies| {
                let concrete = Arc::new(Impl::inject(deps)?);
                let object = caster(Arc::clone(&concrete));
                Ok(Bound::new(object, Some(concrete as Instance)))
            }),
            ..Self::of::<Impl>()
        }
    }

    pub(crate) fn construct(&self, deps: &mut Dependencies) -> DiResult<Instance> {
        (self.construct)(deps)
    }
}

impl fmt::Debug for ClassMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassMetadata")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

type FactoryFn = Arc<dyn Fn(&mut Dependencies) -> DiResult<Instance> + Send + Sync>;

#[derive(Clone)]
pub struct FactoryProvider {
    pub token: Token,
    pub inject: Vec<Token>,
    pub scope: Scope,
    factory: FactoryFn,
}

impl FactoryProvider {
    pub(crate) fn call(&self, deps: &mut Dependencies) -> DiResult<Instance> {
        (self.factory)(deps)
    }
}

/// How a token is satisfied.
#[derive(Clone)]
pub enum Provider {
    /// `{ provide, useClass }`, or a bare class reference.
    Class { token: Token, class: ClassMetadata },
    /// `{ provide, useValue }`. Returned as-is, never constructed.
    Value { token: Token, value: Instance },
    /// `{ provide, useFactory, inject }`.
    Factory(FactoryProvider),
}

impl Provider {
    /// A class provided under its own type.
    pub fn class<T: Injectable>() -> Self {
        Self::use_class::<T>(Token::of::<T>())
    }

    pub fn use_class<T: Injectable>(token: impl Into<Token>) -> Self {
        Self::Class {
            token: token.into(),
            class: ClassMetadata::of::<T>(),
        }
    }

    pub fn value<T: Send + Sync + 'static>(token: impl Into<Token>, value: T) -> Self {
        Self::Value {
            token: token.into(),
            value: Arc::new(value),
        }
    }

    /// A pre-built trait object, resolvable as `Arc<dyn Trait>`.
    pub fn value_dyn<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::Value {
            token: Token::of::<T>(),
            value: Bound::new(value, None),
        }
    }

    /// A factory invoked with the instances of `inject`, in order.
    ///
    /// ```rust,ignore
    /// Provider::factory("DB_CONNECTION", [Token::of::<ConfigService>()], |deps| {
    ///     let config = deps.take::<ConfigService>()?;
    ///     Ok(Connection::open(config.get("DATABASE_URL")))
    /// })
    /// ```
    pub fn factory<T, F>(token: impl Into<Token>, inject: impl IntoIterator<Item = Token>, f: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&mut Dependencies) -> DiResult<T> + Send + Sync + 'static,
    {
        Self::Factory(FactoryProvider {
            token: token.into(),
            inject: inject.into_iter().collect(),
            scope: Scope::Singleton,
            factory: Arc::new(move |deps: &mut Dependencies| Ok(Arc::new(f(deps)?) as Instance)),
        })
    }

    /// Binds a trait object token to an implementation.
    ///
    /// ```rust,ignore
    /// Provider::bind::<dyn UserRepository, PgUserRepository>(|r| r as Arc<dyn UserRepository>)
    /// ```
    pub fn bind<Trait, Impl>(caster: fn(Arc<Impl>) -> Arc<Trait>) -> Self
    where
        Trait: ?Sized + Send + Sync + 'static,
        Impl: Injectable,
    {
        Self::Class {
            token: Token::of::<Trait>(),
            class: ClassMetadata::cast::<Trait, Impl>(caster),
        }
    }

    /// Overrides the scope of a factory provider. Class providers take
    /// their scope from the class itself.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        if let Self::Factory(factory) = &mut self {
            factory.scope = scope;
        }
        self
    }

    pub fn token(&self) -> &Token {
        match self {
            Self::Class { token, .. } | Self::Value { token, .. } => token,
            Self::Factory(factory) => &factory.token,
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::Class { class, .. } => class.scope,
            Self::Value { .. } => Scope::Singleton,
            Self::Factory(factory) => factory.scope,
        }
    }

    pub fn hooks(&self) -> Option<&LifecycleHooks> {
        match self {
            Self::Class { class, .. } => Some(&class.hooks),
            _ => None,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { token, class } => f
                .debug_struct("Class")
                .field("token", token)
                .field("class", &class.name)
                .finish(),
            Self::Value { token, .. } => f.debug_struct("Value").field("token", token).finish(),
            Self::Factory(factory) => f
                .debug_struct("Factory")
                .field("token", &factory.token)
                .field("inject", &factory.inject)
                .field("scope", &factory.scope)
                .finish(),
        }
    }
}
