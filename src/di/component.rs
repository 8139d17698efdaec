use std::fmt;
use std::sync::Arc;

use super::{Container, Injectable, Instance, Provider, ResolutionContext, token::short_type_name};
use crate::error::{DiError, DiResult};

/// How a component class is looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The class must be a provider visible from the requesting module.
    Checked,
    /// The class is constructed even if no module declares it.
    Bypass,
}

type Upcast<C> = Arc<dyn Fn(Instance) -> Option<Arc<C>> + Send + Sync>;

enum Source<C: ?Sized> {
    Class { provider: Provider, upcast: Upcast<C> },
    Instance(Arc<C>),
}

/// A cross-cutting class (guard, pipe, interceptor, filter, middleware)
/// declared at global, controller or handler level.
///
/// Either a class resolved through the container, or a pre-built instance
/// such as `FileInterceptor::new("file")`.
pub struct Component<C: ?Sized> {
    name: &'static str,
    source: Source<C>,
}

impl<C: ?Sized + 'static> Component<C> {
    /// A class resolved through DI, then viewed as `C`.
    pub fn from_class<T: Injectable>(upcast: fn(Arc<T>) -> Arc<C>) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            source: Source::Class {
                provider: Provider::class::<T>(),
                upcast: Arc::new(move |instance: Instance| instance.downcast::<T>().ok().map(upcast)),
            },
        }
    }

    pub fn from_arc(instance: Arc<C>) -> Self {
        Self::named_instance(std::any::type_name::<C>(), instance)
    }

    /// A pre-built instance, reported under `name` in logs.
    pub fn named_instance(name: &'static str, instance: Arc<C>) -> Self {
        Self {
            name,
            source: Source::Instance(instance),
        }
    }

    pub fn name(&self) -> &'static str {
        short_type_name(self.name)
    }

    pub fn resolve(
        &self,
        container: &Container,
        ctx: &ResolutionContext<'_>,
        visibility: Visibility,
    ) -> DiResult<Arc<C>> {
        match &self.source {
            Source::Instance(instance) => Ok(Arc::clone(instance)),
            Source::Class { provider, upcast } => {
                let instance = match visibility {
                    Visibility::Checked => container.resolve(provider.token(), ctx)?,
                    Visibility::Bypass => container.resolve_bypassing(provider, ctx)?,
                };
                upcast(instance).ok_or_else(|| DiError::DowncastFailed {
                    type_name: self.name.to_string(),
                })
            }
        }
    }
}

impl<C: ?Sized> Clone for Component<C> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            Source::Class { provider, upcast } => Source::Class {
                provider: provider.clone(),
                upcast: Arc::clone(upcast),
            },
            Source::Instance(instance) => Source::Instance(Arc::clone(instance)),
        };
        Self {
            name: self.name,
            source,
        }
    }
}

impl<C: ?Sized> fmt::Debug for Component<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            Source::Class { .. } => "class",
            Source::Instance(_) => "instance",
        };
        write!(f, "Component({} {})", kind, short_type_name(self.name))
    }
}
