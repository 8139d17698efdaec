use std::any::Any;
use std::sync::Arc;

use super::{Dependency, Scope};
use crate::error::{DiError, DiResult};
use crate::lifecycle::LifecycleHooks;

/// A resolved provider instance.
///
/// Sized providers are stored as the value itself. Trait-object providers
/// are stored as a [`Bound`].
pub type Instance = Arc<dyn Any + Send + Sync>;

/// A trait-object provider.
///
/// Holds the `Arc<dyn Trait>` handed to dependents and, for classes bound
/// with `Provider::bind`, the concrete instance lifecycle hooks run on.
pub struct Bound {
    object: Box<dyn Any + Send + Sync>,
    concrete: Option<Instance>,
}

impl Bound {
    pub fn new<T: ?Sized + Send + Sync + 'static>(object: Arc<T>, concrete: Option<Instance>) -> Instance {
        Arc::new(Self {
            object: Box::new(object),
            concrete,
        })
    }

    /// The trait object, if `instance` is bound as `T`.
    pub fn object<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Option<Arc<T>> {
        instance
            .downcast_ref::<Self>()?
            .object
            .downcast_ref::<Arc<T>>()
            .cloned()
    }

    /// The implementation behind a bound trait object.
    pub fn concrete(instance: &Instance) -> Option<&Instance> {
        instance.downcast_ref::<Self>()?.concrete.as_ref()
    }
}

/// Trait for types that can be constructed by the DI container
///
/// This trait is typically implemented automatically via the `#[derive(Injectable)]` macro.
///
/// # Example
/// ```rust,ignore
/// use keel::Injectable;
/// use std::sync::Arc;
///
/// trait UserRepository: Send + Sync {}
///
/// #[derive(Injectable)]
/// pub struct UserService {
///     // Resolved from the module that declares `UserService`
///     repository: Arc<dyn UserRepository>,
/// }
/// ```
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor dependencies, in the order `inject` consumes them.
    fn dependencies() -> Vec<Dependency> {
        Vec::new()
    }

    fn scope() -> Scope {
        Scope::Singleton
    }

    fn hooks() -> LifecycleHooks {
        LifecycleHooks::default()
    }

    /// Create an instance from its resolved dependencies
    ///
    /// # Errors
    /// Returns an error if a dependency has an unexpected type or user
    /// construction code fails.
    fn inject(deps: &mut Dependencies) -> DiResult<Self>;
}

/// Resolved constructor arguments, consumed positionally.
pub struct Dependencies {
    class: &'static str,
    values: std::vec::IntoIter<Instance>,
    position: usize,
}

impl Dependencies {
    pub(crate) fn new(class: &'static str, values: Vec<Instance>) -> Self {
        Self {
            class,
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Take the next argument as a sized value.
    pub fn take<T: Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        self.take_instance()?
            .downcast::<T>()
            .map_err(|_| DiError::downcast_failed::<T>())
    }

    /// Take the next argument as a trait object (`Arc<dyn Trait>`).
    pub fn take_dyn<T: ?Sized + Send + Sync + 'static>(&mut self) -> DiResult<Arc<T>> {
        Bound::object::<T>(&self.take_instance()?).ok_or_else(DiError::downcast_failed::<T>)
    }

    pub fn take_instance(&mut self) -> DiResult<Instance> {
        let index = self.position;
        self.position += 1;
        self.values.next().ok_or_else(|| DiError::MissingArgument {
            class: self.class.to_string(),
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn take_reads_arguments_in_order() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let mut deps = Dependencies::new(
            "Target",
            vec![Arc::new(7u32) as Instance, Bound::new(greeter, None)],
        );

        assert_eq!(*deps.take::<u32>().unwrap(), 7);
        assert_eq!(deps.take_dyn::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(matches!(
            deps.take::<u32>(),
            Err(DiError::MissingArgument { index: 2, .. })
        ));
    }

    #[test]
    fn take_reports_type_mismatch() {
        let mut deps = Dependencies::new("Target", vec![Arc::new("text") as Instance]);
        assert!(matches!(
            deps.take::<u32>(),
            Err(DiError::DowncastFailed { .. })
        ));
    }
}
