mod cache;
mod component;
mod container;
mod injectable;
mod provider;
pub(crate) mod token;

pub use cache::SingletonCache;
pub use component::{Component, Visibility};
pub use container::{Container, ResolutionContext};
pub use injectable::{Bound, Dependencies, Injectable, Instance};
pub use provider::{ClassMetadata, Dependency, FactoryProvider, Provider, Scope};
pub use token::Token;
pub(crate) use token::short_type_name;
