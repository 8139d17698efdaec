mod compiler;
mod graph;

pub use compiler::{ImportPolicy, ModuleCompiler};
pub use graph::{CompileWarning, ModuleGraph, ModuleRecord};

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::context::Reflector;
use crate::controller::ControllerDef;
use crate::di::{Provider, Token, token::short_type_name};
use crate::websocket::GatewayDef;

/// Trait for application modules
///
/// Modules are typically defined using the `#[module]` macro, which
/// implements this trait from the declared imports, controllers, providers,
/// gateways and exports.
///
/// # Example
/// ```rust,ignore
/// use keel::module;
///
/// #[module(
///     imports = [DatabaseModule, ConfigModule::for_root(ConfigOptions::default())],
///     controllers = [UserController],
///     providers = [UserService, UserRepository],
///     exports = [UserService],
/// )]
/// pub struct UsersModule;
/// ```
pub trait Module: 'static {
    fn metadata() -> ModuleMetadata;
}

/// Identity of a module: its declaring type, even when dynamically configured.
#[derive(Clone, Copy)]
pub struct ModuleId {
    id: TypeId,
    name: &'static str,
}

impl ModuleId {
    pub fn of<M: 'static>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: std::any::type_name::<M>(),
        }
    }

    pub fn name(&self) -> &'static str {
        short_type_name(self.name)
    }
}

impl PartialEq for ModuleId {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ModuleId {}

impl Hash for ModuleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleId({})", self.name())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared shape of a module.
#[derive(Clone, Default)]
pub struct ModuleMetadata {
    pub imports: Vec<ModuleDef>,
    pub controllers: Vec<ControllerDef>,
    pub gateways: Vec<GatewayDef>,
    pub providers: Vec<Provider>,
    pub exports: Vec<Token>,
    pub global: bool,
}

impl ModuleMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn import(mut self, module: impl Into<ModuleDef>) -> Self {
        self.imports.push(module.into());
        self
    }

    pub fn controller(mut self, controller: ControllerDef) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn gateway(mut self, gateway: GatewayDef) -> Self {
        self.gateways.push(gateway);
        self
    }

    pub fn provider(mut self, provider: impl Into<Provider>) -> Self {
        self.providers.push(provider.into());
        self
    }

    pub fn export(mut self, token: impl Into<Token>) -> Self {
        self.exports.push(token.into());
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }
}

/// Framework providers every module can inject, such as [`Reflector`].
///
/// Compiled into every graph as a global module.
///
/// [`Reflector`]: crate::context::Reflector
pub struct CoreModule;

impl Module for CoreModule {
    fn metadata() -> ModuleMetadata {
        ModuleMetadata::new()
            .provider(Provider::class::<Reflector>())
            .export(Token::of::<Reflector>())
            .global(true)
    }
}

/// A runtime-configured module, e.g. `ConfigModule::for_root(options)`.
///
/// Its identity is the base module type: two configurations of the same
/// module collapse into one compiled node, and the first one wins.
#[derive(Clone)]
pub struct DynamicModule {
    pub module: ModuleId,
    pub metadata: ModuleMetadata,
}

impl DynamicModule {
    pub fn new<M: Module>() -> Self {
        Self {
            module: ModuleId::of::<M>(),
            metadata: ModuleMetadata::new(),
        }
    }

    pub fn import(mut self, module: impl Into<ModuleDef>) -> Self {
        self.metadata = self.metadata.import(module);
        self
    }

    pub fn controller(mut self, controller: ControllerDef) -> Self {
        self.metadata = self.metadata.controller(controller);
        self
    }

    pub fn provider(mut self, provider: impl Into<Provider>) -> Self {
        self.metadata = self.metadata.provider(provider);
        self
    }

    pub fn export(mut self, token: impl Into<Token>) -> Self {
        self.metadata = self.metadata.export(token);
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.metadata.global = global;
        self
    }
}

/// One entry of an import list.
#[derive(Clone)]
pub enum ModuleDef {
    /// A module type. `metadata` is `None` for a bare reference, which only
    /// links if the module is compiled through another import.
    Class {
        id: ModuleId,
        metadata: Option<fn() -> ModuleMetadata>,
    },
    Dynamic(DynamicModule),
}

impl ModuleDef {
    pub fn of<M: Module>() -> Self {
        Self::Class {
            id: ModuleId::of::<M>(),
            metadata: Some(M::metadata),
        }
    }

    pub fn reference(id: ModuleId) -> Self {
        Self::Class { id, metadata: None }
    }

    pub fn id(&self) -> ModuleId {
        match self {
            Self::Class { id, .. } => *id,
            Self::Dynamic(dynamic) => dynamic.module,
        }
    }
}

impl From<DynamicModule> for ModuleDef {
    fn from(module: DynamicModule) -> Self {
        Self::Dynamic(module)
    }
}

impl fmt::Debug for ModuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { id, metadata } => f
                .debug_struct("Class")
                .field("id", id)
                .field("has_metadata", &metadata.is_some())
                .finish(),
            Self::Dynamic(dynamic) => f.debug_tuple("Dynamic").field(&dynamic.module).finish(),
        }
    }
}
