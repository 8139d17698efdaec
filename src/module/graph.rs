use std::collections::{HashMap, HashSet};
use std::fmt;

use super::{ModuleId, ModuleMetadata};
use crate::controller::ControllerDef;
use crate::di::{Provider, Token};
use crate::websocket::GatewayDef;

/// A compiled module. Immutable once the graph is built.
pub struct ModuleRecord {
    id: ModuleId,
    providers: Vec<Provider>,
    provider_index: HashMap<Token, usize>,
    exports: HashSet<Token>,
    controllers: Vec<ControllerDef>,
    gateways: Vec<GatewayDef>,
    imports: Vec<ModuleId>,
    global: bool,
}

impl ModuleRecord {
    pub(crate) fn new(id: ModuleId, metadata: ModuleMetadata) -> Self {
        let mut record = Self {
            id,
            providers: Vec::new(),
            provider_index: HashMap::new(),
            exports: metadata.exports.into_iter().collect(),
            controllers: Vec::new(),
            gateways: Vec::new(),
            imports: Vec::new(),
            global: metadata.global,
        };

        for provider in metadata.providers {
            record.add_provider(provider);
        }
        for controller in metadata.controllers {
            record.add_provider(controller.provider().clone());
            record.controllers.push(controller);
        }
        for gateway in metadata.gateways {
            record.add_provider(gateway.provider().clone());
            record.gateways.push(gateway);
        }
        record
    }

    /// One provider per token: a later registration replaces the earlier one
    /// but keeps its position.
    fn add_provider(&mut self, provider: Provider) {
        match self.provider_index.get(provider.token()) {
            Some(&position) => self.providers[position] = provider,
            None => {
                self.provider_index
                    .insert(provider.token().clone(), self.providers.len());
                self.providers.push(provider);
            }
        }
    }

    pub(crate) fn link(&mut self, imports: Vec<ModuleId>) {
        self.imports = imports;
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    pub fn provider(&self, token: &Token) -> Option<&Provider> {
        self.provider_index
            .get(token)
            .map(|&position| &self.providers[position])
    }

    pub fn exports(&self, token: &Token) -> bool {
        self.exports.contains(token)
    }

    pub fn export_tokens(&self) -> impl Iterator<Item = &Token> {
        self.exports.iter()
    }

    pub fn controllers(&self) -> &[ControllerDef] {
        &self.controllers
    }

    pub fn gateways(&self) -> &[GatewayDef] {
        &self.gateways
    }

    pub fn imports(&self) -> &[ModuleId] {
        &self.imports
    }

    pub fn is_global(&self) -> bool {
        self.global
    }
}

impl fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.id)
            .field("providers", &self.providers)
            .field("exports", &self.exports)
            .field("imports", &self.imports)
            .field("global", &self.global)
            .finish()
    }
}

/// A non-fatal problem found while compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    InvalidImport { module: String, import: String },
    UnknownExport { module: String, token: String },
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidImport { module, import } => {
                write!(f, "module \"{module}\" imports \"{import}\", which is not a compiled module")
            }
            Self::UnknownExport { module, token } => {
                write!(f, "module \"{module}\" exports \"{token}\", which it does not provide")
            }
        }
    }
}

/// The compiled module graph plus the global provider index.
pub struct ModuleGraph {
    records: Vec<ModuleRecord>,
    index: HashMap<ModuleId, usize>,
    globals: HashMap<Token, ModuleId>,
    warnings: Vec<CompileWarning>,
}

impl ModuleGraph {
    pub(crate) fn new(
        records: Vec<ModuleRecord>,
        globals: HashMap<Token, ModuleId>,
        warnings: Vec<CompileWarning>,
    ) -> Self {
        let index = records
            .iter()
            .enumerate()
            .map(|(position, record)| (record.id, position))
            .collect();
        Self {
            records,
            index,
            globals,
            warnings,
        }
    }

    /// The root module. Compilation guarantees there is one.
    pub fn root(&self) -> &ModuleRecord {
        &self.records[0]
    }

    pub fn module(&self, id: &ModuleId) -> Option<&ModuleRecord> {
        self.index.get(id).map(|&position| &self.records[position])
    }

    /// Modules in discovery (breadth-first) order.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn warnings(&self) -> &[CompileWarning] {
        &self.warnings
    }

    pub fn is_global(&self, token: &Token) -> bool {
        self.globals.contains_key(token)
    }

    /// Finds the provider `module` may see for `token`, with the module that
    /// declares it.
    ///
    /// Visible are the module's own providers, tokens exported by an imported
    /// module (re-exports included), and the global provider index.
    pub fn find_provider(&self, module: &ModuleId, token: &Token) -> Option<(ModuleId, &Provider)> {
        let mut visited = HashSet::new();
        self.find_local(module, token, &mut visited).or_else(|| {
            let owner = self.globals.get(token)?;
            let provider = self.module(owner)?.provider(token)?;
            Some((*owner, provider))
        })
    }

    fn find_local(
        &self,
        module: &ModuleId,
        token: &Token,
        visited: &mut HashSet<ModuleId>,
    ) -> Option<(ModuleId, &Provider)> {
        if !visited.insert(*module) {
            return None;
        }
        let record = self.module(module)?;
        if let Some(provider) = record.provider(token) {
            return Some((record.id, provider));
        }
        record.imports.iter().find_map(|import| {
            let imported = self.module(import)?;
            if imported.exports(token) {
                self.find_local(import, token, visited)
            } else {
                None
            }
        })
    }

    /// The first module, in discovery order, whose controllers include `controller`.
    pub fn owner_of_controller(&self, controller: &Token) -> Option<&ModuleRecord> {
        self.records.iter().find(|record| {
            record
                .controllers
                .iter()
                .any(|declared| declared.token() == controller)
        })
    }

    /// The first module, in discovery order, that declares `token` itself.
    pub fn declaring_module(&self, token: &Token) -> Option<&ModuleRecord> {
        self.records
            .iter()
            .find(|record| record.provider(token).is_some())
    }
}

impl fmt::Debug for ModuleGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleGraph")
            .field("modules", &self.records)
            .field("globals", &self.globals)
            .field("warnings", &self.warnings)
            .finish()
    }
}
