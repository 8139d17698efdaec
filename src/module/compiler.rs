use std::collections::{HashMap, VecDeque};

use super::graph::{CompileWarning, ModuleGraph, ModuleRecord};
use super::{CoreModule, ModuleDef, ModuleId};
use crate::error::CompileError;

/// What to do with an import entry that does not resolve to a compiled module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum ImportPolicy {
    /// Log the entry, record a [`CompileWarning`] and continue without the edge.
    #[default]
    Lenient,
    /// Fail compilation.
    Strict,
}

/// Compiles a root module definition into a [`ModuleGraph`].
#[derive(Debug, Clone, Default)]
pub struct ModuleCompiler {
    policy: ImportPolicy,
}

impl ModuleCompiler {
    pub fn new(policy: ImportPolicy) -> Self {
        Self { policy }
    }

    /// Breadth-first discovery from `root`, then a linking pass.
    ///
    /// Modules are deduplicated by identity, which makes diamond and cyclic
    /// import graphs terminate. [`CoreModule`] is compiled last unless the
    /// application imports it.
    pub fn compile(&self, root: ModuleDef) -> Result<ModuleGraph, CompileError> {
        let mut queue = VecDeque::from([root]);
        let mut core_queued = false;
        let mut records: Vec<ModuleRecord> = Vec::new();
        let mut pending_imports: Vec<Vec<ModuleId>> = Vec::new();
        let mut compiled: HashMap<ModuleId, usize> = HashMap::new();
        let mut globals = HashMap::new();
        let mut warnings = Vec::new();

        loop {
            let Some(definition) = queue.pop_front() else {
                if core_queued {
                    break;
                }
                core_queued = true;
                queue.push_back(ModuleDef::of::<CoreModule>());
                continue;
            };
            let id = definition.id();
            if compiled.contains_key(&id) {
                continue;
            }

            let metadata = match definition {
                ModuleDef::Dynamic(dynamic) => dynamic.metadata,
                ModuleDef::Class {
                    metadata: Some(metadata),
                    ..
                } => metadata(),
                ModuleDef::Class { metadata: None, .. } if records.is_empty() => {
                    return Err(CompileError::MissingModuleMetadata {
                        module: id.name().to_string(),
                    });
                }
                // A bare reference links in the second pass if the module is
                // compiled through another import.
                ModuleDef::Class { metadata: None, .. } => continue,
            };

            tracing::debug!("Compiling module {}", id);

            let imports: Vec<ModuleId> = metadata.imports.iter().map(ModuleDef::id).collect();
            queue.extend(metadata.imports.iter().cloned());

            let record = ModuleRecord::new(id, metadata);
            for token in record.export_tokens() {
                if record.provider(token).is_none() {
                    let warning = CompileWarning::UnknownExport {
                        module: id.name().to_string(),
                        token: token.to_string(),
                    };
                    tracing::warn!("{}", warning);
                    warnings.push(warning);
                }
            }
            if record.is_global() {
                for provider in record.providers() {
                    globals.insert(provider.token().clone(), id);
                }
            }

            compiled.insert(id, records.len());
            records.push(record);
            pending_imports.push(imports);
        }

        for (record, imports) in records.iter_mut().zip(pending_imports) {
            let mut linked = Vec::with_capacity(imports.len());
            for import in imports {
                if compiled.contains_key(&import) {
                    linked.push(import);
                    continue;
                }
                if self.policy == ImportPolicy::Strict {
                    return Err(CompileError::InvalidImport {
                        module: record.name().to_string(),
                        import: import.name().to_string(),
                    });
                }
                let warning = CompileWarning::InvalidImport {
                    module: record.name().to_string(),
                    import: import.name().to_string(),
                };
                tracing::warn!("Skipping import: {}", warning);
                warnings.push(warning);
            }
            record.link(linked);
        }

        tracing::info!("Compiled {} modules ({} global providers)", records.len(), globals.len());
        Ok(ModuleGraph::new(records, globals, warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::{Dependencies, Injectable, Provider, Token};
    use crate::error::DiResult;
    use crate::module::{DynamicModule, Module, ModuleMetadata};

    struct Shared;
    impl Injectable for Shared {
        fn inject(_: &mut Dependencies) -> DiResult<Self> {
            Ok(Shared)
        }
    }

    struct Hidden;
    impl Injectable for Hidden {
        fn inject(_: &mut Dependencies) -> DiResult<Self> {
            Ok(Hidden)
        }
    }

    struct FeatureA;
    impl Module for FeatureA {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleDef::of::<FeatureB>())
                .provider(Provider::class::<Shared>())
                .provider(Provider::class::<Hidden>())
                .export(Token::of::<Shared>())
        }
    }

    // Imports FeatureA back: a cycle.
    struct FeatureB;
    impl Module for FeatureB {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new().import(ModuleDef::of::<FeatureA>())
        }
    }

    struct GlobalConfig;
    impl Module for GlobalConfig {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new()
                .provider(Provider::value("CONFIG", 1u8))
                .export("CONFIG")
                .global(true)
        }
    }

    struct Root;
    impl Module for Root {
        fn metadata() -> ModuleMetadata {
            ModuleMetadata::new()
                .import(ModuleDef::of::<FeatureA>())
                .import(ModuleDef::of::<FeatureB>())
                .import(ModuleDef::of::<GlobalConfig>())
        }
    }

    struct Unregistered;

    #[test]
    fn compiles_cyclic_and_diamond_imports_once() {
        let graph = ModuleCompiler::default()
            .compile(ModuleDef::of::<Root>())
            .unwrap();

        assert_eq!(graph.len(), 5);
        assert_eq!(graph.root().id(), ModuleId::of::<Root>());
        let names: Vec<_> = graph.modules().map(|m| m.name()).collect();
        assert_eq!(names, ["Root", "FeatureA", "FeatureB", "GlobalConfig", "CoreModule"]);

        let b = graph.module(&ModuleId::of::<FeatureB>()).unwrap();
        assert_eq!(b.imports(), [ModuleId::of::<FeatureA>()]);
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn visibility_follows_exports_and_globals() {
        let graph = ModuleCompiler::default()
            .compile(ModuleDef::of::<Root>())
            .unwrap();
        let root = ModuleId::of::<Root>();
        let a = ModuleId::of::<FeatureA>();
        let b = ModuleId::of::<FeatureB>();

        let (owner, _) = graph.find_provider(&root, &Token::of::<Shared>()).unwrap();
        assert_eq!(owner, a);
        assert!(graph.find_provider(&root, &Token::of::<Hidden>()).is_none());
        assert!(graph.find_provider(&a, &Token::of::<Hidden>()).is_some());
        assert!(graph.find_provider(&b, &Token::named("CONFIG")).is_some());
        assert!(graph.is_global(&Token::named("CONFIG")));
        assert!(graph.find_provider(&b, &Token::of::<crate::context::Reflector>()).is_some());
    }

    #[test]
    fn root_without_metadata_is_fatal() {
        let result = ModuleCompiler::default()
            .compile(ModuleDef::reference(ModuleId::of::<Unregistered>()));
        assert!(matches!(result, Err(CompileError::MissingModuleMetadata { .. })));
    }

    #[test]
    fn bad_import_is_skipped_or_rejected_by_policy() {
        let root = DynamicModule::new::<Root>()
            .import(ModuleDef::reference(ModuleId::of::<Unregistered>()))
            .import(ModuleDef::of::<GlobalConfig>());

        let graph = ModuleCompiler::new(ImportPolicy::Lenient)
            .compile(root.clone().into())
            .unwrap();
        assert_eq!(graph.root().imports(), [ModuleId::of::<GlobalConfig>()]);
        assert!(matches!(
            graph.warnings(),
            [CompileWarning::InvalidImport { import, .. }] if import == "Unregistered"
        ));

        let strict = ModuleCompiler::new(ImportPolicy::Strict).compile(root.into());
        assert!(matches!(strict, Err(CompileError::InvalidImport { .. })));
    }

    #[test]
    fn first_dynamic_configuration_wins() {
        let first = DynamicModule::new::<GlobalConfig>().provider(Provider::value("CONFIG", 1u8));
        let second = DynamicModule::new::<GlobalConfig>().provider(Provider::value("CONFIG", 2u8));
        let root = DynamicModule::new::<Root>().import(first).import(second);

        let graph = ModuleCompiler::default().compile(root.into()).unwrap();
        assert_eq!(graph.len(), 3);
        let config = graph.module(&ModuleId::of::<GlobalConfig>()).unwrap();
        let Some(Provider::Value { value, .. }) = config.provider(&Token::named("CONFIG")) else {
            panic!("expected a value provider");
        };
        assert_eq!(value.downcast_ref::<u8>(), Some(&1));
    }

    #[test]
    fn latest_provider_registration_wins() {
        let root = DynamicModule::new::<Root>()
            .provider(Provider::value("PORT", 80u16))
            .provider(Provider::value("PORT", 8080u16));
        let graph = ModuleCompiler::default().compile(root.into()).unwrap();

        let providers = graph.root().providers();
        assert_eq!(providers.len(), 1);
        let Provider::Value { value, .. } = &providers[0] else {
            panic!("expected a value provider");
        };
        assert_eq!(value.downcast_ref::<u16>(), Some(&8080));
    }
}
