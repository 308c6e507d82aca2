//! Script module resolution.
//!
//! Import specifiers are URLs. Absolute URIs are used as-is, specifiers that
//! start with `.` or `/` are joined against the importing module's URL, and
//! anything else is unresolved. The URL path is then looked up in each
//! loader in ascending priority, first verbatim and then with `.rhai`
//! appended.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use rhai::{Engine, EvalAltResult, Module, ModuleResolver, Position, Scope, AST};
use tracing::debug;
use url::Url;
use vdev_storage::{ContentLoader, StoragePath};

/// Rhai's shared module handle (`Arc<Module>` under the `sync` feature).
type SharedModule = Arc<Module>;

use crate::error::{Result, RuntimeError};

/// Source file extension of script modules.
pub const SCRIPT_EXTENSION: &str = "rhai";

/// A loader tagged with its lookup priority (lower is consulted first).
#[derive(Clone)]
pub struct PrioritizedLoader {
    pub priority: i32,
    pub loader: Arc<dyn ContentLoader>,
}

impl PrioritizedLoader {
    pub fn new(priority: i32, loader: Arc<dyn ContentLoader>) -> Self {
        Self { priority, loader }
    }
}

/// Resolves and caches modules for one engine instance.
///
/// A new resolver is built on every reload, so edited modules are picked up
/// and the cache never outlives the engine that compiled its contents.
pub struct ScriptResolver {
    loaders: Vec<PrioritizedLoader>,
    /// URL of the entry module; the referrer for imports made without one.
    base: Url,
    cache: Mutex<HashMap<Url, SharedModule>>,
    loading: Mutex<HashSet<Url>>,
}

impl ScriptResolver {
    pub fn new(mut loaders: Vec<PrioritizedLoader>, entry_module: &str) -> Result<Self> {
        loaders.sort_by_key(|l| l.priority);
        let base = Url::parse("file:///")
            .and_then(|root| root.join(entry_module))
            .map_err(|e| RuntimeError::EntryModule {
                module: entry_module.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            loaders,
            base,
            cache: Mutex::new(HashMap::new()),
            loading: Mutex::new(HashSet::new()),
        })
    }

    pub fn entry_url(&self) -> &Url {
        &self.base
    }

    /// Turn an import specifier into a URL.
    pub fn resolve_specifier(&self, referrer: Option<&str>, specifier: &str) -> Option<Url> {
        if let Ok(url) = Url::parse(specifier) {
            return Some(url);
        }
        if !(specifier.starts_with('.') || specifier.starts_with('/')) {
            return None;
        }
        let base = referrer
            .and_then(|r| Url::parse(r).ok())
            .unwrap_or_else(|| self.base.clone());
        base.join(specifier).ok()
    }

    /// Fetch the source text behind `url`.
    pub fn load(&self, url: &Url) -> Result<String> {
        let path = percent_decode_str(url.path()).decode_utf8_lossy();
        let candidates = [
            StoragePath::parse(&path),
            StoragePath::parse(&format!("{path}.{SCRIPT_EXTENSION}")),
        ];
        for entry in &self.loaders {
            for candidate in &candidates {
                if candidate.is_root() || !entry.loader.exists(candidate) {
                    continue;
                }
                if let Ok(bytes) = entry.loader.read(candidate) {
                    debug!(loader = entry.loader.name(), path = %candidate, "module source");
                    return String::from_utf8(bytes)
                        .map_err(|_| RuntimeError::ModuleNotFound(format!("{url} is not UTF-8")));
                }
            }
        }
        Err(RuntimeError::ModuleNotFound(url.to_string()))
    }

    /// Compile the entry module with all static imports resolved.
    pub fn load_entry(&self, engine: &Engine) -> Result<AST> {
        let entry_error = |message: String| RuntimeError::EntryModule {
            module: self.base.to_string(),
            message,
        };
        let source = self.load(&self.base).map_err(|e| entry_error(e.to_string()))?;
        let mut ast = engine
            .compile_into_self_contained(&Scope::new(), &source)
            .map_err(|e| entry_error(e.to_string()))?;
        ast.set_source(self.base.as_str());
        Ok(ast)
    }

    /// Resolve, compile and evaluate a module, or return it from the cache.
    pub fn import(
        &self,
        engine: &Engine,
        referrer: Option<&str>,
        specifier: &str,
        pos: Position,
    ) -> std::result::Result<SharedModule, Box<EvalAltResult>> {
        let url = self
            .resolve_specifier(referrer, specifier)
            .ok_or_else(|| EvalAltResult::ErrorModuleNotFound(specifier.to_string(), pos))?;

        if let Some(module) = self.cache.lock().get(&url) {
            return Ok(module.clone());
        }
        if !self.loading.lock().insert(url.clone()) {
            return Err(EvalAltResult::ErrorInModule(
                url.to_string(),
                format!("circular import of {url}").into(),
                pos,
            )
            .into());
        }

        let result = self.compile_module(engine, &url, specifier, pos);
        self.loading.lock().remove(&url);
        let module = result?;
        self.cache.lock().insert(url, module.clone());
        Ok(module)
    }

    fn compile_module(
        &self,
        engine: &Engine,
        url: &Url,
        specifier: &str,
        pos: Position,
    ) -> std::result::Result<SharedModule, Box<EvalAltResult>> {
        let source = self
            .load(url)
            .map_err(|_| EvalAltResult::ErrorModuleNotFound(specifier.to_string(), pos))?;
        let in_module =
            |err: Box<EvalAltResult>| EvalAltResult::ErrorInModule(url.to_string(), err, pos);

        let mut ast = engine.compile(&source).map_err(|e| in_module(e.into()))?;
        ast.set_source(url.as_str());
        let module = Module::eval_ast_as_new(Scope::new(), &ast, engine).map_err(in_module)?;
        debug!(module = %url, "module loaded");
        Ok(module.into())
    }

    pub fn cached_modules(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Installs a shared [`ScriptResolver`] as an engine's module resolver.
#[derive(Clone)]
pub struct ResolverHandle(pub Arc<ScriptResolver>);

impl ModuleResolver for ResolverHandle {
    fn resolve(
        &self,
        engine: &Engine,
        source: Option<&str>,
        path: &str,
        pos: Position,
    ) -> std::result::Result<SharedModule, Box<EvalAltResult>> {
        self.0.import(engine, source, path, pos)
    }
}
