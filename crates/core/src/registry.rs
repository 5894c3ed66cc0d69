use crate::dispatcher::ContextFunction;
use crate::renderer::RendererTable;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use xdjango_xslt::FunctionNamespace;

/// The dispatchers one transformer knows about, keyed by context name.
///
/// Entries are only ever added. Registering a name twice keeps the first dispatcher.
#[derive(Debug)]
pub struct ContextFunctionRegistry {
    functions: RwLock<HashMap<String, Arc<ContextFunction>>>,
    renderers: Arc<RendererTable>,
}

impl ContextFunctionRegistry {
    pub fn new(renderers: Arc<RendererTable>) -> Self {
        Self {
            functions: RwLock::new(HashMap::new()),
            renderers,
        }
    }

    pub fn renderers(&self) -> &Arc<RendererTable> {
        &self.renderers
    }

    /// Registers a dispatcher for the root of `name`. Returns true if it was new.
    pub fn register(&self, name: &str) -> bool {
        let root = root_name(name);
        if root.is_empty() {
            return false;
        }
        let Ok(mut functions) = self.functions.write() else {
            log::error!(target: "xdjango::registry", "registry lock poisoned; '{}' not registered", root);
            return false;
        };
        if functions.contains_key(root) {
            return false;
        }
        log::debug!(target: "xdjango::registry", "Registering context function '{}'", root);
        functions.insert(
            root.to_string(),
            Arc::new(ContextFunction::new(root, Arc::clone(&self.renderers))),
        );
        true
    }

    /// The dispatcher that serves a call to `name`, which may be dotted (`greet.upper`).
    pub fn get(&self, name: &str) -> Option<Arc<ContextFunction>> {
        self.functions.read().ok()?.get(root_name(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .functions
            .read()
            .map(|f| f.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FunctionNamespace for ContextFunctionRegistry {
    fn has_function(&self, local_name: &str) -> bool {
        self.contains(local_name)
    }
}

/// The context name a call refers to: everything before the first `.` or `(`.
pub fn root_name(call: &str) -> &str {
    let end = call.find(['.', '(']).unwrap_or(call.len());
    call[..end].trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_name() {
        assert_eq!(root_name("greet"), "greet");
        assert_eq!(root_name("greet.upper"), "greet");
        assert_eq!(root_name("greet('xml')"), "greet");
        assert_eq!(root_name(""), "");
    }

    #[test]
    fn test_first_registration_wins() {
        let registry = ContextFunctionRegistry::new(Arc::new(RendererTable::new()));
        assert!(registry.register("greet"));
        let first = registry.get("greet").unwrap();
        assert!(!registry.register("greet.upper"));
        assert!(Arc::ptr_eq(&first, &registry.get("greet.lower").unwrap()));
        assert_eq!(registry.len(), 1);
        assert_eq!(first.name(), "greet");
    }

    #[test]
    fn test_function_namespace_checks_root_names() {
        let registry = ContextFunctionRegistry::new(Arc::new(RendererTable::new()));
        registry.register("rows");
        registry.register("title");
        assert!(registry.has_function("rows.count"));
        assert!(!registry.has_function("missing"));
        assert_eq!(registry.names(), vec!["rows", "title"]);
    }
}
