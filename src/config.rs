// This module replaces the global mutable state the original assembler relied on
// (command-line flags consulted from deep inside directive handlers, a process-wide
// target registry) with explicit values threaded through construction. Config holds
// the knobs that change parser behavior: include search paths and whether warnings
// are promoted to errors. TargetRegistry owns the section-switch alias table that
// maps shorthand directives like .text or .cstring to their full section names, so
// the statement parser can dispatch aliases with a single hash lookup instead of a
// long if-chain, and embedders can add target-specific aliases without touching the
// parser itself.

//! Parser configuration and the target registry.

use std::collections::HashMap;
use std::path::PathBuf;

/// Behavioral knobs for one assembly parse.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Directories searched by `.include` after the literal path fails.
    pub include_paths: Vec<PathBuf>,
    /// Treat parser warnings as errors when reporting the run result.
    pub fatal_warnings: bool,
}

/// Registry of target-provided parsing tables.
///
/// Currently this carries the section-switch alias set: directives that
/// change the current section without operands. The default set matches the
/// aliases the generic assembler accepts.
#[derive(Debug, Clone)]
pub struct TargetRegistry {
    section_aliases: HashMap<String, String>,
}

impl TargetRegistry {
    /// An empty registry with no aliases installed.
    pub fn empty() -> Self {
        Self {
            section_aliases: HashMap::new(),
        }
    }

    /// Full section name for a section-switch alias directive, if registered.
    pub fn section_alias(&self, directive: &str) -> Option<&str> {
        self.section_aliases.get(directive).map(String::as_str)
    }

    /// Register (or override) a section-switch alias.
    pub fn register_section_alias(
        &mut self,
        directive: impl Into<String>,
        section: impl Into<String>,
    ) {
        self.section_aliases
            .insert(directive.into(), section.into());
    }
}

impl Default for TargetRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        for (directive, section) in [
            (".text", "__TEXT,__text,regular,pure_instructions"),
            (".const", "__TEXT,__const"),
            (".static_const", "__TEXT,__static_const"),
            (".cstring", "__TEXT,__cstring,cstring_literals"),
            (".literal4", "__TEXT,__literal4,4byte_literals"),
            (".literal8", "__TEXT,__literal8,8byte_literals"),
            (".literal16", "__TEXT,__literal16,16byte_literals"),
            (".constructor", "__TEXT,__constructor"),
            (".destructor", "__TEXT,__destructor"),
            (".data", "__DATA,__data"),
            (".static_data", "__DATA,__static_data"),
            (
                ".non_lazy_symbol_pointer",
                "__DATA,__nl_symbol_pointer,non_lazy_symbol_pointers",
            ),
            (
                ".lazy_symbol_pointer",
                "__DATA,__la_symbol_pointer,lazy_symbol_pointers",
            ),
            (".dyld", "__DATA,__dyld"),
            (".mod_init_func", "__DATA,__mod_init_func,mod_init_funcs"),
            (".mod_term_func", "__DATA,__mod_term_func,mod_term_funcs"),
            (".const_data", "__DATA,__const,regular"),
        ] {
            registry.register_section_alias(directive, section);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_knows_text_and_data() {
        let registry = TargetRegistry::default();
        assert_eq!(
            registry.section_alias(".text"),
            Some("__TEXT,__text,regular,pure_instructions")
        );
        assert_eq!(registry.section_alias(".data"), Some("__DATA,__data"));
        assert_eq!(registry.section_alias(".bogus"), None);
    }

    #[test]
    fn aliases_can_be_extended() {
        let mut registry = TargetRegistry::empty();
        assert_eq!(registry.section_alias(".text"), None);
        registry.register_section_alias(".text", "__TEXT,__text");
        assert_eq!(registry.section_alias(".text"), Some("__TEXT,__text"));
    }
}
