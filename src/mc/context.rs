// This module is the assembler's shared state hub: a bump arena interns every symbol
// and section name once, and flat Vec tables keyed by u32 ids hold the symbol and
// section records. All names handed out are &'arena str with the arena's lifetime, so
// the tables and every consumer share one lifetime parameter instead of cloning
// strings around. The context is owned mutably by a single parse; concurrent parses
// use separate contexts over separate arenas.

//! Assembler context: interned names, symbols, sections.

use std::collections::HashMap;

use bumpalo::Bump;

use super::section::{Section, SectionId};
use super::symbol::{Symbol, SymbolId, SymbolState};
use super::value::McValue;

pub struct McContext<'arena> {
    arena: &'arena Bump,
    symbols: Vec<Symbol<'arena>>,
    symbols_by_name: HashMap<&'arena str, SymbolId>,
    sections: Vec<Section<'arena>>,
    sections_by_name: HashMap<&'arena str, SectionId>,
}

impl<'arena> McContext<'arena> {
    pub fn new(arena: &'arena Bump) -> Self {
        Self {
            arena,
            symbols: Vec::new(),
            symbols_by_name: HashMap::new(),
            sections: Vec::new(),
            sections_by_name: HashMap::new(),
        }
    }

    fn intern(&self, name: &str) -> &'arena str {
        self.arena.alloc_str(name)
    }

    pub fn get_or_create_symbol(&mut self, name: &str) -> SymbolId {
        if let Some(&id) = self.symbols_by_name.get(name) {
            return id;
        }
        let interned = self.intern(name);
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(interned));
        self.symbols_by_name.insert(interned, id);
        id
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<SymbolId> {
        self.symbols_by_name.get(name).copied()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol<'arena> {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_name(&self, id: SymbolId) -> &'arena str {
        self.symbols[id.0 as usize].name
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Mark a first-use symbol as resolved outside this unit. Only an
    /// undefined symbol changes state.
    pub fn mark_external(&mut self, id: SymbolId) {
        let sym = &mut self.symbols[id.0 as usize];
        if sym.state == SymbolState::Undefined {
            sym.state = SymbolState::External;
        }
    }

    /// Define the symbol as a label. The caller has already diagnosed
    /// conflicting states.
    pub fn define_label(&mut self, id: SymbolId, section: SectionId) {
        let sym = &mut self.symbols[id.0 as usize];
        debug_assert!(
            !sym.is_defined() && !sym.is_assigned(),
            "label definition after definition or assignment"
        );
        sym.state = SymbolState::Defined(section);
    }

    /// Assign the symbol an expression value. The caller has already
    /// diagnosed conflicting states.
    pub fn assign(&mut self, id: SymbolId, value: McValue) {
        let sym = &mut self.symbols[id.0 as usize];
        debug_assert!(
            !sym.is_defined() && !sym.is_assigned(),
            "assignment after definition or assignment"
        );
        sym.state = SymbolState::Assigned(value);
    }

    pub fn get_or_create_section(&mut self, name: &str) -> SectionId {
        if let Some(&id) = self.sections_by_name.get(name) {
            return id;
        }
        let interned = self.intern(name);
        let id = SectionId(self.sections.len() as u32);
        self.sections.push(Section::new(interned));
        self.sections_by_name.insert(interned, id);
        id
    }

    pub fn section(&self, id: SectionId) -> &Section<'arena> {
        &self.sections[id.0 as usize]
    }

    pub fn section_name(&self, id: SectionId) -> &'arena str {
        self.sections[id.0 as usize].name
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_are_interned_once() {
        let arena = Bump::new();
        let mut ctx = McContext::new(&arena);

        let a = ctx.get_or_create_symbol("foo");
        let b = ctx.get_or_create_symbol("foo");
        let c = ctx.get_or_create_symbol("bar");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(ctx.symbol_name(a), "foo");
    }

    #[test]
    fn state_transitions() {
        let arena = Bump::new();
        let mut ctx = McContext::new(&arena);

        let sym = ctx.get_or_create_symbol("foo");
        assert_eq!(ctx.symbol(sym).state, SymbolState::Undefined);

        ctx.mark_external(sym);
        assert!(ctx.symbol(sym).is_external());

        let section = ctx.get_or_create_section("__TEXT,__text");
        ctx.define_label(sym, section);
        assert_eq!(ctx.symbol(sym).section(), Some(section));

        // External marking never downgrades a definition.
        ctx.mark_external(sym);
        assert!(ctx.symbol(sym).is_defined());
    }

    #[test]
    fn sections_dedup_by_name() {
        let arena = Bump::new();
        let mut ctx = McContext::new(&arena);

        let a = ctx.get_or_create_section("__DATA,__data");
        let b = ctx.get_or_create_section("__DATA,__data");
        assert_eq!(a, b);
        assert_eq!(ctx.section_name(a), "__DATA,__data");
    }
}
