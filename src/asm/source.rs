//! Source buffers and include resolution.

use std::fs;
use std::path::PathBuf;

use crate::diag::{BufferId, SourceLoc};

#[derive(Debug)]
pub struct SourceBuffer {
    pub name: String,
    pub contents: String,
}

/// Owns every buffer a parse touches: the main input plus anything pulled
/// in by `.include`. Buffers registered up front by name (tests, embedded
/// inputs) shadow the filesystem.
#[derive(Debug, Default)]
pub struct SourceMgr {
    buffers: Vec<SourceBuffer>,
    include_paths: Vec<PathBuf>,
}

impl SourceMgr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_paths(include_paths: Vec<PathBuf>) -> Self {
        Self {
            buffers: Vec::new(),
            include_paths,
        }
    }

    /// Add a directory to the `.include` search path.
    pub fn add_include_path(&mut self, path: PathBuf) {
        self.include_paths.push(path);
    }

    /// Register an in-memory buffer and return its id.
    pub fn add_buffer(&mut self, name: impl Into<String>, contents: impl Into<String>) -> BufferId {
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(SourceBuffer {
            name: name.into(),
            contents: contents.into(),
        });
        id
    }

    pub fn buffer(&self, id: BufferId) -> &SourceBuffer {
        &self.buffers[id.0 as usize]
    }

    /// Resolve an `.include` filename: a previously registered buffer with
    /// that exact name wins, then the literal path, then each include
    /// search directory.
    pub fn open_include(&mut self, filename: &str) -> Option<BufferId> {
        if let Some(idx) = self.buffers.iter().position(|b| b.name == filename) {
            return Some(BufferId(idx as u32));
        }
        if let Ok(contents) = fs::read_to_string(filename) {
            return Some(self.add_buffer(filename, contents));
        }
        for dir in &self.include_paths {
            let candidate = dir.join(filename);
            if let Ok(contents) = fs::read_to_string(&candidate) {
                return Some(self.add_buffer(filename, contents));
            }
        }
        None
    }

    /// Buffer name plus 1-based line and column for a location.
    pub fn line_col(&self, loc: SourceLoc) -> (&str, u32, u32) {
        let buffer = self.buffer(loc.buffer);
        let upto = &buffer.contents.as_bytes()[..(loc.offset as usize).min(buffer.contents.len())];
        let line = upto.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
        let col = upto
            .iter()
            .rev()
            .take_while(|&&b| b != b'\n')
            .count() as u32
            + 1;
        (&buffer.name, line, col)
    }
}
