use crate::error::{MicroError, Result};
use std::collections::HashMap;
use tracing::trace;

/// Handle to a frame inside an [`Environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameId(usize);

/// One lexical scope
#[derive(Debug, Clone)]
struct Frame<T> {
    vars: HashMap<String, T>,
    parent: Option<FrameId>,
}

impl<T> Frame<T> {
    fn new(parent: Option<FrameId>) -> Self {
        Frame {
            vars: HashMap::new(),
            parent,
        }
    }
}

/// Returned by [`Environment::enter`]; hand it back to [`Environment::leave`]
/// to discard the frame and everything pushed after it.
#[must_use]
#[derive(Debug)]
pub struct ScopeGuard {
    mark: usize,
    previous: FrameId,
}

/// Chain of scopes stored in an arena.
///
/// Frame 0 is the global scope. Frames are pushed and popped in stack order,
/// but a new frame may name any live frame as its parent, so a function call
/// frame can hang off the global scope while the caller's frames stay alive
/// below it. The payload is a `Type` for the analyzer and a `Value` for the
/// evaluator.
#[derive(Debug, Clone)]
pub struct Environment<T> {
    frames: Vec<Frame<T>>,
    current: FrameId,
}

impl<T> Default for Environment<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Environment<T> {
    pub fn new() -> Self {
        Environment {
            frames: vec![Frame::new(None)],
            current: FrameId(0),
        }
    }

    pub fn global(&self) -> FrameId {
        FrameId(0)
    }

    pub fn current(&self) -> FrameId {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Push a fresh frame whose parent is `parent` and make it current.
    pub fn enter(&mut self, parent: FrameId) -> ScopeGuard {
        let guard = ScopeGuard {
            mark: self.frames.len(),
            previous: self.current,
        };
        self.frames.push(Frame::new(Some(parent)));
        self.current = FrameId(guard.mark);
        trace!(frame = guard.mark, parent = parent.0, "enter scope");
        guard
    }

    /// Push a fresh child of the current frame.
    pub fn enter_child(&mut self) -> ScopeGuard {
        self.enter(self.current)
    }

    pub fn leave(&mut self, guard: ScopeGuard) {
        trace!(frame = guard.mark, "leave scope");
        self.frames.truncate(guard.mark);
        self.current = guard.previous;
    }

    fn frame(&self, id: FrameId) -> &Frame<T> {
        &self.frames[id.0]
    }

    /// Walk outward from the current frame to the global one.
    fn resolve(&self, name: &str) -> Option<FrameId> {
        let mut id = Some(self.current);
        while let Some(frame_id) = id {
            let frame = self.frame(frame_id);
            if frame.vars.contains_key(name) {
                return Some(frame_id);
            }
            id = frame.parent;
        }
        None
    }

    pub fn get(&self, name: &str) -> Result<&T> {
        self.resolve(name)
            .and_then(|id| self.frame(id).vars.get(name))
            .ok_or_else(|| MicroError::UndefinedVariable(name.to_string()))
    }

    /// Bind `name` in the current frame, shadowing any outer binding.
    pub fn set(&mut self, name: &str, payload: T) {
        let current = self.current.0;
        self.frames[current].vars.insert(name.to_string(), payload);
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn update(&mut self, name: &str, payload: T) -> Result<()> {
        let id = self
            .resolve(name)
            .ok_or_else(|| MicroError::UndefinedVariable(name.to_string()))?;
        self.frames[id.0].vars.insert(name.to_string(), payload);
        Ok(())
    }

    pub fn is_declared_locally(&self, name: &str) -> bool {
        self.frame(self.current).vars.contains_key(name)
    }

    /// Bindings of one frame, sorted by name.
    pub fn bindings(&self, id: FrameId) -> Vec<(&str, &T)> {
        let mut vars: Vec<_> = self
            .frame(id)
            .vars
            .iter()
            .map(|(name, payload)| (name.as_str(), payload))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(b.0));
        vars
    }
}
