//! Incremental entity-tree builder.
//!
//! The builder consumes open, text and close events in document order and
//! assembles one command's [`Entity`] tree. Events may arrive at any
//! granularity: text is accumulated on the innermost open element and the
//! tree only becomes visible once the root element closes.
//!
//! Open elements live on a stack of owned nodes. Closing an element pops it
//! and attaches it to the new top of the stack, so the finished root is the
//! only tree that ever leaves the builder.

use crate::entity::Entity;

use super::errors::{BuildError, CommandError};
use super::tokenizer::ElementEvents;

/// Parsing state for one command.
#[derive(Debug)]
pub struct TreeBuilder {
    stack: Vec<Entity>,
    root: Option<Entity>,
    done: bool,
    bytes: usize,
    max_bytes: usize,
}

impl TreeBuilder {
    /// Creates a builder that rejects commands larger than `max_bytes`.
    #[must_use]
    pub fn new(max_bytes: usize) -> Self {
        Self {
            stack: Vec::new(),
            root: None,
            done: false,
            bytes: 0,
            max_bytes,
        }
    }

    /// Creates a builder without a size limit.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::new(usize::MAX)
    }

    /// Opens an element, making it the root when nothing is open yet.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::AlreadyComplete`] once the root has closed and
    /// [`BuildError::TooLarge`] when the byte budget is exhausted.
    pub fn on_open<I>(&mut self, name: &str, attributes: I) -> Result<(), BuildError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        if self.done {
            return Err(BuildError::AlreadyComplete {
                name: name.to_owned(),
            });
        }
        let mut node = Entity::new(name);
        let mut size = name.len();
        for (key, value) in attributes {
            size = size.saturating_add(key.len() + value.len());
            node.set_attribute(key, value);
        }
        self.charge(size)?;
        self.stack.push(node);
        Ok(())
    }

    /// Appends text to the innermost open element.
    ///
    /// Text outside any element is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::TooLarge`] when the byte budget is exhausted.
    pub fn on_text(&mut self, text: &str) -> Result<(), BuildError> {
        if self.stack.is_empty() {
            return Ok(());
        }
        self.charge(text.len())?;
        if let Some(current) = self.stack.last_mut() {
            current.append_text(text);
        }
        Ok(())
    }

    /// Closes the innermost open element.
    ///
    /// When the stack empties the tree is complete and [`Self::is_done`]
    /// becomes true.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::UnbalancedClose`] when nothing is open and
    /// [`BuildError::MismatchedClose`] when `name` differs from the open
    /// element.
    pub fn on_close(&mut self, name: &str) -> Result<(), BuildError> {
        let Some(node) = self.stack.pop() else {
            return Err(BuildError::UnbalancedClose {
                name: name.to_owned(),
            });
        };
        if node.name() != name {
            let expected = node.name().to_owned();
            self.stack.push(node);
            return Err(BuildError::MismatchedClose {
                expected,
                found: name.to_owned(),
            });
        }
        match self.stack.last_mut() {
            Some(parent) => parent.append_child(node),
            None => {
                self.root = Some(node);
                self.done = true;
            }
        }
        Ok(())
    }

    /// True once the root element has closed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of currently open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Takes the finished tree. Returns `None` before completion and on every
    /// call after the first.
    pub fn take_root(&mut self) -> Option<Entity> {
        self.root.take()
    }

    fn charge(&mut self, size: usize) -> Result<(), BuildError> {
        self.bytes = self.bytes.saturating_add(size);
        if self.bytes > self.max_bytes {
            return Err(BuildError::TooLarge {
                max_bytes: self.max_bytes,
            });
        }
        Ok(())
    }
}

impl ElementEvents for TreeBuilder {
    fn element_open(
        &mut self,
        name: &str,
        attributes: Vec<(String, String)>,
    ) -> Result<(), CommandError> {
        Ok(self.on_open(name, attributes)?)
    }

    fn element_text(&mut self, text: &str) -> Result<(), CommandError> {
        Ok(self.on_text(text)?)
    }

    fn element_close(&mut self, name: &str) -> Result<(), CommandError> {
        Ok(self.on_close(name)?)
    }
}
