//! Per-function lexical scope tree.
//!
//! Blocks form a tree rooted at the function's implicit top-level block
//! (id 0). Enter/exit calls are strictly nested; an exit with no matching
//! open block is a contract violation by the caller, not recoverable input.

use crate::location::LocalId;
use crate::sink::Label;

/// Identifier of a block within one function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    /// The function's implicit top-level block.
    pub const ROOT: BlockId = BlockId(0);

    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// One lexical block: parent link, children in declaration order, and the
/// locals declared directly in it (not inherited).
#[derive(Debug)]
pub struct Block {
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
    pub locals: Vec<LocalId>,
    /// Code extent; `None` on the root block, which spans the function.
    pub start: Option<Label>,
    pub end: Option<Label>,
}

/// Arena-backed block tree with the currently-open block stack.
#[derive(Debug)]
pub struct BlockTree {
    blocks: Vec<Block>,
    open: Vec<BlockId>,
}

impl Default for BlockTree {
    fn default() -> Self {
        BlockTree {
            blocks: vec![Block {
                parent: None,
                children: Vec::new(),
                locals: Vec::new(),
                start: None,
                end: None,
            }],
            open: vec![BlockId::ROOT],
        }
    }
}

impl BlockTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The innermost open block.
    #[must_use]
    pub fn current(&self) -> BlockId {
        *self.open.last().unwrap_or(&BlockId::ROOT)
    }

    /// Open a new child of the current block and make it current.
    pub fn enter(&mut self, start: Label) -> BlockId {
        let parent = self.current();
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            parent: Some(parent),
            children: Vec::new(),
            locals: Vec::new(),
            start: Some(start),
            end: None,
        });
        self.blocks[parent.idx()].children.push(id);
        self.open.push(id);
        id
    }

    /// Close the current block and pop to its parent.
    ///
    /// # Panics
    /// Panics when only the root block is open; the caller's nesting
    /// contract was violated.
    pub fn exit(&mut self, end: Label) -> BlockId {
        assert!(
            self.open.len() > 1,
            "block exit without a matching open block"
        );
        let id = self.open.pop().unwrap_or(BlockId::ROOT);
        self.blocks[id.idx()].end = Some(end);
        id
    }

    /// Attach a local to the current block.
    pub fn add_local(&mut self, local: LocalId) {
        let current = self.current();
        self.blocks[current.idx()].locals.push(local);
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.idx()]
    }

    /// Whether every entered block has been exited.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.open.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn enter_exit_is_lifo() {
        let mut tree = BlockTree::new();
        let outer = tree.enter(Label(1));
        let inner = tree.enter(Label(2));
        assert_eq!(tree.current(), inner);
        assert_eq!(tree.exit(Label(3)), inner);
        assert_eq!(tree.current(), outer);
        assert_eq!(tree.exit(Label(4)), outer);
        assert!(tree.is_balanced());
        assert_eq!(tree.block(outer).children, vec![inner]);
        assert_eq!(tree.block(inner).parent, Some(outer));
    }

    #[test]
    fn locals_attach_to_the_current_block() {
        let mut tree = BlockTree::new();
        tree.add_local(LocalId::new(0));
        let b = tree.enter(Label(1));
        tree.add_local(LocalId::new(1));
        tree.exit(Label(2));

        assert_eq!(tree.block(BlockId::ROOT).locals, vec![LocalId::new(0)]);
        assert_eq!(tree.block(b).locals, vec![LocalId::new(1)]);
    }

    #[test]
    #[should_panic(expected = "block exit without a matching open block")]
    fn root_exit_is_a_contract_violation() {
        let mut tree = BlockTree::new();
        tree.exit(Label(1));
    }
}
