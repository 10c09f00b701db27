//! Move tree data structure for representing chess games with variations.
//!
//! Each [`MoveNode`] holds one line of play: a sequence of moves starting
//! from an anchor position, a cursor into that sequence and the variations
//! branching off it. All nodes live in the [`MoveTree`] arena and refer to
//! each other by [`MoveNodeId`]; a child's link to its parent is just another
//! id, so ownership stays strictly top-down.
//!
//! This is a pure domain module with no I/O.

use std::collections::BTreeMap;

use shakmaty::{Chess, Position};

use crate::domain::chess::ChessMove;
use crate::error::GameError;

/// Unique identifier for a node in the move tree
pub type MoveNodeId = usize;

/// Where a variation leaves its parent line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BranchPoint {
    /// The line this variation branches from
    pub parent: MoveNodeId,
    /// Index of the parent move after which the variation starts, or `None`
    /// when it starts before the parent's first move
    pub after: Option<usize>,
}

/// One line of the variation tree
#[derive(Clone, Debug)]
pub struct MoveNode {
    id: MoveNodeId,
    branch: Option<BranchPoint>,
    /// Board state before `main_line[0]`
    anchor: Chess,
    main_line: Vec<ChessMove>,
    /// At most one variation per cursor slot; `None` is the slot before the first move
    variations: BTreeMap<Option<usize>, MoveNodeId>,
    /// Index of the last played move, `None` before the first one
    cursor: Option<usize>,
}

impl MoveNode {
    fn new(id: MoveNodeId, branch: Option<BranchPoint>, anchor: Chess) -> Self {
        Self {
            id,
            branch,
            anchor,
            main_line: Vec::new(),
            variations: BTreeMap::new(),
            cursor: None,
        }
    }

    pub fn id(&self) -> MoveNodeId {
        self.id
    }

    /// Parent line, `None` for the root
    pub fn parent(&self) -> Option<MoveNodeId> {
        self.branch.map(|b| b.parent)
    }

    pub fn branch_point(&self) -> Option<BranchPoint> {
        self.branch
    }

    pub fn is_root(&self) -> bool {
        self.branch.is_none()
    }

    pub fn anchor(&self) -> &Chess {
        &self.anchor
    }

    pub fn main_line(&self) -> &[ChessMove] {
        &self.main_line
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.main_line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.main_line.is_empty()
    }

    fn next_index(&self) -> usize {
        self.cursor.map_or(0, |c| c + 1)
    }

    /// Step forward along the line. Returns the move now under the cursor,
    /// or `None` (leaving the cursor alone) at the end of the line.
    pub fn advance(&mut self) -> Option<ChessMove> {
        let next = self.next_index();
        let mv = *self.main_line.get(next)?;
        self.cursor = Some(next);
        Some(mv)
    }

    /// Step back along the line. Returns the move that was under the cursor,
    /// or `None` when already before the first move.
    pub fn retreat(&mut self) -> Option<ChessMove> {
        let current = self.cursor?;
        self.cursor = current.checked_sub(1);
        Some(self.main_line[current])
    }

    /// The move `advance` would return, without moving
    pub fn peek_next(&self) -> Option<ChessMove> {
        self.main_line.get(self.next_index()).copied()
    }

    /// The move under the cursor
    pub fn current_move(&self) -> Option<ChessMove> {
        self.cursor.map(|c| self.main_line[c])
    }

    /// Record a played move at the end of the line and put the cursor on it.
    /// Repeated calls keep appending.
    pub fn append_move(&mut self, mv: ChessMove) {
        self.main_line.push(mv);
        self.cursor = Some(self.main_line.len() - 1);
    }

    /// Move the cursor before the first move
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    /// Move the cursor onto the last move
    pub fn fast_forward(&mut self) {
        self.cursor = self.main_line.len().checked_sub(1);
    }

    pub fn has_variant_at_cursor(&self) -> bool {
        self.variations.contains_key(&self.cursor)
    }

    /// The variation registered at the cursor slot
    pub fn variation_at_cursor(&self) -> Option<MoveNodeId> {
        self.variation_at(self.cursor)
    }

    pub fn variation_at(&self, after: Option<usize>) -> Option<MoveNodeId> {
        self.variations.get(&after).copied()
    }

    /// Replay the line from its anchor up to and including the cursor move
    pub fn position_at_cursor(&self) -> Result<Chess, GameError> {
        self.position_after(self.next_index())
    }

    /// Replay the first `played` moves of the line from its anchor
    pub fn position_after(&self, played: usize) -> Result<Chess, GameError> {
        let mut position = self.anchor.clone();
        for mv in &self.main_line[..played.min(self.main_line.len())] {
            let m = mv
                .to_legal(&position)
                .ok_or_else(|| GameError::IllegalMove(mv.to_string()))?;
            position = position
                .play(m)
                .map_err(|_| GameError::IllegalMove(mv.to_string()))?;
        }
        Ok(position)
    }
}

/// A tree structure representing a chess game with variations
#[derive(Clone, Debug)]
pub struct MoveTree {
    /// All nodes in the tree, indexed by their ID; the root is always 0
    nodes: Vec<MoveNode>,
}

impl MoveTree {
    pub const ROOT: MoveNodeId = 0;

    /// Create a new tree whose root line starts at the standard position
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    /// Create a new tree whose root line starts at `anchor`
    pub fn from_position(anchor: Chess) -> Self {
        Self {
            nodes: vec![MoveNode::new(Self::ROOT, None, anchor)],
        }
    }

    /// Get a node by ID
    pub fn get(&self, id: MoveNodeId) -> Option<&MoveNode> {
        self.nodes.get(id)
    }

    /// Get a mutable reference to a node by ID
    pub fn get_mut(&mut self, id: MoveNodeId) -> Option<&mut MoveNode> {
        self.nodes.get_mut(id)
    }

    /// Get a node by an ID handed out by this tree.
    ///
    /// Panics on an id from elsewhere; nodes are never removed, so ids
    /// obtained from this tree stay valid.
    pub fn node(&self, id: MoveNodeId) -> &MoveNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: MoveNodeId) -> &mut MoveNode {
        &mut self.nodes[id]
    }

    pub fn root(&self) -> &MoveNode {
        &self.nodes[Self::ROOT]
    }

    /// The variation registered at the cursor slot of `id`
    pub fn descend_into_variation(&self, id: MoveNodeId) -> Option<&MoveNode> {
        let child = self.get(id)?.variation_at_cursor()?;
        self.get(child)
    }

    pub fn ascend_to_parent(&self, id: MoveNodeId) -> Option<&MoveNode> {
        let parent = self.get(id)?.parent()?;
        self.get(parent)
    }

    /// Start a variation at the cursor slot of `id`, beginning with `mv`
    /// played from `anchor`.
    ///
    /// The first variation registered at a slot wins: if one already exists
    /// nothing changes and `None` is returned. Otherwise returns the id of
    /// the new line, whose cursor sits on `mv`.
    pub fn branch_variant(
        &mut self,
        id: MoveNodeId,
        mv: ChessMove,
        anchor: Chess,
    ) -> Option<MoveNodeId> {
        let parent = self.get(id)?;
        if parent.has_variant_at_cursor() {
            log::debug!("variation already present at {:?} of line {id}", parent.cursor);
            return None;
        }
        let after = parent.cursor;

        let new_id = self.nodes.len();
        let mut child = MoveNode::new(new_id, Some(BranchPoint { parent: id, after }), anchor);
        child.append_move(mv);
        self.nodes.push(child);
        self.nodes[id].variations.insert(after, new_id);
        log::debug!("line {new_id} branches from line {id} after {after:?} with {mv}");
        Some(new_id)
    }

    /// Number of lines between `id` and the root
    pub fn depth(&self, id: MoveNodeId) -> usize {
        let mut depth = 0;
        let mut current = self.get(id).and_then(|n| n.parent());
        while let Some(parent) = current {
            depth += 1;
            current = self.get(parent).and_then(|n| n.parent());
        }
        depth
    }

    /// Every move from the root anchor to the cursor of `id`, crossing into
    /// each variation at its branch point
    pub fn path_moves(&self, id: MoveNodeId) -> Vec<ChessMove> {
        let mut segments = Vec::new();
        let Some(node) = self.get(id) else {
            return Vec::new();
        };
        segments.push(&node.main_line[..node.next_index()]);

        let mut branch = node.branch;
        while let Some(BranchPoint { parent, after }) = branch {
            let Some(parent_node) = self.get(parent) else {
                break;
            };
            let upto = after.map_or(0, |a| a + 1);
            segments.push(&parent_node.main_line[..upto]);
            branch = parent_node.branch;
        }

        segments.into_iter().rev().flatten().copied().collect()
    }

    /// Total number of lines, including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if no move has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && self.root().is_empty()
    }
}

impl Default for MoveTree {
    fn default() -> Self {
        Self::new()
    }
}
