//! Game navigation over the variation tree.
//!
//! The navigator decides where a played move belongs (replay, existing
//! variation or new variation) and moves the active line pointer for the
//! stepping commands. It never touches a board: every operation reports what
//! the caller has to do to its own live position.

use shakmaty::Chess;

use crate::domain::{ChessMove, MoveNode, MoveNodeId, MoveTree};
use crate::error::GameError;

/// Where a played move ended up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Recorded at the end of the active line
    Appended,
    /// Matched the next recorded move of the active line
    Replayed,
    /// Matched the first move of an existing variation, now active
    EnteredVariation(MoveNodeId),
    /// Started a new variation, now active
    Branched(MoveNodeId),
}

/// What the caller must do to its live board after a navigation command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoardUpdate {
    /// Play this move forward
    Apply(ChessMove),
    /// Take this move back
    Retract(ChessMove),
    /// The active position changed discontinuously; rebuild it from
    /// [`GameNavigator::position`]
    Resync,
    Unchanged,
}

/// Façade over a [`MoveTree`] tracking the active line
#[derive(Clone, Debug)]
pub struct GameNavigator {
    tree: MoveTree,
    current: MoveNodeId,
}

impl GameNavigator {
    pub fn new(start: Chess) -> Self {
        Self {
            tree: MoveTree::from_position(start),
            current: MoveTree::ROOT,
        }
    }

    pub fn tree(&self) -> &MoveTree {
        &self.tree
    }

    pub fn current_id(&self) -> MoveNodeId {
        self.current
    }

    /// The active line
    pub fn current(&self) -> &MoveNode {
        self.node(self.current)
    }

    fn node(&self, id: MoveNodeId) -> &MoveNode {
        self.tree.node(id)
    }

    fn node_mut(&mut self, id: MoveNodeId) -> &mut MoveNode {
        self.tree.node_mut(id)
    }

    /// Record that `mv` was played from `pre_move`, the position the live
    /// board had before the move.
    ///
    /// When the cursor slot already holds a variation that starts with a
    /// different move, the search continues inside that variation from its
    /// start, so the move is never dropped.
    pub fn move_played(&mut self, mv: ChessMove, pre_move: &Chess) -> MoveOutcome {
        let mut entered = None;
        loop {
            let line = self.current;
            match self.node(line).peek_next() {
                None => {
                    self.node_mut(line).append_move(mv);
                    return match entered {
                        Some(id) => MoveOutcome::EnteredVariation(id),
                        None => MoveOutcome::Appended,
                    };
                }
                Some(next) if next == mv => {
                    self.node_mut(line).advance();
                    return match entered {
                        Some(id) => MoveOutcome::EnteredVariation(id),
                        None => MoveOutcome::Replayed,
                    };
                }
                Some(_) => {}
            }

            if let Some(child) = self.node(line).variation_at_cursor() {
                self.node_mut(child).rewind();
                self.current = child;
                entered = Some(child);
                continue;
            }

            // an occupied slot makes the next pass descend into it
            if let Some(child) = self.tree.branch_variant(line, mv, pre_move.clone()) {
                self.current = child;
                return MoveOutcome::Branched(child);
            }
        }
    }

    /// Undo one move, or leave a variation that is already at its start
    pub fn step_backward(&mut self) -> BoardUpdate {
        let line = self.current;
        if let Some(mv) = self.node_mut(line).retreat() {
            return BoardUpdate::Retract(mv);
        }
        match self.node(line).parent() {
            Some(parent) => {
                log::debug!("leaving line {line} for line {parent}");
                self.current = parent;
                BoardUpdate::Resync
            }
            None => BoardUpdate::Unchanged,
        }
    }

    /// Redo one move along the active line
    pub fn step_forward(&mut self) -> BoardUpdate {
        let line = self.current;
        match self.node_mut(line).advance() {
            Some(mv) => BoardUpdate::Apply(mv),
            None => BoardUpdate::Unchanged,
        }
    }

    /// Switch to the variation at the cursor, positioned at its start.
    /// The variation's anchor is the position at the cursor, so the
    /// resynced board shows the same position.
    pub fn enter_variation(&mut self) -> BoardUpdate {
        let Some(child) = self.current().variation_at_cursor() else {
            return BoardUpdate::Unchanged;
        };
        self.node_mut(child).rewind();
        self.current = child;
        BoardUpdate::Resync
    }

    /// Return to the parent line at the point this variation branched off
    pub fn exit_variation(&mut self) -> BoardUpdate {
        let line = self.current;
        let Some(parent) = self.current().parent() else {
            return BoardUpdate::Unchanged;
        };
        self.node_mut(line).rewind();
        self.current = parent;
        BoardUpdate::Resync
    }

    /// Put the cursor before the first move of the active line
    pub fn jump_to_line_start(&mut self) -> BoardUpdate {
        let line = self.current;
        if self.current().cursor().is_none() {
            return BoardUpdate::Unchanged;
        }
        self.node_mut(line).rewind();
        BoardUpdate::Resync
    }

    /// Put the cursor on the last move of the active line
    pub fn jump_to_line_end(&mut self) -> BoardUpdate {
        let line = self.current;
        let node = self.current();
        if node.cursor() == node.len().checked_sub(1) {
            return BoardUpdate::Unchanged;
        }
        self.node_mut(line).fast_forward();
        BoardUpdate::Resync
    }

    /// The position at the cursor of the active line, replayed from the
    /// line's anchor
    pub fn position(&self) -> Result<Chess, GameError> {
        self.current().position_at_cursor()
    }

    /// Moves from the starting position to the active cursor
    pub fn path_moves(&self) -> Vec<ChessMove> {
        self.tree.path_moves(self.current)
    }

    /// Notation for the whole game, variations included
    pub fn notation(&self) -> String {
        self.tree.render(MoveTree::ROOT)
    }

    /// Number of variations between the active line and the root
    pub fn depth(&self) -> usize {
        self.tree.depth(self.current)
    }
}

impl Default for GameNavigator {
    fn default() -> Self {
        Self::new(Chess::default())
    }
}
