//! Graph Editor Controller
//!
//! Owns the live node/edge collections for one open mind map and mediates
//! every mutation. The rendering layer dispatches `(id, event)` messages to
//! the controller; no callbacks are ever stored inside the document model,
//! so the persisted projection is a pure function of the live state.

use crate::error::{Error, Result};
use crate::types::{Edge, EdgeStyle, MindMapDoc, Node, NodeRecord, Position};
use chrono::Utc;
use rand::Rng;

/// Visible canvas region new nodes are scattered into.
const SPAWN_EXTENT: f64 = 250.0;

/// A label prompt in flight: either a new connection awaiting its label or
/// an existing edge being relabeled. Mutually exclusive; committing or
/// cancelling clears it.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEdit {
    Connect { source: String, target: String },
    Relabel { edge_id: String },
}

/// What a canvas click resolved to, for the caller to open the matching
/// affordance (or nothing, when delete mode consumed the click).
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    Deleted,
    EditNode(String),
    EditEdge(String),
}

/// Live editing state for one open mind map document.
#[derive(Debug, Default)]
pub struct GraphEditor {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    delete_mode: bool,
    pending: Option<PendingEdit>,
}

impl GraphEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace live state with the document's nodes and edges.
    pub fn load(&mut self, doc: &MindMapDoc) {
        self.nodes = doc.nodes.iter().map(NodeRecord::to_node).collect();
        self.edges = doc.edges.clone();
        self.delete_mode = false;
        self.pending = None;
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn delete_mode(&self) -> bool {
        self.delete_mode
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    /// Append a fresh node with a time-based id, default label and colors,
    /// and a randomized position inside the visible canvas. Returns the id.
    pub fn add_node(&mut self) -> String {
        let mut candidate = Utc::now().timestamp_millis();
        while self.nodes.iter().any(|n| n.id == candidate.to_string()) {
            candidate += 1;
        }
        let id = candidate.to_string();

        let mut rng = rand::thread_rng();
        let position = Position {
            x: rng.gen_range(0.0..SPAWN_EXTENT),
            y: rng.gen_range(0.0..SPAWN_EXTENT),
        };
        self.nodes.push(Node::new(&id, "New Node", position));
        id
    }

    /// In-place label replace. Empty labels are allowed pending save.
    pub fn update_node_label(&mut self, id: &str, label: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        node.label = label.to_string();
        Ok(())
    }

    pub fn update_node_colors(&mut self, id: &str, bg: &str, border: &str) -> Result<()> {
        let node = self.node_mut(id)?;
        node.bg_color = bg.to_string();
        node.border_color = border.to_string();
        Ok(())
    }

    /// Move a node (drag interaction).
    pub fn update_node_position(&mut self, id: &str, position: Position) -> Result<()> {
        let node = self.node_mut(id)?;
        node.position = position;
        Ok(())
    }

    /// Remove a node together with every edge incident to it.
    ///
    /// Cascade deletion is a controller invariant: the live graph never
    /// holds an edge whose endpoint is gone.
    pub fn delete_node(&mut self, id: &str) -> Result<()> {
        let before = self.nodes.len();
        self.nodes.retain(|n| n.id != id);
        if self.nodes.len() == before {
            return Err(Error::NotFound(format!("node {}", id)));
        }
        self.edges.retain(|e| e.source != id && e.target != id);
        Ok(())
    }

    /// Start connecting two nodes; commits once the label prompt resolves.
    pub fn begin_connect(&mut self, source: &str, target: &str) -> Result<()> {
        if !self.nodes.iter().any(|n| n.id == source) {
            return Err(Error::Validation(format!("unknown source node {}", source)));
        }
        if !self.nodes.iter().any(|n| n.id == target) {
            return Err(Error::Validation(format!("unknown target node {}", target)));
        }
        self.pending = Some(PendingEdit::Connect {
            source: source.to_string(),
            target: target.to_string(),
        });
        Ok(())
    }

    /// Start relabeling an existing edge through the same prompt step.
    pub fn begin_relabel(&mut self, edge_id: &str) -> Result<()> {
        if !self.edges.iter().any(|e| e.id == edge_id) {
            return Err(Error::NotFound(format!("edge {}", edge_id)));
        }
        self.pending = Some(PendingEdit::Relabel {
            edge_id: edge_id.to_string(),
        });
        Ok(())
    }

    /// Resolve the pending label prompt. For a connection this appends the
    /// new edge (label empty if none was given); for a relabel it replaces
    /// the edge's label in place. Returns the affected edge id.
    pub fn commit_label(&mut self, label: &str) -> Result<String> {
        match self.pending.take() {
            Some(PendingEdit::Connect { source, target }) => {
                let id = self.fresh_edge_id(&source, &target);
                self.edges.push(Edge {
                    id: id.clone(),
                    source,
                    target,
                    label: label.to_string(),
                    style: EdgeStyle::default(),
                });
                Ok(id)
            }
            Some(PendingEdit::Relabel { edge_id }) => {
                let edge = self
                    .edges
                    .iter_mut()
                    .find(|e| e.id == edge_id)
                    .ok_or_else(|| Error::NotFound(format!("edge {}", edge_id)))?;
                edge.label = label.to_string();
                Ok(edge_id)
            }
            None => Err(Error::Validation("no pending edge edit".to_string())),
        }
    }

    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    pub fn delete_edge(&mut self, id: &str) -> Result<()> {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        if self.edges.len() == before {
            return Err(Error::NotFound(format!("edge {}", id)));
        }
        Ok(())
    }

    /// Flip the modal delete-mode interaction. While active, clicks delete
    /// instead of opening edit affordances.
    pub fn toggle_delete_mode(&mut self) -> bool {
        self.delete_mode = !self.delete_mode;
        self.delete_mode
    }

    pub fn click_node(&mut self, id: &str) -> Result<ClickOutcome> {
        if self.delete_mode {
            self.delete_node(id)?;
            Ok(ClickOutcome::Deleted)
        } else {
            Ok(ClickOutcome::EditNode(id.to_string()))
        }
    }

    pub fn click_edge(&mut self, id: &str) -> Result<ClickOutcome> {
        if self.delete_mode {
            self.delete_edge(id)?;
            Ok(ClickOutcome::Deleted)
        } else {
            self.begin_relabel(id)?;
            Ok(ClickOutcome::EditEdge(id.to_string()))
        }
    }

    /// Project the live collections to the minimal persisted shape.
    ///
    /// Pure and idempotent: unchanged live state always yields identical
    /// output, and `load` followed by `sanitize_for_save` round-trips.
    pub fn sanitize_for_save(&self) -> (Vec<NodeRecord>, Vec<Edge>) {
        let nodes = self.nodes.iter().map(NodeRecord::from_node).collect();
        (nodes, self.edges.clone())
    }

    /// Write the sanitized projection into a document, leaving its other
    /// fields untouched.
    pub fn apply_to(&self, doc: &mut MindMapDoc) {
        let (nodes, edges) = self.sanitize_for_save();
        doc.nodes = nodes;
        doc.edges = edges;
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::NotFound(format!("node {}", id)))
    }

    /// Edge id derived from the endpoints and a creation timestamp, bumped
    /// until unique so repeated connections within one millisecond still
    /// get distinct ids.
    fn fresh_edge_id(&self, source: &str, target: &str) -> String {
        let mut ts = Utc::now().timestamp_millis();
        loop {
            let id = format!("e{}-{}-{}", source, target, ts);
            if !self.edges.iter().any(|e| e.id == id) {
                return id;
            }
            ts += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_BG_COLOR;

    fn editor_with_nodes(count: usize) -> (GraphEditor, Vec<String>) {
        let mut editor = GraphEditor::new();
        let ids: Vec<String> = (0..count).map(|_| editor.add_node()).collect();
        (editor, ids)
    }

    #[test]
    fn test_add_node_defaults() {
        let (editor, ids) = editor_with_nodes(1);
        let node = &editor.nodes()[0];
        assert_eq!(node.id, ids[0]);
        assert_eq!(node.label, "New Node");
        assert_eq!(node.bg_color, DEFAULT_BG_COLOR);
        assert!(node.position.x >= 0.0 && node.position.x < 250.0);
        assert!(node.position.y >= 0.0 && node.position.y < 250.0);
    }

    #[test]
    fn test_add_node_ids_unique_within_one_millisecond() {
        let mut editor = GraphEditor::new();
        let ids: Vec<String> = (0..50).map(|_| editor.add_node()).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_connect_commits_one_edge_per_call() {
        let (mut editor, ids) = editor_with_nodes(2);
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        let first = editor.commit_label("causes").unwrap();
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        let second = editor.commit_label("").unwrap();

        // Multi-edges between the same pair are allowed, distinguished by id.
        assert_eq!(editor.edges().len(), 2);
        assert_ne!(first, second);
        assert_eq!(editor.edges()[0].label, "causes");
        assert_eq!(editor.edges()[1].label, "");
        assert_eq!(editor.edges()[1].style, EdgeStyle::default());
    }

    #[test]
    fn test_connect_rejects_unknown_endpoint() {
        let (mut editor, ids) = editor_with_nodes(1);
        let err = editor.begin_connect(&ids[0], "missing").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(editor.pending().is_none());
    }

    #[test]
    fn test_commit_without_pending_fails() {
        let mut editor = GraphEditor::new();
        assert!(matches!(
            editor.commit_label("x"),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_relabel_edge() {
        let (mut editor, ids) = editor_with_nodes(2);
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        let edge_id = editor.commit_label("old").unwrap();

        editor.begin_relabel(&edge_id).unwrap();
        editor.commit_label("new").unwrap();
        assert_eq!(editor.edges()[0].label, "new");
        assert_eq!(editor.edges().len(), 1);
    }

    #[test]
    fn test_delete_node_cascades_incident_edges() {
        let (mut editor, ids) = editor_with_nodes(3);
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        editor.commit_label("").unwrap();
        editor.begin_connect(&ids[1], &ids[2]).unwrap();
        editor.commit_label("").unwrap();
        editor.begin_connect(&ids[0], &ids[2]).unwrap();
        editor.commit_label("").unwrap();

        editor.delete_node(&ids[1]).unwrap();

        // Both edges touching the deleted node are gone; the third survives.
        assert_eq!(editor.nodes().len(), 2);
        assert_eq!(editor.edges().len(), 1);
        assert_eq!(editor.edges()[0].source, ids[0]);
        assert_eq!(editor.edges()[0].target, ids[2]);
    }

    #[test]
    fn test_delete_mode_clicks() {
        let (mut editor, ids) = editor_with_nodes(2);
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        let edge_id = editor.commit_label("").unwrap();

        // Without delete mode a click opens the edit affordance.
        assert_eq!(
            editor.click_node(&ids[0]).unwrap(),
            ClickOutcome::EditNode(ids[0].clone())
        );
        assert_eq!(
            editor.click_edge(&edge_id).unwrap(),
            ClickOutcome::EditEdge(edge_id.clone())
        );
        editor.cancel_pending();

        assert!(editor.toggle_delete_mode());
        assert_eq!(editor.click_edge(&edge_id).unwrap(), ClickOutcome::Deleted);
        assert_eq!(editor.click_node(&ids[0]).unwrap(), ClickOutcome::Deleted);
        assert_eq!(editor.nodes().len(), 1);
        assert!(editor.edges().is_empty());
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let (mut editor, ids) = editor_with_nodes(2);
        editor.update_node_label(&ids[0], "Cells").unwrap();
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        editor.commit_label("contain").unwrap();

        let first = editor.sanitize_for_save();
        let second = editor.sanitize_for_save();
        assert_eq!(first, second);
    }

    #[test]
    fn test_load_then_sanitize_round_trips() {
        let (mut editor, ids) = editor_with_nodes(2);
        editor.update_node_label(&ids[0], "Mitosis").unwrap();
        editor
            .update_node_colors(&ids[1], "#ffcc00", "#333333")
            .unwrap();
        editor.begin_connect(&ids[0], &ids[1]).unwrap();
        editor.commit_label("precedes").unwrap();

        let mut doc = MindMapDoc::new("Biology");
        editor.apply_to(&mut doc);

        let mut reloaded = GraphEditor::new();
        reloaded.load(&doc);
        assert_eq!(reloaded.sanitize_for_save(), (doc.nodes.clone(), doc.edges.clone()));
    }

    #[test]
    fn test_update_node_events_address_the_right_node() {
        let (mut editor, ids) = editor_with_nodes(3);
        editor.update_node_label(&ids[1], "middle").unwrap();
        editor
            .update_node_colors(&ids[2], "#112233", "#445566")
            .unwrap();

        assert_eq!(editor.nodes()[0].label, "New Node");
        assert_eq!(editor.nodes()[1].label, "middle");
        assert_eq!(editor.nodes()[2].bg_color, "#112233");
        assert_eq!(editor.nodes()[0].bg_color, DEFAULT_BG_COLOR);
    }
}
