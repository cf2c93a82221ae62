use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default fill color for a new node.
pub const DEFAULT_BG_COLOR: &str = "#ffffff";
/// Default border/stroke color for nodes and edges.
pub const DEFAULT_BORDER_COLOR: &str = "#000000";
/// Default edge stroke width.
pub const DEFAULT_STROKE_WIDTH: f64 = 1.5;

/// A point in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A labeled, positioned, colorable vertex in a mind map graph.
///
/// `id` never changes after creation; exactly one node with a given id
/// exists in a live graph at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub position: Position,
    pub label: String,
    pub bg_color: String,
    pub border_color: String,
}

impl Node {
    pub fn new(id: &str, label: &str, position: Position) -> Self {
        Self {
            id: id.to_string(),
            position,
            label: label.to_string(),
            bg_color: DEFAULT_BG_COLOR.to_string(),
            border_color: DEFAULT_BORDER_COLOR.to_string(),
        }
    }
}

/// Display part of the persisted node shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub label: String,
    #[serde(default = "default_bg")]
    pub bg_color: String,
    #[serde(default = "default_border")]
    pub border_color: String,
}

fn default_bg() -> String {
    DEFAULT_BG_COLOR.to_string()
}

fn default_border() -> String {
    DEFAULT_BORDER_COLOR.to_string()
}

/// Minimal persisted node shape: editor callbacks never serialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub position: Position,
    pub data: NodeData,
}

impl NodeRecord {
    /// Re-hydrate the live editor shape.
    pub fn to_node(&self) -> Node {
        Node {
            id: self.id.clone(),
            position: self.position,
            label: self.data.label.clone(),
            bg_color: self.data.bg_color.clone(),
            border_color: self.data.border_color.clone(),
        }
    }

    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            node_type: "custom".to_string(),
            position: node.position,
            data: NodeData {
                label: node.label.clone(),
                bg_color: node.bg_color.clone(),
                border_color: node.border_color.clone(),
            },
        }
    }
}

/// Edge stroke styling, defaults black / 1.5.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    pub stroke: String,
    pub stroke_width: f64,
}

impl Default for EdgeStyle {
    fn default() -> Self {
        Self {
            stroke: DEFAULT_BORDER_COLOR.to_string(),
            stroke_width: DEFAULT_STROKE_WIDTH,
        }
    }
}

/// A labeled, styled connection between two nodes.
///
/// `id` embeds source, target and a creation timestamp so repeated
/// connections between the same pair stay distinguishable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub style: EdgeStyle,
}

/// Persisted mind map aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMapDoc {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl MindMapDoc {
    pub fn new(title: &str) -> Self {
        Self {
            id: String::new(),
            title: title.to_string(),
            nodes: Vec::new(),
            edges: Vec::new(),
            tags: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

/// Persisted summary aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDoc {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Question kinds supported on a test paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "Open-Ended", alias = "Open-ended")]
    OpenEnded,
    Other,
}

/// A recorded answer, shaped per question type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    /// Uploaded file answer, stored as `{name, url}` after submit.
    File { name: String, url: String },
    /// Selected option labels for an MCQ.
    Choices(Vec<String>),
    /// Free-text answer.
    Text(String),
}

/// One question on a test paper page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default)]
    pub question_number: String,
    #[serde(rename = "type")]
    pub qtype: QuestionType,
    pub marks: f64,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_answer: Option<Answer>,
}

/// Ordered questions for one page of the paper PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPage {
    pub page: u32,
    pub questions: Vec<Question>,
}

/// Persisted test paper aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPaperDoc {
    #[serde(default)]
    pub id: String,
    pub paper_title: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_url: String,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub questions_by_page: Vec<QuestionPage>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl TestPaperDoc {
    /// All questions in page order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions_by_page.iter().flat_map(|p| p.questions.iter())
    }

    /// Total obtainable marks across every question.
    pub fn total_marks(&self) -> f64 {
        self.questions().map(|q| q.marks).sum()
    }
}

/// One timed run through a test paper.
///
/// Immutable once created except for the single grading pass that sets
/// `scores`, `total_scored` and `graded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptDoc {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub answers: BTreeMap<String, Answer>,
    /// Per-question scores; `Value` because legacy attempts carry raw
    /// numbers, nested `{score}` objects or numeric strings.
    #[serde(default)]
    pub scores: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub total_scored: f64,
    #[serde(default)]
    pub graded: bool,
    /// Wall-clock seconds from session start to submit.
    #[serde(default)]
    pub time_taken: u64,
    pub timestamp: DateTime<Utc>,
}

/// Uniform access the gateway needs over the three persisted kinds.
pub trait StudyDocument:
    Serialize + DeserializeOwned + Clone + Send + Sync + 'static
{
    /// Collection path under the owner, e.g. `mindmaps`.
    fn collection() -> &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn title(&self) -> &str;
    fn set_title(&mut self, title: String);
    fn tags(&self) -> &[String];
    fn tags_mut(&mut self) -> &mut Vec<String>;
    /// Key for descending dashboard ordering.
    fn sort_key(&self) -> DateTime<Utc>;
    fn set_created(&mut self, at: DateTime<Utc>);
}

impl StudyDocument for MindMapDoc {
    fn collection() -> &'static str {
        "mindmaps"
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn set_title(&mut self, title: String) {
        self.title = title;
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn tags_mut(&mut self) -> &mut Vec<String> {
        &mut self.tags
    }
    fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn set_created(&mut self, at: DateTime<Utc>) {
        self.timestamp = at;
    }
}

impl StudyDocument for SummaryDoc {
    fn collection() -> &'static str {
        "summaries"
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn title(&self) -> &str {
        &self.title
    }
    fn set_title(&mut self, title: String) {
        self.title = title;
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn tags_mut(&mut self) -> &mut Vec<String> {
        &mut self.tags
    }
    fn sort_key(&self) -> DateTime<Utc> {
        self.timestamp
    }
    fn set_created(&mut self, at: DateTime<Utc>) {
        self.timestamp = at;
    }
}

impl StudyDocument for TestPaperDoc {
    fn collection() -> &'static str {
        "testpapers"
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn set_id(&mut self, id: String) {
        self.id = id;
    }
    fn title(&self) -> &str {
        &self.paper_title
    }
    fn set_title(&mut self, title: String) {
        self.paper_title = title;
    }
    fn tags(&self) -> &[String] {
        &self.tags
    }
    fn tags_mut(&mut self) -> &mut Vec<String> {
        &mut self.tags
    }
    fn sort_key(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
    fn set_created(&mut self, at: DateTime<Utc>) {
        self.uploaded_at = at;
    }
}
