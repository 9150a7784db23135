use serde::Deserialize;

/// Canvas ids are integers unless the instance is asked for string ids.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum CanvasId {
    Int(i64),
    Str(String),
}

impl CanvasId {
    pub fn to_native(&self) -> String {
        match self {
            CanvasId::Int(i) => i.to_string(),
            CanvasId::Str(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasProfile {
    pub id: CanvasId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasCourse {
    #[serde(default)]
    pub id: Option<CanvasId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasAssignment {
    #[serde(default)]
    pub id: Option<CanvasId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasSubmission {
    #[serde(default)]
    pub id: Option<CanvasId>,
    #[serde(default)]
    pub assignment_id: Option<CanvasId>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub workflow_state: Option<String>,
    #[serde(default)]
    pub assignment: Option<CanvasSubmissionAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasSubmissionAssignment {
    #[serde(default)]
    pub points_possible: Option<f64>,
}
