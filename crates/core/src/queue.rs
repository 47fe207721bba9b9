use serde_json::Value;

/// Deferred cache mutation produced by an incoming watch frame.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueAction {
    Load { ty: String, body: Value, event: Option<String> },
    Remove { ty: String, id: String, event: Option<String> },
    ForgetType { ty: String },
}

impl QueueAction {
    pub fn ty(&self) -> &str {
        match self {
            QueueAction::Load { ty, .. } | QueueAction::Remove { ty, .. } | QueueAction::ForgetType { ty } => ty,
        }
    }
}
