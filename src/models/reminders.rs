use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    pub sent: bool,
    pub count: usize,
}

impl SweepSummary {
    pub fn new(count: usize) -> Self {
        Self {
            sent: count > 0,
            count,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ForcedNotification {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TestNotification {
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
