use serde::Serialize;

/// How a stage left the escalation chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageVerdict {
    /// The stage produced the box that was used.
    Accepted,
    /// The stage passed control to the next one.
    Escalated,
    /// The stage ended the chain with the whole-image box.
    WholeImage,
}

/// One threshold or sampling attempt inside a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Intensity threshold used, if the attempt had one.
    pub threshold: Option<u8>,
    /// Whether this attempt satisfied the stage's acceptance test.
    pub accepted: bool,
    /// Human-readable explanation of the decision.
    pub reason: String,
}

impl Attempt {
    pub(crate) fn accepted(threshold: Option<u8>, reason: impl Into<String>) -> Self {
        Self {
            threshold,
            accepted: true,
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(threshold: Option<u8>, reason: impl Into<String>) -> Self {
        Self {
            threshold,
            accepted: false,
            reason: reason.into(),
        }
    }
}

/// Everything one strategy did during a call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Strategy name.
    pub stage: String,
    /// Final decision of the stage.
    pub verdict: StageVerdict,
    /// Attempts in execution order.
    pub attempts: Vec<Attempt>,
}

/// Where the crop box of a result came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CropSource {
    /// A detection stage accepted a box.
    Detected,
    /// No stage isolated a region; the whole image was used.
    WholeImage,
    /// The caller supplied the box.
    Manual,
    /// The call failed before a box was produced.
    #[default]
    Failed,
}

/// Structured record of a detection call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionTrace {
    /// Where the crop box came from.
    pub source: CropSource,
    /// Stages that ran, in order.
    pub stages: Vec<StageRecord>,
    /// Name of the stage whose box was used.
    pub accepted_by: Option<String>,
    /// Threshold of the accepting attempt.
    pub accepted_threshold: Option<u8>,
}

impl DetectionTrace {
    pub(crate) fn manual() -> Self {
        Self {
            source: CropSource::Manual,
            ..Self::default()
        }
    }

    /// Serialize the trace for diagnostics.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
