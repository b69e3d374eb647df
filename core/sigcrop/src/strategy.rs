use crate::buffer::IntensityBuffer;
use crate::cancel::CancelToken;
use crate::error::SigCropError;
use crate::geometry::BoundingBox;
use crate::trace::Attempt;

/// Decision of a single detection stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Use this box; later stages are skipped.
    Accept {
        /// Detected signature bounds.
        bounds: BoundingBox,
        /// Threshold of the accepting attempt, if any.
        threshold: Option<u8>,
    },
    /// Hand over to the next stage.
    Escalate,
    /// Stop the chain and use the whole image.
    WholeImage,
}

/// A stage's verdict plus the attempts that led to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Final decision.
    pub verdict: Verdict,
    /// Attempts in execution order.
    pub attempts: Vec<Attempt>,
}

impl Detection {
    pub(crate) fn new(verdict: Verdict, attempts: Vec<Attempt>) -> Self {
        Self { verdict, attempts }
    }

    /// The accepted box, if the stage accepted one.
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self.verdict {
            Verdict::Accept { bounds, .. } => Some(bounds),
            _ => None,
        }
    }
}

/// One stage of the escalation chain.
///
/// Implementations must be pure with respect to the buffer: the same input
/// always produces the same verdict. Custom strategies can be plugged in with
/// [`crate::SignatureCropper::strategies`].
pub trait DetectionStrategy: Send + Sync {
    /// Stable name recorded in the trace.
    fn name(&self) -> &'static str;

    /// Inspect `buffer` and decide. Long scans should poll `cancel`.
    fn detect(
        &self,
        buffer: &IntensityBuffer<'_>,
        cancel: &CancelToken,
    ) -> Result<Detection, SigCropError>;
}
