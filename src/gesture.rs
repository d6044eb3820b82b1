//! Swipe-left-to-dismiss recognition for the headline card.
//!
//! Mouse and touch input are reduced to [`PointerSample`]s before they get
//! here, so the recognizer only sees positions.

/// Farthest the card follows the pointer to the left.
pub const MAX_DRAG: f32 = 120.0;
/// Release must travel strictly further left than this to dismiss.
pub const DISMISS_DISTANCE: f32 = 90.0;
const ROTATION_DIVISOR: f32 = 18.0;
const FADE_DISTANCE: f32 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSample {
    pub x: f32,
    pub y: f32,
}

impl PointerSample {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// How the card should be drawn while it is being dragged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeFeedback {
    pub translation: f32,
    pub rotation_deg: f32,
    pub opacity: f32,
}

impl SwipeFeedback {
    pub const NEUTRAL: SwipeFeedback = SwipeFeedback {
        translation: 0.0,
        rotation_deg: 0.0,
        opacity: 1.0,
    };

    fn for_offset(dx: f32) -> Self {
        let t = dx.clamp(-MAX_DRAG, 0.0);
        Self {
            translation: t,
            rotation_deg: t / ROTATION_DIVISOR,
            opacity: 1.0 - t.abs() / FADE_DISTANCE,
        }
    }
}

impl Default for SwipeFeedback {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SwipeOutcome {
    Dismiss,
    SnapBack,
}

#[derive(Debug, Default)]
pub struct SwipeRecognizer {
    start: Option<PointerSample>,
}

impl SwipeRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_tracking(&self) -> bool {
        self.start.is_some()
    }

    pub fn down(&mut self, sample: PointerSample) {
        self.start = Some(sample);
    }

    /// `None` when nothing is tracked or the motion reads as a vertical scroll.
    pub fn moved(&mut self, sample: PointerSample) -> Option<SwipeFeedback> {
        let start = self.start?;
        let dx = sample.x - start.x;
        let dy = sample.y - start.y;
        if dy.abs() > dx.abs() {
            return None;
        }
        Some(SwipeFeedback::for_offset(dx))
    }

    pub fn up(&mut self, sample: PointerSample) -> Option<SwipeOutcome> {
        let start = self.start.take()?;
        let dx = sample.x - start.x;
        if dx < -DISMISS_DISTANCE {
            Some(SwipeOutcome::Dismiss)
        } else {
            Some(SwipeOutcome::SnapBack)
        }
    }

    /// Drops the current sequence without deciding anything.
    pub fn cancel(&mut self) {
        self.start = None;
    }
}
