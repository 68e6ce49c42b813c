//! Progress notifications for batch checks.

use crate::types::Phase;

/// Receives progress events while a batch runs.
///
/// `phase` fires once per domain examined in a phase, with `current`
/// counting up to that phase's `total`. `overall` reports how many domains
/// have a final result so far out of the whole batch.
pub trait ProgressReporter {
    fn phase(&mut self, _phase: Phase, _current: usize, _total: usize) {}

    fn overall(&mut self, _processed: usize, _total: usize) {}
}

/// Reporter that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {}

type PhaseFn<'a> = Box<dyn FnMut(Phase, usize, usize) + 'a>;
type OverallFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Reporter built from plain closures.
///
/// ```rust
/// use domain_verify_lib::{Phase, ProgressCallbacks, ProgressReporter};
///
/// let mut seen = Vec::new();
/// {
///     let mut progress = ProgressCallbacks::new()
///         .on_phase(|phase, current, total| seen.push((phase, current, total)));
///     progress.phase(Phase::Dns, 1, 2);
/// }
/// assert_eq!(seen, vec![(Phase::Dns, 1, 2)]);
/// ```
#[derive(Default)]
pub struct ProgressCallbacks<'a> {
    on_phase: Option<PhaseFn<'a>>,
    on_overall: Option<OverallFn<'a>>,
}

impl<'a> ProgressCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_phase<F>(mut self, f: F) -> Self
    where
        F: FnMut(Phase, usize, usize) + 'a,
    {
        self.on_phase = Some(Box::new(f));
        self
    }

    pub fn on_overall<F>(mut self, f: F) -> Self
    where
        F: FnMut(usize, usize) + 'a,
    {
        self.on_overall = Some(Box::new(f));
        self
    }
}

impl ProgressReporter for ProgressCallbacks<'_> {
    fn phase(&mut self, phase: Phase, current: usize, total: usize) {
        if let Some(f) = self.on_phase.as_mut() {
            f(phase, current, total);
        }
    }

    fn overall(&mut self, processed: usize, total: usize) {
        if let Some(f) = self.on_overall.as_mut() {
            f(processed, total);
        }
    }
}
