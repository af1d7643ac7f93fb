// Copyright (c) 2024 Mike Tsao. All rights reserved.

//! Named, mutually exclusive interpolations over wall-clock time.
//!
//! A [TransitionScheduler] sweeps a scalar from one value to another over a
//! duration, reporting each intermediate value to a progress callback. At most
//! one transition per target name runs at a time; asking for another on a
//! busy target is a no-op. Chains (ramp up, then back down) are built by
//! starting the next leg from the completion callback, which receives the
//! scheduler for exactly that purpose.

use derivative::Derivative;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};
use strum_macros::{Display, EnumIter};

/// Receives each intermediate value.
pub type ProgressFn = Box<dyn FnMut(f64) + Send>;

/// Runs once when a transition finishes. The target is already free again, so
/// it may start a follow-up on the same target.
pub type CompleteFn = Box<dyn FnOnce(&mut TransitionScheduler) + Send>;

/// Shapes progress through a transition.
#[derive(Clone, Copy, Debug, Default, Display, EnumIter, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    #[allow(missing_docs)]
    #[default]
    Linear,
    #[allow(missing_docs)]
    QuadraticIn,
    #[allow(missing_docs)]
    QuadraticOut,
    #[allow(missing_docs)]
    QuadraticInOut,
    #[allow(missing_docs)]
    SineInOut,
}
impl Easing {
    /// Maps linear progress (0..=1) to eased progress (0..=1).
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::Linear => t,
            Easing::QuadraticIn => t * t,
            Easing::QuadraticOut => t * (2.0 - t),
            Easing::QuadraticInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::SineInOut => 0.5 * (1.0 - (std::f64::consts::PI * t).cos()),
        }
    }
}

/// One interpolation's state.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Unique per parameter family, e.g. `master-filter`.
    pub target: String,
    #[allow(missing_docs)]
    pub from: f64,
    #[allow(missing_docs)]
    pub to: f64,
    #[allow(missing_docs)]
    pub duration: Duration,
    #[allow(missing_docs)]
    pub started_at: Instant,
    #[allow(missing_docs)]
    pub easing: Easing,
    /// False once the transition has completed.
    pub active: bool,
}
impl Transition {
    /// Fraction of the duration elapsed at `now`, clamped to 0..=1.
    pub fn progress_at(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started_at);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    /// The interpolated value at `now`.
    pub fn value_at(&self, now: Instant) -> f64 {
        self.from + (self.to - self.from) * self.easing.apply(self.progress_at(now))
    }

    #[allow(missing_docs)]
    pub fn is_finished_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.duration
    }
}

/// Everything needed to start a transition.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct TransitionRequest {
    target: String,
    from: f64,
    to: f64,
    duration: Duration,
    easing: Easing,
    #[derivative(Debug = "ignore")]
    on_progress: Option<ProgressFn>,
    #[derivative(Debug = "ignore")]
    on_complete: Option<CompleteFn>,
}
impl TransitionRequest {
    #[allow(missing_docs)]
    pub fn new(target: impl Into<String>, from: f64, to: f64, duration: Duration) -> Self {
        Self {
            target: target.into(),
            from,
            to,
            duration,
            easing: Easing::default(),
            on_progress: None,
            on_complete: None,
        }
    }

    #[allow(missing_docs)]
    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    #[allow(missing_docs)]
    pub fn on_progress(mut self, f: impl FnMut(f64) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    #[allow(missing_docs)]
    pub fn on_complete(mut self, f: impl FnOnce(&mut TransitionScheduler) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    #[allow(missing_docs)]
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Running {
    transition: Transition,
    #[derivative(Debug = "ignore")]
    on_progress: Option<ProgressFn>,
    #[derivative(Debug = "ignore")]
    on_complete: Option<CompleteFn>,
}

/// Runs transitions, at most one per target. Drive it by calling
/// [TransitionScheduler::update()] on a fast periodic tick.
#[derive(Debug, Default)]
pub struct TransitionScheduler {
    running: BTreeMap<String, Running>,
}
impl TransitionScheduler {
    /// Starts a transition now. See [TransitionScheduler::start_at()].
    pub fn start(&mut self, request: TransitionRequest) -> bool {
        self.start_at(Instant::now(), request)
    }

    /// Starts a transition at `now`. Returns false, and does nothing else, if
    /// the target already has an active transition.
    pub fn start_at(&mut self, now: Instant, request: TransitionRequest) -> bool {
        if self.running.contains_key(&request.target) {
            log::info!("Already running a transition on {}", request.target);
            return false;
        }
        log::debug!(
            "Starting {}: {:.2} -> {:.2} over {:?}",
            request.target,
            request.from,
            request.to,
            request.duration
        );
        let transition = Transition {
            target: request.target.clone(),
            from: request.from,
            to: request.to,
            duration: request.duration,
            started_at: now,
            easing: request.easing,
            active: true,
        };
        self.running.insert(
            request.target,
            Running {
                transition,
                on_progress: request.on_progress,
                on_complete: request.on_complete,
            },
        );
        true
    }

    /// Advances every active transition to `now`, reporting progress, then
    /// retires the finished ones and runs their completion callbacks.
    pub fn update(&mut self, now: Instant) {
        let mut finished = Vec::default();
        for (target, running) in self.running.iter_mut() {
            let value = running.transition.value_at(now);
            log::trace!("{target}: {value:.2}");
            if let Some(on_progress) = running.on_progress.as_mut() {
                on_progress(value);
            }
            if running.transition.is_finished_at(now) {
                finished.push(target.clone());
            }
        }

        for target in finished {
            if let Some(mut running) = self.running.remove(&target) {
                running.transition.active = false;
                log::debug!("Finished {target}");
                if let Some(on_complete) = running.on_complete.take() {
                    on_complete(self);
                }
            }
        }
    }

    /// Whether `target` has an active transition.
    pub fn is_active(&self, target: &str) -> bool {
        self.running.contains_key(target)
    }

    /// The active transition for `target`, if any.
    pub fn transition(&self, target: &str) -> Option<&Transition> {
        self.running.get(target).map(|r| &r.transition)
    }

    /// Names of all busy targets, in order.
    pub fn active_targets(&self) -> impl Iterator<Item = &str> {
        self.running.keys().map(String::as_str)
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }
}
