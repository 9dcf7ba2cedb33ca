//! Rolling maximum / minimum over the last W samples.
//!
//! Monotonic-deque design: (insertion index, value) pairs where values are
//! kept in dominance order, giving O(1) amortized updates instead of O(W)
//! rescans.

use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Max,
    Min,
}

/// Shared monotonic-deque implementation.
#[derive(Debug, Clone)]
struct MonotonicWindow {
    kind: Kind,
    window: usize,
    /// Index the next sample will get.
    next_index: u64,
    deque: VecDeque<(u64, f64)>,
}

impl MonotonicWindow {
    fn new(kind: Kind, window: usize) -> Self {
        let window = window.max(1);
        Self {
            kind,
            window,
            next_index: 0,
            deque: VecDeque::with_capacity(window),
        }
    }

    /// `existing` is dominated by `incoming` and can never be the extremum again.
    fn dominated(&self, existing: f64, incoming: f64) -> bool {
        match self.kind {
            Kind::Max => existing <= incoming,
            Kind::Min => existing >= incoming,
        }
    }

    fn add(&mut self, value: f64) {
        while let Some(&(_, back)) = self.deque.back() {
            if self.dominated(back, value) {
                self.deque.pop_back();
            } else {
                break;
            }
        }
        let index = self.next_index;
        self.deque.push_back((index, value));
        self.next_index += 1;

        // Oldest index still inside the window
        let min_index = self.next_index.saturating_sub(self.window as u64);
        while let Some(&(front_index, _)) = self.deque.front() {
            if front_index < min_index {
                self.deque.pop_front();
            } else {
                break;
            }
        }
    }

    fn current(&self) -> Option<f64> {
        self.deque.front().map(|&(_, v)| v)
    }

    fn bars_since(&self) -> Option<usize> {
        self.deque
            .front()
            .map(|&(index, _)| (self.next_index - 1 - index) as usize)
    }

    fn is_ready(&self) -> bool {
        self.next_index >= self.window as u64
    }

    fn clear(&mut self) {
        self.deque.clear();
        self.next_index = 0;
    }
}

macro_rules! rolling_extremum {
    ($name:ident, $kind:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone)]
        pub struct $name {
            inner: MonotonicWindow,
        }

        impl $name {
            /// Create a tracker over the last `window` samples (minimum 1).
            pub fn new(window: usize) -> Self {
                Self {
                    inner: MonotonicWindow::new($kind, window),
                }
            }

            /// Add a sample.
            pub fn add(&mut self, value: f64) {
                self.inner.add(value);
            }

            /// Current extremum over the window, `None` when empty.
            pub fn current(&self) -> Option<f64> {
                self.inner.current()
            }

            /// Bars elapsed since the current extremum was added (0 = newest).
            pub fn bars_since(&self) -> Option<usize> {
                self.inner.bars_since()
            }

            /// True once `window` samples have been added.
            pub fn is_ready(&self) -> bool {
                self.inner.is_ready()
            }

            pub fn window(&self) -> usize {
                self.inner.window
            }

            pub fn clear(&mut self) {
                self.inner.clear();
            }
        }
    };
}

rolling_extremum!(RollingMax, Kind::Max, "Running maximum over the last W samples.");
rolling_extremum!(RollingMin, Kind::Min, "Running minimum over the last W samples.");

impl RollingMax {
    /// Alias used by engines that read the value as a highest-high.
    pub fn current_max(&self) -> Option<f64> {
        self.current()
    }
}

impl RollingMin {
    /// Alias used by engines that read the value as a lowest-low.
    pub fn current_min(&self) -> Option<f64> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy(n: usize) -> Vec<f64> {
        // Deterministic pseudo-random walk with ties
        let mut x = 50.0;
        (0..n)
            .map(|i| {
                let step = ((i * 7919) % 13) as f64 - 6.0;
                x += step * 0.5;
                (x * 2.0_f64).round() / 2.0
            })
            .collect()
    }

    #[test]
    fn test_matches_brute_force() {
        for window in [1, 2, 3, 5, 16] {
            let series = noisy(300);
            let mut max = RollingMax::new(window);
            let mut min = RollingMin::new(window);
            for (i, &x) in series.iter().enumerate() {
                max.add(x);
                min.add(x);
                let start = (i + 1).saturating_sub(window);
                let slice = &series[start..=i];
                let bf_max = slice.iter().cloned().fold(f64::MIN, f64::max);
                let bf_min = slice.iter().cloned().fold(f64::MAX, f64::min);
                assert_eq!(max.current_max(), Some(bf_max));
                assert_eq!(min.current_min(), Some(bf_min));
            }
        }
    }

    #[test]
    fn test_empty_and_ready() {
        let mut max = RollingMax::new(3);
        assert_eq!(max.current(), None);
        assert!(!max.is_ready());
        max.add(1.0);
        max.add(2.0);
        assert!(!max.is_ready());
        max.add(0.5);
        assert!(max.is_ready());
        max.clear();
        assert_eq!(max.current(), None);
    }

    #[test]
    fn test_bars_since() {
        let mut max = RollingMax::new(5);
        for x in [1.0, 5.0, 2.0, 3.0] {
            max.add(x);
        }
        assert_eq!(max.current(), Some(5.0));
        assert_eq!(max.bars_since(), Some(2));

        let mut min = RollingMin::new(5);
        min.add(3.0);
        assert_eq!(min.bars_since(), Some(0));
    }
}
