//! Matches queued `expect_*` assertions against inbound device publishes.
//! Ordering is enforced per interface, not globally: two interfaces can have
//! expectations declared and satisfied in any relative order to each other,
//! but within one interface, matching stays FIFO. Each interface's queue is
//! the same bounded two-slot ring used for stdin command ingestion
//! ([`crate::spsc::SpscQueue`]) — a script realistically never needs to have
//! more than two outstanding expectations in flight on the same interface.

use crate::spsc::SpscQueue;
use astarte_device_core::{objects_equal, ObjectEntry, TypedValue};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Expectation {
    Individual { interface: String, path: String, value: TypedValue },
    Object { interface: String, entries: Vec<ObjectEntry> },
    PropertySet { interface: String, path: String, value: TypedValue },
    PropertyUnset { interface: String, path: String },
}

impl Expectation {
    fn interface(&self) -> &str {
        match self {
            Expectation::Individual { interface, .. }
            | Expectation::Object { interface, .. }
            | Expectation::PropertySet { interface, .. }
            | Expectation::PropertyUnset { interface, .. } => interface,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Observed<'a> {
    Individual { interface: &'a str, path: &'a str, value: &'a TypedValue },
    Object { interface: &'a str, entries: &'a [ObjectEntry] },
    PropertyUnset { interface: &'a str, path: &'a str },
}

impl<'a> Observed<'a> {
    fn interface(&self) -> &'a str {
        match self {
            Observed::Individual { interface, .. }
            | Observed::Object { interface, .. }
            | Observed::PropertyUnset { interface, .. } => interface,
        }
    }
}

/// Per-interface FIFO expectation queues plus the matching logic that
/// drains them as matching events arrive.
#[derive(Default)]
pub struct Matcher {
    pending: HashMap<String, SpscQueue<Expectation>>,
    declared: usize,
    matched: usize,
    failures: Vec<String>,
}

impl Matcher {
    pub fn new() -> Self {
        Matcher::default()
    }

    /// Queues `e` onto its own interface's ring. A script that declares a
    /// third outstanding expectation on the same interface before the first
    /// two have been observed is a script bug, recorded as a failure rather
    /// than silently dropped or panicked on.
    pub fn expect(&mut self, e: Expectation) {
        let queue = self.pending.entry(e.interface().to_string()).or_default();
        if let Err(e) = queue.push(e) {
            self.failures.push(format!(
                "too many outstanding expectations on interface {} (max 2): {e:?}",
                e.interface()
            ));
            return;
        }
        self.declared += 1;
    }

    /// Checks `observed` against the head of its interface's queue. A
    /// mismatch (wrong shape, wrong data, or nothing expected at all on
    /// that interface) is recorded as a failure rather than panicking, so
    /// the harness can keep draining and report every mismatch at exit.
    pub fn observe(&mut self, observed: Observed<'_>) {
        let expected = match self.pending.get(observed.interface()).and_then(|q| q.pop()) {
            Some(e) => e,
            None => {
                self.failures.push(format!("unexpected data with no pending expectation: {observed:?}"));
                return;
            }
        };
        let matches = match (&expected, &observed) {
            (
                Expectation::Individual { interface: ei, path: ep, value: ev },
                Observed::Individual { interface: oi, path: op, value: ov },
            ) => ei == oi && ep == op && ev == *ov,
            (
                Expectation::Object { interface: ei, entries: ee },
                Observed::Object { interface: oi, entries: oe },
            ) => ei == oi && objects_equal(ee, oe),
            (
                Expectation::PropertySet { interface: ei, path: ep, value: ev },
                Observed::Individual { interface: oi, path: op, value: ov },
            ) => ei == oi && ep == op && ev == *ov,
            (
                Expectation::PropertyUnset { interface: ei, path: ep },
                Observed::PropertyUnset { interface: oi, path: op },
            ) => ei == oi && ep == op,
            _ => false,
        };
        if matches {
            self.matched += 1;
        } else {
            self.failures.push(format!("expected {expected:?}, observed {observed:?}"));
        }
    }

    pub fn failures(&self) -> &[String] {
        &self.failures
    }

    /// True only if every expectation was both declared and matched, with
    /// no leftovers and no recorded mismatches.
    pub fn is_satisfied(&self) -> bool {
        self.matched == self.declared && self.failures.is_empty()
    }

    pub fn outstanding_count(&self) -> usize {
        self.declared - self.matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_individual_in_order() {
        let mut m = Matcher::new();
        m.expect(Expectation::Individual {
            interface: "org.Iface".into(),
            path: "/x".into(),
            value: TypedValue::from_double(1.0),
        });
        m.observe(Observed::Individual {
            interface: "org.Iface",
            path: "/x",
            value: &TypedValue::from_double(1.0),
        });
        assert!(m.is_satisfied());
    }

    #[test]
    fn records_mismatch_without_panicking() {
        let mut m = Matcher::new();
        m.expect(Expectation::Individual {
            interface: "org.Iface".into(),
            path: "/x".into(),
            value: TypedValue::from_double(1.0),
        });
        m.observe(Observed::Individual {
            interface: "org.Iface",
            path: "/x",
            value: &TypedValue::from_double(2.0),
        });
        assert!(!m.is_satisfied());
        assert_eq!(m.failures().len(), 1);
    }

    #[test]
    fn unmatched_expectation_leaves_queue_nonempty() {
        let mut m = Matcher::new();
        m.expect(Expectation::PropertyUnset {
            interface: "org.Iface".into(),
            path: "/x".into(),
        });
        assert_eq!(m.outstanding_count(), 1);
        assert!(!m.is_satisfied());
    }

    #[test]
    fn ordering_holds_per_interface_independently() {
        let mut m = Matcher::new();
        m.expect(Expectation::Individual {
            interface: "org.A".into(),
            path: "/x".into(),
            value: TypedValue::from_double(1.0),
        });
        m.expect(Expectation::Individual {
            interface: "org.B".into(),
            path: "/y".into(),
            value: TypedValue::from_double(2.0),
        });
        // Observe B before A: each interface's own FIFO is independent, so
        // this is not a mismatch.
        m.observe(Observed::Individual { interface: "org.B", path: "/y", value: &TypedValue::from_double(2.0) });
        m.observe(Observed::Individual { interface: "org.A", path: "/x", value: &TypedValue::from_double(1.0) });
        assert!(m.is_satisfied());
    }

    #[test]
    fn third_outstanding_expectation_on_one_interface_is_rejected() {
        let mut m = Matcher::new();
        for i in 0..3 {
            m.expect(Expectation::Individual {
                interface: "org.A".into(),
                path: "/x".into(),
                value: TypedValue::from_double(i as f64),
            });
        }
        assert_eq!(m.failures().len(), 1);
    }
}
