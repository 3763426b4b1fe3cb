//! Rule Evaluator: three-valued boolean condition trees over the Snapshot View.

pub mod intent;

pub use intent::{Intent, IntentAction};

use crate::domain::TfRole;
use serde::{Deserialize, Serialize};

/// Three-valued evaluation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonCode {
    MissingValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalResult {
    pub value: Tri,
    pub reason: Option<ReasonCode>,
}

impl EvalResult {
    pub fn is_true(self) -> bool {
        self.value == Tri::True
    }

    fn t() -> Self {
        Self { value: Tri::True, reason: None }
    }

    fn f() -> Self {
        Self { value: Tri::False, reason: None }
    }

    fn f_missing() -> Self {
        Self { value: Tri::False, reason: Some(ReasonCode::MissingValue) }
    }

    fn missing() -> Self {
        Self { value: Tri::Missing, reason: Some(ReasonCode::MissingValue) }
    }
}

/// A value referenced by a `Leaf` condition: a literal, a feature lookup, or
/// an enumerated set (only meaningful for the `In` operator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(f64),
    Feature { id: String, field: String, offset: usize },
    Set(Vec<f64>),
}

impl Value {
    pub fn feature(id: &str) -> Self {
        Value::Feature { id: id.to_string(), field: "value".to_string(), offset: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
    Ne,
    NearPct,
    NearAbs,
    CrossAbove,
    CrossBelow,
    Between,
    In,
}

/// A rule tree node. Parsing happens outside the core; this is the already-
/// validated tree the core consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        lhs: Value,
        op: Op,
        rhs: Value,
        tolerance: Option<f64>,
    },
    /// `between(x, lo, hi)`: encoded as a `Leaf`-like ternary via `rhs = Set([lo, hi])`.
    All(Vec<Node>),
    Any(Vec<Node>),
    Not(Box<Node>),
    HoldsFor { bars: usize, anchor_tf: Option<TfRole>, expr: Box<Node> },
    OccurredWithin { bars: usize, anchor_tf: Option<TfRole>, expr: Box<Node> },
    CountTrue { bars: usize, anchor_tf: Option<TfRole>, expr: Box<Node>, op: Op, value: f64 },
}

/// What the rule evaluator needs from the Snapshot View: resolving a `Value`
/// at an extra historical shift, and whether enough history exists for a
/// window of a given size ending at the current (shifted) bar.
pub trait SnapshotSource {
    fn resolve(&self, value: &Value, extra_offset: usize) -> Option<f64>;
    fn has_history(&self, bars: usize, extra_offset: usize) -> bool;
    /// Converts an `anchor_tf`-denominated bar count into exec-TF bars.
    fn scale_bars(&self, bars: usize, anchor_tf: Option<TfRole>) -> usize;
}

pub fn eval(node: &Node, snap: &dyn SnapshotSource) -> EvalResult {
    eval_shifted(node, snap, 0)
}

fn eval_shifted(node: &Node, snap: &dyn SnapshotSource, shift: usize) -> EvalResult {
    match node {
        Node::Leaf { lhs, op, rhs, tolerance } => eval_leaf(lhs, *op, rhs, *tolerance, snap, shift),
        Node::All(children) => {
            let mut saw_missing = false;
            for child in children {
                let r = eval_shifted(child, snap, shift);
                match r.value {
                    Tri::False => return r,
                    Tri::Missing => saw_missing = true,
                    Tri::True => {}
                }
            }
            if saw_missing { EvalResult::missing() } else { EvalResult::t() }
        }
        Node::Any(children) => {
            let mut saw_missing = false;
            for child in children {
                let r = eval_shifted(child, snap, shift);
                match r.value {
                    Tri::True => return r,
                    Tri::Missing => saw_missing = true,
                    Tri::False => {}
                }
            }
            if saw_missing { EvalResult::missing() } else { EvalResult::f() }
        }
        Node::Not(inner) => {
            let r = eval_shifted(inner, snap, shift);
            match r.value {
                Tri::Missing => EvalResult::f(),
                Tri::True => EvalResult::f(),
                Tri::False => EvalResult::t(),
            }
        }
        Node::HoldsFor { bars, anchor_tf, expr } => {
            let window = snap.scale_bars(*bars, *anchor_tf);
            if window == 0 || !snap.has_history(window, shift) {
                return EvalResult::missing();
            }
            for k in shift..shift + window {
                if !eval_shifted(expr, snap, k).is_true() {
                    return EvalResult::f();
                }
            }
            EvalResult::t()
        }
        Node::OccurredWithin { bars, anchor_tf, expr } => {
            let window = snap.scale_bars(*bars, *anchor_tf);
            if window == 0 || !snap.has_history(window, shift) {
                return EvalResult::missing();
            }
            for k in shift..shift + window {
                if eval_shifted(expr, snap, k).is_true() {
                    return EvalResult::t();
                }
            }
            EvalResult::f()
        }
        Node::CountTrue { bars, anchor_tf, expr, op, value } => {
            let window = snap.scale_bars(*bars, *anchor_tf);
            if window == 0 || !snap.has_history(window, shift) {
                return EvalResult::missing();
            }
            let count = (shift..shift + window)
                .filter(|&k| eval_shifted(expr, snap, k).is_true())
                .count() as f64;
            if compare(count, *op, *value) { EvalResult::t() } else { EvalResult::f() }
        }
    }
}

fn compare(lhs: f64, op: Op, rhs: f64) -> bool {
    match op {
        Op::Gt => lhs > rhs,
        Op::Gte => lhs >= rhs,
        Op::Lt => lhs < rhs,
        Op::Lte => lhs <= rhs,
        Op::Eq => lhs == rhs,
        Op::Ne => lhs != rhs,
        _ => false,
    }
}

fn eval_leaf(
    lhs: &Value,
    op: Op,
    rhs: &Value,
    tolerance: Option<f64>,
    snap: &dyn SnapshotSource,
    shift: usize,
) -> EvalResult {
    match op {
        Op::CrossAbove | Op::CrossBelow => {
            let a_prev = snap.resolve(lhs, shift + 1);
            let a_curr = snap.resolve(lhs, shift);
            let b_prev = snap.resolve(rhs, shift + 1);
            let b_curr = snap.resolve(rhs, shift);
            let (Some(a_prev), Some(a_curr), Some(b_prev), Some(b_curr)) =
                (a_prev, a_curr, b_prev, b_curr)
            else {
                return EvalResult::f_missing();
            };
            let crossed = if op == Op::CrossAbove {
                a_prev <= b_prev && a_curr > b_curr
            } else {
                a_prev >= b_prev && a_curr < b_curr
            };
            if crossed { EvalResult::t() } else { EvalResult::f() }
        }
        Op::Between => {
            let Value::Set(bounds) = rhs else { return EvalResult::f() };
            let (Some(lo), Some(hi)) = (bounds.first(), bounds.get(1)) else {
                return EvalResult::f();
            };
            let Some(x) = snap.resolve(lhs, shift) else { return EvalResult::f_missing() };
            if *lo <= x && x <= *hi { EvalResult::t() } else { EvalResult::f() }
        }
        Op::In => {
            let Value::Set(set) = rhs else { return EvalResult::f() };
            let Some(x) = snap.resolve(lhs, shift) else { return EvalResult::f_missing() };
            if set.iter().any(|v| (*v - x).abs() < f64::EPSILON) {
                EvalResult::t()
            } else {
                EvalResult::f()
            }
        }
        Op::NearPct | Op::NearAbs => {
            let (Some(a), Some(b)) = (snap.resolve(lhs, shift), snap.resolve(rhs, shift)) else {
                return EvalResult::f_missing();
            };
            let tol = tolerance.unwrap_or(0.0);
            let within = if op == Op::NearPct {
                b != 0.0 && (a - b).abs() / b.abs() <= tol
            } else {
                (a - b).abs() <= tol
            };
            if within { EvalResult::t() } else { EvalResult::f() }
        }
        Op::Gt | Op::Gte | Op::Lt | Op::Lte | Op::Eq | Op::Ne => {
            let (Some(a), Some(b)) = (snap.resolve(lhs, shift), snap.resolve(rhs, shift)) else {
                return EvalResult::f_missing();
            };
            if compare(a, op, b) { EvalResult::t() } else { EvalResult::f() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSnapshot {
        series: HashMap<String, Vec<f64>>,
        index: usize,
    }

    impl SnapshotSource for FakeSnapshot {
        fn resolve(&self, value: &Value, extra_offset: usize) -> Option<f64> {
            match value {
                Value::Scalar(x) => Some(*x),
                Value::Set(_) => None,
                Value::Feature { id, offset, .. } => {
                    let series = self.series.get(id)?;
                    let idx = self.index.checked_sub(offset + extra_offset)?;
                    series.get(idx).copied().filter(|v| !v.is_nan())
                }
            }
        }

        fn has_history(&self, bars: usize, extra_offset: usize) -> bool {
            self.index.checked_sub(bars + extra_offset).is_some()
        }

        fn scale_bars(&self, bars: usize, _anchor_tf: Option<TfRole>) -> usize {
            bars
        }
    }

    #[test]
    fn cross_above_detects_crossing() {
        let snap = FakeSnapshot {
            series: HashMap::from([
                ("fast".to_string(), vec![1.0, 2.0, 5.0]),
                ("slow".to_string(), vec![3.0, 3.0, 3.0]),
            ]),
            index: 2,
        };
        let node = Node::Leaf {
            lhs: Value::feature("fast"),
            op: Op::CrossAbove,
            rhs: Value::feature("slow"),
            tolerance: None,
        };
        assert!(eval(&node, &snap).is_true());
    }

    #[test]
    fn missing_operand_is_false_with_reason() {
        let snap = FakeSnapshot { series: HashMap::new(), index: 0 };
        let node = Node::Leaf {
            lhs: Value::feature("ghost"),
            op: Op::Gt,
            rhs: Value::Scalar(0.0),
            tolerance: None,
        };
        let r = eval(&node, &snap);
        assert_eq!(r.value, Tri::False);
        assert_eq!(r.reason, Some(ReasonCode::MissingValue));
    }

    #[test]
    fn not_of_missing_is_false() {
        let snap = FakeSnapshot { series: HashMap::new(), index: 0 };
        let leaf = Node::Leaf {
            lhs: Value::feature("ghost"),
            op: Op::Gt,
            rhs: Value::Scalar(0.0),
            tolerance: None,
        };
        // Force a genuinely Missing child via HoldsFor with insufficient history.
        let holds = Node::HoldsFor { bars: 5, anchor_tf: None, expr: Box::new(leaf) };
        let not_node = Node::Not(Box::new(holds));
        assert_eq!(eval(&not_node, &snap).value, Tri::False);
    }

    #[test]
    fn all_short_circuits_on_false() {
        let snap = FakeSnapshot {
            series: HashMap::from([("x".to_string(), vec![5.0])]),
            index: 0,
        };
        let node = Node::All(vec![
            Node::Leaf { lhs: Value::feature("x"), op: Op::Gt, rhs: Value::Scalar(10.0), tolerance: None },
            Node::Leaf { lhs: Value::feature("x"), op: Op::Gt, rhs: Value::Scalar(0.0), tolerance: None },
        ]);
        assert_eq!(eval(&node, &snap).value, Tri::False);
    }

    #[test]
    fn between_operator() {
        let snap = FakeSnapshot {
            series: HashMap::from([("x".to_string(), vec![5.0])]),
            index: 0,
        };
        let node = Node::Leaf {
            lhs: Value::feature("x"),
            op: Op::Between,
            rhs: Value::Set(vec![0.0, 10.0]),
            tolerance: None,
        };
        assert!(eval(&node, &snap).is_true());
    }
}
