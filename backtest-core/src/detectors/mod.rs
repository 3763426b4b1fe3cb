//! Incremental State: stateful, bar-by-bar, O(1) detectors with a
//! dependency-DAG update order, per TF.

pub mod anchored_vwap;
pub mod atr;
pub mod ema;
pub mod fibonacci;
pub mod fisher;
pub mod rolling_window;
pub mod rsi;
pub mod swing;
pub mod trend;
pub mod vwap;
pub mod zone;

use crate::domain::Bar;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DetectorValue {
    Float(f64),
    Int(i64),
    Enum(i64),
}

impl DetectorValue {
    pub fn as_f64(self) -> f64 {
        match self {
            DetectorValue::Float(f) => f,
            DetectorValue::Int(i) => i as f64,
            DetectorValue::Enum(e) => e as f64,
        }
    }
}

/// A stateful detector updated exactly once per closed bar on its TF.
///
/// `update` receives a `DepContext` so detectors with `depends_on` can read
/// already-updated sibling detectors on the same TF this bar (single
/// threaded, topo-sorted — no aliasing, no locks).
pub trait IncrementalDetector: fmt::Debug {
    fn update(&mut self, bar: &Bar, deps: &DepContext);
    fn get_value(&self, field: &str) -> Option<DetectorValue>;
    fn output_keys(&self) -> &'static [&'static str];
    fn reset(&mut self);
    fn snapshot(&self) -> serde_json::Value;
    fn restore(&mut self, snap: &serde_json::Value);
}

/// Borrowed handle into sibling detectors on the same TF, given to a
/// detector's `update` so it can resolve its `depends_on` references.
pub struct DepContext<'a> {
    state: &'a TfIncrementalState,
}

impl<'a> DepContext<'a> {
    pub fn get(&self, key: &str, field: &str) -> Option<DetectorValue> {
        self.state.get(key, field)
    }
}

/// All detectors declared on one timeframe, topologically ordered.
pub struct TfIncrementalState {
    by_key: HashMap<String, usize>,
    detectors: Vec<RefCell<Box<dyn IncrementalDetector>>>,
    update_order: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct DetectorSpec {
    pub key: String,
    /// `depends_on: {logical_role: key}`
    pub depends_on: HashMap<String, String>,
}

impl TfIncrementalState {
    /// Builds the dependency DAG and its topological update order.
    /// Errors (cycle or missing dependency) are hard construction failures.
    pub fn build(
        specs: &[DetectorSpec],
        mut make: impl FnMut(&str) -> Box<dyn IncrementalDetector>,
    ) -> Result<Self, String> {
        let mut by_key = HashMap::new();
        let mut detectors = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            by_key.insert(spec.key.clone(), i);
            detectors.push(RefCell::new(make(&spec.key)));
        }
        for spec in specs {
            for dep_key in spec.depends_on.values() {
                if !by_key.contains_key(dep_key) {
                    return Err(format!("unresolved dependency '{dep_key}' for '{}'", spec.key));
                }
            }
        }
        let update_order = topo_sort(specs, &by_key)?;
        Ok(Self { by_key, detectors, update_order })
    }

    pub fn update(&self, bar: &Bar) {
        for &i in &self.update_order {
            let deps = DepContext { state: self };
            self.detectors[i].borrow_mut().update(bar, &deps);
        }
    }

    pub fn get(&self, key: &str, field: &str) -> Option<DetectorValue> {
        let idx = *self.by_key.get(key)?;
        self.detectors[idx].borrow().get_value(field)
    }

    /// Every declared detector's every output field, flattened for the
    /// engine to record into `StructureHistory` after a TF's update. Eager
    /// (not iterator-returning) since each field read takes its own short
    /// `RefCell` borrow.
    pub fn all_values(&self) -> Vec<(String, &'static str, Option<f64>)> {
        let mut out = Vec::new();
        for (key, &idx) in &self.by_key {
            let det = self.detectors[idx].borrow();
            for &field in det.output_keys() {
                let v = det.get_value(field).map(|dv| dv.as_f64());
                out.push((key.clone(), field, v));
            }
        }
        out
    }

    pub fn reset_all(&self) {
        for d in &self.detectors {
            d.borrow_mut().reset();
        }
    }

    pub fn snapshot_all(&self) -> HashMap<String, serde_json::Value> {
        self.by_key
            .iter()
            .map(|(k, &i)| (k.clone(), self.detectors[i].borrow().snapshot()))
            .collect()
    }

    pub fn restore_all(&self, snaps: &HashMap<String, serde_json::Value>) {
        for (key, &idx) in &self.by_key {
            if let Some(snap) = snaps.get(key) {
                self.detectors[idx].borrow_mut().restore(snap);
            }
        }
    }
}

fn topo_sort(specs: &[DetectorSpec], by_key: &HashMap<String, usize>) -> Result<Vec<usize>, String> {
    let n = specs.len();
    let mut visited = vec![0u8; n]; // 0 = white, 1 = gray, 2 = black
    let mut order = Vec::with_capacity(n);

    fn visit(
        i: usize,
        specs: &[DetectorSpec],
        by_key: &HashMap<String, usize>,
        visited: &mut Vec<u8>,
        order: &mut Vec<usize>,
        stack: &mut HashSet<usize>,
    ) -> Result<(), String> {
        if visited[i] == 2 {
            return Ok(());
        }
        if visited[i] == 1 || stack.contains(&i) {
            return Err(format!("dependency cycle involving '{}'", specs[i].key));
        }
        visited[i] = 1;
        stack.insert(i);
        for dep_key in specs[i].depends_on.values() {
            let dep_idx = by_key[dep_key];
            visit(dep_idx, specs, by_key, visited, order, stack)?;
        }
        stack.remove(&i);
        visited[i] = 2;
        order.push(i);
        Ok(())
    }

    let mut stack = HashSet::new();
    for i in 0..n {
        visit(i, specs, by_key, &mut visited, &mut order, &mut stack)?;
    }
    Ok(order)
}
