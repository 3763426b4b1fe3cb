//! Multi-timeframe forward-fill alignment.
//!
//! Higher-TF bars close less often than the exec TF. Between closes their
//! last value is carried forward rather than gapped — this is the mandatory
//! forward-fill rule (§4.2): "between such closes the detector state is
//! frozen and read accessors return the last-closed values".

use crate::domain::Bar;

/// For every exec-TF close timestamp, the index into `higher` of the most
/// recently closed higher-TF bar at or before that timestamp, or `None` if
/// the higher TF has not closed its first bar yet.
pub fn forward_fill_index(exec_close_ts: &[i64], higher: &[Bar]) -> Vec<Option<usize>> {
    let mut out = Vec::with_capacity(exec_close_ts.len());
    let mut cursor = 0usize;
    let mut last_closed: Option<usize> = None;

    for &ts in exec_close_ts {
        while cursor < higher.len() && higher[cursor].ts_close <= ts {
            last_closed = Some(cursor);
            cursor += 1;
        }
        out.push(last_closed);
    }
    out
}

/// True exactly on the exec-TF bars where the higher TF closed a new bar.
pub fn closed_this_bar(forward_fill: &[Option<usize>]) -> Vec<bool> {
    let mut out = Vec::with_capacity(forward_fill.len());
    let mut prev: Option<usize> = None;
    for &idx in forward_fill {
        out.push(idx.is_some() && idx != prev);
        prev = idx;
    }
    out
}
