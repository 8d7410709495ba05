use lifeline_common::models::Call;
use std::collections::HashSet;

/// Keep the first call for each distinct `call_time`
///
/// Input order is preserved. With descending input the survivor of a
/// duplicate group is the first one the backend returned.
pub fn dedupe_by_call_time(calls: Vec<Call>) -> Vec<Call> {
    let mut seen = HashSet::with_capacity(calls.len());
    calls
        .into_iter()
        .filter(|call| seen.insert(call.call_time))
        .collect()
}
