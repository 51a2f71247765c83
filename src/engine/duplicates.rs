use std::collections::HashMap;

use serde::Serialize;

use crate::engine::sheet::SheetRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateSummary {
    pub duplicate_groups: usize,
    pub duplicate_records: usize,
    pub records_without_combined_id: usize,
}

pub fn detect_duplicates(records: &mut [SheetRecord]) -> DuplicateSummary {
    let mut group_sizes = HashMap::<String, usize>::new();
    let mut summary = DuplicateSummary::default();

    let keys = records
        .iter()
        .map(SheetRecord::combined_id)
        .collect::<Vec<Option<String>>>();

    for key in keys.iter().flatten() {
        *group_sizes.entry(key.clone()).or_default() += 1;
    }

    for (record, key) in records.iter_mut().zip(keys.iter()) {
        let size = key
            .as_ref()
            .and_then(|key| group_sizes.get(key))
            .copied()
            .unwrap_or(1);

        if key.is_none() {
            summary.records_without_combined_id += 1;
        }

        record.is_duplicate = size > 1;
        record.duplicate_count = size;
        if record.is_duplicate {
            summary.duplicate_records += 1;
        }
    }

    summary.duplicate_groups = group_sizes.values().filter(|size| **size > 1).count();
    summary
}

pub fn review_order(records: &mut [SheetRecord]) {
    records.sort_by_key(review_bucket);
}

fn review_bucket(record: &SheetRecord) -> u8 {
    if record.is_duplicate {
        0
    } else if record.is_error_only() {
        1
    } else {
        2
    }
}
