//! Repetition guard: what was used in the last N days.

use chrono::{DateTime, Duration, Utc};

use crate::models::{HistoryItem, RepetitionWindow};

/// Collect titles, labels and tags of items stamped within `window_days`
/// before `now`.
///
/// Items whose timestamp is missing or malformed are left out of the
/// window; so are items stamped after `now`. Empty strings are never
/// added to the sets. A window reaching past the representable range
/// covers the whole history.
pub fn compute_window(
    items: &[HistoryItem],
    window_days: i64,
    now: DateTime<Utc>,
) -> RepetitionWindow {
    let cutoff = Duration::try_days(window_days)
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut window = RepetitionWindow {
        days: window_days,
        ..Default::default()
    };

    for item in items {
        let Some(ts) = item.timestamp() else {
            continue;
        };
        if ts < cutoff || ts > now {
            continue;
        }
        insert_nonempty(&mut window.titles, &item.title);
        insert_nonempty(&mut window.labels, &item.label);
        for tag in &item.tags {
            insert_nonempty(&mut window.tags, tag);
        }
    }

    window
}

fn insert_nonempty(set: &mut std::collections::BTreeSet<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        set.insert(value.to_string());
    }
}
