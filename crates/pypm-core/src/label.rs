use std::cmp::Ordering;

/// Orders free-form labels by the integer spelled by every digit they contain,
/// read in order. `Python39` is 39, `python3.10` is 310, a label without
/// digits is 0.
///
/// This is a presentation heuristic, not version semantics.
pub fn compare_labels(left: &str, right: &str) -> Ordering {
    let left = significant_digits(left);
    let right = significant_digits(right);
    left.len().cmp(&right.len()).then_with(|| left.cmp(&right))
}

/// Stable descending sort by label, so equal labels keep their input order.
pub fn sort_by_label_descending<T, F>(items: &mut [T], label: F)
where
    F: Fn(&T) -> &str,
{
    items.sort_by(|left, right| compare_labels(label(right), label(left)));
}

// Digits with leading zeros removed; comparing by length then lexically is
// integer comparison without overflow.
fn significant_digits(label: &str) -> String {
    let digits = label
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    digits.trim_start_matches('0').to_string()
}
