//! Element deduplication by ID and by span containment

use crate::elements::{normalize_path, CodeElement};
use ahash::{AHashMap, AHashSet};

/// Drop repeated element IDs, keeping the first occurrence
pub fn deduplicate_by_id(elements: Vec<CodeElement>) -> Vec<CodeElement> {
    let mut seen: AHashSet<String> = AHashSet::new();

    elements
        .into_iter()
        .filter(|element| seen.insert(element.id.clone()))
        .collect()
}

/// Deduplicate by ID, then drop elements nested inside another kept element
///
/// Elements are grouped by (repository, path). Within a group they are
/// visited by containment priority (file, class, function, other), then
/// widest span, then earliest start. An element is dropped when its span is
/// strictly inside the span of an already kept element of the same kind, so
/// a function inside an accumulated file stays while a helper nested in
/// another function of the same file does not.
///
/// # Returns
/// Surviving elements in their original relative order
pub fn deduplicate_elements(elements: Vec<CodeElement>) -> Vec<CodeElement> {
    let elements = deduplicate_by_id(elements);

    let mut groups: AHashMap<(String, String), Vec<usize>> = AHashMap::new();
    for (index, element) in elements.iter().enumerate() {
        groups
            .entry((element.repo.clone(), normalize_path(&element.path)))
            .or_default()
            .push(index);
    }

    let mut keep = vec![false; elements.len()];
    for mut members in groups.into_values() {
        members.sort_by(|&a, &b| {
            let (ea, eb) = (&elements[a], &elements[b]);
            eb.kind
                .containment_priority()
                .cmp(&ea.kind.containment_priority())
                .then_with(|| eb.line_span().cmp(&ea.line_span()))
                .then_with(|| ea.start_line.cmp(&eb.start_line))
        });

        let mut kept: Vec<usize> = Vec::with_capacity(members.len());
        for index in members {
            let candidate = &elements[index];
            let nested = kept
                .iter()
                .any(|&k| strictly_contains(&elements[k], candidate));
            if !nested {
                kept.push(index);
                keep[index] = true;
            }
        }
    }

    elements
        .into_iter()
        .zip(keep)
        .filter_map(|(element, kept)| kept.then_some(element))
        .collect()
}

fn strictly_contains(outer: &CodeElement, inner: &CodeElement) -> bool {
    outer.kind == inner.kind
        && outer.start_line <= inner.start_line
        && inner.end_line <= outer.end_line
        && (outer.start_line, outer.end_line) != (inner.start_line, inner.end_line)
}
