//! Type-based reweighting of fused results

use crate::elements::ElementKind;
use crate::retrieval::ScoredElement;

/// Score multiplier favoring directly actionable code units
pub fn type_weight(kind: ElementKind) -> f32 {
    match kind {
        ElementKind::Function => 1.2,
        ElementKind::Class => 1.1,
        ElementKind::File => 0.9,
        ElementKind::Documentation => 0.8,
        ElementKind::Other => 1.0,
    }
}

/// Multiply each score by its type weight and re-sort, best first
pub fn rerank_by_type(results: &mut [ScoredElement]) {
    for result in results.iter_mut() {
        result.score *= type_weight(result.element.kind);
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
