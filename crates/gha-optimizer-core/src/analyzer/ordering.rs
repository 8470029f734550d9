use crate::analyzer::report::Recommendation;
use std::cmp::Ordering;

/// Display order: priority (critical first), then monthly savings descending, then title.
///
/// The sort is stable, so entries equal on all three keys keep their input order.
pub fn sort_recommendations(recommendations: &mut [Recommendation]) {
    recommendations.sort_by(compare);
}

pub fn compare(a: &Recommendation, b: &Recommendation) -> Ordering {
    a.priority
        .rank()
        .cmp(&b.priority.rank())
        .then_with(|| b.monthly_cost_savings.total_cmp(&a.monthly_cost_savings))
        .then_with(|| a.title.cmp(&b.title))
}
