//! Retrieval quality self-report (no ground truth available)
//!
//! Evidence is graded by how much of the claim it covers: half or more
//! of the claim's terms is grade 2, a quarter or more is grade 1. The
//! quality value averages precision and nDCG over that pseudo-judgment.

use std::collections::{HashMap, HashSet};

use super::{ndcg_at_k, precision_at_k};
use crate::retrieval::Evidence;
use crate::text::Normalizer;

/// Pseudo relevance grade of each evidence for the claim
pub fn grade_evidence(
    claim_terms: &[String],
    evidences: &[Evidence],
    normalizer: &Normalizer,
) -> HashMap<String, i32> {
    let claim: HashSet<&str> = claim_terms.iter().map(String::as_str).collect();
    let mut grades = HashMap::new();
    if claim.is_empty() {
        return grades;
    }

    for ev in evidences {
        let doc_terms: HashSet<String> = normalizer.normalize(&ev.text).into_iter().collect();
        let covered = claim.iter().filter(|t| doc_terms.contains(**t)).count();
        let coverage = covered as f64 / claim.len() as f64;
        let grade = if coverage >= 0.5 {
            2
        } else if coverage >= 0.25 {
            1
        } else {
            0
        };
        grades.insert(ev.doc_id.clone(), grade);
    }
    grades
}

/// Quality in [0,1] of a live retrieval, `None` when nothing was retrieved
pub fn retrieval_quality(claim: &str, evidences: &[Evidence], normalizer: &Normalizer) -> Option<f64> {
    if evidences.is_empty() {
        return None;
    }
    let claim_terms = normalizer.normalize(claim);
    if claim_terms.is_empty() {
        return None;
    }

    let grades = grade_evidence(&claim_terms, evidences, normalizer);
    let ranked: Vec<&str> = evidences.iter().map(|e| e.doc_id.as_str()).collect();
    let k = ranked.len();

    let precision = precision_at_k(&ranked, &grades, k);
    let ndcg = ndcg_at_k(&ranked, &grades, k);
    Some((0.5 * precision + 0.5 * ndcg).clamp(0.0, 1.0))
}
