use std::collections::{BTreeSet, HashSet};

/// One frequent itemset: the items it contains (sorted), the fraction
/// of transactions containing all of them, and the set size.
#[derive(Debug, Clone, PartialEq)]
pub struct Itemset {
    pub items: Vec<String>,
    pub support: f64,
    pub size: usize,
}

/// Levelwise (Apriori) frequent-itemset search over workflow
/// transactions. Each transaction is the set of item identifiers of
/// one workflow; support is the fraction of transactions containing
/// every item of the candidate set.
pub fn frequent_itemsets(transactions: &[BTreeSet<String>], min_support: f64) -> Vec<Itemset> {
    let total = transactions.len();
    if total == 0 {
        return Vec::new();
    }

    let mut results = Vec::new();

    // Level 1: frequent single items.
    let universe: BTreeSet<&String> = transactions.iter().flatten().collect();
    let mut current: Vec<Vec<String>> = Vec::new();
    for item in universe {
        let candidate = vec![item.clone()];
        if let Some(support) = passes(&candidate, transactions, total, min_support) {
            results.push(make_itemset(candidate.clone(), support));
            current.push(candidate);
        }
    }

    // Level k+1: join frequent k-sets sharing a (k-1)-prefix, prune
    // candidates with an infrequent subset, then count support.
    while !current.is_empty() {
        let frequent: HashSet<&[String]> = current.iter().map(Vec::as_slice).collect();
        let mut next = Vec::new();

        for i in 0..current.len() {
            for j in (i + 1)..current.len() {
                let Some(candidate) = join(&current[i], &current[j]) else {
                    continue;
                };
                if !all_subsets_frequent(&candidate, &frequent) {
                    continue;
                }
                if let Some(support) = passes(&candidate, transactions, total, min_support) {
                    results.push(make_itemset(candidate.clone(), support));
                    next.push(candidate);
                }
            }
        }
        current = next;
    }

    results
}

fn make_itemset(items: Vec<String>, support: f64) -> Itemset {
    let size = items.len();
    Itemset {
        items,
        support,
        size,
    }
}

/// Support of the candidate if it meets the threshold.
fn passes(
    candidate: &[String],
    transactions: &[BTreeSet<String>],
    total: usize,
    min_support: f64,
) -> Option<f64> {
    let count = transactions
        .iter()
        .filter(|transaction| candidate.iter().all(|item| transaction.contains(item)))
        .count();
    let support = count as f64 / total as f64;
    (support >= min_support).then_some(support)
}

/// Joins two sorted k-itemsets into a (k+1)-candidate when they share
/// their first k-1 items.
fn join(a: &[String], b: &[String]) -> Option<Vec<String>> {
    let k = a.len();
    if a[..k - 1] != b[..k - 1] || a[k - 1] == b[k - 1] {
        return None;
    }
    let mut joined = a.to_vec();
    if a[k - 1] < b[k - 1] {
        joined.push(b[k - 1].clone());
    } else {
        joined.insert(k - 1, b[k - 1].clone());
    }
    Some(joined)
}

fn all_subsets_frequent(candidate: &[String], frequent: &HashSet<&[String]>) -> bool {
    (0..candidate.len()).all(|skip| {
        let subset: Vec<String> = candidate
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, item)| item.clone())
            .collect();
        frequent.contains(subset.as_slice())
    })
}
