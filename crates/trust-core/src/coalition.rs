//! Coalition Detection
//!
//! Finds clusters of agents whose pairwise trust clears a threshold on every
//! internal edge. Clusters grow greedily from the strongest edges, so every
//! agent ends up in at most one cluster and every cluster is a clique of
//! qualifying edges.

/// A detected cluster
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Member ids, sorted
    pub members: Vec<String>,
    /// Mean weight over internal edges
    pub mean_trust: f64,
}

/// Groups `agents` into coalitions.
///
/// `weight(a, b)` returns the edge weight between two agents, or `None` if
/// there is no usable edge (for example because they have not interacted
/// recently). Only edges strictly above `threshold` count. Clusters smaller
/// than `min_size` are dropped.
pub fn detect_clusters<F>(agents: &[String], weight: F, threshold: f64, min_size: usize) -> Vec<Cluster>
where
    F: Fn(&str, &str) -> Option<f64>,
{
    let mut ids: Vec<&str> = agents.iter().map(String::as_str).collect();
    ids.sort_unstable();
    ids.dedup();
    let n = ids.len();

    let mut links = vec![vec![None; n]; n];
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();
    for a in 0..n {
        for b in (a + 1)..n {
            if let Some(w) = weight(ids[a], ids[b]) {
                if w > threshold {
                    links[a][b] = Some(w);
                    links[b][a] = Some(w);
                    edges.push((a, b, w));
                }
            }
        }
    }
    // Strongest first; ties broken by id order so the result is input-order independent
    edges.sort_by(|x, y| {
        y.2.total_cmp(&x.2)
            .then_with(|| x.0.cmp(&y.0))
            .then_with(|| x.1.cmp(&y.1))
    });

    let fits = |agent: usize, cluster: &[usize]| cluster.iter().all(|&m| links[agent][m].is_some());
    let cohesion = |cluster: &[usize]| -> f64 {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (i, &x) in cluster.iter().enumerate() {
            for &y in &cluster[i + 1..] {
                if let Some(w) = links[x][y] {
                    sum += w;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    };
    // Most cohesive existing cluster every joiner fits into
    let best_for = |joiners: &[usize], clusters: &[Vec<usize>]| -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, cluster) in clusters.iter().enumerate() {
            if joiners.iter().all(|&j| fits(j, cluster)) {
                let score = cohesion(cluster);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((index, score));
                }
            }
        }
        best.map(|(index, _)| index)
    };

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut assigned: Vec<Option<usize>> = vec![None; n];

    for &(a, b, _) in &edges {
        match (assigned[a], assigned[b]) {
            (None, None) => {
                let index = best_for(&[a, b], &clusters).unwrap_or_else(|| {
                    clusters.push(Vec::new());
                    clusters.len() - 1
                });
                clusters[index].extend([a, b]);
                assigned[a] = Some(index);
                assigned[b] = Some(index);
            }
            (Some(_), None) => {
                if let Some(index) = best_for(&[b], &clusters) {
                    clusters[index].push(b);
                    assigned[b] = Some(index);
                }
            }
            (None, Some(_)) => {
                if let Some(index) = best_for(&[a], &clusters) {
                    clusters[index].push(a);
                    assigned[a] = Some(index);
                }
            }
            (Some(_), Some(_)) => {}
        }
    }

    let mut result: Vec<Cluster> = clusters
        .into_iter()
        .filter(|c| c.len() >= min_size.max(2))
        .map(|mut c| {
            c.sort_unstable();
            Cluster {
                mean_trust: cohesion(&c),
                members: c.iter().map(|&i| ids[i].to_string()).collect(),
            }
        })
        .collect();
    result.sort_by(|x, y| x.members.cmp(&y.members));
    result
}
