// Render deltas between two displayed article lists
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{
    models::Article,
    observable::{Publisher, Subscription},
};

/// One step of a list edit script.
///
/// `Remove` and `Move::from` index into the previous list; `Insert`,
/// `Change` and `Move::to` index into the next list. Articles are matched
/// by url; a matched pair whose fields differ also gets a `Change`.
#[derive(Debug, Clone, PartialEq)]
pub enum DiffOp {
    Remove { index: usize, url: String },
    Insert { index: usize, article: Article },
    Move { from: usize, to: usize, url: String },
    Change { index: usize, article: Article },
}

/// Compute the edit script turning `prev` into `next`.
///
/// Items on the longest common subsequence of urls stay put; other
/// matched items become moves. Ops come out as removes (descending),
/// then moves, inserts and changes (ascending by target index).
pub fn diff(prev: &[Article], next: &[Article]) -> Vec<DiffOp> {
    // pairs[i] = index in `next` that prev[i] maps to, if any
    let mut pairs: Vec<Option<usize>> = vec![None; prev.len()];
    let mut kept = vec![false; prev.len()];
    let mut next_matched = vec![false; next.len()];

    for (i, j) in common_subsequence(prev, next) {
        pairs[i] = Some(j);
        kept[i] = true;
        next_matched[j] = true;
    }

    // Pair up leftovers with the same url, first come first served
    let mut unmatched_next: HashMap<&str, VecDeque<usize>> = HashMap::new();
    for (j, article) in next.iter().enumerate() {
        if !next_matched[j] {
            unmatched_next.entry(article.url.as_str()).or_default().push_back(j);
        }
    }
    for (i, article) in prev.iter().enumerate() {
        if kept[i] {
            continue;
        }
        if let Some(j) = unmatched_next
            .get_mut(article.url.as_str())
            .and_then(VecDeque::pop_front)
        {
            pairs[i] = Some(j);
            next_matched[j] = true;
        }
    }

    let mut ops = Vec::new();

    for (i, article) in prev.iter().enumerate().rev() {
        if pairs[i].is_none() {
            ops.push(DiffOp::Remove {
                index: i,
                url: article.url.clone(),
            });
        }
    }

    let mut moves: Vec<(usize, usize)> = (0..prev.len())
        .filter(|&i| !kept[i])
        .filter_map(|i| pairs[i].map(|j| (i, j)))
        .collect();
    moves.sort_by_key(|&(_, j)| j);
    ops.extend(moves.into_iter().map(|(from, to)| DiffOp::Move {
        from,
        to,
        url: next[to].url.clone(),
    }));

    for (j, article) in next.iter().enumerate() {
        if !next_matched[j] {
            ops.push(DiffOp::Insert {
                index: j,
                article: article.clone(),
            });
        }
    }

    let mut changes: Vec<(usize, usize)> = pairs
        .iter()
        .enumerate()
        .filter_map(|(i, j)| j.map(|j| (i, j)))
        .filter(|&(i, j)| prev[i] != next[j])
        .collect();
    changes.sort_by_key(|&(_, j)| j);
    ops.extend(changes.into_iter().map(|(_, j)| DiffOp::Change {
        index: j,
        article: next[j].clone(),
    }));

    ops
}

/// Rebuild the next list from the previous one and an edit script
/// produced by `diff`. Returns `None` if the script does not fit `prev`.
pub fn apply(prev: &[Article], ops: &[DiffOp]) -> Option<Vec<Article>> {
    let mut removed = vec![false; prev.len()];
    let mut slots: HashMap<usize, Article> = HashMap::new();
    let mut inserted = 0;

    for op in ops {
        match op {
            DiffOp::Remove { index, .. } => {
                let slot = removed.get_mut(*index)?;
                if std::mem::replace(slot, true) {
                    return None;
                }
            }
            DiffOp::Move { from, to, .. } => {
                let slot = removed.get_mut(*from)?;
                if std::mem::replace(slot, true) {
                    return None;
                }
                if slots.insert(*to, prev[*from].clone()).is_some() {
                    return None;
                }
            }
            DiffOp::Insert { index, article } => {
                inserted += 1;
                if slots.insert(*index, article.clone()).is_some() {
                    return None;
                }
            }
            DiffOp::Change { .. } => {}
        }
    }

    let moved = slots.len() - inserted;
    let kept_count = removed.iter().filter(|r| !**r).count();
    let len = kept_count + moved + inserted;

    let mut kept = prev
        .iter()
        .zip(&removed)
        .filter(|(_, r)| !**r)
        .map(|(a, _)| a.clone());

    let mut result = Vec::with_capacity(len);
    for j in 0..len {
        result.push(slots.remove(&j).or_else(|| kept.next())?);
    }
    // Every kept item and every targeted slot must have been placed
    if kept.next().is_some() || !slots.is_empty() {
        return None;
    }

    for op in ops {
        if let DiffOp::Change { index, article } = op {
            *result.get_mut(*index)? = article.clone();
        }
    }
    Some(result)
}

/// Largest middle section (prev x next) that gets a full LCS table
const MAX_LCS_CELLS: usize = 1 << 22;

/// Index pairs (prev, next) of a longest common subsequence by url
fn common_subsequence(prev: &[Article], next: &[Article]) -> Vec<(usize, usize)> {
    // Shared head and tail are always part of it; only diff the middle
    let head = prev
        .iter()
        .zip(next)
        .take_while(|(a, b)| a.is_same_item(b))
        .count();
    let tail = prev[head..]
        .iter()
        .rev()
        .zip(next[head..].iter().rev())
        .take_while(|(a, b)| a.is_same_item(b))
        .count();

    let old = &prev[head..prev.len() - tail];
    let new = &next[head..next.len() - tail];
    let (n, m) = (old.len(), new.len());

    let mut pairs: Vec<(usize, usize)> = (0..head).map(|k| (k, k)).collect();
    let tail_pairs = (0..tail).map(|k| (prev.len() - tail + k, next.len() - tail + k));

    // Too big for the table: leave the middle to url pairing as moves
    if n.saturating_mul(m) > MAX_LCS_CELLS {
        debug!("Skipping LCS over a {}x{} middle", n, m);
        pairs.extend(tail_pairs);
        return pairs;
    }

    // lengths[i][j] = LCS length of old[i..] and new[j..]
    let mut lengths = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lengths[i][j] = if old[i].is_same_item(&new[j]) {
                lengths[i + 1][j + 1] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i].is_same_item(&new[j]) {
            pairs.push((head + i, head + j));
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    pairs.extend(tail_pairs);
    pairs
}

/// A diff that made it onto the screen
#[derive(Debug, Clone, PartialEq)]
pub struct ListUpdate {
    pub generation: u64,
    pub ops: Vec<DiffOp>,
    pub list: Arc<Vec<Article>>,
}

struct PresenterState {
    current: Arc<Vec<Article>>,
    latest_generation: u64,
}

/// Computes diffs off the caller's thread and applies them in order.
///
/// Submitting a new list supersedes any diff still in flight: its result
/// is thrown away instead of being applied after (or over) the newer one.
#[derive(Clone)]
pub struct ListDiffPresenter {
    state: Arc<Mutex<PresenterState>>,
    updates: Publisher<ListUpdate>,
}

impl ListDiffPresenter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PresenterState {
                current: Arc::new(Vec::new()),
                latest_generation: 0,
            })),
            updates: Publisher::new(),
        }
    }

    pub fn subscribe(&self) -> Subscription<ListUpdate> {
        self.updates.subscribe()
    }

    /// The list as of the last applied diff
    pub fn current(&self) -> Arc<Vec<Article>> {
        Arc::clone(&self.lock().current)
    }

    /// Diff `next` against the current list in the background. Resolves to
    /// `None` if a newer list was submitted before this one finished.
    pub fn submit(&self, next: Vec<Article>) -> JoinHandle<Option<ListUpdate>> {
        let (generation, base) = {
            let mut state = self.lock();
            state.latest_generation += 1;
            (state.latest_generation, Arc::clone(&state.current))
        };

        let presenter = self.clone();
        tokio::spawn(async move {
            let next = Arc::new(next);
            let target = Arc::clone(&next);
            let ops = match tokio::task::spawn_blocking(move || diff(&base, &target)).await {
                Ok(ops) => ops,
                Err(e) => {
                    debug!("Diff task for generation {} failed: {}", generation, e);
                    return None;
                }
            };

            let mut state = presenter.lock();
            if state.latest_generation != generation {
                debug!(
                    "Dropping diff {} superseded by {}",
                    generation, state.latest_generation
                );
                return None;
            }

            state.current = Arc::clone(&next);
            let update = ListUpdate {
                generation,
                ops,
                list: next,
            };
            presenter.updates.publish(update.clone());
            Some(update)
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PresenterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ListDiffPresenter {
    fn default() -> Self {
        Self::new()
    }
}
