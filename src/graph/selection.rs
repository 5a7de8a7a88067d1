//! Ordered query results and random selection over them.

use rand::seq::index;
use rand::Rng;

use super::{Kind, Ref};
use crate::error::SelectionError;

/// The ordered result of a graph query.
pub struct Selection<'g, N, T> {
    items: Vec<Ref<'g, N, T>>,
}

impl<'g, N, T> Clone for Selection<'g, N, T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

impl<'g, N, T: std::fmt::Debug> std::fmt::Debug for Selection<'g, N, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<'g, N, T> FromIterator<Ref<'g, N, T>> for Selection<'g, N, T> {
    fn from_iter<I: IntoIterator<Item = Ref<'g, N, T>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl<'g, N, T> IntoIterator for Selection<'g, N, T> {
    type Item = Ref<'g, N, T>;
    type IntoIter = std::vec::IntoIter<Ref<'g, N, T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'g, N, T> Selection<'g, N, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Ref<'g, N, T>> + '_ {
        self.items.iter().copied()
    }

    pub fn get(&self, index: usize) -> Option<Ref<'g, N, T>> {
        self.items.get(index).copied()
    }

    pub fn contains(&self, node: &Ref<'g, N, T>) -> bool {
        self.items.contains(node)
    }

    /// Keep only the nodes matching `predicate`. Chain to combine predicates.
    pub fn filter(mut self, mut predicate: impl FnMut(&Ref<'g, N, T>) -> bool) -> Self {
        self.items.retain(|item| predicate(item));
        self
    }

    /// The whole result in order.
    pub fn all(self) -> Vec<Ref<'g, N, T>> {
        self.items
    }

    /// Exactly `n` distinct nodes chosen uniformly without replacement,
    /// returned in their original relative order.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<Ref<'g, N, T>>, SelectionError> {
        let available = self.items.len();
        if n > available {
            return Err(SelectionError::Insufficient {
                requested: n,
                available,
            });
        }
        if n == available {
            return Ok(self.items.clone());
        }
        let mut chosen = index::sample(rng, available, n).into_vec();
        chosen.sort_unstable();
        Ok(chosen.into_iter().map(|i| self.items[i]).collect())
    }

    /// Between 1 and `n` nodes, see [`Selection::pick_between`].
    pub fn pick_up_to<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        n: usize,
    ) -> Result<Vec<Ref<'g, N, T>>, SelectionError> {
        self.pick_between(rng, 1, n)
    }

    /// A random count in `[min, max]` of nodes, `max` clamped to the size of
    /// the selection.
    pub fn pick_between<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        min: usize,
        max: usize,
    ) -> Result<Vec<Ref<'g, N, T>>, SelectionError> {
        let max = max.min(self.items.len());
        if min > max {
            return Err(SelectionError::Insufficient {
                requested: min,
                available: self.items.len(),
            });
        }
        let count = rng.gen_range(min..=max);
        self.pick(rng, count)
    }
}

impl<'g, N, T: Kind<N>> Selection<'g, N, T> {
    /// The only node. Use where cardinality is structurally guaranteed.
    pub fn one(self) -> Result<Ref<'g, N, T>, SelectionError> {
        match self.items.as_slice() {
            [only] => Ok(*only),
            _ => Err(SelectionError::NotExactlyOne {
                kind: T::kind_name(),
                found: self.items.len(),
            }),
        }
    }

    /// A uniformly random node.
    pub fn any<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Ref<'g, N, T>, SelectionError> {
        let mut picked = self.pick(rng, 1)?;
        picked.pop().ok_or(SelectionError::Insufficient {
            requested: 1,
            available: self.items.len(),
        })
    }
}
