//! Structured values.
use crate::error::QlearnError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A value with an arbitrarily nested structure.
///
/// Observations and their specs are often not a single array but a tuple or a
/// named collection of arrays. [`Nest`] keeps that structure while letting
/// algorithms see the leaves as a flat list through [`Nest::flatten`] and put
/// them back with [`Nest::pack_sequence_as`].
///
/// Leaves are visited depth-first; entries of [`Nest::Map`] are visited in
/// key order, so the flat order is deterministic.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Nest<T> {
    /// A single value.
    Leaf(T),

    /// An ordered sequence of nests.
    Seq(Vec<Nest<T>>),

    /// Named nests.
    Map(BTreeMap<String, Nest<T>>),
}

impl<T> From<T> for Nest<T> {
    fn from(v: T) -> Self {
        Self::Leaf(v)
    }
}

impl<T> Nest<T> {
    /// Returns the value if this nest is a single leaf.
    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Self::Leaf(v) => Some(v),
            _ => None,
        }
    }

    /// Returns references to all leaves in depth-first order.
    pub fn flatten(&self) -> Vec<&T> {
        let mut leaves = Vec::new();
        self.collect_refs(&mut leaves);
        leaves
    }

    fn collect_refs<'a>(&'a self, leaves: &mut Vec<&'a T>) {
        match self {
            Self::Leaf(v) => leaves.push(v),
            Self::Seq(vs) => vs.iter().for_each(|v| v.collect_refs(leaves)),
            Self::Map(vs) => vs.values().for_each(|v| v.collect_refs(leaves)),
        }
    }

    /// Consumes the nest and returns its leaves in depth-first order.
    pub fn into_flat(self) -> Vec<T> {
        let mut leaves = Vec::new();
        self.collect_owned(&mut leaves);
        leaves
    }

    fn collect_owned(self, leaves: &mut Vec<T>) {
        match self {
            Self::Leaf(v) => leaves.push(v),
            Self::Seq(vs) => vs.into_iter().for_each(|v| v.collect_owned(leaves)),
            Self::Map(vs) => vs.into_iter().for_each(|(_, v)| v.collect_owned(leaves)),
        }
    }

    /// The number of leaves.
    pub fn len(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Seq(vs) => vs.iter().map(|v| v.len()).sum(),
            Self::Map(vs) => vs.values().map(|v| v.len()).sum(),
        }
    }

    /// Returns `true` if the nest has no leaves.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Applies `f` to every leaf, keeping the structure.
    pub fn map<U, F>(&self, mut f: F) -> Nest<U>
    where
        F: FnMut(&T) -> U,
    {
        self.map_with(&mut f)
    }

    fn map_with<U, F>(&self, f: &mut F) -> Nest<U>
    where
        F: FnMut(&T) -> U,
    {
        match self {
            Self::Leaf(v) => Nest::Leaf(f(v)),
            Self::Seq(vs) => Nest::Seq(vs.iter().map(|v| v.map_with(f)).collect()),
            Self::Map(vs) => Nest::Map(
                vs.iter()
                    .map(|(k, v)| (k.clone(), v.map_with(f)))
                    .collect(),
            ),
        }
    }

    /// Applies a fallible `f` to every leaf, stopping at the first error.
    pub fn try_map<U, E, F>(&self, mut f: F) -> Result<Nest<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        self.try_map_with(&mut f)
    }

    fn try_map_with<U, E, F>(&self, f: &mut F) -> Result<Nest<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(match self {
            Self::Leaf(v) => Nest::Leaf(f(v)?),
            Self::Seq(vs) => Nest::Seq(
                vs.iter()
                    .map(|v| v.try_map_with(f))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Map(vs) => {
                let mut map = BTreeMap::new();
                for (k, v) in vs.iter() {
                    map.insert(k.clone(), v.try_map_with(f)?);
                }
                Nest::Map(map)
            }
        })
    }

    /// Returns `true` if both nests have the same structure, ignoring leaf values.
    pub fn same_structure<U>(&self, other: &Nest<U>) -> bool {
        match (self, other) {
            (Self::Leaf(_), Nest::Leaf(_)) => true,
            (Self::Seq(a), Nest::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.same_structure(b))
            }
            (Self::Map(a), Nest::Map(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, a), (kb, b))| ka == kb && a.same_structure(b))
            }
            _ => false,
        }
    }

    /// Builds a nest with the structure of `self` from flat leaves.
    ///
    /// This is the inverse of [`Nest::into_flat`].
    pub fn pack_sequence_as<U>(&self, flat: Vec<U>) -> Result<Nest<U>, QlearnError> {
        if flat.len() != self.len() {
            return Err(QlearnError::NestStructureError(format!(
                "expected {} leaves, got {}",
                self.len(),
                flat.len()
            )));
        }
        let mut iter = flat.into_iter();
        self.pack_with(&mut iter).ok_or_else(|| {
            QlearnError::NestStructureError("ran out of leaves while packing".to_string())
        })
    }

    fn pack_with<U, I>(&self, iter: &mut I) -> Option<Nest<U>>
    where
        I: Iterator<Item = U>,
    {
        Some(match self {
            Self::Leaf(_) => Nest::Leaf(iter.next()?),
            Self::Seq(vs) => Nest::Seq(
                vs.iter()
                    .map(|v| v.pack_with(iter))
                    .collect::<Option<_>>()?,
            ),
            Self::Map(vs) => {
                let mut map = BTreeMap::new();
                for (k, v) in vs.iter() {
                    map.insert(k.clone(), v.pack_with(iter)?);
                }
                Nest::Map(map)
            }
        })
    }
}
