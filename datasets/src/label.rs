use std::{collections::BTreeSet, fmt::Debug};

use crate::{DatasetErr, Result};

/// Maps raw labels to class indices by their sorted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEncoder<L> {
    classes: Vec<L>,
}

impl<L: Ord + Clone + Debug> LabelEncoder<L> {
    /// Creates a new `LabelEncoder` over the distinct values of `labels`.
    pub fn fit<I>(labels: I) -> Self
    where
        I: IntoIterator<Item = L>,
    {
        let unique: BTreeSet<L> = labels.into_iter().collect();

        Self {
            classes: unique.into_iter().collect(),
        }
    }

    /// Returns the class index of `label`.
    pub fn transform(&self, label: &L) -> Result<usize> {
        self.classes
            .binary_search(label)
            .map_err(|_| DatasetErr::UnknownLabel(format!("{label:?}")))
    }

    /// Returns the label of the class at `index`.
    pub fn inverse(&self, index: usize) -> Option<&L> {
        self.classes.get(index)
    }

    pub fn classes(&self) -> &[L] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_sorted_order() {
        let le = LabelEncoder::fit(["wave", "clap", "run", "clap"].map(String::from));

        assert_eq!(le.len(), 3);
        assert_eq!(le.transform(&"clap".into()).unwrap(), 0);
        assert_eq!(le.transform(&"wave".into()).unwrap(), 2);
        assert_eq!(le.inverse(1).map(String::as_str), Some("run"));
    }

    #[test]
    fn numeric_labels_sort_numerically() {
        let le = LabelEncoder::fit([10u32, 2, 1]);

        assert_eq!(le.transform(&2).unwrap(), 1);
        assert_eq!(le.transform(&10).unwrap(), 2);
    }

    #[test]
    fn unseen_labels_are_rejected() {
        let le = LabelEncoder::fit(["clap".to_string()]);
        let err = le.transform(&"jump".into()).unwrap_err();

        assert!(matches!(err, DatasetErr::UnknownLabel(l) if l.contains("jump")));
    }
}
