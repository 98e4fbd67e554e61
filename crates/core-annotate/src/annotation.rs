//! Applied annotation set.

use crate::host::LabelHandle;

/// One rendered duration label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub anchor_line: usize,
    pub text: String,
    pub handle: LabelHandle,
}

/// Labels currently applied to a view. Only ever replaced as a whole.
#[derive(Debug, Default)]
pub struct AnnotationSet {
    items: Vec<Annotation>,
    generation: u64,
}

impl AnnotationSet {
    /// Swap in a fully attached set and hand back the previous one for
    /// disposal. Bumps the generation.
    pub fn replace(&mut self, next: Vec<Annotation>) -> Vec<Annotation> {
        self.generation += 1;
        std::mem::replace(&mut self.items, next)
    }

    /// Remove every label (view closing). The generation is left alone.
    pub fn take_all(&mut self) -> Vec<Annotation> {
        std::mem::take(&mut self.items)
    }

    /// Number of completed commits this set has seen.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `(anchor_line, text)` pairs, handy for comparing cycles.
    pub fn anchors(&self) -> Vec<(usize, String)> {
        self.items
            .iter()
            .map(|a| (a.anchor_line, a.text.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(line: usize, handle: u64) -> Annotation {
        Annotation {
            anchor_line: line,
            text: format!("[{line}h 0m]"),
            handle: LabelHandle(handle),
        }
    }

    #[test]
    fn replace_returns_previous_and_bumps_generation() {
        let mut set = AnnotationSet::default();
        assert!(set.replace(vec![ann(2, 1)]).is_empty());
        let old = set.replace(vec![ann(4, 2), ann(9, 3)]);
        assert_eq!(old, vec![ann(2, 1)]);
        assert_eq!(set.generation(), 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn take_all_empties_without_new_generation() {
        let mut set = AnnotationSet::default();
        set.replace(vec![ann(1, 1)]);
        assert_eq!(set.take_all().len(), 1);
        assert!(set.is_empty());
        assert_eq!(set.generation(), 1);
    }
}
