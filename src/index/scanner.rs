//! Cursor handed to selection nodes

use super::errors::IndexResult;
use super::tree::TreeCursor;
use crate::storage::Rid;

/// Yields the record ids matched by one index scan, in key order
///
/// After the last id every call returns `Ok(None)`.
#[derive(Debug)]
pub struct IndexScanner {
    cursor: Option<TreeCursor>,
}

impl IndexScanner {
    pub(crate) fn new(cursor: TreeCursor) -> Self {
        Self {
            cursor: Some(cursor),
        }
    }

    pub fn next_entry(&mut self) -> IndexResult<Option<Rid>> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };
        let next = cursor.next_rid();
        if next.is_none() {
            self.cursor = None;
        }
        Ok(next)
    }

    /// Releases the underlying cursor
    pub fn destroy(self) {}
}

impl Iterator for IndexScanner {
    type Item = IndexResult<Rid>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scanner_exhausts_then_stays_empty() {
        let mut scanner = IndexScanner::new(TreeCursor::new(vec![Rid::new(0, 1), Rid::new(1, 0)]));
        assert_eq!(scanner.next_entry().unwrap(), Some(Rid::new(0, 1)));
        assert_eq!(scanner.next_entry().unwrap(), Some(Rid::new(1, 0)));
        assert_eq!(scanner.next_entry().unwrap(), None);
        assert_eq!(scanner.next_entry().unwrap(), None);
        scanner.destroy();
    }

    #[test]
    fn test_iterator_yields_results() {
        let scanner = IndexScanner::new(TreeCursor::new(vec![Rid::new(2, 3)]));
        let rids: IndexResult<Vec<Rid>> = scanner.collect();
        assert_eq!(rids.unwrap(), vec![Rid::new(2, 3)]);
    }
}
