//! Composite key layout and typed key ordering
//!
//! An index key is the concatenation of the raw bytes of its fields in
//! declared order. Keys are ordered part by part using each part's attribute
//! type, so little-endian integers and dates sort numerically.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::storage::FieldMeta;
use crate::types::{AttrType, Value};

/// One field's slot inside a composite key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPart {
    pub attr_type: AttrType,
    pub len: usize,
}

/// Ordered list of key parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyLayout {
    parts: Vec<KeyPart>,
}

impl KeyLayout {
    pub fn new(parts: Vec<KeyPart>) -> Self {
        Self { parts }
    }

    /// Layout of an index over `fields`, in field order
    pub fn from_fields(fields: &[FieldMeta]) -> Self {
        Self::new(
            fields
                .iter()
                .map(|f| KeyPart {
                    attr_type: f.attr_type,
                    len: f.len,
                })
                .collect(),
        )
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.parts
    }

    /// Total key length: the sum of every part's length
    pub fn key_len(&self) -> usize {
        self.parts.iter().map(|p| p.len).sum()
    }

    /// Compares two keys part by part.
    ///
    /// Parts that fail to decode fall back to byte order. Keys of unexpected
    /// length are ordered by the parts both contain, then by length.
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let mut offset = 0;
        for part in &self.parts {
            let end = offset + part.len;
            let (Some(x), Some(y)) = (a.get(offset..end), b.get(offset..end)) else {
                break;
            };
            let ord = compare_part(part.attr_type, x, y);
            if ord != Ordering::Equal {
                return ord;
            }
            offset = end;
        }
        a.len().cmp(&b.len())
    }
}

fn compare_part(attr_type: AttrType, x: &[u8], y: &[u8]) -> Ordering {
    match (Value::decode(attr_type, x), Value::decode(attr_type, y)) {
        (Ok(vx), Ok(vy)) => vx.compare(&vy).unwrap_or_else(|_| x.cmp(y)),
        _ => x.cmp(y),
    }
}

/// Key stored in the ordered map; ordering delegates to the shared layout
#[derive(Debug, Clone)]
pub struct TreeKey {
    bytes: Vec<u8>,
    layout: Arc<KeyLayout>,
}

impl TreeKey {
    pub fn new(bytes: Vec<u8>, layout: Arc<KeyLayout>) -> Self {
        Self { bytes, layout }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq for TreeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TreeKey {}

impl PartialOrd for TreeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TreeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.layout.compare(&self.bytes, &other.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_key(v: i32) -> Vec<u8> {
        v.to_le_bytes().to_vec()
    }

    #[test]
    fn test_integers_sort_numerically() {
        let layout = KeyLayout::new(vec![KeyPart {
            attr_type: AttrType::Int,
            len: 4,
        }]);
        // Little-endian bytes of 256 sort below 1 byte-wise
        assert_eq!(layout.compare(&int_key(1), &int_key(256)), Ordering::Less);
        assert_eq!(layout.compare(&int_key(-5), &int_key(3)), Ordering::Less);
    }

    #[test]
    fn test_composite_key_orders_by_first_part_then_second() {
        let layout = KeyLayout::new(vec![
            KeyPart {
                attr_type: AttrType::Int,
                len: 4,
            },
            KeyPart {
                attr_type: AttrType::Char,
                len: 2,
            },
        ]);
        assert_eq!(layout.key_len(), 6);

        let a = [int_key(1), b"zz".to_vec()].concat();
        let b = [int_key(2), b"aa".to_vec()].concat();
        let c = [int_key(2), b"ab".to_vec()].concat();
        assert_eq!(layout.compare(&a, &b), Ordering::Less);
        assert_eq!(layout.compare(&b, &c), Ordering::Less);
        assert_eq!(layout.compare(&c, &c), Ordering::Equal);
    }

    #[test]
    fn test_tree_key_ordering() {
        let layout = Arc::new(KeyLayout::new(vec![KeyPart {
            attr_type: AttrType::Int,
            len: 4,
        }]));
        let mut keys: Vec<TreeKey> = [300, -1, 7]
            .iter()
            .map(|v| TreeKey::new(int_key(*v), layout.clone()))
            .collect();
        keys.sort();
        let decoded: Vec<i32> = keys
            .iter()
            .map(|k| i32::from_le_bytes(k.bytes().try_into().unwrap()))
            .collect();
        assert_eq!(decoded, vec![-1, 7, 300]);
    }
}
