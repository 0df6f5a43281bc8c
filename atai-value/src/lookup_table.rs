//! ルックアップテーブル

use crate::range::signed_hex;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// ルックアップテーブルのエントリ（複数の入力値 → 1つの出力値）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupTableEntry {
    pub from_values: Vec<i64>,
    pub to_value: i64,
}

impl LookupTableEntry {
    pub fn new(from_values: Vec<i64>, to_value: i64) -> Self {
        Self {
            from_values,
            to_value,
        }
    }
}

impl fmt::Display for LookupTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let from: Vec<String> = self
            .from_values
            .iter()
            .map(|v| signed_hex(*v as i128))
            .collect();
        write!(f, "[{}] -> {}", from.join(", "), signed_hex(self.to_value as i128))
    }
}

/// ルックアップテーブル
///
/// エントリ列と、そこから導出したフラットな対応表（入力値 → 出力値）を持ちます。
/// 対応表はエントリと一緒にしか更新されません。同じ入力値が複数のエントリに
/// 現れた場合は、後に処理されたエントリが勝ちます。
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: Vec<LookupTableEntry>,
    mapping: HashMap<i64, i64>,
}

impl LookupTable {
    /// エントリ列からテーブルを構築する
    pub fn new(entries: Vec<LookupTableEntry>) -> Self {
        let mut table = Self {
            entries: Vec::with_capacity(entries.len()),
            mapping: HashMap::new(),
        };
        for entry in entries {
            table.push(entry);
        }
        table
    }

    /// エントリを追加し、対応表を更新する
    pub fn push(&mut self, entry: LookupTableEntry) {
        for from in &entry.from_values {
            self.mapping.insert(*from, entry.to_value);
        }
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LookupTableEntry] {
        &self.entries
    }

    pub fn mapping(&self) -> &HashMap<i64, i64> {
        &self.mapping
    }

    /// 入力値に対応する出力値
    pub fn resolve(&self, from: i64) -> Option<i64> {
        self.mapping.get(&from).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for LookupTable {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl Eq for LookupTable {}

impl Hash for LookupTable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.entries.hash(state);
    }
}

impl FromIterator<LookupTableEntry> for LookupTable {
    fn from_iter<I: IntoIterator<Item = LookupTableEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_covers_every_entry() {
        let table = LookupTable::new(vec![
            LookupTableEntry::new(vec![1, 2], 0x100),
            LookupTableEntry::new(vec![3], 0x200),
        ]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.mapping().len(), 3);
        assert_eq!(table.resolve(2), Some(0x100));
        assert_eq!(table.resolve(3), Some(0x200));
        assert_eq!(table.resolve(4), None);
    }

    #[test]
    fn test_later_entry_wins() {
        let mut table = LookupTable::new(vec![
            LookupTableEntry::new(vec![0x10, 0x11], 1),
            LookupTableEntry::new(vec![0x10], 2),
        ]);
        assert_eq!(table.resolve(0x10), Some(2));
        assert_eq!(table.resolve(0x11), Some(1));

        table.push(LookupTableEntry::new(vec![0x11], 3));
        assert_eq!(table.resolve(0x11), Some(3));
    }

    #[test]
    fn test_entry_display() {
        let entry = LookupTableEntry::new(vec![1, -2], 0x5);
        assert_eq!(entry.to_string(), "[0x1, -0x2] -> 0x5");
    }
}
