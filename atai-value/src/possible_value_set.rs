//! 取り得る値の集合（PossibleValueSet）
//!
//! ある位置（レジスタ・変数）が保持し得る値について静的に分かっていることを表す
//! 格子の要素です。エンジンが計算した生のタグ付き値をデコードし、
//! クライアントが組み立てた値をヒントとしてエンジンへ戻すためにエンコードします。

use crate::{LookupTable, LookupTableEntry, Register, Result, ValueError, ValueRange};
use atai_target::{
    Architecture, RawLookupTableEntry, RawPossibleValueSet, RawValueRange, RegisterValueType,
};
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::mem;
use tracing::debug;

/// 取り得る値の集合
///
/// 同時に有効なのは1つのバリアントのペイロードだけです。
#[derive(Debug, Clone)]
pub enum PossibleValueSet {
    Undetermined,
    EntryValue { reg: Register },
    ConstantValue { value: i64 },
    ConstantPointerValue { value: i64 },
    StackFrameOffset { offset: i64 },
    SignedRangeValue { offset: i64, ranges: Vec<ValueRange<i64>> },
    UnsignedRangeValue { offset: i64, ranges: Vec<ValueRange<u64>> },
    LookupTableValue { table: LookupTable },
    InSetOfValues { values: BTreeSet<i64> },
    NotInSetOfValues { values: BTreeSet<i64> },
    ReturnAddressValue,
    ImportedAddressValue { value: i64 },
}

fn check_count(count: usize, present: usize) -> std::result::Result<(), ValueError> {
    if count != present {
        return Err(ValueError::CountMismatch {
            expected: present,
            actual: count,
        });
    }
    Ok(())
}

impl PossibleValueSet {
    pub fn undetermined() -> Self {
        Self::Undetermined
    }

    pub fn entry_value(reg: impl Into<Register>) -> Self {
        Self::EntryValue { reg: reg.into() }
    }

    pub fn constant(value: i64) -> Self {
        Self::ConstantValue { value }
    }

    pub fn constant_ptr(value: i64) -> Self {
        Self::ConstantPointerValue { value }
    }

    pub fn stack_frame_offset(offset: i64) -> Self {
        Self::StackFrameOffset { offset }
    }

    pub fn return_address() -> Self {
        Self::ReturnAddressValue
    }

    pub fn imported_address(value: i64) -> Self {
        Self::ImportedAddressValue { value }
    }

    /// 符号付き範囲の集合
    ///
    /// ```
    /// use atai_value::{PossibleValueSet, ValueRange};
    ///
    /// let set = PossibleValueSet::signed_range_value(vec![
    ///     ValueRange::new(-5, -1, 1).unwrap(),
    ///     ValueRange::new(7, 10, 1).unwrap(),
    /// ]).unwrap();
    /// assert_eq!(
    ///     set.to_string(),
    ///     "<signed ranges: [<range: -0x5 to -0x1>, <range: 0x7 to 0xa>]>"
    /// );
    /// ```
    pub fn signed_range_value(ranges: Vec<ValueRange<i64>>) -> std::result::Result<Self, ValueError> {
        if ranges.is_empty() {
            return Err(ValueError::EmptyRanges);
        }
        Ok(Self::SignedRangeValue { offset: 0, ranges })
    }

    /// 符号なし範囲の集合
    pub fn unsigned_range_value(ranges: Vec<ValueRange<u64>>) -> std::result::Result<Self, ValueError> {
        if ranges.is_empty() {
            return Err(ValueError::EmptyRanges);
        }
        Ok(Self::UnsignedRangeValue { offset: 0, ranges })
    }

    pub fn in_set_of_values(values: impl IntoIterator<Item = i64>) -> Self {
        Self::InSetOfValues {
            values: values.into_iter().collect(),
        }
    }

    pub fn not_in_set_of_values(values: impl IntoIterator<Item = i64>) -> Self {
        Self::NotInSetOfValues {
            values: values.into_iter().collect(),
        }
    }

    /// ルックアップテーブル（対応表はエントリから構築される）
    pub fn lookup_table_value(entries: Vec<LookupTableEntry>) -> Self {
        Self::LookupTableValue {
            table: LookupTable::new(entries),
        }
    }

    /// エンジンの生の値をデコードする
    ///
    /// 符号付き範囲の `start`/`end` はビット63が立っていれば負の値として扱います。
    pub fn decode(raw: &RawPossibleValueSet, arch: Option<&dyn Architecture>) -> Result<Self> {
        let kind = RegisterValueType::try_from(raw.state).map_err(ValueError::from)?;
        let set = match kind {
            RegisterValueType::UndeterminedValue => Self::Undetermined,
            RegisterValueType::EntryValue => Self::EntryValue {
                reg: Register::from_raw(raw.value, arch)?,
            },
            RegisterValueType::ConstantValue => Self::ConstantValue { value: raw.value },
            RegisterValueType::ConstantPointerValue => {
                Self::ConstantPointerValue { value: raw.value }
            }
            RegisterValueType::StackFrameOffset => Self::StackFrameOffset { offset: raw.value },
            RegisterValueType::ReturnAddressValue => Self::ReturnAddressValue,
            RegisterValueType::ImportedAddressValue => {
                Self::ImportedAddressValue { value: raw.value }
            }
            RegisterValueType::SignedRangeValue => {
                check_count(raw.count, raw.ranges.len())?;
                let ranges = raw
                    .ranges
                    .iter()
                    .map(|r| ValueRange::new(r.start as i64, r.end as i64, r.step))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Self::SignedRangeValue {
                    offset: raw.value,
                    ranges,
                }
            }
            RegisterValueType::UnsignedRangeValue => {
                check_count(raw.count, raw.ranges.len())?;
                let ranges = raw
                    .ranges
                    .iter()
                    .map(|r| ValueRange::new(r.start, r.end, r.step))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Self::UnsignedRangeValue {
                    offset: raw.value,
                    ranges,
                }
            }
            RegisterValueType::LookupTableValue => {
                check_count(raw.count, raw.table.len())?;
                let table = raw
                    .table
                    .iter()
                    .map(|e| LookupTableEntry::new(e.from_values.clone(), e.to_value))
                    .collect();
                Self::LookupTableValue { table }
            }
            RegisterValueType::InSetOfValues => {
                check_count(raw.count, raw.value_set.len())?;
                Self::InSetOfValues {
                    values: raw.value_set.iter().copied().collect(),
                }
            }
            RegisterValueType::NotInSetOfValues => {
                check_count(raw.count, raw.value_set.len())?;
                Self::NotInSetOfValues {
                    values: raw.value_set.iter().copied().collect(),
                }
            }
        };
        debug!(kind = %kind, count = raw.count, "decoded possible value set");
        Ok(set)
    }

    /// エンジンの生の値にエンコードする
    ///
    /// 符号付き範囲の負の値は64ビットの2の補数表現に戻します。
    pub fn encode(&self, arch: Option<&dyn Architecture>) -> Result<RawPossibleValueSet> {
        let mut raw = RawPossibleValueSet::with_state(self.kind());
        match self {
            Self::Undetermined | Self::ReturnAddressValue => {}
            Self::EntryValue { reg } => raw.value = reg.to_index(arch)? as i64,
            Self::ConstantValue { value }
            | Self::ConstantPointerValue { value }
            | Self::ImportedAddressValue { value } => raw.value = *value,
            Self::StackFrameOffset { offset } => raw.value = *offset,
            Self::SignedRangeValue { offset, ranges } => {
                raw.value = *offset;
                raw.ranges = ranges
                    .iter()
                    .map(|r| RawValueRange {
                        start: r.start() as u64,
                        end: r.end() as u64,
                        step: r.step(),
                    })
                    .collect();
                raw.count = raw.ranges.len();
            }
            Self::UnsignedRangeValue { offset, ranges } => {
                raw.value = *offset;
                raw.ranges = ranges
                    .iter()
                    .map(|r| RawValueRange {
                        start: r.start(),
                        end: r.end(),
                        step: r.step(),
                    })
                    .collect();
                raw.count = raw.ranges.len();
            }
            Self::LookupTableValue { table } => {
                raw.table = table
                    .entries()
                    .iter()
                    .map(|e| RawLookupTableEntry {
                        from_values: e.from_values.clone(),
                        to_value: e.to_value,
                    })
                    .collect();
                raw.count = raw.table.len();
            }
            Self::InSetOfValues { values } | Self::NotInSetOfValues { values } => {
                raw.value_set = values.iter().copied().collect();
                raw.count = raw.value_set.len();
            }
        }
        Ok(raw)
    }

    /// 状態タグ
    pub fn kind(&self) -> RegisterValueType {
        match self {
            Self::Undetermined => RegisterValueType::UndeterminedValue,
            Self::EntryValue { .. } => RegisterValueType::EntryValue,
            Self::ConstantValue { .. } => RegisterValueType::ConstantValue,
            Self::ConstantPointerValue { .. } => RegisterValueType::ConstantPointerValue,
            Self::StackFrameOffset { .. } => RegisterValueType::StackFrameOffset,
            Self::SignedRangeValue { .. } => RegisterValueType::SignedRangeValue,
            Self::UnsignedRangeValue { .. } => RegisterValueType::UnsignedRangeValue,
            Self::LookupTableValue { .. } => RegisterValueType::LookupTableValue,
            Self::InSetOfValues { .. } => RegisterValueType::InSetOfValues,
            Self::NotInSetOfValues { .. } => RegisterValueType::NotInSetOfValues,
            Self::ReturnAddressValue => RegisterValueType::ReturnAddressValue,
            Self::ImportedAddressValue { .. } => RegisterValueType::ImportedAddressValue,
        }
    }

    /// 範囲・エントリ・値の個数（スカラーの種類では0）
    pub fn count(&self) -> usize {
        match self {
            Self::SignedRangeValue { ranges, .. } => ranges.len(),
            Self::UnsignedRangeValue { ranges, .. } => ranges.len(),
            Self::LookupTableValue { table } => table.len(),
            Self::InSetOfValues { values } | Self::NotInSetOfValues { values } => values.len(),
            _ => 0,
        }
    }

    /// 値が集合に含まれ得るか
    ///
    /// スタックフレームオフセットなど比較できない種類では
    /// [`ValueError::NotComparable`] を返します。
    pub fn contains<V: Into<i128>>(&self, value: V) -> std::result::Result<bool, ValueError> {
        let value = value.into();
        match self {
            Self::ConstantValue { value: v } | Self::ConstantPointerValue { value: v } => {
                Ok(*v as i128 == value)
            }
            Self::SignedRangeValue { ranges, .. } => Ok(ranges.iter().any(|r| r.contains(value))),
            Self::UnsignedRangeValue { ranges, .. } => {
                Ok(ranges.iter().any(|r| r.contains(value)))
            }
            Self::InSetOfValues { values } => {
                Ok(i64::try_from(value).is_ok_and(|v| values.contains(&v)))
            }
            Self::NotInSetOfValues { values } => {
                Ok(!i64::try_from(value).is_ok_and(|v| values.contains(&v)))
            }
            other => Err(ValueError::NotComparable(other.kind())),
        }
    }

    /// 定数・定数ポインタ・インポートアドレスの値
    pub fn value(&self) -> Option<i64> {
        match self {
            Self::ConstantValue { value }
            | Self::ConstantPointerValue { value }
            | Self::ImportedAddressValue { value } => Some(*value),
            _ => None,
        }
    }

    /// スタックフレームオフセット、または範囲のオフセット
    pub fn offset(&self) -> Option<i64> {
        match self {
            Self::StackFrameOffset { offset }
            | Self::SignedRangeValue { offset, .. }
            | Self::UnsignedRangeValue { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    pub fn reg(&self) -> Option<&Register> {
        match self {
            Self::EntryValue { reg } => Some(reg),
            _ => None,
        }
    }

    pub fn signed_ranges(&self) -> Option<&[ValueRange<i64>]> {
        match self {
            Self::SignedRangeValue { ranges, .. } => Some(ranges.as_slice()),
            _ => None,
        }
    }

    pub fn unsigned_ranges(&self) -> Option<&[ValueRange<u64>]> {
        match self {
            Self::UnsignedRangeValue { ranges, .. } => Some(ranges.as_slice()),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&LookupTable> {
        match self {
            Self::LookupTableValue { table } => Some(table),
            _ => None,
        }
    }

    /// ルックアップテーブルのフラットな対応表
    pub fn mapping(&self) -> Option<&HashMap<i64, i64>> {
        self.table().map(LookupTable::mapping)
    }

    pub fn values(&self) -> Option<&BTreeSet<i64>> {
        match self {
            Self::InSetOfValues { values } | Self::NotInSetOfValues { values } => Some(values),
            _ => None,
        }
    }
}

impl Default for PossibleValueSet {
    fn default() -> Self {
        Self::Undetermined
    }
}

/// 種類ごとに比較するペイロードを決める（範囲のオフセットは比較しない）
impl PartialEq for PossibleValueSet {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undetermined, Self::Undetermined) => true,
            (Self::ReturnAddressValue, Self::ReturnAddressValue) => true,
            (Self::EntryValue { reg: a }, Self::EntryValue { reg: b }) => a == b,
            (Self::ConstantValue { value: a }, Self::ConstantValue { value: b }) => a == b,
            (Self::ConstantPointerValue { value: a }, Self::ConstantPointerValue { value: b }) => {
                a == b
            }
            (Self::ImportedAddressValue { value: a }, Self::ImportedAddressValue { value: b }) => {
                a == b
            }
            (Self::StackFrameOffset { offset: a }, Self::StackFrameOffset { offset: b }) => a == b,
            (Self::SignedRangeValue { ranges: a, .. }, Self::SignedRangeValue { ranges: b, .. }) => {
                a == b
            }
            (
                Self::UnsignedRangeValue { ranges: a, .. },
                Self::UnsignedRangeValue { ranges: b, .. },
            ) => a == b,
            (Self::LookupTableValue { table: a }, Self::LookupTableValue { table: b }) => a == b,
            (Self::InSetOfValues { values: a }, Self::InSetOfValues { values: b }) => a == b,
            (Self::NotInSetOfValues { values: a }, Self::NotInSetOfValues { values: b }) => a == b,
            _ => false,
        }
    }
}

impl Eq for PossibleValueSet {}

impl Hash for PossibleValueSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        mem::discriminant(self).hash(state);
        match self {
            Self::Undetermined | Self::ReturnAddressValue => {}
            Self::EntryValue { reg } => reg.hash(state),
            Self::ConstantValue { value }
            | Self::ConstantPointerValue { value }
            | Self::ImportedAddressValue { value } => value.hash(state),
            Self::StackFrameOffset { offset } => offset.hash(state),
            Self::SignedRangeValue { ranges, .. } => ranges.hash(state),
            Self::UnsignedRangeValue { ranges, .. } => ranges.hash(state),
            Self::LookupTableValue { table } => table.hash(state),
            Self::InSetOfValues { values } | Self::NotInSetOfValues { values } => {
                values.hash(state)
            }
        }
    }
}

/// 整数との比較は定数系の種類だけが対象
impl PartialEq<i64> for PossibleValueSet {
    fn eq(&self, other: &i64) -> bool {
        self.value() == Some(*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atai_target::DwarfArchitecture;

    fn urange(start: u64, end: u64, step: u64) -> ValueRange<u64> {
        ValueRange::new(start, end, step).unwrap()
    }

    #[test]
    fn test_unsigned_range_membership() {
        let set = PossibleValueSet::unsigned_range_value(vec![urange(0, 5, 1), urange(7, 10, 1)])
            .unwrap();
        assert_eq!(set.contains(3), Ok(true));
        assert_eq!(set.contains(8), Ok(true));
        assert_eq!(set.contains(5), Ok(false));
        assert_eq!(set.contains(6), Ok(false));
        assert_eq!(set.contains(10), Ok(false));
    }

    #[test]
    fn test_set_membership() {
        let in_set = PossibleValueSet::in_set_of_values([1, 2, 3]);
        assert_eq!(in_set.contains(2), Ok(true));
        assert_eq!(in_set.contains(4), Ok(false));

        let not_in_set = PossibleValueSet::not_in_set_of_values([1, 2, 3]);
        assert_eq!(not_in_set.contains(4), Ok(true));
        assert_eq!(not_in_set.contains(2), Ok(false));
        assert_eq!(not_in_set.contains(u64::MAX), Ok(true));
    }

    #[test]
    fn test_constant_membership() {
        assert_eq!(PossibleValueSet::constant(5).contains(5), Ok(true));
        assert_eq!(PossibleValueSet::constant_ptr(0x1000).contains(0x1001), Ok(false));
    }

    #[test]
    fn test_not_comparable() {
        assert_eq!(
            PossibleValueSet::stack_frame_offset(-8).contains(0),
            Err(ValueError::NotComparable(RegisterValueType::StackFrameOffset))
        );
        assert_eq!(
            PossibleValueSet::undetermined().contains(0),
            Err(ValueError::NotComparable(RegisterValueType::UndeterminedValue))
        );
        let table = PossibleValueSet::lookup_table_value(vec![LookupTableEntry::new(vec![1], 2)]);
        assert!(table.contains(1).is_err());
    }

    #[test]
    fn test_empty_ranges_rejected() {
        assert_eq!(
            PossibleValueSet::signed_range_value(vec![]),
            Err(ValueError::EmptyRanges)
        );
        assert_eq!(
            PossibleValueSet::unsigned_range_value(vec![]),
            Err(ValueError::EmptyRanges)
        );
    }

    #[test]
    fn test_sign_extension_on_decode() {
        let mut raw = RawPossibleValueSet::with_state(RegisterValueType::SignedRangeValue);
        raw.ranges = vec![RawValueRange {
            start: 0x8000_0000_0000_0000,
            end: 0xffff_ffff_ffff_ffff,
            step: 1,
        }];
        raw.count = 1;

        let signed = PossibleValueSet::decode(&raw, None).unwrap();
        let ranges = signed.signed_ranges().unwrap();
        assert_eq!(ranges[0].start(), i64::MIN);
        assert_eq!(ranges[0].end(), -1);

        raw.state = RegisterValueType::UnsignedRangeValue.into();
        let unsigned = PossibleValueSet::decode(&raw, None).unwrap();
        let ranges = unsigned.unsigned_ranges().unwrap();
        assert_eq!(ranges[0].start(), 0x8000_0000_0000_0000);
    }

    #[test]
    fn test_count_mismatch() {
        let mut raw = RawPossibleValueSet::with_state(RegisterValueType::InSetOfValues);
        raw.value_set = vec![1, 2];
        raw.count = 3;
        let err = PossibleValueSet::decode(&raw, None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValueError>(),
            Some(&ValueError::CountMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_unknown_state() {
        let raw = RawPossibleValueSet {
            state: 42,
            ..Default::default()
        };
        assert!(PossibleValueSet::decode(&raw, None).is_err());
    }

    #[test]
    fn test_entry_value_roundtrip_with_arch() {
        let arch = DwarfArchitecture::X86_64;
        let set = PossibleValueSet::entry_value("rdi");
        let raw = set.encode(Some(&arch)).unwrap();
        assert_eq!(raw.value, 5);
        assert_eq!(PossibleValueSet::decode(&raw, Some(&arch)).unwrap(), set);
        assert_eq!(
            PossibleValueSet::decode(&raw, None).unwrap(),
            PossibleValueSet::entry_value(5u32)
        );
    }

    #[test]
    fn test_equality_rules() {
        assert!(PossibleValueSet::constant(5) == 5i64);
        assert!(PossibleValueSet::constant_ptr(5) == 5i64);
        assert!(PossibleValueSet::imported_address(5) == 5i64);
        assert!(PossibleValueSet::stack_frame_offset(5) != 5i64);
        assert!(PossibleValueSet::return_address() != 0i64);
        assert_ne!(PossibleValueSet::constant(5), PossibleValueSet::constant_ptr(5));
        assert_eq!(PossibleValueSet::undetermined(), PossibleValueSet::Undetermined);
        assert_ne!(PossibleValueSet::undetermined(), PossibleValueSet::return_address());
        assert_eq!(
            PossibleValueSet::in_set_of_values([3, 1, 2]),
            PossibleValueSet::in_set_of_values([1, 2, 3, 3])
        );
        assert_ne!(
            PossibleValueSet::in_set_of_values([1]),
            PossibleValueSet::not_in_set_of_values([1])
        );
    }

    #[test]
    fn test_range_equality_ignores_offset() {
        let a = PossibleValueSet::UnsignedRangeValue {
            offset: 0,
            ranges: vec![urange(0, 4, 1)],
        };
        let b = PossibleValueSet::UnsignedRangeValue {
            offset: 8,
            ranges: vec![urange(0, 4, 1)],
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_lookup_table_mapping() {
        let set = PossibleValueSet::lookup_table_value(vec![
            LookupTableEntry::new(vec![0x10, 0x20], 1),
            LookupTableEntry::new(vec![0x10], 2),
        ]);
        assert_eq!(set.count(), 2);
        assert_eq!(set.mapping().unwrap().get(&0x10), Some(&2));
        assert_eq!(set.mapping().unwrap().get(&0x20), Some(&1));
    }
}
