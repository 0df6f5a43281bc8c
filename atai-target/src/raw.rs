//! エンジンが返すタグ付きの生の値

use std::fmt;

/// 値の状態タグ
///
/// エンジンの列挙値と同じ数値を持ちます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum RegisterValueType {
    UndeterminedValue = 0,
    EntryValue = 1,
    ConstantValue = 2,
    ConstantPointerValue = 3,
    StackFrameOffset = 4,
    ReturnAddressValue = 5,
    ImportedAddressValue = 6,
    SignedRangeValue = 7,
    UnsignedRangeValue = 8,
    LookupTableValue = 9,
    InSetOfValues = 10,
    NotInSetOfValues = 11,
}

/// 未知の状態タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown register value state {0}")]
pub struct UnknownStateError(pub u32);

impl TryFrom<u32> for RegisterValueType {
    type Error = UnknownStateError;

    fn try_from(state: u32) -> Result<Self, Self::Error> {
        let kind = match state {
            0 => RegisterValueType::UndeterminedValue,
            1 => RegisterValueType::EntryValue,
            2 => RegisterValueType::ConstantValue,
            3 => RegisterValueType::ConstantPointerValue,
            4 => RegisterValueType::StackFrameOffset,
            5 => RegisterValueType::ReturnAddressValue,
            6 => RegisterValueType::ImportedAddressValue,
            7 => RegisterValueType::SignedRangeValue,
            8 => RegisterValueType::UnsignedRangeValue,
            9 => RegisterValueType::LookupTableValue,
            10 => RegisterValueType::InSetOfValues,
            11 => RegisterValueType::NotInSetOfValues,
            other => return Err(UnknownStateError(other)),
        };
        Ok(kind)
    }
}

impl From<RegisterValueType> for u32 {
    fn from(kind: RegisterValueType) -> Self {
        kind as u32
    }
}

impl fmt::Display for RegisterValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            RegisterValueType::UndeterminedValue => "undetermined",
            RegisterValueType::EntryValue => "entry value",
            RegisterValueType::ConstantValue => "constant",
            RegisterValueType::ConstantPointerValue => "constant pointer",
            RegisterValueType::StackFrameOffset => "stack frame offset",
            RegisterValueType::ReturnAddressValue => "return address",
            RegisterValueType::ImportedAddressValue => "imported address",
            RegisterValueType::SignedRangeValue => "signed range",
            RegisterValueType::UnsignedRangeValue => "unsigned range",
            RegisterValueType::LookupTableValue => "lookup table",
            RegisterValueType::InSetOfValues => "in set of values",
            RegisterValueType::NotInSetOfValues => "not in set of values",
        };
        write!(f, "{}", name)
    }
}

/// レジスタ値（生）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawRegisterValue {
    pub state: u32,
    pub value: i64,
}

/// 値の範囲（生）
///
/// `start` と `end` は符号の有無に関係なく64ビットの符号なし値として格納されます。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawValueRange {
    pub start: u64,
    pub end: u64,
    pub step: u64,
}

/// ルックアップテーブルのエントリ（生）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLookupTableEntry {
    pub from_values: Vec<i64>,
    pub to_value: i64,
}

/// 取り得る値の集合（生）
///
/// スカラー値（定数、スタックオフセット、エントリレジスタ番号、範囲のオフセット）は
/// すべて `value` に入ります。`count` は状態が使うリストの長さと一致する必要があります。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPossibleValueSet {
    pub state: u32,
    pub value: i64,
    pub ranges: Vec<RawValueRange>,
    pub table: Vec<RawLookupTableEntry>,
    pub value_set: Vec<i64>,
    pub count: usize,
}

impl RawPossibleValueSet {
    /// 状態タグだけを持つ値を作成する
    pub fn with_state(kind: RegisterValueType) -> Self {
        Self {
            state: kind.into(),
            ..Default::default()
        }
    }
}
