//! レジスタ値（1つの推論結果）

use crate::range::signed_hex;
use crate::{Register, Result, ValueError};
use atai_target::{Architecture, RawRegisterValue, RegisterValueType, MAX_CONFIDENCE};
use std::fmt;
use std::hash::{Hash, Hasher};

/// レジスタや変数について推論された1つの事実
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbstractValue {
    /// 値が決まらない
    Undetermined,
    /// 関数入口でのレジスタの値
    EntryValue(Register),
    /// 定数
    Constant(i64),
    /// 定数ポインタ
    ConstantPointer(i64),
    /// スタックフレームからのオフセット
    StackFrameOffset(i64),
    /// 戻りアドレス
    ReturnAddress,
    /// インポートされたアドレス
    ImportedAddress(i64),
}

impl AbstractValue {
    /// 状態タグ
    pub fn kind(&self) -> RegisterValueType {
        match self {
            AbstractValue::Undetermined => RegisterValueType::UndeterminedValue,
            AbstractValue::EntryValue(_) => RegisterValueType::EntryValue,
            AbstractValue::Constant(_) => RegisterValueType::ConstantValue,
            AbstractValue::ConstantPointer(_) => RegisterValueType::ConstantPointerValue,
            AbstractValue::StackFrameOffset(_) => RegisterValueType::StackFrameOffset,
            AbstractValue::ReturnAddress => RegisterValueType::ReturnAddressValue,
            AbstractValue::ImportedAddress(_) => RegisterValueType::ImportedAddressValue,
        }
    }
}

/// 信頼度付きのレジスタ値
///
/// 信頼度は等価性やハッシュには影響しません。
#[derive(Debug, Clone)]
pub struct RegisterValue {
    value: AbstractValue,
    confidence: u8,
}

impl RegisterValue {
    pub fn new(value: AbstractValue, confidence: u8) -> Self {
        Self { value, confidence }
    }

    pub fn undetermined() -> Self {
        Self::new(AbstractValue::Undetermined, MAX_CONFIDENCE)
    }

    /// 関数入口でのレジスタ値
    pub fn entry_value(reg: impl Into<Register>) -> Self {
        Self::new(AbstractValue::EntryValue(reg.into()), MAX_CONFIDENCE)
    }

    pub fn constant(value: i64) -> Self {
        Self::new(AbstractValue::Constant(value), MAX_CONFIDENCE)
    }

    pub fn constant_ptr(value: i64) -> Self {
        Self::new(AbstractValue::ConstantPointer(value), MAX_CONFIDENCE)
    }

    pub fn stack_frame_offset(offset: i64) -> Self {
        Self::new(AbstractValue::StackFrameOffset(offset), MAX_CONFIDENCE)
    }

    pub fn imported_address(value: i64) -> Self {
        Self::new(AbstractValue::ImportedAddress(value), MAX_CONFIDENCE)
    }

    pub fn return_address() -> Self {
        Self::new(AbstractValue::ReturnAddress, MAX_CONFIDENCE)
    }

    /// 信頼度を変更した値を返す
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence;
        self
    }

    /// エンジンの生の値をデコードする
    ///
    /// アーキテクチャが与えられた場合、エントリ値のレジスタ番号はレジスタ名に解決されます。
    pub fn decode(
        raw: &RawRegisterValue,
        arch: Option<&dyn Architecture>,
        confidence: u8,
    ) -> Result<Self> {
        let kind = RegisterValueType::try_from(raw.state).map_err(ValueError::from)?;
        let value = match kind {
            RegisterValueType::UndeterminedValue => AbstractValue::Undetermined,
            RegisterValueType::EntryValue => {
                AbstractValue::EntryValue(Register::from_raw(raw.value, arch)?)
            }
            RegisterValueType::ConstantValue => AbstractValue::Constant(raw.value),
            RegisterValueType::ConstantPointerValue => AbstractValue::ConstantPointer(raw.value),
            RegisterValueType::StackFrameOffset => AbstractValue::StackFrameOffset(raw.value),
            RegisterValueType::ReturnAddressValue => AbstractValue::ReturnAddress,
            RegisterValueType::ImportedAddressValue => AbstractValue::ImportedAddress(raw.value),
            other => return Err(ValueError::NotARegisterValue(other).into()),
        };
        Ok(Self { value, confidence })
    }

    /// エンジンの生の値にエンコードする
    pub fn encode(&self, arch: Option<&dyn Architecture>) -> Result<RawRegisterValue> {
        let value = match &self.value {
            AbstractValue::Undetermined | AbstractValue::ReturnAddress => 0,
            AbstractValue::EntryValue(reg) => reg.to_index(arch)? as i64,
            AbstractValue::Constant(v)
            | AbstractValue::ConstantPointer(v)
            | AbstractValue::StackFrameOffset(v)
            | AbstractValue::ImportedAddress(v) => *v,
        };
        Ok(RawRegisterValue {
            state: self.kind().into(),
            value,
        })
    }

    pub fn value(&self) -> &AbstractValue {
        &self.value
    }

    pub fn kind(&self) -> RegisterValueType {
        self.value.kind()
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// 定数と分かっているか
    pub fn is_constant(&self) -> bool {
        matches!(
            self.value,
            AbstractValue::Constant(_) | AbstractValue::ConstantPointer(_)
        )
    }

    /// 定数・定数ポインタ・インポートアドレスの値
    pub fn int_value(&self) -> Option<i64> {
        match self.value {
            AbstractValue::Constant(v)
            | AbstractValue::ConstantPointer(v)
            | AbstractValue::ImportedAddress(v) => Some(v),
            _ => None,
        }
    }

    /// スタックフレームオフセット
    pub fn offset(&self) -> Option<i64> {
        match self.value {
            AbstractValue::StackFrameOffset(offset) => Some(offset),
            _ => None,
        }
    }

    pub fn reg(&self) -> Option<&Register> {
        match &self.value {
            AbstractValue::EntryValue(reg) => Some(reg),
            _ => None,
        }
    }
}

impl Default for RegisterValue {
    fn default() -> Self {
        Self::undetermined()
    }
}

impl PartialEq for RegisterValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for RegisterValue {}

impl Hash for RegisterValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

/// 整数との比較は定数系の種類だけが対象（戻りアドレスは値を持たないので常に不一致）
impl PartialEq<i64> for RegisterValue {
    fn eq(&self, other: &i64) -> bool {
        self.int_value() == Some(*other)
    }
}

impl fmt::Display for RegisterValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.value {
            AbstractValue::Undetermined => write!(f, "<undetermined>"),
            AbstractValue::EntryValue(reg) => write!(f, "<entry {}>", reg),
            AbstractValue::Constant(v) => write!(f, "<const {}>", signed_hex(*v as i128)),
            AbstractValue::ConstantPointer(v) => {
                write!(f, "<const ptr {}>", signed_hex(*v as i128))
            }
            AbstractValue::StackFrameOffset(offset) => {
                write!(f, "<stack frame offset {}>", signed_hex(*offset as i128))
            }
            AbstractValue::ReturnAddress => write!(f, "<return address>"),
            AbstractValue::ImportedAddress(v) => {
                write!(f, "<imported address from entry {}>", signed_hex(*v as i128))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atai_target::DwarfArchitecture;
    use std::collections::HashSet;

    #[test]
    fn test_decode_entry_value() {
        let raw = RawRegisterValue {
            state: RegisterValueType::EntryValue.into(),
            value: 7,
        };
        let arch = DwarfArchitecture::X86_64;

        let named = RegisterValue::decode(&raw, Some(&arch), MAX_CONFIDENCE).unwrap();
        assert_eq!(named.reg(), Some(&Register::Name("rsp".into())));

        let unnamed = RegisterValue::decode(&raw, None, MAX_CONFIDENCE).unwrap();
        assert_eq!(unnamed.reg(), Some(&Register::Index(7)));

        assert_eq!(named.encode(Some(&arch)).unwrap(), raw);
        assert_eq!(unnamed.encode(None).unwrap(), raw);
    }

    #[test]
    fn test_is_constant() {
        assert!(RegisterValue::constant(1).is_constant());
        assert!(RegisterValue::constant_ptr(0x1000).is_constant());
        assert!(!RegisterValue::imported_address(0x10).is_constant());
        assert!(!RegisterValue::stack_frame_offset(-8).is_constant());
    }

    #[test]
    fn test_equality_ignores_confidence() {
        let a = RegisterValue::constant(5).with_confidence(10);
        let b = RegisterValue::constant(5);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_integer_comparison() {
        assert!(RegisterValue::constant(5) == 5i64);
        assert!(RegisterValue::constant_ptr(0x1000) == 0x1000i64);
        assert!(RegisterValue::imported_address(0x10) == 0x10i64);
        assert!(RegisterValue::stack_frame_offset(5) != 5i64);
        assert!(RegisterValue::return_address() != 0i64);
        assert!(RegisterValue::undetermined() != 0i64);
    }

    #[test]
    fn test_kinds_are_not_interchangeable() {
        assert_ne!(RegisterValue::constant(5), RegisterValue::constant_ptr(5));
    }

    #[test]
    fn test_range_state_is_rejected() {
        let raw = RawRegisterValue {
            state: RegisterValueType::SignedRangeValue.into(),
            value: 0,
        };
        let err = RegisterValue::decode(&raw, None, MAX_CONFIDENCE).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValueError>(),
            Some(&ValueError::NotARegisterValue(RegisterValueType::SignedRangeValue))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(RegisterValue::constant(0x10).to_string(), "<const 0x10>");
        assert_eq!(RegisterValue::stack_frame_offset(-0x10).to_string(), "<stack frame offset -0x10>");
        assert_eq!(RegisterValue::entry_value("rdi").to_string(), "<entry rdi>");
        assert_eq!(RegisterValue::return_address().to_string(), "<return address>");
    }
}
