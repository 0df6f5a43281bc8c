//! エンジンの型オブジェクト

use crate::MAX_CONFIDENCE;
use std::fmt;

/// 型の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Void,
    Bool,
    Integer,
    Float,
    Pointer,
    Structure,
    Enumeration,
    Function,
    Array,
}

/// 型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    class: TypeClass,
    name: String,
    /// サイズ（バイト）
    width: u64,
    confidence: u8,
}

impl Type {
    fn build(class: TypeClass, name: impl Into<String>, width: u64) -> Self {
        Self {
            class,
            name: name.into(),
            width,
            confidence: MAX_CONFIDENCE,
        }
    }

    pub fn void() -> Self {
        Self::build(TypeClass::Void, "void", 0)
    }

    pub fn bool() -> Self {
        Self::build(TypeClass::Bool, "bool", 1)
    }

    /// 整数型（`int32_t` などの名前を付ける）
    pub fn int(width: u64, signed: bool) -> Self {
        let prefix = if signed { "int" } else { "uint" };
        Self::build(TypeClass::Integer, format!("{}{}_t", prefix, width.saturating_mul(8)), width)
    }

    pub fn float(width: u64) -> Self {
        let name = match width {
            4 => "float".to_string(),
            8 => "double".to_string(),
            _ => format!("float{}", width.saturating_mul(8)),
        };
        Self::build(TypeClass::Float, name, width)
    }

    /// ポインタ型
    pub fn pointer(width: u64, target: &Type) -> Self {
        Self::build(TypeClass::Pointer, format!("{}*", target.name), width)
    }

    pub fn array(element: &Type, count: u64) -> Self {
        Self::build(
            TypeClass::Array,
            format!("{}[{}]", element.name, count),
            element.width.saturating_mul(count),
        )
    }

    /// 名前付きの型（構造体・列挙型・関数型）
    pub fn named(class: TypeClass, name: impl Into<String>, width: u64) -> Self {
        Self::build(class, name, width)
    }

    /// 信頼度を変更した型を返す
    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn class(&self) -> TypeClass {
        self.class
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// 値を格納できる型か（`void` は格納先を持たない）
    pub fn has_storage(&self) -> bool {
        self.class != TypeClass::Void
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}
