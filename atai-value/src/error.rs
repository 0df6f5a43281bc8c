//! 値の変換・比較で発生するエラー

use atai_target::{RegisterValueType, UnknownStateError};

/// 値エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error(transparent)]
    UnknownState(#[from] UnknownStateError),

    #[error("{0} is not a register value state")]
    NotARegisterValue(RegisterValueType),

    #[error("count {actual} does not match the {expected} entries present")]
    CountMismatch { expected: usize, actual: usize },

    #[error("range step must be positive")]
    InvalidStep,

    #[error("a range value set requires at least one range")]
    EmptyRanges,

    #[error("register index {0} is out of range")]
    InvalidRegisterIndex(i64),

    #[error("register '{0}' is unknown to the architecture")]
    UnresolvedRegister(String),

    #[error("register '{0}' needs an architecture to be encoded")]
    MissingArchitecture(String),

    #[error("membership is not comparable for {0} values")]
    NotComparable(RegisterValueType),
}
