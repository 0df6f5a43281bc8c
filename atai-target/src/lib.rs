//! Atai エンジン境界
//!
//! このクレートは、解析エンジン側のオブジェクトとワイヤ表現を提供します。
//! タグ付きの生の値、参照カウント付きハンドル、貸し出し配列、
//! レジスタ名の解決、関数・型・ビューといったエンジンオブジェクトを扱います。

pub mod raw;
pub mod handle;
pub mod array;
pub mod registers;
pub mod function;
pub mod types;
pub mod view;

pub use raw::{
    RawLookupTableEntry, RawPossibleValueSet, RawRegisterValue, RawValueRange,
    RegisterValueType, UnknownStateError,
};
pub use handle::Ref;
pub use array::{CoreArray, LeaseTracker};
pub use registers::{Architecture, CoreArchitecture, DwarfArchitecture};
pub use function::{
    from_variable_identifier, to_variable_identifier, CoreVariable, Function, VariableSourceType,
};
pub use types::{Type, TypeClass};
pub use view::BinaryView;

/// 信頼度の最大値
pub const MAX_CONFIDENCE: u8 = 255;

/// エンジン境界の結果型
pub type Result<T> = anyhow::Result<T>;
