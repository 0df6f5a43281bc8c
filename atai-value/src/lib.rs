//! Atai 値の格子
//!
//! このクレートは、レジスタや変数が取り得る値を表す格子を提供します。
//! エンジンが計算した生のタグ付き値のデコード・エンコード、範囲や集合に対する
//! 所属判定、変数の同一性キャッシュ、IL参照の記録などを扱います。

pub mod error;
pub mod register;
pub mod range;
pub mod lookup_table;
pub mod register_value;
pub mod possible_value_set;
pub mod variables;
pub mod references;
pub mod value_formatter;

pub use error::ValueError;
pub use register::Register;
pub use range::ValueRange;
pub use lookup_table::{LookupTable, LookupTableEntry};
pub use register_value::{AbstractValue, RegisterValue};
pub use possible_value_set::PossibleValueSet;
pub use variables::Variable;
pub use references::{
    AddressRange, ArchAndAddr, ConstantReference, FunctionGraphType, ILReferenceSource,
    IndirectBranchInfo, ParameterVariables, StackVariableReference, UserVariableValueInfo,
    VariableReferenceSource, NO_SOURCE_OPERAND,
};
pub use value_formatter::{FormatConfig, ValueFormatter};

/// 値の格子の結果型
pub type Result<T> = anyhow::Result<T>;
