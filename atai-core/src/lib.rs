//! Atai デバッグ情報サブシステム
//!
//! このクレートは、デバッグ情報パーサの登録・検索・実行と、パーサが集めた
//! 型・関数・データ変数を保持するデバッグ情報セッションを提供します。
//! REPLで使うコマンドと整数パースのヘルパーもここに置きます。

pub mod error;
pub mod debug_info;
pub mod parser;
pub mod command;
pub mod parse;

pub use error::{CallbackStage, DebugInfoError};
pub use debug_info::{
    DataVariableAndName, DebugFunctionInfo, DebugInfo, NameAndType, USER_CONTRIBUTOR,
};
pub use parser::{CustomDebugInfoParser, DebugInfoParser, ParserRegistry};
pub use command::{Command, ValueSpec};

/// デバッグ情報サブシステムの結果型
pub type Result<T> = anyhow::Result<T>;
