//! デバッグ情報サブシステムのエラー

use std::fmt;

/// コールバックの実行段階
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackStage {
    IsValid,
    ParseInfo,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CallbackStage::IsValid => write!(f, "is_valid"),
            CallbackStage::ParseInfo => write!(f, "parse_info"),
        }
    }
}

/// デバッグ情報エラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DebugInfoError {
    /// 名前で見つからない
    #[error("'{0}' is not a valid debug-info parser")]
    ParserNotFound(String),

    /// 入力がこの操作に対応していない
    #[error("operation not supported: {0}")]
    NotSupported(String),

    /// ユーザーのコールバックが失敗した（ログに記録されるだけで呼び出し元には返らない）
    #[error("debug-info parser '{parser}' failed in {stage}: {message}")]
    CallbackFailed {
        parser: String,
        stage: CallbackStage,
        message: String,
    },
}
