//! デバッグ情報パーサの登録と実行
//!
//! ユーザーが実装したパーサをレジストリに登録し、ビューごとに適用可否を判定して
//! デバッグ情報セッションを組み立てます。ユーザーのコールバックが失敗（エラーまたは
//! パニック）しても呼び出し元には伝播させず、ログに記録して「結果なし」として扱います。

use crate::{DebugInfo, DebugInfoError, Result};
use crate::error::CallbackStage;
use atai_target::{BinaryView, CoreArray, LeaseTracker, Ref};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{OnceLock, PoisonError, RwLock};
use tracing::{debug, error, warn};

/// ユーザーが実装するデバッグ情報パーサ
pub trait CustomDebugInfoParser: Send + Sync {
    /// このビューを解析できるか
    fn is_valid(&self, view: &BinaryView) -> Result<bool>;

    /// ビューを解析してデバッグ情報を追加する
    fn parse_info(&self, debug_info: &DebugInfo, view: &BinaryView) -> Result<()>;
}

/// パニックのペイロードをメッセージにする
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// コールバックを隔離して実行する
///
/// 失敗は `error!` で記録し、[`DebugInfoError::CallbackFailed`] として返します。
fn isolate<T>(
    parser: &str,
    stage: CallbackStage,
    callback: impl FnOnce() -> Result<T>,
) -> std::result::Result<T, DebugInfoError> {
    let message = match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(err)) => format!("{:#}", err),
        Err(payload) => panic_message(payload),
    };
    let failure = DebugInfoError::CallbackFailed {
        parser: parser.to_string(),
        stage,
        message,
    };
    error!(parser, %stage, "{}", failure);
    Err(failure)
}

/// 登録済みのデバッグ情報パーサ
pub struct DebugInfoParser {
    name: String,
    callbacks: Box<dyn CustomDebugInfoParser>,
}

impl DebugInfoParser {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// ビューに適用できるか（コールバックが失敗した場合は `false`）
    pub fn is_valid_for_view(&self, view: &BinaryView) -> bool {
        isolate(&self.name, CallbackStage::IsValid, || self.callbacks.is_valid(view))
            .unwrap_or(false)
    }

    /// ビューを解析する
    ///
    /// `existing` があればそのセッションに追加し、なければ新しいセッションを作ります。
    /// コールバックが失敗した場合は `None` を返し、途中まで追加された内容は捨てます。
    pub fn parse_debug_info(
        &self,
        view: &BinaryView,
        existing: Option<&Ref<DebugInfo>>,
    ) -> Option<Ref<DebugInfo>> {
        let staging = DebugInfo::for_parser(self.name.as_str());
        isolate(&self.name, CallbackStage::ParseInfo, || {
            self.callbacks.parse_info(&staging, view)
        })
        .ok()?;

        let session = match existing {
            Some(session) => session.new_reference(),
            None => Ref::new(DebugInfo::for_parser(self.name.as_str())),
        };
        session.merge(&staging);
        debug!(
            parser = %self.name,
            view = view.file_name(),
            types = staging.types().len(),
            functions = staging.functions().len(),
            "parsed debug info"
        );
        Some(session)
    }
}

impl fmt::Debug for DebugInfoParser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<debug-info parser: '{}'>", self.name)
    }
}

impl fmt::Display for DebugInfoParser {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<debug-info parser: '{}'>", self.name)
    }
}

/// デバッグ情報パーサのレジストリ
///
/// 一度登録したパーサは削除されず、レジストリの寿命（グローバルならプロセス終了）まで残ります。
#[derive(Default)]
pub struct ParserRegistry {
    parsers: RwLock<Vec<Ref<DebugInfoParser>>>,
    leases: LeaseTracker,
}

static GLOBAL_REGISTRY: OnceLock<ParserRegistry> = OnceLock::new();

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// プロセス全体で共有されるレジストリ
    pub fn global() -> &'static ParserRegistry {
        GLOBAL_REGISTRY.get_or_init(ParserRegistry::new)
    }

    /// パーサを登録する（同じ名前が登録済みなら最初のものを残してエラー）
    pub fn register(
        &self,
        name: &str,
        parser: impl CustomDebugInfoParser + 'static,
    ) -> Result<Ref<DebugInfoParser>> {
        let mut parsers = self.parsers.write().unwrap_or_else(PoisonError::into_inner);
        if parsers.iter().any(|p| p.name == name) {
            warn!(parser = name, "debug-info parser is already registered");
            return Err(DebugInfoError::NotSupported(format!(
                "debug-info parser '{}' is already registered",
                name
            ))
            .into());
        }
        let registered = Ref::new(DebugInfoParser {
            name: name.to_string(),
            callbacks: Box::new(parser),
        });
        parsers.push(registered.new_reference());
        debug!(parser = name, "registered debug-info parser");
        Ok(registered)
    }

    /// 登録済みのパーサ（登録順）
    pub fn list(&self) -> CoreArray<Ref<DebugInfoParser>> {
        let parsers = self.parsers.read().unwrap_or_else(PoisonError::into_inner);
        self.leases
            .lease(parsers.iter().map(Ref::new_reference).collect())
    }

    /// 名前でパーサを取得する
    pub fn get(&self, name: &str) -> Result<Ref<DebugInfoParser>> {
        let parsers = self.parsers.read().unwrap_or_else(PoisonError::into_inner);
        parsers
            .iter()
            .find(|p| p.name == name)
            .map(Ref::new_reference)
            .ok_or_else(|| DebugInfoError::ParserNotFound(name.to_string()).into())
    }

    /// ビューに適用できるパーサ
    pub fn parsers_for_view(&self, view: &BinaryView) -> CoreArray<Ref<DebugInfoParser>> {
        let candidates = self.list();
        let applicable = candidates
            .iter()
            .filter(|p| p.is_valid_for_view(view))
            .map(Ref::new_reference)
            .collect();
        self.leases.lease(applicable)
    }

    /// 適用できるすべてのパーサでビューを解析し、1つのセッションにまとめる
    ///
    /// 失敗したパーサは読み飛ばします。
    pub fn parse_debug_info(
        &self,
        view: &BinaryView,
        existing: Option<&Ref<DebugInfo>>,
    ) -> Ref<DebugInfo> {
        let session = match existing {
            Some(session) => session.new_reference(),
            None => Ref::new(DebugInfo::new()),
        };
        for parser in &self.parsers_for_view(view) {
            if parser.parse_debug_info(view, Some(&session)).is_none() {
                warn!(parser = parser.name(), view = view.file_name(), "skipping failed debug-info parser");
            }
        }
        session
    }

    pub fn len(&self) -> usize {
        self.parsers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 返却されていない貸し出し配列の数
    pub fn outstanding_leases(&self) -> usize {
        self.leases.outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atai_target::Type;

    struct ElfTypes;

    impl CustomDebugInfoParser for ElfTypes {
        fn is_valid(&self, view: &BinaryView) -> Result<bool> {
            Ok(view.view_type() == "ELF")
        }

        fn parse_info(&self, debug_info: &DebugInfo, _view: &BinaryView) -> Result<()> {
            debug_info.add_type("size_t", &Type::int(8, false))?;
            Ok(())
        }
    }

    struct Failing;

    impl CustomDebugInfoParser for Failing {
        fn is_valid(&self, _view: &BinaryView) -> Result<bool> {
            Ok(true)
        }

        fn parse_info(&self, debug_info: &DebugInfo, _view: &BinaryView) -> Result<()> {
            debug_info.add_type("partial", &Type::int(4, true))?;
            anyhow::bail!("truncated section")
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = ParserRegistry::new();
        let parser = registry.register("elf-types", ElfTypes).unwrap();
        assert_eq!(parser.name(), "elf-types");

        let found = registry.get("elf-types").unwrap();
        assert!(Ref::ptr_eq(&parser, &found));
        assert_eq!(parser, found);
    }

    #[test]
    fn test_get_unknown_parser() {
        let registry = ParserRegistry::new();
        let err = registry.get("pdb").unwrap_err();
        assert_eq!(
            err.downcast_ref::<DebugInfoError>(),
            Some(&DebugInfoError::ParserNotFound("pdb".into()))
        );
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let registry = ParserRegistry::new();
        let first = registry.register("dup", ElfTypes).unwrap();
        assert!(registry.register("dup", Failing).is_err());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("dup").unwrap(), first);
    }

    #[test]
    fn test_failed_parse_discards_partial_results() {
        let registry = ParserRegistry::new();
        let parser = registry.register("failing", Failing).unwrap();
        let view = BinaryView::new("a.out", "ELF");

        assert!(parser.parse_debug_info(&view, None).is_none());

        let existing = Ref::new(DebugInfo::new());
        assert!(parser.parse_debug_info(&view, Some(&existing)).is_none());
        assert!(existing.types().is_empty());
    }

    #[test]
    fn test_parse_into_existing_session() {
        let registry = ParserRegistry::new();
        let parser = registry.register("elf-types", ElfTypes).unwrap();
        let view = BinaryView::new("a.out", "ELF");

        let existing = Ref::new(DebugInfo::new());
        let session = parser.parse_debug_info(&view, Some(&existing)).unwrap();
        assert!(Ref::ptr_eq(&session, &existing));
        assert_eq!(existing.types_from_parser("elf-types").len(), 1);
    }

    #[test]
    fn test_global_registry_is_shared() {
        let registry = ParserRegistry::global();
        registry.register("global-elf-types", ElfTypes).unwrap();
        assert!(ParserRegistry::global().get("global-elf-types").is_ok());
    }
}
