//! 解析対象のビュー

use crate::{CoreArchitecture, CoreArray, Function, LeaseTracker, Ref};
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// バイナリビュー
///
/// デバッグ情報パーサーが適用可否を判断する対象です。
/// ファイルの読み込みは行わず、識別情報と関数リストだけを持ちます。
pub struct BinaryView {
    file_name: String,
    view_type: String,
    architecture: Option<CoreArchitecture>,
    functions: RwLock<Vec<Ref<Function>>>,
    leases: LeaseTracker,
}

impl BinaryView {
    /// ビューを作成する
    pub fn new(file_name: impl Into<String>, view_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            view_type: view_type.into(),
            architecture: None,
            functions: RwLock::new(Vec::new()),
            leases: LeaseTracker::new(),
        }
    }

    pub fn with_architecture(mut self, architecture: CoreArchitecture) -> Self {
        self.architecture = Some(architecture);
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// ビューの種類（"ELF", "PE" など）
    pub fn view_type(&self) -> &str {
        &self.view_type
    }

    pub fn architecture(&self) -> Option<&CoreArchitecture> {
        self.architecture.as_ref()
    }

    /// 関数を追加する
    pub fn add_function(&self, function: Ref<Function>) {
        let mut functions = self.functions.write().unwrap_or_else(PoisonError::into_inner);
        functions.push(function);
    }

    /// 関数リストを貸し出す
    pub fn functions(&self) -> CoreArray<Ref<Function>> {
        let functions = self.functions.read().unwrap_or_else(PoisonError::into_inner);
        self.leases
            .lease(functions.iter().map(Ref::new_reference).collect())
    }

    /// 返却されていない貸し出し配列の数
    pub fn outstanding_leases(&self) -> usize {
        self.leases.outstanding()
    }
}

impl fmt::Debug for BinaryView {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<BinaryView: '{}', type: '{}'>", self.file_name, self.view_type)
    }
}
