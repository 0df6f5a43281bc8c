//! デバッグ情報セッション
//!
//! パーサが見つけた型・関数・データ変数を、どのパーサが追加したかと一緒に保持します。
//! 列挙結果は貸し出し配列で返し、配列のドロップ時に必ず返却されます。

use crate::{DebugInfoError, Result};
use atai_target::{CoreArray, LeaseTracker, Type};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// パーサ以外から追加されたものの帰属先
pub const USER_CONTRIBUTOR: &str = "user";

/// 名前付きの型
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NameAndType {
    pub name: String,
    pub ty: Type,
}

/// データ変数とその名前
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataVariableAndName {
    pub address: u64,
    pub ty: Type,
    pub name: Option<String>,
    pub auto_discovered: bool,
    pub type_confidence: u8,
}

impl fmt::Display for DataVariableAndName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<var {:#x}: {} {}>", self.address, self.ty, name),
            None => write!(f, "<var {:#x}: {}>", self.address, self.ty),
        }
    }
}

/// デバッグ情報から得た関数
///
/// 生の（マングルされた）名前だけが与えられた場合、完全名はデマングルで、
/// 短い名前は完全名の最後のパス要素で補います。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugFunctionInfo {
    address: u64,
    short_name: Option<String>,
    full_name: Option<String>,
    raw_name: Option<String>,
    return_type: Option<Type>,
    parameters: Vec<(String, Type)>,
}

/// `a::b::c` の `c`
fn last_segment(name: &str) -> &str {
    name.rsplit("::").next().unwrap_or(name)
}

impl DebugFunctionInfo {
    pub fn new(address: u64) -> Self {
        Self {
            address,
            short_name: None,
            full_name: None,
            raw_name: None,
            return_type: None,
            parameters: Vec::new(),
        }
    }

    pub fn with_short_name(mut self, name: impl Into<String>) -> Self {
        self.short_name = Some(name.into());
        self
    }

    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.short_name.is_none() {
            self.short_name = Some(last_segment(&name).to_string());
        }
        self.full_name = Some(name);
        self
    }

    /// 生の名前を設定し、未設定の完全名・短い名前を補う
    pub fn with_raw_name(mut self, raw_name: impl Into<String>) -> Self {
        let raw_name = raw_name.into();
        if self.full_name.is_none() {
            let full_name = match rustc_demangle::try_demangle(&raw_name) {
                Ok(demangled) => format!("{:#}", demangled),
                Err(_) => {
                    debug!(raw_name = %raw_name, "name is not mangled, using it as the full name");
                    raw_name.clone()
                }
            };
            if self.short_name.is_none() {
                self.short_name = Some(last_segment(&full_name).to_string());
            }
            self.full_name = Some(full_name);
        }
        self.raw_name = Some(raw_name);
        self
    }

    pub fn with_return_type(mut self, return_type: Type) -> Self {
        self.return_type = Some(return_type);
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.parameters.push((name.into(), ty));
        self
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    pub fn raw_name(&self) -> Option<&str> {
        self.raw_name.as_deref()
    }

    pub fn return_type(&self) -> Option<&Type> {
        self.return_type.as_ref()
    }

    pub fn parameters(&self) -> &[(String, Type)] {
        &self.parameters
    }
}

impl fmt::Display for DebugFunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<debug-info function: {}@{:#x}>",
            self.short_name.as_deref().unwrap_or("?"),
            self.address
        )
    }
}

/// 追加元のパーサ名付きの項目
#[derive(Debug, Clone)]
struct Contribution<T> {
    parser: String,
    item: T,
}

#[derive(Debug, Default)]
struct Store {
    types: Vec<Contribution<NameAndType>>,
    functions: Vec<Contribution<DebugFunctionInfo>>,
    data_variables: Vec<Contribution<DataVariableAndName>>,
}

/// 型・関数・データ変数を集めるデバッグ情報セッション
#[derive(Debug)]
pub struct DebugInfo {
    contributor: String,
    store: RwLock<Store>,
    leases: LeaseTracker,
}

impl Default for DebugInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugInfo {
    /// 追加したものを [`USER_CONTRIBUTOR`] に帰属させるセッション
    pub fn new() -> Self {
        Self::for_parser(USER_CONTRIBUTOR)
    }

    /// 追加したものを指定したパーサに帰属させるセッション
    pub fn for_parser(name: impl Into<String>) -> Self {
        Self {
            contributor: name.into(),
            store: RwLock::new(Store::default()),
            leases: LeaseTracker::new(),
        }
    }

    /// このセッションで追加したものの帰属先
    pub fn contributor(&self) -> &str {
        &self.contributor
    }

    fn read_store(&self) -> std::sync::RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> std::sync::RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn collect<T: Clone>(
        &self,
        items: &[Contribution<T>],
        parser: Option<&str>,
    ) -> CoreArray<T> {
        let selected = items
            .iter()
            .filter(|c| parser.map_or(true, |name| c.parser == name))
            .map(|c| c.item.clone())
            .collect();
        self.leases.lease(selected)
    }

    pub fn types(&self) -> CoreArray<NameAndType> {
        self.collect(&self.read_store().types, None)
    }

    /// 指定したパーサが追加した型（知らない名前なら空）
    pub fn types_from_parser(&self, name: &str) -> CoreArray<NameAndType> {
        self.collect(&self.read_store().types, Some(name))
    }

    pub fn functions(&self) -> CoreArray<DebugFunctionInfo> {
        self.collect(&self.read_store().functions, None)
    }

    pub fn functions_from_parser(&self, name: &str) -> CoreArray<DebugFunctionInfo> {
        self.collect(&self.read_store().functions, Some(name))
    }

    pub fn data_variables(&self) -> CoreArray<DataVariableAndName> {
        self.collect(&self.read_store().data_variables, None)
    }

    pub fn data_variables_from_parser(&self, name: &str) -> CoreArray<DataVariableAndName> {
        self.collect(&self.read_store().data_variables, Some(name))
    }

    /// 何かを追加したパーサの名前（追加順）
    pub fn parser_names(&self) -> Vec<String> {
        let store = self.read_store();
        let mut names: Vec<String> = Vec::new();
        let all = store
            .types
            .iter()
            .map(|c| &c.parser)
            .chain(store.functions.iter().map(|c| &c.parser))
            .chain(store.data_variables.iter().map(|c| &c.parser));
        for name in all {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// 型を追加する（このパーサが同じ名前を追加済みなら `false`）
    pub fn add_type(&self, name: &str, ty: &Type) -> Result<bool> {
        let mut store = self.write_store();
        if store
            .types
            .iter()
            .any(|c| c.parser == self.contributor && c.item.name == name)
        {
            return Ok(false);
        }
        store.types.push(Contribution {
            parser: self.contributor.clone(),
            item: NameAndType {
                name: name.to_string(),
                ty: ty.clone(),
            },
        });
        debug!(parser = %self.contributor, name, "added debug type");
        Ok(true)
    }

    /// 関数を追加する（このパーサが同じアドレスを追加済みなら `false`）
    ///
    /// 格納場所を持たない型の引数は受け付けません。
    pub fn add_function(&self, function: &DebugFunctionInfo) -> Result<bool> {
        if let Some((name, ty)) = function.parameters.iter().find(|(_, ty)| !ty.has_storage()) {
            return Err(DebugInfoError::NotSupported(format!(
                "parameter '{}' of type {} has no storage",
                name, ty
            ))
            .into());
        }
        let mut store = self.write_store();
        if store
            .functions
            .iter()
            .any(|c| c.parser == self.contributor && c.item.address == function.address)
        {
            return Ok(false);
        }
        store.functions.push(Contribution {
            parser: self.contributor.clone(),
            item: function.clone(),
        });
        debug!(parser = %self.contributor, address = function.address, "added debug function");
        Ok(true)
    }

    /// データ変数を追加する（このパーサが同じアドレスを追加済みなら `false`）
    pub fn add_data_variable(&self, address: u64, ty: &Type, name: Option<&str>) -> Result<bool> {
        if !ty.has_storage() {
            return Err(DebugInfoError::NotSupported(format!(
                "data variable at {:#x} cannot have type {}",
                address, ty
            ))
            .into());
        }
        let mut store = self.write_store();
        if store
            .data_variables
            .iter()
            .any(|c| c.parser == self.contributor && c.item.address == address)
        {
            return Ok(false);
        }
        store.data_variables.push(Contribution {
            parser: self.contributor.clone(),
            item: DataVariableAndName {
                address,
                ty: ty.clone(),
                name: name.map(str::to_string),
                auto_discovered: true,
                type_confidence: ty.confidence(),
            },
        });
        debug!(parser = %self.contributor, address, "added debug data variable");
        Ok(true)
    }

    /// 別のセッションの内容を、元の帰属先のまま取り込む
    ///
    /// 同じパーサが同じ名前・アドレスを追加済みの項目は取り込みません。
    pub(crate) fn merge(&self, other: &DebugInfo) {
        if std::ptr::eq(self, other) {
            return;
        }
        let incoming = other.read_store();
        let mut store = self.write_store();
        for c in &incoming.types {
            if !store
                .types
                .iter()
                .any(|t| t.parser == c.parser && t.item.name == c.item.name)
            {
                store.types.push(c.clone());
            }
        }
        for c in &incoming.functions {
            if !store
                .functions
                .iter()
                .any(|f| f.parser == c.parser && f.item.address == c.item.address)
            {
                store.functions.push(c.clone());
            }
        }
        for c in &incoming.data_variables {
            if !store
                .data_variables
                .iter()
                .any(|v| v.parser == c.parser && v.item.address == c.item.address)
            {
                store.data_variables.push(c.clone());
            }
        }
    }

    /// 返却されていない貸し出し配列の数
    pub fn outstanding_leases(&self) -> usize {
        self.leases.outstanding()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demangle_raw_name() {
        let info = DebugFunctionInfo::new(0x1000)
            .with_raw_name("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
        assert_eq!(info.full_name(), Some("core::ptr::drop_in_place"));
        assert_eq!(info.short_name(), Some("drop_in_place"));
        assert_eq!(
            info.raw_name(),
            Some("_ZN4core3ptr13drop_in_place17h0123456789abcdefE")
        );
    }

    #[test]
    fn test_unmangled_raw_name() {
        let info = DebugFunctionInfo::new(0x1000).with_raw_name("main");
        assert_eq!(info.full_name(), Some("main"));
        assert_eq!(info.short_name(), Some("main"));
    }

    #[test]
    fn test_explicit_names_win() {
        let info = DebugFunctionInfo::new(0x1000)
            .with_short_name("entry")
            .with_raw_name("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
        assert_eq!(info.short_name(), Some("entry"));
        assert_eq!(info.full_name(), Some("core::ptr::drop_in_place"));
        assert_eq!(info.to_string(), "<debug-info function: entry@0x1000>");
    }

    #[test]
    fn test_duplicate_adds_return_false() {
        let info = DebugInfo::for_parser("dwarf");
        assert!(info.add_type("size_t", &Type::int(8, false)).unwrap());
        assert!(!info.add_type("size_t", &Type::int(4, false)).unwrap());

        let function = DebugFunctionInfo::new(0x2000).with_short_name("f");
        assert!(info.add_function(&function).unwrap());
        assert!(!info.add_function(&function).unwrap());

        assert!(info.add_data_variable(0x4000, &Type::int(4, true), Some("g")).unwrap());
        assert!(!info.add_data_variable(0x4000, &Type::int(4, true), None).unwrap());
    }

    #[test]
    fn test_void_storage_is_not_supported() {
        let info = DebugInfo::new();
        let err = info.add_data_variable(0x4000, &Type::void(), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DebugInfoError>(),
            Some(DebugInfoError::NotSupported(_))
        ));

        let function = DebugFunctionInfo::new(0x2000).with_parameter("x", Type::void());
        assert!(info.add_function(&function).is_err());
        assert!(info.functions().is_empty());

        // void は戻り値型としてなら使える
        let function = DebugFunctionInfo::new(0x2000).with_return_type(Type::void());
        assert!(info.add_function(&function).unwrap());
    }

    #[test]
    fn test_filter_by_parser() {
        let session = DebugInfo::for_parser("pdb");
        session.add_type("HANDLE", &Type::pointer(8, &Type::void())).unwrap();

        let staging = DebugInfo::for_parser("dwarf");
        staging.add_type("size_t", &Type::int(8, false)).unwrap();
        session.merge(&staging);

        assert_eq!(session.types().len(), 2);
        let dwarf = session.types_from_parser("dwarf");
        assert_eq!(dwarf.len(), 1);
        assert_eq!(dwarf[0].name, "size_t");
        assert!(session.types_from_parser("missing").is_empty());
        assert_eq!(session.parser_names(), vec!["pdb".to_string(), "dwarf".to_string()]);
    }

    #[test]
    fn test_arrays_are_returned() {
        let info = DebugInfo::new();
        info.add_type("int", &Type::int(4, true)).unwrap();
        {
            let types = info.types();
            let functions = info.functions();
            assert_eq!(types.len(), 1);
            assert!(functions.is_empty());
            assert_eq!(info.outstanding_leases(), 2);
        }
        assert_eq!(info.outstanding_leases(), 0);
    }
}
