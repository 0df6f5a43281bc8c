//! 関数と変数の格納場所

use crate::{CoreArchitecture, Ref, Type};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// 変数の格納元の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum VariableSourceType {
    StackVariableSourceType = 0,
    RegisterVariableSourceType = 1,
    FlagVariableSourceType = 2,
}

impl VariableSourceType {
    fn from_bits(bits: u64) -> Self {
        match bits & 0b11 {
            0 => Self::StackVariableSourceType,
            1 => Self::RegisterVariableSourceType,
            _ => Self::FlagVariableSourceType,
        }
    }
}

/// エンジン側の変数表現
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CoreVariable {
    pub source_type: VariableSourceType,
    pub index: u32,
    /// スタック変数ならスタックオフセット、レジスタ変数ならレジスタ番号
    pub storage: i64,
}

impl CoreVariable {
    pub fn new(source_type: VariableSourceType, index: u32, storage: i64) -> Self {
        Self {
            source_type,
            index,
            storage,
        }
    }
}

const INDEX_MASK: u64 = (1 << 30) - 1;

/// 変数を一意な識別子に変換する
///
/// ビット62-63に格納元の種類、ビット32-61にインデックス、
/// ビット0-31に32ビットの格納場所を詰めます。
pub fn to_variable_identifier(var: CoreVariable) -> u64 {
    ((var.source_type as u64) << 62)
        | ((var.index as u64 & INDEX_MASK) << 32)
        | (var.storage as i32 as u32 as u64)
}

/// 識別子から変数を復元する
pub fn from_variable_identifier(identifier: u64) -> CoreVariable {
    CoreVariable {
        source_type: VariableSourceType::from_bits(identifier >> 62),
        index: ((identifier >> 32) & INDEX_MASK) as u32,
        storage: identifier as u32 as i32 as i64,
    }
}

#[derive(Debug, Clone, Default)]
struct VariableInfo {
    name: Option<String>,
    var_type: Option<Type>,
}

/// 関数
///
/// 変数名と変数型はエンジンが保持し、バインディングは必要になった時に問い合わせます。
pub struct Function {
    start: u64,
    architecture: Option<CoreArchitecture>,
    variables: RwLock<HashMap<CoreVariable, VariableInfo>>,
    lookups: AtomicUsize,
}

impl Function {
    /// 関数を作成する
    pub fn new(start: u64, architecture: Option<CoreArchitecture>) -> Ref<Self> {
        Ref::new(Self {
            start,
            architecture,
            variables: RwLock::new(HashMap::new()),
            lookups: AtomicUsize::new(0),
        })
    }

    /// 関数の開始アドレス
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn architecture(&self) -> Option<&CoreArchitecture> {
        self.architecture.as_ref()
    }

    /// 変数を定義する
    pub fn create_variable(&self, var: CoreVariable, name: &str, var_type: Option<Type>) {
        let mut variables = self.variables.write().unwrap_or_else(PoisonError::into_inner);
        variables.insert(
            var,
            VariableInfo {
                name: Some(name.to_string()),
                var_type,
            },
        );
    }

    /// 変数名を変更する
    pub fn set_variable_name(&self, var: CoreVariable, name: &str) {
        let mut variables = self.variables.write().unwrap_or_else(PoisonError::into_inner);
        variables.entry(var).or_default().name = Some(name.to_string());
    }

    /// 変数型を変更する
    pub fn set_variable_type(&self, var: CoreVariable, var_type: Type) {
        let mut variables = self.variables.write().unwrap_or_else(PoisonError::into_inner);
        variables.entry(var).or_default().var_type = Some(var_type);
    }

    /// 変数名を問い合わせる
    pub fn variable_name(&self, var: CoreVariable) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let variables = self.variables.read().unwrap_or_else(PoisonError::into_inner);
        variables.get(&var).and_then(|info| info.name.clone())
    }

    /// 変数型を問い合わせる
    pub fn variable_type(&self, var: CoreVariable) -> Option<Type> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let variables = self.variables.read().unwrap_or_else(PoisonError::into_inner);
        variables.get(&var).and_then(|info| info.var_type.clone())
    }

    /// これまでに受けた変数名・型の問い合わせ回数
    pub fn variable_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.architecture {
            Some(arch) => write!(f, "<func: {}@{:#x}>", arch.name(), self.start),
            None => write!(f, "<func: {:#x}>", self.start),
        }
    }
}
