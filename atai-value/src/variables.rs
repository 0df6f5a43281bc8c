//! 変数の同一性と名前・型のキャッシュ

use atai_target::{
    from_variable_identifier, to_variable_identifier, CoreVariable, Function, Ref, Type,
    VariableSourceType,
};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// 関数内の1つの格納場所を表す変数
///
/// 識別子・名前・型は最初に参照した時に一度だけ取得してキャッシュします。
/// キャッシュは無効化されないので、エンジン側で名前が変わっても古い値を返します。
/// 等価性とハッシュは（識別子, 所属する関数）だけで決まります。
#[derive(Debug)]
pub struct Variable {
    function: Option<Ref<Function>>,
    source_type: VariableSourceType,
    index: u32,
    storage: i64,
    identifier: OnceLock<u64>,
    name: OnceLock<Option<String>>,
    var_type: OnceLock<Option<Type>>,
}

impl Variable {
    pub fn new(
        function: Option<&Ref<Function>>,
        source_type: VariableSourceType,
        index: u32,
        storage: i64,
    ) -> Self {
        Self {
            function: function.map(Ref::new_reference),
            source_type,
            index,
            storage,
            identifier: OnceLock::new(),
            name: OnceLock::new(),
            var_type: OnceLock::new(),
        }
    }

    /// エンジンの識別子から変数を作成する
    pub fn from_identifier(function: Option<&Ref<Function>>, identifier: u64) -> Self {
        let core = from_variable_identifier(identifier);
        let var = Self::new(function, core.source_type, core.index, core.storage);
        let _ = var.identifier.set(identifier);
        var
    }

    pub fn from_core(function: Option<&Ref<Function>>, core: CoreVariable) -> Self {
        Self::new(function, core.source_type, core.index, core.storage)
    }

    /// 名前を事前に与える（関数への問い合わせは行われない）
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let _ = self.name.set(Some(name.into()));
        self
    }

    /// 型を事前に与える
    pub fn with_type(self, var_type: Type) -> Self {
        let _ = self.var_type.set(Some(var_type));
        self
    }

    pub fn function(&self) -> Option<&Ref<Function>> {
        self.function.as_ref()
    }

    pub fn source_type(&self) -> VariableSourceType {
        self.source_type
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn storage(&self) -> i64 {
        self.storage
    }

    pub fn to_core(&self) -> CoreVariable {
        CoreVariable::new(self.source_type, self.index, self.storage)
    }

    /// 一意な識別子
    pub fn identifier(&self) -> u64 {
        *self
            .identifier
            .get_or_init(|| to_variable_identifier(self.to_core()))
    }

    /// 変数名（所属する関数がなければ `None`）
    pub fn name(&self) -> Option<&str> {
        self.name
            .get_or_init(|| {
                let function = self.function.as_ref()?;
                function.variable_name(self.to_core())
            })
            .as_deref()
    }

    pub fn var_type(&self) -> Option<&Type> {
        self.var_type
            .get_or_init(|| {
                let function = self.function.as_ref()?;
                function.variable_type(self.to_core())
            })
            .as_ref()
    }

    /// キャッシュされた名前を上書きする
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = OnceLock::from(Some(name.into()));
    }

    pub fn set_type(&mut self, var_type: Type) {
        self.var_type = OnceLock::from(Some(var_type));
    }

    pub fn set_identifier(&mut self, identifier: u64) {
        self.identifier = OnceLock::from(identifier);
    }

    fn function_id(&self) -> Option<usize> {
        self.function.as_ref().map(Ref::handle_id)
    }
}

impl Clone for Variable {
    fn clone(&self) -> Self {
        Self {
            function: self.function.as_ref().map(Ref::new_reference),
            source_type: self.source_type,
            index: self.index,
            storage: self.storage,
            identifier: self.identifier.clone(),
            name: self.name.clone(),
            var_type: self.var_type.clone(),
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.identifier() == other.identifier() && self.function_id() == other.function_id()
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier().hash(state);
        self.function_id().hash(state);
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "var_{:x}", self.identifier()),
        }
    }
}
