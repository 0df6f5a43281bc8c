//! IL・変数・定数への参照の記録

use crate::range::signed_hex;
use crate::{PossibleValueSet, Variable};
use atai_target::{CoreArchitecture, Function, Ref, Type, MAX_CONFIDENCE};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// 関数グラフ（IL）の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionGraphType {
    NormalFunctionGraph,
    LowLevelILFunctionGraph,
    LiftedILFunctionGraph,
    LowLevelILSSAFormFunctionGraph,
    MediumLevelILFunctionGraph,
    MediumLevelILSSAFormFunctionGraph,
    MappedMediumLevelILFunctionGraph,
    MappedMediumLevelILSSAFormFunctionGraph,
    HighLevelILFunctionGraph,
    HighLevelILSSAFormFunctionGraph,
}

impl FunctionGraphType {
    /// ILの短い名前
    pub fn il_name(&self) -> &'static str {
        match self {
            Self::NormalFunctionGraph => "disassembly",
            Self::LowLevelILFunctionGraph => "llil",
            Self::LiftedILFunctionGraph => "lifted_llil",
            Self::LowLevelILSSAFormFunctionGraph => "llil_ssa",
            Self::MediumLevelILFunctionGraph => "mlil",
            Self::MediumLevelILSSAFormFunctionGraph => "mlil_ssa",
            Self::MappedMediumLevelILFunctionGraph => "mapped_mlil",
            Self::MappedMediumLevelILSSAFormFunctionGraph => "mapped_mlil_ssa",
            Self::HighLevelILFunctionGraph => "hlil",
            Self::HighLevelILSSAFormFunctionGraph => "hlil_ssa",
        }
    }
}

impl fmt::Display for FunctionGraphType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.il_name())
    }
}

/// 関数は開始アドレスで並べ、同じアドレスの別オブジェクトはハンドルで区別する
fn function_key(function: &Ref<Function>) -> (u64, usize) {
    (function.start(), function.handle_id())
}

/// IL式への参照元
///
/// 等価性・ハッシュ・順序はすべて
/// （関数, アーキテクチャ, アドレス, ILの種類, 式ID）の順で比較します。
/// 関数は開始アドレスで順序付けます。
#[derive(Debug)]
pub struct ILReferenceSource {
    function: Option<Ref<Function>>,
    architecture: Option<CoreArchitecture>,
    address: u64,
    il_type: FunctionGraphType,
    expr_id: usize,
}

impl ILReferenceSource {
    pub fn new(
        function: Option<&Ref<Function>>,
        architecture: Option<CoreArchitecture>,
        address: u64,
        il_type: FunctionGraphType,
        expr_id: usize,
    ) -> Self {
        Self {
            function: function.map(Ref::new_reference),
            architecture,
            address,
            il_type,
            expr_id,
        }
    }

    pub fn function(&self) -> Option<&Ref<Function>> {
        self.function.as_ref()
    }

    pub fn architecture(&self) -> Option<&CoreArchitecture> {
        self.architecture.as_ref()
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn il_type(&self) -> FunctionGraphType {
        self.il_type
    }

    pub fn expr_id(&self) -> usize {
        self.expr_id
    }

    fn key(&self) -> (Option<(u64, usize)>, Option<&str>, u64, FunctionGraphType, usize) {
        (
            self.function.as_ref().map(function_key),
            self.architecture.as_ref().map(|arch| arch.name()),
            self.address,
            self.il_type,
            self.expr_id,
        )
    }
}

impl Clone for ILReferenceSource {
    fn clone(&self) -> Self {
        Self {
            function: self.function.as_ref().map(Ref::new_reference),
            architecture: self.architecture.clone(),
            address: self.address,
            il_type: self.il_type,
            expr_id: self.expr_id,
        }
    }
}

impl PartialEq for ILReferenceSource {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ILReferenceSource {}

impl Hash for ILReferenceSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ILReferenceSource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ILReferenceSource {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ILReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.architecture {
            Some(arch) => write!(
                f,
                "<ref: {}@{:#x}, {}@{}>",
                arch.name(),
                self.address,
                self.il_type,
                self.expr_id
            ),
            None => write!(f, "<ref: {:#x}, {}@{}>", self.address, self.il_type, self.expr_id),
        }
    }
}

/// 変数への参照元
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariableReferenceSource {
    pub var: Variable,
    pub src: ILReferenceSource,
}

impl VariableReferenceSource {
    pub fn new(var: Variable, src: ILReferenceSource) -> Self {
        Self { var, src }
    }
}

impl PartialOrd for VariableReferenceSource {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// 変数の識別子、変数の関数、参照元の順に比較する
impl Ord for VariableReferenceSource {
    fn cmp(&self, other: &Self) -> Ordering {
        let function_id = |var: &Variable| var.function().map(function_key);
        self.var
            .identifier()
            .cmp(&other.var.identifier())
            .then_with(|| function_id(&self.var).cmp(&function_id(&other.var)))
            .then_with(|| self.src.cmp(&other.src))
    }
}

impl fmt::Display for VariableReferenceSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<var: {}, src: {}>", self.var, self.src)
    }
}

/// オペランドなしを表すエンジン側の値
pub const NO_SOURCE_OPERAND: u32 = 0xffff_ffff;

/// 命令からスタック変数への参照
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackVariableReference {
    source_operand: Option<u32>,
    var_type: Type,
    name: String,
    var: Variable,
    referenced_offset: i64,
    size: u64,
}

impl StackVariableReference {
    /// `source_operand` が `0xffffffff` ならオペランドなしとして扱う
    pub fn new(
        source_operand: u32,
        var_type: Type,
        name: impl Into<String>,
        var: Variable,
        referenced_offset: i64,
        size: u64,
    ) -> Self {
        Self {
            source_operand: (source_operand != NO_SOURCE_OPERAND).then_some(source_operand),
            var_type,
            name: name.into(),
            var,
            referenced_offset,
            size,
        }
    }

    pub fn source_operand(&self) -> Option<u32> {
        self.source_operand
    }

    pub fn var_type(&self) -> &Type {
        &self.var_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn var(&self) -> &Variable {
        &self.var
    }

    pub fn referenced_offset(&self) -> i64 {
        self.referenced_offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl fmt::Display for StackVariableReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // i64同士の差はi64に収まらないことがある
        let delta = self.referenced_offset as i128 - self.var.storage() as i128;
        if let Some(operand) = self.source_operand {
            write!(f, "<operand {} ", operand)?;
        } else {
            write!(f, "<")?;
        }
        match delta {
            0 => write!(f, "ref to {}>", self.name),
            d if d < 0 => write!(f, "ref to {}{}>", self.name, signed_hex(d)),
            d => write!(f, "ref to {}+{}>", self.name, signed_hex(d)),
        }
    }
}

/// 命令中の定数への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantReference {
    pub value: i64,
    pub size: u64,
    pub pointer: bool,
    pub intermediate: bool,
}

impl fmt::Display for ConstantReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.pointer {
            write!(f, "<constant pointer {:#x}>", self.value)
        } else if self.size == 0 {
            write!(f, "<constant {:#x}>", self.value)
        } else {
            write!(f, "<constant {:#x} size {}>", self.value, self.size)
        }
    }
}

/// アドレス範囲 `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
}

impl AddressRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, address: u64) -> bool {
        (self.start..self.end).contains(&address)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<{:#x}-{:#x}>", self.start, self.end)
    }
}

/// 関数の引数変数の並び（信頼度付き）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParameterVariables {
    vars: Vec<Variable>,
    confidence: u8,
}

impl ParameterVariables {
    pub fn new(vars: Vec<Variable>) -> Self {
        Self {
            vars,
            confidence: MAX_CONFIDENCE,
        }
    }

    /// 同じ変数列を別の信頼度で返す
    pub fn with_confidence(&self, confidence: u8) -> Self {
        Self {
            vars: self.vars.clone(),
            confidence,
        }
    }

    pub fn vars(&self) -> &[Variable] {
        &self.vars
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Variable> {
        self.vars.iter()
    }
}

impl<'a> IntoIterator for &'a ParameterVariables {
    type Item = &'a Variable;
    type IntoIter = std::slice::Iter<'a, Variable>;

    fn into_iter(self) -> Self::IntoIter {
        self.vars.iter()
    }
}

/// アーキテクチャ付きのアドレス
#[derive(Debug, Clone)]
pub struct ArchAndAddr {
    pub arch: Option<CoreArchitecture>,
    pub addr: u64,
}

impl ArchAndAddr {
    pub fn new(arch: Option<CoreArchitecture>, addr: u64) -> Self {
        Self { arch, addr }
    }

    fn arch_name(&self) -> &str {
        self.arch.as_ref().map_or("?", |arch| arch.name())
    }
}

impl PartialEq for ArchAndAddr {
    fn eq(&self, other: &Self) -> bool {
        self.arch_name() == other.arch_name() && self.addr == other.addr
    }
}

impl Eq for ArchAndAddr {}

impl fmt::Display for ArchAndAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{:#x}", self.arch_name(), self.addr)
    }
}

/// ユーザーが与えた変数値のヒント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserVariableValueInfo {
    pub var: Variable,
    pub def_site: ArchAndAddr,
    pub value: PossibleValueSet,
}

impl fmt::Display for UserVariableValueInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<user value for {} @ {} -> {}>", self.var, self.def_site, self.value)
    }
}

/// 間接分岐の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndirectBranchInfo {
    pub source: ArchAndAddr,
    pub dest: ArchAndAddr,
    pub auto_defined: bool,
}

impl fmt::Display for IndirectBranchInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "<branch {} -> {}>", self.source, self.dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atai_target::{DwarfArchitecture, VariableSourceType};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn x86_64() -> CoreArchitecture {
        Arc::new(DwarfArchitecture::X86_64)
    }

    #[test]
    fn test_il_reference_equality_is_field_aligned() {
        let function = Function::new(0x1000, None);
        let il = FunctionGraphType::MediumLevelILFunctionGraph;
        let a = ILReferenceSource::new(Some(&function), Some(x86_64()), 0x1004, il, 3);
        let b = ILReferenceSource::new(Some(&function), Some(x86_64()), 0x1004, il, 3);
        assert_eq!(a, b);

        // 同じ値が別のフィールドに入っていても等しくならない
        let c = ILReferenceSource::new(None, None, 0x1004, il, 3);
        let d = ILReferenceSource::new(None, None, 3, il, 0x1004);
        assert_ne!(c, d);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(set.contains(&b));
    }

    #[test]
    fn test_il_reference_ordering() {
        let il = FunctionGraphType::LowLevelILFunctionGraph;
        let low = ILReferenceSource::new(None, None, 0x10, il, 5);
        let high = ILReferenceSource::new(None, None, 0x20, il, 0);
        assert!(low < high);

        let later_il = ILReferenceSource::new(None, None, 0x10, FunctionGraphType::HighLevelILFunctionGraph, 0);
        assert!(low < later_il);
        assert_eq!(low.cmp(&low.clone()), Ordering::Equal);
    }

    #[test]
    fn test_il_reference_orders_functions_by_address() {
        let il = FunctionGraphType::MediumLevelILFunctionGraph;
        let late = Function::new(0x2000, None);
        let early = Function::new(0x1000, None);
        let mut sources = vec![
            ILReferenceSource::new(Some(&late), None, 0x2004, il, 0),
            ILReferenceSource::new(Some(&early), None, 0x1008, il, 0),
            ILReferenceSource::new(Some(&early), None, 0x1004, il, 0),
        ];
        sources.sort();
        let addresses: Vec<u64> = sources.iter().map(|s| s.address()).collect();
        assert_eq!(addresses, vec![0x1004, 0x1008, 0x2004]);

        // 開始アドレスが同じでも別の関数なら等しくない
        let twin = Function::new(0x1000, None);
        let a = ILReferenceSource::new(Some(&early), None, 0x1004, il, 0);
        let b = ILReferenceSource::new(Some(&twin), None, 0x1004, il, 0);
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn test_il_reference_display() {
        let src = ILReferenceSource::new(
            None,
            Some(x86_64()),
            0x1000,
            FunctionGraphType::MappedMediumLevelILSSAFormFunctionGraph,
            2,
        );
        assert_eq!(src.to_string(), "<ref: x86_64@0x1000, mapped_mlil_ssa@2>");
    }

    #[test]
    fn test_stack_reference_without_operand() {
        let var = Variable::new(None, VariableSourceType::StackVariableSourceType, 0, -0x20);
        let reference = StackVariableReference::new(
            NO_SOURCE_OPERAND,
            Type::int(4, true),
            "buf",
            var.clone(),
            -0x18,
            4,
        );
        assert_eq!(reference.source_operand(), None);
        assert_eq!(reference.to_string(), "<ref to buf+0x8>");

        let reference = StackVariableReference::new(1, Type::int(4, true), "buf", var, -0x20, 4);
        assert_eq!(reference.source_operand(), Some(1));
        assert_eq!(reference.to_string(), "<operand 1 ref to buf>");
    }

    #[test]
    fn test_stack_reference_extreme_offsets() {
        let var = Variable::new(None, VariableSourceType::StackVariableSourceType, 0, 1);
        let reference =
            StackVariableReference::new(0, Type::int(1, false), "lo", var, i64::MIN, 4);
        assert_eq!(reference.to_string(), "<operand 0 ref to lo-0x8000000000000001>");

        let var = Variable::new(None, VariableSourceType::StackVariableSourceType, 0, -1);
        let reference =
            StackVariableReference::new(NO_SOURCE_OPERAND, Type::int(1, false), "hi", var, i64::MAX, 4);
        assert_eq!(reference.to_string(), "<ref to hi+0x8000000000000000>");
    }

    #[test]
    fn test_variable_reference_ordering() {
        let il = FunctionGraphType::MediumLevelILFunctionGraph;
        let first = Variable::new(None, VariableSourceType::StackVariableSourceType, 0, -8);
        let second = Variable::new(None, VariableSourceType::RegisterVariableSourceType, 0, 0);
        let a = VariableReferenceSource::new(first, ILReferenceSource::new(None, None, 0x20, il, 0));
        let b = VariableReferenceSource::new(second, ILReferenceSource::new(None, None, 0x10, il, 0));
        assert!(a < b);
    }

    #[test]
    fn test_variable_reference_orders_functions_by_address() {
        let il = FunctionGraphType::MediumLevelILFunctionGraph;
        let late = Function::new(0x2000, None);
        let early = Function::new(0x1000, None);
        let source = VariableSourceType::StackVariableSourceType;
        let mut refs = vec![
            VariableReferenceSource::new(
                Variable::new(Some(&late), source, 0, -8),
                ILReferenceSource::new(Some(&late), None, 0x2000, il, 0),
            ),
            VariableReferenceSource::new(
                Variable::new(Some(&early), source, 0, -8),
                ILReferenceSource::new(Some(&early), None, 0x1000, il, 0),
            ),
        ];
        refs.sort();
        assert_eq!(refs[0].src.address(), 0x1000);
        assert_eq!(refs[1].src.address(), 0x2000);
    }

    #[test]
    fn test_parameter_variables_with_confidence() {
        let params = ParameterVariables::new(vec![Variable::new(
            None,
            VariableSourceType::RegisterVariableSourceType,
            0,
            5,
        )]);
        assert_eq!(params.confidence(), MAX_CONFIDENCE);
        let lowered = params.with_confidence(10);
        assert_eq!(lowered.confidence(), 10);
        assert_eq!(lowered.len(), 1);
        assert_eq!(params.iter().next(), lowered.vars().first());
    }

    #[test]
    fn test_address_range() {
        let range = AddressRange::new(0x1000, 0x1010);
        assert_eq!(range.len(), 0x10);
        assert!(range.contains(0x100f));
        assert!(!range.contains(0x1010));
        assert!(AddressRange::new(0x10, 0x8).is_empty());
    }

    #[test]
    fn test_user_value_display() {
        let var = Variable::new(None, VariableSourceType::RegisterVariableSourceType, 0, 0)
            .with_name("arg1");
        let info = UserVariableValueInfo {
            var,
            def_site: ArchAndAddr::new(Some(x86_64()), 0x401000),
            value: PossibleValueSet::constant(4),
        };
        assert_eq!(info.to_string(), "<user value for arg1 @ x86_64:0x401000 -> <const 0x4>>");
    }

    #[test]
    fn test_constant_reference_display() {
        let pointer = ConstantReference {
            value: 0x4000,
            size: 8,
            pointer: true,
            intermediate: false,
        };
        assert_eq!(pointer.to_string(), "<constant pointer 0x4000>");
        let sized = ConstantReference {
            value: 0x10,
            size: 4,
            pointer: false,
            intermediate: false,
        };
        assert_eq!(sized.to_string(), "<constant 0x10 size 4>");
    }
}
