//! レジスタ名の解決機能

use std::fmt;
use std::sync::Arc;

/// レジスタ番号とレジスタ名を相互変換するアーキテクチャ
pub trait Architecture: Send + Sync + fmt::Debug {
    /// アーキテクチャ名
    fn name(&self) -> &str;

    /// レジスタ番号からレジスタ名を取得する
    fn register_name(&self, index: u32) -> Option<String>;

    /// レジスタ名からレジスタ番号を取得する
    fn register_index(&self, name: &str) -> Option<u32>;
}

/// 共有されるアーキテクチャ
pub type CoreArchitecture = Arc<dyn Architecture>;

/// DWARFレジスタ番号に基づくアーキテクチャ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DwarfArchitecture {
    X86,
    X86_64,
    Arm,
    AArch64,
    RiscV,
}

impl DwarfArchitecture {
    /// 名前からアーキテクチャを取得する
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i686" => Some(Self::X86),
            "x86_64" | "x86-64" | "amd64" => Some(Self::X86_64),
            "arm" | "armv7" | "thumb2" => Some(Self::Arm),
            "aarch64" | "arm64" => Some(Self::AArch64),
            "riscv" | "riscv64" | "rv64gc" => Some(Self::RiscV),
            _ => None,
        }
    }

    /// 共有可能なアーキテクチャとして取得する
    pub fn core(self) -> CoreArchitecture {
        Arc::new(self)
    }
}

impl Architecture for DwarfArchitecture {
    fn name(&self) -> &str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Arm => "arm",
            Self::AArch64 => "aarch64",
            Self::RiscV => "riscv",
        }
    }

    fn register_name(&self, index: u32) -> Option<String> {
        let register = gimli::Register(u16::try_from(index).ok()?);
        let name = match self {
            Self::X86 => gimli::X86::register_name(register),
            Self::X86_64 => gimli::X86_64::register_name(register),
            Self::Arm => gimli::Arm::register_name(register),
            Self::AArch64 => gimli::AArch64::register_name(register),
            Self::RiscV => gimli::RiscV::register_name(register),
        };
        name.map(str::to_string)
    }

    fn register_index(&self, name: &str) -> Option<u32> {
        let register = match self {
            Self::X86 => gimli::X86::name_to_register(name),
            Self::X86_64 => gimli::X86_64::name_to_register(name),
            Self::Arm => gimli::Arm::name_to_register(name),
            Self::AArch64 => gimli::AArch64::name_to_register(name),
            Self::RiscV => gimli::RiscV::name_to_register(name),
        };
        register.map(|r| r.0 as u32)
    }
}
