//! エントリ値が参照するレジスタ

use crate::ValueError;
use atai_target::Architecture;
use std::fmt;
use tracing::debug;

/// レジスタ参照
///
/// アーキテクチャが分かればレジスタ名、分からなければ生のレジスタ番号を保持します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    Name(String),
    Index(u32),
}

impl Register {
    /// 生の値からレジスタ参照を作成する
    pub fn from_raw(value: i64, arch: Option<&dyn Architecture>) -> Result<Self, ValueError> {
        let index = u32::try_from(value).map_err(|_| ValueError::InvalidRegisterIndex(value))?;
        Ok(Self::resolve(index, arch))
    }

    /// レジスタ番号を名前に解決する（解決できなければ番号のまま）
    pub fn resolve(index: u32, arch: Option<&dyn Architecture>) -> Self {
        let Some(arch) = arch else {
            return Register::Index(index);
        };
        match arch.register_name(index) {
            Some(name) => Register::Name(name),
            None => {
                debug!(index, arch = arch.name(), "register index has no name, keeping raw index");
                Register::Index(index)
            }
        }
    }

    /// レジスタ番号に戻す
    pub fn to_index(&self, arch: Option<&dyn Architecture>) -> Result<u32, ValueError> {
        match self {
            Register::Index(index) => Ok(*index),
            Register::Name(name) => {
                let arch = arch.ok_or_else(|| ValueError::MissingArchitecture(name.clone()))?;
                arch.register_index(name)
                    .ok_or_else(|| ValueError::UnresolvedRegister(name.clone()))
            }
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Register::Name(name) => Some(name),
            Register::Index(_) => None,
        }
    }
}

impl From<&str> for Register {
    fn from(name: &str) -> Self {
        Register::Name(name.to_string())
    }
}

impl From<u32> for Register {
    fn from(index: u32) -> Self {
        Register::Index(index)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::Name(name) => write!(f, "{}", name),
            Register::Index(index) => write!(f, "{}", index),
        }
    }
}
