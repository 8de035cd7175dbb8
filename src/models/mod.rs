//! # 数据模型模块
//!
//! 定义统一的晶体结构、电子结构数据集和输出表格模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`transform/`、`electronic/` 和 `commands/` 使用
//! - 子模块: structure, electronic, table

pub mod electronic;
pub mod structure;
pub mod table;

pub use electronic::{BandStructure, DensityOfStates, OrbitalWeights, ProjectionSet, SpinLayout};
pub use structure::{CoordinateMode, Lattice, MagneticMoments, Site, SiteMetadata, Structure};
pub use table::{Column, ColumnData, Table};
