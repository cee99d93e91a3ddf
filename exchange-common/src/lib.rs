//! Shared data layer: the coin/pair registry, per-exchange constraint cache
//! and the snapshot/relational storage formats.

pub mod data;
