//! Impls - ports の実装（開発用・テスト用）
//!
//! broker 向けの publisher は別クレートに置く想定。

pub mod inmem_publisher;

pub use self::inmem_publisher::InMemoryPublisher;
