//! Message sources feeding the dispatch coordinator.

pub mod telegram;
