// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `concord-core` — Graph Execution & Coordination Primitives
//!
//! The execution substrate of the Concord coordinator: a resumable
//! directed graph traversed against a per-session execution context, plus
//! the coordination layer built on it (collaboration trace, routing
//! decision task, interceptor chain, snapshot round trip).
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | graph, context, trace, member, oracle, interceptor, protocol contracts |
//! | [`application`] | Application | `ExecutionEngine`, `DecisionTask`, `CoordinationSession` |
//! | [`infrastructure`] | Infrastructure | event bus, snapshot repositories, oracle adapters |
//!
//! Protocol strategies live in the sibling `concord-protocols` crate.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
