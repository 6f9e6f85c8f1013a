// SPDX-License-Identifier: MIT

//! Process-wide plumbing shared by every invocation.

pub mod config;
pub mod error;
pub mod memory;
pub mod registry;
pub mod repository;
