// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for MineAgent
//!
//! Message model, the chat backend seam and its implementations.

pub mod message;
pub mod mock_backend;
pub mod provider;
pub mod providers;

pub use message::*;
pub use provider::*;
