// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat backend implementations

pub mod cloudflare;

pub use cloudflare::CloudflareClient;
