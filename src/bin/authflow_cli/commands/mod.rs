// ABOUTME: Command implementations for authflow-cli
// ABOUTME: Client-side flow commands and resource-server token commands
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

pub mod flow;
pub mod token;

use anyhow::Context;
use serde::Serialize;

/// Print a value as pretty JSON on stdout
pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}
