// SPDX-License-Identifier: MIT OR Apache-2.0
//! Specialized graph vocabularies built on the core framework.

pub mod material;
