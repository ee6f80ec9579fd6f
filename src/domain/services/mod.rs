// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod bfs_strategy;
pub mod classifier;
pub mod extraction_service;
pub mod link_discoverer;
