// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 指标导出
pub mod metrics;
/// 仓库实现
pub mod repositories;
/// 商品下游
pub mod sink;
