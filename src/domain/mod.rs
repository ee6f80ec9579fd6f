// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型
pub mod models;
/// 存储与下游接口
pub mod repositories;
/// 领域服务
pub mod services;
