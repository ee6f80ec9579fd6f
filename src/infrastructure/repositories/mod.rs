// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供店铺仓库接口的 Redis 和内存实现
pub mod memory_shop_repo_impl;
pub mod redis_shop_repo_impl;
