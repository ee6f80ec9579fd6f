// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 测试主模块
///
/// 集成测试通过公开接口组装队列、存储、抓取引擎和下游接口
mod integration;
