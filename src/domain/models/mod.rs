// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod crawl_result;
pub mod disposition;
pub mod job;
pub mod product;
pub mod queue_message;
pub mod shop;
