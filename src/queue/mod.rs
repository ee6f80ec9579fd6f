// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod memory_queue;
pub mod message_queue;
pub mod sqs_queue;
