// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod api_server;

pub use api_server::{Operation, SimulatedApiServer};
