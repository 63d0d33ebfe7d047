// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod common;
pub mod janusgraph_e2e;

use common::Error;
use janusgraph_e2e::{janusgraph_e2e_test, janusgraph_scaling_e2e_test};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).cloned().unwrap_or_default();
    match cmd.as_str() {
        "janusgraph" => {
            println!("Running janusgraph end-to-end test");
            janusgraph_e2e_test().await
        }
        "janusgraph-scaling" => {
            println!("Running janusgraph end-to-end test for scaling");
            janusgraph_scaling_e2e_test().await
        }
        _ => {
            println!("Please specify one test: \"janusgraph\" or \"janusgraph-scaling\"");
            Ok(())
        }
    }
}
