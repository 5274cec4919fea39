// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod runtime;
pub mod scheduler;

pub use self::{
    config::Config,
    runtime::fail::Fail,
    scheduler::{
        ControlBlock,
        Dispatch,
        DispatchState,
        Level,
        SharedScheduler,
        Task,
        TaskHandle,
        ThreadTask,
        Tid,
        Yielder,
    },
};

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    anyhow::bail!(
                        r#"ensure failed: `(left == right)`
    left: `{:?}`,
   right: `{:?}`"#,
                        left_val,
                        right_val
                    )
                }
            },
        }
    }};
}

/// Ensures that two expressions are not equal, bailing out of the enclosing `anyhow::Result` function otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val != *right_val) {
                    anyhow::bail!(
                        r#"ensure failed: `(left != right)`
    left: `{:?}`,
   right: `{:?}`"#,
                        left_val,
                        right_val
                    )
                }
            },
        }
    }};
}
