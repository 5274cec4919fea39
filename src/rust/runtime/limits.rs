// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use ::std::time::Duration;

/// Base quantum granted to a task before the scheduler revisits its decision.
pub const DEFAULT_TIME_SLICE: Duration = Duration::from_millis(1000);

/// Number of task identifiers that may be live at once.
pub const DEFAULT_MAX_THREADS: usize = 10000;

/// Number of priority levels in the feedback queue.
pub const NUM_LEVELS: usize = 3;
