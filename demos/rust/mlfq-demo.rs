// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![deny(clippy::all)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::clap::{Arg, ArgMatches, Command};
use ::crossbeam_channel::{Receiver, Sender};
use ::mlfq::{Config, SharedScheduler, ThreadTask, Yielder};
use ::rand::{rngs::SmallRng, Rng, SeedableRng};
use ::std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

//======================================================================================================================
// Constants
//======================================================================================================================

const TIMEOUT_SECONDS: Duration = Duration::from_secs(256);

/// Work done between two yield points.
const STEP: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct ProgramArguments {
    config: Config,
    num_tasks: usize,
    max_rounds: usize,
    seed: Option<u64>,
}

impl ProgramArguments {
    const DEFAULT_NUM_TASKS: usize = 8;
    const DEFAULT_MAX_ROUNDS: usize = 2000;

    pub fn new() -> Result<Self> {
        let matches: ArgMatches = Command::new("mlfq-demo")
            .arg(
                Arg::new("config")
                    .long("config")
                    .value_parser(clap::value_parser!(String))
                    .required(false)
                    .value_name("FILE")
                    .help("Sets the YAML configuration file"),
            )
            .arg(
                Arg::new("quantum")
                    .long("quantum")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("MILLISECONDS")
                    .help("Sets the time slice"),
            )
            .arg(
                Arg::new("capacity")
                    .long("capacity")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("COUNT")
                    .help("Sets the maximum number of live tasks"),
            )
            .arg(
                Arg::new("tasks")
                    .long("tasks")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("COUNT")
                    .help("Sets the number of tasks to admit"),
            )
            .arg(
                Arg::new("rounds")
                    .long("rounds")
                    .value_parser(clap::value_parser!(usize))
                    .required(false)
                    .value_name("COUNT")
                    .help("Sets the maximum amount of work per task"),
            )
            .arg(
                Arg::new("seed")
                    .long("seed")
                    .value_parser(clap::value_parser!(u64))
                    .required(false)
                    .value_name("NUMBER")
                    .help("Sets the seed of the workload generator"),
            )
            .get_matches();

        let config: Config = match matches.get_one::<String>("config") {
            Some(path) => match Config::from_file(path) {
                Ok(config) => config,
                Err(e) => anyhow::bail!("failed to load configuration: {:?}", e),
            },
            None => Config::default(),
        };

        let mut args: ProgramArguments = ProgramArguments {
            config,
            num_tasks: Self::DEFAULT_NUM_TASKS,
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            seed: matches.get_one::<u64>("seed").copied(),
        };

        let quantum: Option<Duration> = matches.get_one::<u64>("quantum").map(|ms| Duration::from_millis(*ms));
        let capacity: Option<usize> = matches.get_one::<usize>("capacity").copied();
        if quantum.is_some() || capacity.is_some() {
            args.set_config(quantum, capacity)?;
        }
        if let Some(num_tasks) = matches.get_one::<usize>("tasks") {
            args.num_tasks = *num_tasks;
        }
        if let Some(max_rounds) = matches.get_one::<usize>("rounds") {
            if *max_rounds == 0 {
                anyhow::bail!("rounds must be positive");
            }
            args.max_rounds = *max_rounds;
        }

        Ok(args)
    }

    fn set_config(&mut self, quantum: Option<Duration>, capacity: Option<usize>) -> Result<()> {
        let time_slice: Duration = quantum.unwrap_or(self.config.time_slice());
        let max_threads: usize = capacity.unwrap_or(self.config.max_threads());
        self.config = match Config::new(time_slice, max_threads) {
            Ok(config) => config,
            Err(e) => anyhow::bail!("invalid configuration: {:?}", e),
        };
        Ok(())
    }
}

struct Application {
    scheduler: SharedScheduler,
    rng: SmallRng,
    num_tasks: usize,
    max_rounds: usize,
}

impl Application {
    pub fn new(args: ProgramArguments) -> Result<Self> {
        let rng: SmallRng = match args.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let scheduler: SharedScheduler = SharedScheduler::new(args.config);
        scheduler.start()?;

        Ok(Self {
            scheduler,
            rng,
            num_tasks: args.num_tasks,
            max_rounds: args.max_rounds,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        let (tx, rx): (Sender<(String, Duration)>, Receiver<(String, Duration)>) = crossbeam_channel::unbounded();
        let start_time: Instant = Instant::now();

        let mut admitted: usize = 0;
        for i in 0..self.num_tasks {
            let name: String = format!("task-{}", i);
            let rounds: usize = self.rng.gen_range(1..=self.max_rounds);
            let task: Arc<ThreadTask> = self.worker(&name, rounds, start_time, tx.clone());
            match self.scheduler.admit(task) {
                Ok(cb) => {
                    println!("admitted {} (tid={}, rounds={})", name, cb.get_tid(), rounds);
                    admitted += 1;
                },
                Err(e) => println!("WARN: {} was rejected (error={:?})", name, e),
            }
        }

        for _ in 0..admitted {
            match rx.recv_timeout(TIMEOUT_SECONDS) {
                Ok((name, elapsed)) => println!("{} finished after {:?} ms", name, elapsed.as_millis()),
                Err(e) => anyhow::bail!("tasks did not finish: {:?}", e),
            }
        }

        // Give the dispatch loop a chance to reap the last task.
        let deadline: Instant = Instant::now() + self.scheduler.get_config().time_slice() * 4;
        while self.scheduler.live_count() != 0 && Instant::now() < deadline {
            thread::sleep(STEP);
        }
        println!(
            "{} tasks done in {:?} ms (live={}, queues={:?})",
            admitted,
            start_time.elapsed().as_millis(),
            self.scheduler.live_count(),
            self.scheduler.queue_lengths()
        );
        Ok(())
    }

    fn worker(
        &self,
        name: &str,
        rounds: usize,
        start_time: Instant,
        done: Sender<(String, Duration)>,
    ) -> Arc<ThreadTask> {
        let scheduler: SharedScheduler = self.scheduler.clone();
        let me: String = name.to_string();
        Arc::new(ThreadTask::new(name, move |yielder: Yielder| {
            for _ in 0..rounds {
                if let Err(e) = yielder.yield_now() {
                    println!("ERROR: {} lost its scheduler (error={:?})", me, e);
                    return;
                }
                thread::sleep(STEP);
            }
            if let Err(e) = scheduler.request_termination() {
                println!("ERROR: request_termination() failed (error={:?})", e);
            }
            let _ = done.send((me, start_time.elapsed()));
        }))
    }
}

//======================================================================================================================
// main()
//======================================================================================================================

fn main() -> Result<()> {
    let args: ProgramArguments = ProgramArguments::new()?;
    Application::new(args)?.run()
}
