use std::error::Error;

use tracing::{error, info, warn};

use jobsd::{
    cli::{Commands, parse_args},
    config::{Settings, load_settings},
    constants::{DRAIN_SIGNAL, FORCE_STOP_SIGNALS},
    error::SupervisorError,
    logs::{self, LogDestination},
    master::Master,
    pidfile::PidFile,
    process::{SystemProcesses, daemonize, send_signal},
    task::CommandTask,
    topics::StaticTopics,
    worker::{WorkerAssignment, run_worker},
};
use nix::sys::signal::Signal;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    let log_level = args.log_level.map(|level| level.as_str());

    match args.command {
        Commands::Start { config, foreground } => start(&config, foreground, log_level)?,
        Commands::Stop { config } => {
            logs::init_stderr(log_level);
            let (_, settings) = load_settings(Some(&config))?;
            signal_master(&settings, FORCE_STOP_SIGNALS[0], "stop")?;
        }
        Commands::Drain { config } => {
            logs::init_stderr(log_level);
            let (_, settings) = load_settings(Some(&config))?;
            signal_master(&settings, DRAIN_SIGNAL, "drain")?;
        }
        Commands::Status { config } => {
            logs::init_stderr(log_level);
            let (_, settings) = load_settings(Some(&config))?;
            match PidFile::new(&settings.pid_file).live_pid() {
                Some(pid) => println!("jobsd master running (pid {pid})"),
                None => println!("jobsd master not running"),
            }
        }
        Commands::Worker {
            config,
            slot,
            topic,
            master_pid,
        } => {
            let assignment = WorkerAssignment {
                slot_id: slot,
                topic,
                master_pid,
            };
            std::process::exit(worker(&config, assignment, log_level));
        }
    }

    Ok(())
}

fn start(config: &str, foreground: bool, log_level: Option<&str>) -> Result<(), Box<dyn Error>> {
    let (config, settings) = load_settings(Some(config))?;
    logs::init(&settings.log_dir, LogDestination::Master, log_level);

    let procs = SystemProcesses::new(settings.config_path.clone(), settings.process_name.clone())?
        .with_log_level(log_level);

    let detach = || {
        if foreground {
            Ok(())
        } else {
            info!("Daemonizing jobsd master");
            daemonize()
        }
    };

    let mut master = match Master::launch(&settings, procs, detach) {
        Ok(master) => master,
        Err(err @ SupervisorError::AlreadyRunning { .. }) => {
            error!("{err}");
            eprintln!("jobsd master already running: {err}");
            std::process::exit(1);
        }
        Err(err) => return Err(err.into()),
    };

    let topics = StaticTopics::new(config.topics.clone());
    master.run(&topics)?;

    Ok(())
}

fn signal_master(settings: &Settings, signal: Signal, action: &str) -> Result<(), Box<dyn Error>> {
    match PidFile::new(&settings.pid_file).live_pid() {
        Some(pid) => {
            send_signal(pid, signal)?;
            info!("Sent {signal:?} to jobsd master {pid}");
            println!("Requested {action} of jobsd master (pid {pid})");
        }
        None => {
            warn!("No running master found at {:?}", settings.pid_file);
            println!("jobsd master not running");
        }
    }

    Ok(())
}

fn worker(config: &str, assignment: WorkerAssignment, log_level: Option<&str>) -> i32 {
    let (config, settings) = match load_settings(Some(config)) {
        Ok(loaded) => loaded,
        Err(err) => {
            logs::init_stderr(log_level);
            error!("worker id: {} could not load config: {err}", assignment.slot_id);
            return 1;
        }
    };
    logs::init(&settings.log_dir, LogDestination::Worker, log_level);

    let task = match CommandTask::from_config(&config, &assignment) {
        Ok(task) => task,
        Err(err) => {
            error!("worker id: {} cannot run: {err}", assignment.slot_id);
            return 1;
        }
    };

    run_worker(&assignment, &settings.process_name, &task)
}
