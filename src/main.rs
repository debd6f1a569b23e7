use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use gw_scheduler::{init_logger, log_info, NoGatewayStatus, Schedule, ScheduleConfig, ScheduleError, Semtech};

#[derive(Parser)]
#[command(name = "gw-scheduler-demo")]
#[command(about = "Demo CLI for the gateway downlink scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a short scripted demo: sync, subscribe, request an option,
    /// commit it, and print whatever goes out the downlink channel.
    Demo {
        #[arg(long, default_value_t = 50_000)]
        length_us: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), ScheduleError> {
    init_logger();

    let cli = Cli::parse();
    match cli.command {
        Commands::Demo { length_us } => run_demo(length_us).await?,
    }

    Ok(())
}

async fn run_demo(length_us: u32) -> Result<(), ScheduleError> {
    let schedule = Schedule::new(
        ScheduleConfig::default(),
        Arc::new(NoGatewayStatus),
        Arc::new(Semtech),
    );

    schedule.sync(0).await;
    let downlinks = schedule.subscribe().await;

    let (id, score) = schedule.get_option(1_000_000, length_us).await?;
    log_info(&format!("reserved option {id} with conflict score {score}"));

    let payload = gw_scheduler::DownlinkMessage::new(
        bytes::Bytes::from_static(b"hello gateway"),
        gw_scheduler::ProtocolConfiguration::Lorawan(gw_scheduler::LorawanTxConfig {
            modulation: gw_scheduler::Modulation::Fsk,
            data_rate: String::new(),
            coding_rate: String::new(),
            bit_rate: 50_000,
        }),
    );
    schedule.schedule(&id, payload).await?;

    match tokio::time::timeout(Duration::from_secs(5), downlinks.recv()).await {
        Ok(Some(downlink)) => {
            log_info(&format!("dispatched downlink of {} bytes", downlink.payload.len()));
        }
        Ok(None) => log_info("downlink channel closed before dispatch"),
        Err(_) => log_info("timed out waiting for dispatch"),
    }

    let stats_json = schedule.stats().await.to_json().unwrap_or_default();
    log_info(&format!("scheduler stats: {stats_json}"));

    schedule.stop().await;
    Ok(())
}
