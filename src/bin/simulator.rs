use clap::{App, Arg};
use colored::*;
use std::time::Duration;
use tokio::time;
use tracing::{error, info, warn};
use vcuemu::modules::bms::{CHARGE_LIMIT_ID, TELEMETRY_ID};
use vcuemu::modules::shifter::{GEAR_STATUS_ID, LEVER_STATUS_ID};
use vcuemu::modules::{BatteryMonitor, GearShifter, GearState};
use vcuemu::{Frame, FrameRecorder, OpMode, ParamId, ParamStore, ParamTable, VcuConfig, VcuHost};

const STEP_MS: u64 = 10;
const LEVER_PERIOD_MS: u64 = 40;
const BMS_PERIOD_MS: u64 = 1000;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("vcu-sim")
        .version("0.1.0")
        .about("Runs the emulated OEM modules against a scripted CAN scenario")
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("JSON configuration file")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("duration")
                .short("d")
                .long("duration")
                .value_name("MS")
                .help("Simulated time in milliseconds")
                .takes_value(true)
                .default_value("5000")
                .validator(|v| match v.parse::<u64>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err("Duration must be a number of milliseconds".into()),
                }),
        )
        .arg(
            Arg::with_name("mode")
                .short("m")
                .long("mode")
                .value_name("MODE")
                .help("Operating mode")
                .takes_value(true)
                .possible_values(&["off", "run", "charge"])
                .default_value("run"),
        )
        .arg(
            Arg::with_name("gear")
                .short("g")
                .long("gear")
                .value_name("GEAR")
                .help("Lever position reported by the selector")
                .takes_value(true)
                .possible_values(&["park", "reverse", "neutral", "drive", "sport"])
                .default_value("drive"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enable debug logging"),
        )
        .get_matches();

    let level = if matches.is_present("verbose") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match matches.value_of("config") {
        Some(path) => VcuConfig::from_file(path)?,
        None => VcuConfig::default(),
    };
    let duration_ms: u64 = matches.value_of("duration").unwrap_or("5000").parse()?;
    let mode = match matches.value_of("mode") {
        Some("off") => OpMode::Off,
        Some("charge") => OpMode::Charge,
        _ => OpMode::Run,
    };
    let lever = match matches.value_of("gear") {
        Some("park") => GearState::Park,
        Some("reverse") => GearState::Reverse,
        Some("neutral") => GearState::Neutral,
        Some("sport") => GearState::Sport,
        _ => GearState::Drive,
    };

    let mut params = ParamTable::new();
    config.apply(&mut params);
    params.set_op_mode(mode);
    params.set_bool(ParamId::T15Stat, true);

    let registry = config.build_registry()?;
    let mut host = VcuHost::new(FrameRecorder::new(), params, registry);
    host.start()?;

    // BMS goes quiet halfway through to exercise the freshness timeout.
    let bms_cutoff_ms = duration_ms / 2;
    let mut interval = time::interval(Duration::from_millis(STEP_MS));
    let mut now_ms = 0u64;

    while now_ms < duration_ms {
        interval.tick().await;

        if now_ms % LEVER_PERIOD_MS == 0 {
            host.receive(&lever_frame(lever, now_ms)?);
        }
        if now_ms % BMS_PERIOD_MS == 0 && now_ms < bms_cutoff_ms {
            host.receive(&Frame::new(
                TELEMETRY_ID,
                &bms_payload(3_650, 3_710, 295, 301),
            )?);
            host.receive(&Frame::new(CHARGE_LIMIT_ID, &[0, 0, 0x10, 0x27, 0, 0, 0, 0])?);
        }
        if now_ms == bms_cutoff_ms {
            warn!("BMS telemetry stopped");
        }

        host.advance(STEP_MS);
        now_ms += STEP_MS;
    }

    host.stop();
    print_summary(&host);

    if host.bus().dropped() > 0 {
        error!(dropped = host.bus().dropped(), "frame log overflowed");
    }
    info!("simulation complete");
    Ok(())
}

fn lever_frame(lever: GearState, now_ms: u64) -> Result<Frame, vcuemu::VcuError> {
    let sequence = ((now_ms / LEVER_PERIOD_MS) & 0x0F) as u8;
    Frame::new(
        LEVER_STATUS_ID,
        &[0, 0, 0, lever.lever_code() << 4, 0, 0, 0, sequence],
    )
}

fn bms_payload(min_mv: u16, max_mv: u16, min_k: u16, max_k: u16) -> [u8; 8] {
    let mut payload = [0u8; 8];
    payload[0..2].copy_from_slice(&min_mv.to_le_bytes());
    payload[2..4].copy_from_slice(&max_mv.to_le_bytes());
    payload[4..6].copy_from_slice(&min_k.to_le_bytes());
    payload[6..8].copy_from_slice(&max_k.to_le_bytes());
    payload
}

fn print_summary(host: &VcuHost<FrameRecorder>) {
    let state = host.get_state();
    let params = host.params();

    println!("{}", "VCU Emulator Summary".bold().cyan());
    println!("  Uptime:            {} ms", state.uptime_ms);
    println!(
        "  Frames in:         {} ({} unclaimed)",
        state.frames_received, state.frames_unclaimed
    );
    println!("  Frames out:        {}", host.bus().sent().len());

    if let Some(shifter) = host.module::<GearShifter>() {
        let status_frames = host.bus().sent_with_id(GEAR_STATUS_ID).count();
        let transmitting = if shifter.is_transmitting() {
            "transmitting".green()
        } else {
            "suspended".yellow()
        };
        println!(
            "  Gear:              {:?} ({} status frames, {})",
            shifter.get_gear(),
            status_frames,
            transmitting
        );
    }

    if let Some(bms) = host.module::<BatteryMonitor>() {
        let validity = if bms.is_data_valid() {
            "valid".green()
        } else {
            "stale".red()
        };
        println!("  BMS data:          {}", validity);
        println!(
            "  Cell V min/max:    {:.3} / {:.3}",
            params.get_float(ParamId::BmsVmin),
            params.get_float(ParamId::BmsVmax)
        );
        println!(
            "  Temp C min/max:    {:.1} / {:.1}",
            params.get_float(ParamId::BmsTmin),
            params.get_float(ParamId::BmsTmax)
        );
        println!(
            "  Charge limit:      {:.2} A",
            params.get_float(ParamId::BmsChargeLim)
        );
    }
}
