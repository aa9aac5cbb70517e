use chrono::Timelike;
use clap::{Parser, Subcommand};
use patch_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "patchctl")]
#[command(about = "Insulin patch pump schedule and status tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a basal profile into a day schedule and summarize it
    Schedule {
        /// Basal profile JSON file
        #[arg(long)]
        profile: PathBuf,

        /// Also show the rate in force at this time of day (HH:MM)
        #[arg(long)]
        at: Option<String>,
    },

    /// Decode a status frame reported by the patch
    Decode {
        /// Frame payload as hex (16 bytes)
        #[arg(long)]
        frame: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    patch_core::logging::init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Schedule { profile, at } => cmd_schedule(&profile, at.as_deref(), &config),
        Commands::Decode { frame } => cmd_decode(&frame, &config),
    }
}

fn cmd_schedule(profile_path: &Path, at: Option<&str>, config: &Config) -> Result<()> {
    let profile = BasalProfile::from_json_file(profile_path)?;
    let schedule = BasalScheduleManager::schedule_from_profile(&profile)?;

    println!("Basal schedule ({} segments)", schedule.segments().len());
    for segment in schedule.segments().segments() {
        println!(
            "  {} - {}  {:.2} U/h",
            format_minute(segment.start_minute()),
            format_minute(segment.end_minute()),
            segment.units_per_hour()
        );
    }
    println!();

    if schedule.segments().covers_full_day() {
        println!("Coverage: full day");
    } else {
        let (gap_start, gap_end) = schedule.segments().first_gap();
        println!(
            "Coverage: INCOMPLETE (slots {}..{} uncovered)",
            gap_start, gap_end
        );
    }
    println!("Max rate: {:.2} U/h", schedule.max_rate());
    println!(
        "Total daily dose: {:.2} U",
        config.round_dose(schedule.units_per_day())
    );

    if let Some(at) = at {
        let minute = parse_clock_time(at)?;
        let rate = schedule.rate_per_cell()[(minute / MINUTES_PER_CELL) as usize];
        println!("Rate at {}: {:.2} U/h", at, rate);
    }

    Ok(())
}

fn cmd_decode(frame_hex: &str, config: &Config) -> Result<()> {
    let bytes = parse_hex(frame_hex)?;
    let mut state = PatchState::new();
    state.update(&bytes, chrono::Utc::now())?;

    println!("Patch status");
    println!("  Basal:       {}", active_label(state.is_basal_active()));
    println!(
        "  Temp basal:  {}",
        active_label(state.is_temp_basal_active())
    );
    println!(
        "  Bolus (now): {}",
        active_label(state.is_now_bolus_active())
    );
    println!(
        "  Bolus (ext): {}",
        active_label(state.is_ext_bolus_active())
    );
    println!(
        "  Battery:     {}% (raw {})",
        state.battery_percent(&config.battery),
        state.battery_raw()
    );

    let mut raised = Vec::new();
    if state.has_occlusion() {
        raised.push(AlarmCode::Occlusion);
    }
    if state.is_reservoir_low() {
        raised.push(AlarmCode::LowReservoir);
    }
    if state.is_reservoir_empty() {
        raised.push(AlarmCode::EmptyReservoir);
    }
    if state.is_battery_low() {
        raised.push(AlarmCode::LowBattery);
    }

    if raised.is_empty() {
        println!("  Alarms:      none");
    } else {
        println!("  Alarms:");
        for code in raised {
            let meta = code.meta();
            println!("    ! {} ({:?})", meta.label, meta.priority);
        }
    }

    Ok(())
}

fn active_label(active: bool) -> &'static str {
    if active {
        "active"
    } else {
        "inactive"
    }
}

fn format_minute(minute: u32) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

fn parse_clock_time(s: &str) -> Result<u32> {
    let time = chrono::NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::Config(format!("invalid time {:?}, expected HH:MM", s)))?;
    Ok(time.hour() * 60 + time.minute())
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some(bad) = cleaned.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(Error::Frame(format!("invalid hex character {:?}", bad)));
    }
    if cleaned.len() % 2 != 0 {
        return Err(Error::Frame(format!(
            "hex payload has odd length {}",
            cleaned.len()
        )));
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|e| Error::Frame(format!("bad hex byte: {}", e)))
        })
        .collect()
}
