use clap::{App, Arg, ArgMatches, SubCommand};
use log::{debug, info, warn};
use shmclock::{
    defaults,
    driver::shm::PeekOutcome,
    segment::{layout, segment_key, segment_permissions},
    AttachedSegment, BackingType, DriverConfig, FaultKind, LeapIndicator, Publication, ReadMode,
    RefClock, Result, SegmentAccess, SegmentPublisher, ShmClockError, ShmRefClock, SyncEngine,
    SystemClock, Timestamp, WallClock,
};
use std::{thread, time::Duration};

fn main() -> Result<()> {
    env_logger::init();

    let matches = App::new("shmclock-cli")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Shared memory reference clock tool")
        .subcommand(
            SubCommand::with_name("watch")
                .about("Run the driver against a unit and log accepted samples")
                .args(&unit_args())
                .args(&control_args())
                .arg(
                    Arg::with_name("ticks")
                        .short("n")
                        .long("ticks")
                        .value_name("TICKS")
                        .help("Stop after this many timer ticks (0 runs forever)")
                        .default_value("0")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("poll")
                        .short("p")
                        .long("poll")
                        .value_name("SECONDS")
                        .help("Poll interval in seconds")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("post")
                .about("Act as a producer and post the current time")
                .args(&unit_args())
                .arg(
                    Arg::with_name("mode")
                        .short("m")
                        .long("mode")
                        .value_name("MODE")
                        .help("0 = unguarded, 1 = count-guarded")
                        .possible_values(&["0", "1"])
                        .default_value("1")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("offset")
                        .short("o")
                        .long("offset")
                        .value_name("SECONDS")
                        .help("Offset added to the clock timestamp")
                        .default_value("0")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("count")
                        .short("c")
                        .long("count")
                        .value_name("COUNT")
                        .help("Number of samples to post, one per second")
                        .default_value("1")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("dump")
                .about("Print the raw fields of a unit's segment")
                .args(&unit_args()),
        )
        .subcommand(
            SubCommand::with_name("info")
                .about("Show version and segment layout information")
                .args(&unit_args()),
        )
        .get_matches();

    match matches.subcommand() {
        ("watch", Some(watch_matches)) => handle_watch(watch_matches),
        ("post", Some(post_matches)) => handle_post(post_matches),
        ("dump", Some(dump_matches)) => handle_dump(dump_matches),
        ("info", Some(info_matches)) => show_info(info_matches),
        _ => {
            println!("Use --help for usage information");
            Ok(())
        }
    }
}

fn unit_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("unit")
            .short("u")
            .long("unit")
            .value_name("UNIT")
            .help("Unit index (segment key 0x4e545030 + UNIT)")
            .takes_value(true),
        Arg::with_name("file")
            .short("f")
            .long("file")
            .value_name("FILE")
            .help("Use a memory-mapped file instead of SysV shared memory")
            .takes_value(true),
        Arg::with_name("config")
            .long("config")
            .value_name("CONFIG")
            .help("TOML driver configuration")
            .takes_value(true),
    ]
}

fn control_args<'a, 'b>() -> Vec<Arg<'a, 'b>> {
    vec![
        Arg::with_name("time1")
            .long("time1")
            .value_name("SECONDS")
            .help("Fudge offset added to every sample")
            .takes_value(true),
        Arg::with_name("time2")
            .long("time2")
            .value_name("SECONDS")
            .help("Maximum receive/clock difference (1..86400)")
            .takes_value(true),
        Arg::with_name("flag1")
            .long("flag1")
            .help("Disable the receive/clock difference check"),
        Arg::with_name("flag4")
            .long("flag4")
            .help("Print the clock statistics line every poll"),
    ]
}

fn parse_arg<T: std::str::FromStr>(matches: &ArgMatches, name: &str) -> Result<Option<T>> {
    match matches.value_of(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ShmClockError::invalid_parameter(name, format!("Invalid value '{}'", value))),
        None => Ok(None),
    }
}

fn driver_config(matches: &ArgMatches) -> Result<DriverConfig> {
    let mut config = match matches.value_of("config") {
        Some(path) => DriverConfig::from_toml_file(path)?,
        None => DriverConfig::default(),
    };

    if let Some(unit) = parse_arg(matches, "unit")? {
        config.unit = unit;
    }
    if let Some(path) = matches.value_of("file") {
        config.segment.backing_type = BackingType::FileBacked;
        config.segment.file_path = Some(path.into());
    }
    if let Some(time1) = parse_arg(matches, "time1")? {
        config.control.time1 = time1;
    }
    if let Some(time2) = parse_arg(matches, "time2")? {
        config.control.time2 = time2;
    }
    if matches.is_present("flag1") {
        config.control.flag1 = true;
    }
    if matches.is_present("flag4") {
        config.control.flag4 = true;
    }

    config.validate()?;
    Ok(config)
}

/// Engine stand-in that logs what a synchronization engine would receive
#[derive(Debug, Default)]
struct LogEngine {
    pending: usize,
}

impl SyncEngine for LogEngine {
    fn submit_offset(&mut self, receive: Timestamp, clock: Timestamp, fudge: f64) {
        self.pending += 1;
        let offset = clock.seconds_since(&receive) + fudge;
        info!(
            "offset {:+.9}s (clock {:#018x}, receive {:#018x})",
            offset,
            clock.to_ntp_fixed(),
            receive.to_ntp_fixed()
        );
    }

    fn set_leap(&mut self, leap: LeapIndicator) {
        if leap != LeapIndicator::NoWarning {
            warn!("leap indicator {:?}", leap);
        }
    }

    fn set_precision(&mut self, precision: i32) {
        debug!("precision 2^{}", precision);
    }

    fn receive(&mut self) {
        info!("{} samples this poll", self.pending);
        self.pending = 0;
    }

    fn report_fault(&mut self, fault: FaultKind) {
        warn!("clock fault: {:?}", fault);
    }

    fn record_clock_stats(&mut self, line: &str) {
        info!("clockstats {}", line);
    }
}

fn handle_watch(matches: &ArgMatches) -> Result<()> {
    let config = driver_config(matches)?;
    let ticks: u64 = parse_arg(matches, "ticks")?.unwrap_or(0);
    let poll: u64 = parse_arg(matches, "poll")?.unwrap_or(defaults::POLL_INTERVAL_SECS).max(1);

    let mut driver = ShmRefClock::from_config(&config)?;
    let mut engine = LogEngine::default();

    println!(
        "Watching unit {} ({}), drift limit {}s, poll every {}s",
        config.unit,
        config.segment.backing_type.name(),
        driver.thresholds().max_delta,
        poll
    );

    if let Err(e) = driver.start(&mut engine) {
        warn!("start failed, retrying every tick: {}", e);
    }

    let mut tick: u64 = 0;
    while ticks == 0 || tick < ticks {
        tick += 1;
        match driver.peek(&mut engine) {
            PeekOutcome::Accepted(sample) => println!("{}", sample.timecode),
            other => debug!("tick {}: {:?}", tick, other),
        }
        if tick % poll == 0 {
            driver.poll(&mut engine);
            debug!("poll cycle {} complete", driver.polls());
        }
        thread::sleep(Duration::from_secs(defaults::TIMER_INTERVAL_SECS));
    }

    driver.poll(&mut engine);
    driver.shutdown();
    Ok(())
}

fn handle_post(matches: &ArgMatches) -> Result<()> {
    let config = driver_config(matches)?;
    let mode = match parse_arg::<i32>(matches, "mode")?.and_then(ReadMode::from_tag) {
        Some(mode) => mode,
        None => return Err(ShmClockError::invalid_parameter("mode", "Mode must be 0 or 1")),
    };
    let offset: f64 = parse_arg(matches, "offset")?.unwrap_or(0.0);
    let count: u64 = parse_arg(matches, "count")?.unwrap_or(1);

    let segment = AttachedSegment::attach(config.unit, &config.segment)?;
    let publisher = SegmentPublisher::new(segment.view(), mode);
    let offset_nanos = (offset * 1e9).round() as i64;

    for i in 0..count {
        let now = SystemClock.now();
        let clock = Timestamp::from_parts(now.secs, now.nanos as i64 + offset_nanos);
        publisher.publish(&Publication::from_timestamps(clock, now));
        println!("posted {:?} sample {} to unit {}", mode, i + 1, config.unit);
        if i + 1 < count {
            thread::sleep(Duration::from_secs(1));
        }
    }

    Ok(())
}

fn handle_dump(matches: &ArgMatches) -> Result<()> {
    let config = driver_config(matches)?;
    let segment = AttachedSegment::attach(config.unit, &config.segment)?;
    let snap = segment.view().snapshot();

    println!("unit:          {}", config.unit);
    println!("mode:          {}", snap.mode);
    println!("count:         {}", snap.count);
    println!("valid:         {}", segment.valid());
    println!(
        "clock:         {}.{:06} ({} ns)",
        snap.clock_sec, snap.clock_usec, snap.clock_nsec
    );
    println!(
        "receive:       {}.{:06} ({} ns)",
        snap.receive_sec, snap.receive_usec, snap.receive_nsec
    );
    println!("leap:          {}", snap.leap);
    println!("precision:     {}", snap.precision);
    println!("nsamples:      {}", snap.nsamples);
    Ok(())
}

fn show_info(matches: &ArgMatches) -> Result<()> {
    let config = driver_config(matches)?;
    println!("shmclock {}", shmclock::VERSION);
    println!("Segment size: {} bytes", layout::SEGMENT_SIZE);
    println!("Unit {} key: {:#x}", config.unit, segment_key(config.unit));
    println!("Unit {} permissions: {:#o}", config.unit, segment_permissions(config.unit));
    println!("Backing: {}", config.segment.backing_type.name());
    println!("Maximum sample age: {}s", defaults::MAX_DELAY_SECS);
    println!("Default drift limit: {}s", defaults::MAX_DELTA_SECS);
    Ok(())
}
