// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

mod args;

use args::Args;
use clap::Parser;
use ripple::{
    error::Error,
    observer::Observer,
    param::ParamId,
    profile::{SensorProfile, SlotConfig},
    sensor::{RadarModule, RadarSensor},
};
use std::{
    fs::File,
    io::{BufWriter, Write},
    time::Duration,
};
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::{layer::SubscriberExt as _, Layer as _, Registry};
use tracy_client::{frame_mark, plot, secondary_frame_mark};

#[cfg(feature = "profiling")]
#[global_allocator]
static GLOBAL: tracy_client::ProfiledAllocator<std::alloc::System> =
    tracy_client::ProfiledAllocator::new(std::alloc::System, 100);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    args.tracy.then(tracy_client::Client::start);

    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(args.rust_log);

    let journald = match tracing_journald::layer() {
        Ok(journald) => Some(journald.with_filter(args.rust_log)),
        Err(_) => None,
    };

    let tracy = match args.tracy {
        true => Some(tracing_tracy::TracyLayer::default().with_filter(args.rust_log)),
        false => None,
    };

    let subscriber = Registry::default()
        .with(stdout_log)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;

    let profile = SensorProfile::from_path(&args.profile)?;
    let module = RadarModule::init();
    let sensor = module.create(args.radar_id, profile)?;

    let tracy = args.tracy;
    sensor.add_observer(
        Observer::new()
            .on_burst_ready(move || {
                tracy.then(|| secondary_frame_mark!("burst_ready"));
            })
            .on_register_set(|addr, value| debug!("register 0x{:08X} = {}", addr, value)),
    )?;
    sensor.set_log_level(args.driver_log.into())?;

    if let Some(country) = &args.country {
        sensor.check_country_code(country)?;
    }
    sensor.log_sensor_details()?;

    if args.info {
        println!("{}", serde_json::to_string_pretty(&sensor.sensor_info()?)?);
        module.destroy(sensor)?;
        module.deinit()?;
        return Ok(());
    }

    let result = run(&sensor, &args);

    if let Err(err) = sensor.stop_streaming() {
        warn!("stop streaming: {}", err);
    }
    let stats = sensor.stream_stats();
    info!(
        "{} bursts acquired, {} dropped by the fifo",
        stats.acquired, stats.dropped
    );

    if args.registers {
        for (addr, value) in sensor.all_registers()? {
            println!("0x{:08X}: {}", addr, value);
        }
    }

    module.destroy(sensor)?;
    module.deinit()?;
    result
}

fn run(sensor: &RadarSensor, args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    info_span!("configure", slot = args.slot).in_scope(|| -> Result<(), Error> {
        match &args.slot_config {
            Some(path) => {
                let config = SlotConfig::from_path(path)?;
                sensor.apply_slot_config(args.slot, &config)?;
            }
            None => {
                sensor.set_main_param(args.slot, ParamId::BURST_PERIOD_US, args.burst_period_us)?
            }
        }

        sensor.activate_config(args.slot)?;
        sensor.turn_on()?;
        sensor.set_fifo_mode(args.fifo_mode.into())?;
        sensor.start_streaming()
    })?;

    let mut output = match &args.output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None => None,
    };

    let timeout = Duration::from_millis(args.timeout_ms);
    let mut count = 0;
    while args.bursts == 0 || count < args.bursts {
        let burst = match sensor.read_burst(timeout) {
            Ok(burst) => burst,
            Err(Error::Timeout) => {
                warn!("no burst within {:?}", timeout);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        info!("{} at {} us", burst.format, burst.timestamp_us);
        args.tracy.then(|| plot!("burst_bytes", burst.data.len() as f64));

        if let Some(output) = &mut output {
            output.write_all(&burst.to_wire())?;
        }

        args.tracy.then(frame_mark);
        count += 1;
    }

    if let Some(mut output) = output {
        output.flush()?;
    }

    sensor.stop_streaming()?;
    sensor.turn_off()?;
    Ok(())
}
