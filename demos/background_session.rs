/// Background session example: run the threaded pipeline over replayed sensors
///
/// Motion permission is refused, so the session runs on GPS alone and the
/// summary carries the degraded status.
use std::time::Duration;

use dinowalk::{
    geo, DinoWalkError, MemorySink, Position, PositionFix, ReplaySource, SensorError, SensorEvent,
    SensorKind, SessionPipeline, UnavailableSource, WalkConfig,
};

fn main() -> dinowalk::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let meters_to_deg = |m: f64| (m / geo::EARTH_RADIUS_M).to_degrees();
    let fixes: Vec<SensorEvent> = (0..20u64)
        .map(|i| {
            let latitude = 51.5007 + meters_to_deg(1.4 * i as f64);
            let position = Position::at(latitude, -0.1246, i * 1000);
            SensorEvent::Position(PositionFix::new(position, Some(8.0)))
        })
        .collect();

    let (gps, replay_done) = ReplaySource::with_completion(SensorKind::Geolocation, fixes);
    let sink = MemorySink::new();
    let (pipeline, handle) = SessionPipeline::new(WalkConfig::default(), Box::new(sink.clone()));
    let worker = pipeline
        .with_source(Box::new(gps.paced(Duration::from_millis(5))))
        .with_source(Box::new(UnavailableSource::new(
            SensorKind::Motion,
            SensorError::PermissionDenied,
        )))
        .spawn()?;

    handle.start()?;
    let delivered = replay_done
        .recv()
        .map_err(|_| DinoWalkError::PipelineClosed)?;
    println!("replayed {} fixes", delivered);

    let live = handle.snapshot()?;
    println!(
        "live: {} at {} (gps {:?}, motion {:?})",
        geo::format_distance(live.aggregate.distance_m),
        geo::format_speed(live.aggregate.speed_mps),
        live.geolocation_status,
        live.motion_status
    );

    handle.stop()?;
    handle.shutdown()?;
    if worker.join().is_err() {
        eprintln!("pipeline thread panicked");
    }

    for summary in sink.sessions() {
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    }
    Ok(())
}
