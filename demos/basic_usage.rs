/// Basic usage example: feed a walk into a session, read steps and distance
use dinowalk::{
    geo, AccelerationSample, Dinosaur, Position, PositionFix, WalkConfig, WalkingSession,
};

fn main() {
    println!("=== DinoWalk: Basic Example ===\n");

    let mut session = WalkingSession::new(&WalkConfig::default());
    if let Err(err) = session.start_session() {
        eprintln!("could not start: {}", err);
        return;
    }

    // Ten seconds at 50Hz: a step every half second, each spike followed by a dip
    for i in 0..500u64 {
        let z = match i % 25 {
            0 if i > 0 => 24.0,
            2 if i > 2 => 2.5,
            _ => 9.81,
        };
        let sample = AccelerationSample::new(i * 20, 0.0, 0.0, z);
        if let Some(step) = session.observe_acceleration(&sample) {
            println!(
                "  step {:>2} at {:>5}ms (magnitude {:.1} over baseline {:.1})",
                step.step_number, step.timestamp_ms, step.magnitude, step.baseline
            );
        }
    }

    // One fix per second, about 1.3m apart; the sixth is a wild GPS jump
    let meters_to_deg = |m: f64| (m / geo::EARTH_RADIUS_M).to_degrees();
    for i in 0..10u64 {
        let mut lat = 35.6812 + meters_to_deg(1.3 * i as f64);
        if i == 5 {
            lat += meters_to_deg(2_000.0);
        }
        let fix = PositionFix::new(Position::at(lat, 139.7671, i * 1000), Some(6.0));
        session.observe_position(&fix);
    }

    println!("\nLive view:");
    println!("  Steps:    {}", session.steps());
    println!("  Distance: {}", geo::format_distance(session.distance_m()));
    println!("  Speed:    {}", geo::format_speed(session.speed_mps()));
    println!("  Moving:   {}", session.is_moving());

    let summary = match session.stop_session() {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("could not stop: {}", err);
            return;
        }
    };

    let mut rex = Dinosaur::new("Rex");
    let gain = rex.gain_experience(summary.experience_gained);
    println!(
        "\n{} gained {} xp and is level {} ({:.0}% to next)",
        rex.name,
        gain.gained,
        rex.level,
        rex.level_progress_percent()
    );
}
