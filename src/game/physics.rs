//! Car physics: the per-tick speed and position update

use super::results::CarPosition;

/// Speed units needed to advance one segment per tick
pub const SPEED_PER_SEGMENT: i32 = 30;
/// Player acceleration is scaled down by this factor before input is added
pub const PLAYER_ACCELERATION_DIVISOR: i32 = 3;
/// Speed the player loses on a tick with no input
pub const IDLE_DECAY: i32 = 20;

/// Physics system for updating car speeds and segments
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Speed of the human-controlled car after one tick.
    ///
    /// Any input since the last tick adds a third of the car's acceleration
    /// plus one per click. No input decays speed with no lower bound.
    pub fn player_speed(speed: i32, acceleration: i32, pending: u32) -> i32 {
        if pending > 0 {
            let clicks = i32::try_from(pending).unwrap_or(i32::MAX);
            speed
                .saturating_add(acceleration / PLAYER_ACCELERATION_DIVISOR)
                .saturating_add(clicks)
        } else {
            speed.saturating_sub(IDLE_DECAY)
        }
    }

    /// Speed of an AI car after one tick
    pub fn ai_speed(speed: i32, acceleration: i32) -> i32 {
        speed.saturating_add(acceleration)
    }

    /// Segments covered in one tick. Negative speed never moves a car back.
    pub fn segments_covered(speed: i32) -> u32 {
        (speed / SPEED_PER_SEGMENT).max(0) as u32
    }

    /// Advance every car by one tick.
    ///
    /// Cars are processed in entry order, which is also the tie-break when
    /// several cars cross the line on the same tick. Cars that already hold
    /// a final position are left untouched. Returns true once every car has
    /// finished.
    pub fn step(
        positions: &mut [CarPosition],
        player_id: u32,
        pending: u32,
        track_length: u32,
    ) -> bool {
        let mut next_rank = positions.iter().filter(|p| p.is_finished()).count() as u32 + 1;
        let mut all_finished = true;

        for position in positions.iter_mut() {
            if position.is_finished() {
                continue;
            }

            let speed = if position.car.id == player_id {
                Self::player_speed(position.speed, position.car.acceleration, pending)
            } else {
                Self::ai_speed(position.speed, position.car.acceleration)
            };
            position.speed = speed.min(position.car.top_speed);

            let segment = position
                .segment
                .saturating_add(Self::segments_covered(position.speed));
            if segment >= track_length {
                position.segment = track_length;
                position.final_position = Some(next_rank);
                next_rank += 1;
            } else {
                position.segment = segment;
                all_finished = false;
            }
        }

        all_finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Car;

    fn position(id: u32, acceleration: i32, top_speed: i32) -> CarPosition {
        CarPosition::new(Car {
            id,
            name: format!("Car {}", id),
            acceleration,
            top_speed,
        })
    }

    #[test]
    fn ai_car_accelerates_and_finishes() {
        let mut positions = vec![position(1, 15, 60)];

        assert!(!PhysicsSystem::step(&mut positions, 0, 0, 2));
        assert_eq!((positions[0].speed, positions[0].segment), (15, 0));

        assert!(!PhysicsSystem::step(&mut positions, 0, 0, 2));
        assert_eq!((positions[0].speed, positions[0].segment), (30, 1));

        assert!(PhysicsSystem::step(&mut positions, 0, 0, 2));
        assert_eq!((positions[0].speed, positions[0].segment), (45, 2));
        assert_eq!(positions[0].final_position, Some(1));
    }

    #[test]
    fn idle_player_decays_without_floor() {
        let mut positions = vec![position(7, 30, 100)];
        let mut speeds = Vec::new();
        for _ in 0..3 {
            PhysicsSystem::step(&mut positions, 7, 0, 10);
            speeds.push(positions[0].speed);
            assert_eq!(positions[0].segment, 0);
        }
        // No lower clamp: sustained inaction drives speed negative.
        assert_eq!(speeds, vec![-20, -40, -60]);
    }

    #[test]
    fn player_input_uses_truncated_third_of_acceleration() {
        let mut positions = vec![position(7, 30, 100)];
        PhysicsSystem::step(&mut positions, 7, 1, 10);
        assert_eq!(positions[0].speed, 11);
        assert_eq!(positions[0].segment, 0);

        let mut positions = vec![position(7, 32, 100)];
        PhysicsSystem::step(&mut positions, 7, 1, 10);
        assert_eq!(positions[0].speed, 11);
    }

    #[test]
    fn coalesced_clicks_match_single_weighted_input() {
        assert_eq!(PhysicsSystem::player_speed(0, 30, 5), 30 / 3 + 5);
        assert_eq!(
            PhysicsSystem::player_speed(40, 45, 12),
            PhysicsSystem::player_speed(40, 45, 1) + 11
        );
    }

    #[test]
    fn speed_is_capped_at_top_speed() {
        let mut positions = vec![position(1, 50, 70), position(2, 30, 100)];
        for _ in 0..5 {
            PhysicsSystem::step(&mut positions, 2, 20, 1_000);
            assert!(positions[0].speed <= 70);
            assert!(positions[1].speed <= 100);
        }
        assert_eq!(positions[0].speed, 70);
        assert_eq!(positions[1].speed, 100);
    }

    #[test]
    fn negative_speed_never_moves_car_backwards() {
        let mut positions = vec![position(7, 30, 100)];
        positions[0].segment = 4;
        positions[0].speed = -100;
        PhysicsSystem::step(&mut positions, 7, 0, 10);
        assert_eq!(positions[0].segment, 4);
        assert_eq!(PhysicsSystem::segments_covered(-59), 0);
        assert_eq!(PhysicsSystem::segments_covered(59), 1);
    }

    #[test]
    fn simultaneous_finishers_ranked_by_entry_order() {
        let mut positions = vec![
            position(3, 60, 60),
            position(1, 60, 60),
            position(2, 30, 30),
        ];

        assert!(!PhysicsSystem::step(&mut positions, 0, 0, 2));
        assert_eq!(positions[0].final_position, Some(1));
        assert_eq!(positions[1].final_position, Some(2));
        assert_eq!(positions[2].final_position, None);

        assert!(PhysicsSystem::step(&mut positions, 0, 0, 2));
        assert_eq!(positions[2].final_position, Some(3));
    }

    #[test]
    fn finished_cars_are_frozen() {
        let mut positions = vec![position(1, 60, 60), position(2, 1, 1)];
        PhysicsSystem::step(&mut positions, 0, 0, 2);
        let frozen = positions[0].clone();

        for _ in 0..3 {
            PhysicsSystem::step(&mut positions, 0, 0, 2);
            assert_eq!(positions[0], frozen);
        }
    }

    #[test]
    fn final_positions_form_a_permutation() {
        let mut positions: Vec<CarPosition> = (1..=6)
            .map(|id| position(id, 5 * id as i32, 200))
            .collect();

        let mut ticks = 0;
        while !PhysicsSystem::step(&mut positions, 0, 0, 20) {
            ticks += 1;
            assert!(ticks < 1_000);
        }

        let mut ranks: Vec<u32> = positions.iter().filter_map(|p| p.final_position).collect();
        ranks.sort_unstable();
        assert_eq!(ranks, (1..=6).collect::<Vec<u32>>());
        assert!(positions.iter().all(|p| p.segment == 20));
    }
}
