//! Ready-made road networks.

use crate::error::LayoutError;
use crate::math::Point2d;
use crate::spawner::Spawner;
use crate::vehicle::VehicleAttributes;
use crate::world::World;

fn points(coords: &[(f64, f64)]) -> Vec<Point2d> {
    coords.iter().map(|&(x, y)| Point2d::new(x, y)).collect()
}

/// Builds a three lane highway which narrows to two lanes around a bend,
/// is joined by a single lane on-ramp and widens back to three lanes.
/// The rightmost lane of the first stretch ends at an obstacle.
///
/// Two spawners feed 50 vehicles onto the highway: 12 sportscars,
/// 6 trucks and 32 minivans. The spawners are seeded from the world's seed.
pub fn highway(world: &mut World) -> Result<(), LayoutError> {
    let spawn = points(&[(-500.0, -23.0), (-490.0, -23.0), (-360.0, -23.0), (-350.0, -23.0)]);
    let path0 = points(&[
        (-330.218669385, -23.8417247666),
        (-325.218669385, -23.8417247666),
        (-270.218669385, -23.8417247666),
        (-260.218669385, -23.8417247666),
        (-233.948921101, -25.4179096636),
        (-214.509307372, -29.0956744232),
        (-194.018903711, -28.0448844919),
        (-178.782449707, -22.2655398696),
        (-160.919020874, -12.8084304876),
        (-144.106381973, -8.07987579663),
        (-126.24295314, -4.92750600264),
        (-112.582684033, -3.35132110564),
        (-94.1938602344, -2.30053117431),
        (-90.0, -2.0),
        (-50.0, -2.0),
        (-30.0, -2.0),
    ]);
    let path1 = points(&[
        (70.0, -2.0),
        (90.0, -2.0),
        (101.538461538, -2.69230769231),
        (113.846153846, -5.76923076923),
        (126.923076923, -13.4615384615),
        (139.230769231, -24.2307692308),
        (144.757330429, -38.0015384615),
        (148.852715044, -52.3353846154),
        (145.781176583, -66.6692307692),
        (132.471176583, -78.9553846154),
        (111.994253506, -86.1223076923),
        (81.2788688905, -87.1461538462),
        (58.7542535059, -88.17),
    ]);
    let path2 = points(&[
        (81.2788688905, -87.1461538462),
        (58.7542535059, -88.17),
        (42.3076923077, -90.6923076923),
        (26.1538461538, -95.3076923077),
        (12.3076923077, -103.0),
        (-3.07692307692, -109.153846154),
        (-20.7692307692, -111.461538462),
        (-46.1538461538, -111.461538462),
        (-73.0769230769, -111.461538462),
        (-101.538461538, -114.538461538),
        (-122.307692308, -111.461538462),
        (-150.0, -110.692307692),
    ]);
    let side = points(&[
        (199.230769231, -170.538461538),
        (196.153846154, -153.615384615),
        (190.769230769, -142.846153846),
        (182.307692308, -132.076923077),
        (170.0, -121.307692308),
        (157.692307692, -113.615384615),
        (143.846153846, -105.923076923),
        (130.0, -100.538461538),
        (113.076923077, -97.4615384615),
        (90.7692307692, -96.6923076923),
        (70.3760010455, -95.8844097781),
    ]);
    let end = points(&[
        (-150.0, -110.0),
        (-160.0, -110.0),
        (-200.0, -110.0),
        (-300.0, -110.0),
        (-310.0, -110.0),
    ]);

    let road_spawn = world.add_road(&spawn, 3)?;
    let road_path0 = world.add_road(&path0, 3)?;
    let road_path1 = world.add_road(&path1, 2)?;
    let road_path2 = world.add_road(&path2, 3)?;
    let road_side = world.add_road(&side, 1)?;
    let road_end = world.add_road(&end, 3)?;

    let closed = world.network().road(road_path0).lanes()[2];
    let obstacle_pos = world.network().lane(closed).center().last().copied();
    if let Some(pos) = obstacle_pos {
        world.add_obstacle(closed, pos);
    }

    world.connect_roads(road_spawn, road_path0, &[(0, 0), (1, 1), (2, 2)])?;
    world.connect_roads(road_path0, road_path1, &[(0, 0), (1, 1)])?;
    world.connect_roads(road_path1, road_path2, &[(0, 0), (1, 1)])?;
    world.connect_roads(road_side, road_path2, &[(0, 2)])?;
    world.connect_roads(road_path2, road_end, &[(0, 0), (1, 1), (2, 2)])?;

    let seed = world.seed();
    world.add_spawner(Spawner::new(road_spawn).seed(seed))?;
    world.add_spawner(Spawner::new(road_side).seed(seed.wrapping_add(1)))?;

    let fleet = [
        (12, VehicleAttributes::sportscar()),
        (6, VehicleAttributes::truck()),
        (32, VehicleAttributes::minivan()),
    ];
    for (count, attributes) in fleet {
        for _ in 0..count {
            world.add_vehicle(&attributes);
        }
    }
    Ok(())
}
