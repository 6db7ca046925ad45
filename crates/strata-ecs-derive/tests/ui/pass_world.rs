//! Test that derived components work with a world.

use strata_ecs::{Component, World};

#[derive(Component, Debug, Clone, Copy, PartialEq)]
#[component(id = 1)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, PartialEq)]
#[component(id = 2)]
struct Velocity {
    x: f32,
    y: f32,
}

fn main() {
    let mut world = World::new();
    world.register::<Position>().unwrap();
    world.register::<Velocity>().unwrap();

    let e = world
        .spawn((Position { x: 0.0, y: 0.0 }, Velocity { x: 1.0, y: 2.0 }))
        .unwrap();

    world
        .query::<(&mut Position, &Velocity)>()
        .for_each(&mut world, |_, (p, v)| {
            p.x += v.x;
            p.y += v.y;
        });

    assert_eq!(
        world.get_component::<Position>(e),
        Ok(&Position { x: 1.0, y: 2.0 })
    );
}
