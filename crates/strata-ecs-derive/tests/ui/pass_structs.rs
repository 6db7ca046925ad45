//! Test that structs of every shape derive Component.

use strata_ecs::{Component, ComponentId};

#[derive(Component, Clone, Copy)]
#[component(id = 1)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component)]
#[component(id = 2)]
struct Health(u32);

#[derive(Component)]
#[component(id = 3)]
struct Player;

#[derive(Component)]
#[component(id = 2047)]
struct LastDataId {
    name: String,
}

const _: () = assert!(Position::ID.as_raw() == 1);
const _: () = assert!(!LastDataId::ID.is_tag());

fn ids() -> [ComponentId; 4] {
    [Position::ID, Health::ID, Player::ID, LastDataId::ID]
}

fn main() {
    assert_eq!(ids().map(ComponentId::as_raw), [1, 2, 3, 2047]);
}
