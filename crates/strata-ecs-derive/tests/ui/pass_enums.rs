//! Test that enums are allowed as components.

use strata_ecs::Component;

#[derive(Component, Clone, Copy)]
#[component(id = 10)]
enum Team {
    Red,
    Blue,
}

#[derive(Component, Clone, Copy)]
#[component(id = 11)]
enum Action {
    Move { dx: f32, dy: f32 },
    Wait,
    Attack { target: u32 },
}

fn main() {
    assert_ne!(Team::ID, Action::ID);
}
