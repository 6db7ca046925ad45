//! Test that generic components keep their bounds.

use strata_ecs::Component;

#[derive(Component)]
#[component(id = 20)]
struct Wrapper<T: Send + Sync + 'static>(T);

#[derive(Component)]
#[component(id = 21)]
struct Pair<A, B>
where
    A: Send + Sync + 'static,
    B: Send + Sync + 'static,
{
    first: A,
    second: B,
}

fn main() {
    assert_eq!(Wrapper::<u8>::ID, Wrapper::<String>::ID);
    assert_eq!(Pair::<u8, u16>::ID.as_raw(), 21);
}
