pub mod prelude;

pub mod generations;
