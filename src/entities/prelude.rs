pub use super::generations::Entity as Generations;
