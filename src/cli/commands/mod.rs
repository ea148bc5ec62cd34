mod enhance;
mod list;
mod prune;
mod status;

pub use enhance::cmd_enhance;
pub use list::cmd_list_generations;
pub use prune::cmd_prune;
pub use status::cmd_status;
