pub mod api;
pub mod binding;
pub mod supervisor;

pub use binding::{Binding, BindingHealth};
pub use supervisor::{Supervisor, SystemHealth};
